use std::io::{self, Read, Result as IoResult, Write};

/// Unbuffered writer on the process's standard output.
///
/// Every `write` is exactly one `write(2)` call. Nothing is buffered or
/// allocated, so it can be used from the `SIGINT` handler and output
/// interleaves correctly with output of forked children.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawStdout;

impl Write for RawStdout {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        // SAFETY: `data` is a valid buffer of `data.len()` bytes.
        let n = unsafe { libc::write(libc::STDOUT_FILENO, data.as_ptr().cast(), data.len()) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

/// Unbuffered reader on the process's standard input.
///
/// Every `read` is exactly one `read(2)` call; a read cut short by a signal
/// is reported as [`io::ErrorKind::Interrupted`] rather than retried.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawStdin;

impl Read for RawStdin {
    fn read(&mut self, out: &mut [u8]) -> IoResult<usize> {
        // SAFETY: `out` is a valid, writable buffer of `out.len()` bytes.
        let n = unsafe { libc::read(libc::STDIN_FILENO, out.as_mut_ptr().cast(), out.len()) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }
}
