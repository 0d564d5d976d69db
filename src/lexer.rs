//! In-place tokenization of a single command line.
//!
//! A [`LineBuffer`] owns the bytes of one line. [`tokenize`] overwrites every
//! delimiter in it with a NUL terminator and hands back a [`TokenList`] whose
//! words borrow from the buffer, so the borrow checker forbids overwriting the
//! line while its tokens are alive.

use std::io::{self, Read};

/// Capacity of a line buffer, including the room reserved for a terminator.
pub const COMMAND_LENGTH: usize = 1024;

/// Capacity of a token list: the worst case of single-byte words separated
/// by single delimiters, plus the sentinel slot.
pub const NUM_TOKENS: usize = COMMAND_LENGTH / 2 + 1;

/// Fixed-capacity byte buffer holding one command line.
///
/// Holds at most `COMMAND_LENGTH - 1` bytes; longer input is truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineBuffer {
    bytes: [u8; COMMAND_LENGTH],
    len: usize,
}

impl LineBuffer {
    /// Largest number of content bytes a line can hold.
    pub const MAX_LEN: usize = COMMAND_LENGTH - 1;

    pub const fn new() -> Self {
        Self {
            bytes: [0; COMMAND_LENGTH],
            len: 0,
        }
    }

    /// Build a line from `text`, truncated to [`LineBuffer::MAX_LEN`].
    pub fn from_bytes(text: &[u8]) -> Self {
        let mut line = Self::new();
        line.set(text);
        line
    }

    /// Replace the content with `text`, truncated to [`LineBuffer::MAX_LEN`].
    pub fn set(&mut self, text: &[u8]) {
        let len = text.len().min(Self::MAX_LEN);
        self.bytes[..len].copy_from_slice(&text[..len]);
        self.bytes[len..].fill(0);
        self.len = len;
    }

    pub fn clear(&mut self) {
        self.set(&[]);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits raw input into lines.
///
/// A single `read` may return several lines at once (piped or scripted
/// input). The bytes past the first newline are kept and handed out on the
/// following calls, so every line gets its own read/dispatch cycle. Nothing
/// is allocated.
pub struct LineReader {
    pending: [u8; COMMAND_LENGTH],
    len: usize,
}

impl LineReader {
    pub const fn new() -> Self {
        Self {
            pending: [0; COMMAND_LENGTH],
            len: 0,
        }
    }

    /// Number of bytes read but not handed out yet.
    pub fn buffered(&self) -> usize {
        self.len
    }

    /// Fill `line` with the next line of `reader`, without its newline.
    ///
    /// `read` is called only while no complete line is buffered. A line longer
    /// than [`LineBuffer::MAX_LEN`] is split, and a final line without a
    /// newline is returned as is. Returns `Ok(false)` at end of input.
    ///
    /// Errors are passed through untouched and leave `line` empty; an
    /// interrupted read surfaces as [`io::ErrorKind::Interrupted`] and keeps
    /// whatever was buffered.
    pub fn next_line(&mut self, reader: &mut dyn Read, line: &mut LineBuffer) -> io::Result<bool> {
        line.clear();
        loop {
            if let Some(end) = self.pending[..self.len].iter().position(|&b| b == b'\n') {
                self.take(end, end + 1, line);
                return Ok(true);
            }
            if self.len == LineBuffer::MAX_LEN {
                self.take(self.len, self.len, line);
                return Ok(true);
            }
            let n = reader.read(&mut self.pending[self.len..LineBuffer::MAX_LEN])?;
            if n == 0 {
                if self.len == 0 {
                    return Ok(false);
                }
                self.take(self.len, self.len, line);
                return Ok(true);
            }
            self.len += n;
        }
    }

    /// Move the first `end` bytes into `line` and drop `consumed` bytes.
    fn take(&mut self, end: usize, consumed: usize, line: &mut LineBuffer) {
        line.set(&self.pending[..end]);
        self.pending.copy_within(consumed..self.len, 0);
        self.len -= consumed;
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Words of one line, borrowed from the [`LineBuffer`] they were cut from.
///
/// The slot after the last word always holds the empty sentinel.
pub struct TokenList<'a> {
    slots: [&'a [u8]; NUM_TOKENS],
    len: usize,
}

impl<'a> TokenList<'a> {
    fn new() -> Self {
        let empty: &'a [u8] = &[];
        Self {
            slots: [empty; NUM_TOKENS],
            len: 0,
        }
    }

    pub fn as_slice(&self) -> &[&'a [u8]] {
        &self.slots[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Remove a final token that is exactly `&`.
    ///
    /// Returns true when the line asked to run in the background.
    pub fn strip_background(&mut self) -> bool {
        if self.as_slice().last() == Some(&&b"&"[..]) {
            self.len -= 1;
            self.slots[self.len] = &[];
            true
        } else {
            false
        }
    }

    fn push(&mut self, token: &'a [u8]) -> bool {
        if self.len + 1 >= NUM_TOKENS {
            return false;
        }
        self.slots[self.len] = token;
        self.len += 1;
        true
    }
}

impl<'a> std::ops::Deref for TokenList<'a> {
    type Target = [&'a [u8]];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

fn is_delimiter(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | 0)
}

/// Split `line` into words in place.
///
/// Every space, tab and newline is overwritten with NUL and each maximal run
/// of other bytes becomes one token. NUL counts as a delimiter too, so running
/// the tokenizer again over its own output yields the same tokens. Words past
/// the token list capacity are dropped.
pub fn tokenize(line: &mut [u8]) -> TokenList<'_> {
    for byte in line.iter_mut() {
        if is_delimiter(*byte) {
            *byte = 0;
        }
    }

    let line: &[u8] = line;
    let mut tokens = TokenList::new();
    for word in line.split(|&b| b == 0).filter(|w| !w.is_empty()) {
        if !tokens.push(word) {
            break;
        }
    }
    tokens
}
