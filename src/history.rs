//! Bounded record of previously entered command lines.
//!
//! Entries are numbered by absolute sequence number starting at 1. Only the
//! last [`HISTORY_DEPTH`] entries are retained, but numbering never restarts,
//! so `!<n>` keeps referring to the same line until it is evicted.
//!
//! Storage is a fixed array of [`LineBuffer`]s: recording, listing and recall
//! never touch the heap, which lets the `SIGINT` handler print the listing.

use crate::lexer::LineBuffer;
use std::io::{self, Write};
use thiserror::Error;

/// Number of entries the ring retains.
pub const HISTORY_DEPTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// The requested entry was never recorded or has been evicted.
    #[error("no history entry numbered {0}")]
    NotFound(u64),
}

const EMPTY_LINE: LineBuffer = LineBuffer::new();

#[derive(Debug, Clone)]
pub struct History {
    slots: [LineBuffer; HISTORY_DEPTH],
    total: u64,
}

impl History {
    pub const fn new() -> Self {
        Self {
            slots: [EMPTY_LINE; HISTORY_DEPTH],
            total: 0,
        }
    }

    /// Number of lines ever recorded, including evicted ones.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Append `line`, evicting the oldest entry once the ring is full.
    pub fn record(&mut self, line: &[u8]) {
        let slot = self.slot_of(self.total + 1);
        self.slots[slot].set(line);
        self.total += 1;
    }

    /// Copy of the most recently recorded line.
    pub fn recall_last(&self) -> Option<LineBuffer> {
        self.recall_by_number(self.total).ok()
    }

    /// Copy of the line recorded with sequence number `n`.
    pub fn recall_by_number(&self, n: u64) -> Result<LineBuffer, HistoryError> {
        if n == 0 || n > self.total || self.total - n >= HISTORY_DEPTH as u64 {
            return Err(HistoryError::NotFound(n));
        }
        Ok(self.slots[self.slot_of(n)].clone())
    }

    /// Retained entries, oldest first, paired with their sequence numbers.
    pub fn list(&self) -> impl Iterator<Item = (u64, &[u8])> + '_ {
        let first = self.total.saturating_sub(HISTORY_DEPTH as u64) + 1;
        (first..=self.total).map(move |n| (n, self.slots[self.slot_of(n)].as_bytes()))
    }

    /// Write the listing as `<number>\t<text>\n` lines.
    ///
    /// Numbers are formatted on the stack and each piece goes out with a
    /// plain `write_all`, so this is safe to call from a signal handler when
    /// `out` is an unbuffered file descriptor writer.
    pub fn write_listing(&self, out: &mut dyn Write) -> io::Result<()> {
        let mut digits = [0u8; 20];
        for (n, text) in self.list() {
            out.write_all(format_decimal(n, &mut digits))?;
            out.write_all(b"\t")?;
            out.write_all(text)?;
            out.write_all(b"\n")?;
        }
        Ok(())
    }

    fn slot_of(&self, n: u64) -> usize {
        ((n - 1) % HISTORY_DEPTH as u64) as usize
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

/// Render `n` in base 10 into the tail of `buf` without allocating.
fn format_decimal(mut n: u64, buf: &mut [u8; 20]) -> &[u8] {
    let mut start = buf.len();
    loop {
        start -= 1;
        buf[start] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    &buf[start..]
}
