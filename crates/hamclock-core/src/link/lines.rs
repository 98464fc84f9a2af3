use core::str;

use heapless::Vec;
use log::debug;

/// Reassembles newline-terminated lines from arbitrary byte chunks.
///
/// Partial lines are kept across calls. A line longer than `N` bytes is
/// dropped whole, up to its terminating newline; it is never delivered
/// truncated.
#[derive(Debug, Clone)]
pub struct LineAssembler<const N: usize> {
    buf: Vec<u8, N>,
    // A `\r` is held back until the next byte shows whether it ends the line.
    held_cr: bool,
    discarding: bool,
    dropped: u32,
}

impl<const N: usize> LineAssembler<N> {
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            held_cr: false,
            discarding: false,
            dropped: 0,
        }
    }

    /// Bytes of the current unterminated line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Lines dropped for being too long or not UTF-8.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.held_cr = false;
        self.discarding = false;
    }

    /// Feeds `bytes`, calling `on_line` once per complete non-empty line with
    /// the `\r\n` stripped. Returns the number of lines delivered.
    pub fn push<F>(&mut self, bytes: &[u8], mut on_line: F) -> usize
    where
        F: FnMut(&str),
    {
        let mut delivered = 0usize;

        for &byte in bytes {
            if byte == b'\n' {
                self.held_cr = false;
                if self.discarding {
                    self.discarding = false;
                } else if self.emit(&mut on_line) {
                    delivered += 1;
                }
                self.buf.clear();
                continue;
            }

            if self.discarding {
                continue;
            }

            if core::mem::replace(&mut self.held_cr, false) {
                self.store(b'\r');
                if self.discarding {
                    continue;
                }
            }

            if byte == b'\r' {
                self.held_cr = true;
            } else {
                self.store(byte);
            }
        }

        delivered
    }

    fn store(&mut self, byte: u8) {
        if self.buf.push(byte).is_err() {
            debug!("lines: overlong line dropped cap={}", N);
            self.buf.clear();
            self.discarding = true;
            self.dropped = self.dropped.saturating_add(1);
        }
    }

    fn emit<F>(&mut self, on_line: &mut F) -> bool
    where
        F: FnMut(&str),
    {
        let line = self.buf.as_slice();
        if line.is_empty() {
            return false;
        }

        match str::from_utf8(line) {
            Ok(text) => {
                on_line(text);
                true
            }
            Err(_) => {
                self.dropped = self.dropped.saturating_add(1);
                false
            }
        }
    }
}

impl<const N: usize> Default for LineAssembler<N> {
    fn default() -> Self {
        Self::new()
    }
}
