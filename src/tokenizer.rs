//! Splitting of a raw MIDI byte stream into the bytes of complete messages.
//!
//! The tokenizer never fails. Stray data bytes, undefined statuses and interrupted messages are
//! dropped silently and the tokenizer resynchronizes on the next status byte.

use crate::specs::{is_realtime_status, spec_by_status, SYSEX_END, SYSEX_START};
use std::{collections::VecDeque, mem};
use tracing::trace;

/// A streaming MIDI tokenizer.
///
/// Feed bytes with [`feed`](Tokenizer::feed) or [`feed_byte`](Tokenizer::feed_byte) and pull
/// complete messages out by iterating. Each message comes out as its complete wire bytes,
/// including the status byte even when it was received through running status.
///
/// Realtime messages are emitted as soon as they arrive, even in the middle of another message or
/// a sysex, and leave the interrupted message untouched.
#[derive(Clone, Debug, Default)]
pub struct Tokenizer {
    /// Bytes of the message in progress. Empty when idle.
    buffer: Vec<u8>,
    /// Expected total length of the message in progress. `None` while in a sysex or idle.
    expected: Option<usize>,
    running_status: Option<u8>,
    in_sysex: bool,
    output: VecDeque<Vec<u8>>,
}
impl Tokenizer {
    /// Create an idle tokenizer.
    pub fn new() -> Tokenizer {
        Tokenizer::default()
    }

    /// Feed a chunk of bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.feed_byte(byte);
        }
    }

    /// Feed a single byte.
    pub fn feed_byte(&mut self, byte: u8) {
        if byte < 0x80 {
            self.feed_data_byte(byte);
        } else {
            self.feed_status_byte(byte);
        }
    }

    fn feed_data_byte(&mut self, byte: u8) {
        if self.buffer.is_empty() {
            trace!("dropping stray data byte {:#04X}", byte);
            return;
        }
        self.buffer.push(byte);
        self.check_complete();
    }

    fn feed_status_byte(&mut self, status: u8) {
        if is_realtime_status(status) {
            //Realtime messages do not touch the message in progress
            self.output.push_back(vec![status]);
            return;
        }
        match status {
            SYSEX_END => {
                if self.in_sysex {
                    self.buffer.push(SYSEX_END);
                    self.emit();
                } else {
                    trace!("dropping stray sysex end byte");
                }
                self.reset();
            }
            SYSEX_START => {
                self.abandon();
                self.buffer.push(SYSEX_START);
                self.in_sysex = true;
                self.expected = None;
                self.running_status = None;
            }
            _ => match spec_by_status(status) {
                Some(spec) => {
                    self.abandon();
                    self.buffer.push(status);
                    self.expected = spec.length;
                    self.running_status = if spec.is_channel() { Some(status) } else { None };
                    self.check_complete();
                }
                None => {
                    trace!("dropping undefined status byte {:#04X}", status);
                    self.abandon();
                    self.reset();
                }
            },
        }
    }

    /// Emit the message in progress if it has reached its expected length.
    fn check_complete(&mut self) {
        if !self.in_sysex && Some(self.buffer.len()) == self.expected {
            self.emit();
            if let Some(status) = self.running_status {
                self.buffer.push(status);
            }
        }
    }

    fn emit(&mut self) {
        let msg = mem::take(&mut self.buffer);
        self.output.push_back(msg);
    }

    /// Drop any partial message, leaving running status as it is.
    fn abandon(&mut self) {
        let reseeded = self.buffer.len() == 1 && self.running_status == self.buffer.first().copied();
        if !self.buffer.is_empty() && !reseeded {
            trace!("abandoning partial message of {} bytes", self.buffer.len());
        }
        self.buffer.clear();
        self.in_sysex = false;
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.expected = None;
        self.in_sysex = false;
        self.running_status = None;
    }

    /// Take the next complete message, if any.
    #[inline]
    pub fn pop(&mut self) -> Option<Vec<u8>> {
        self.output.pop_front()
    }

    /// Number of complete messages waiting to be taken.
    #[inline]
    pub fn len(&self) -> usize {
        self.output.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }
}
impl Iterator for Tokenizer {
    type Item = Vec<u8>;

    #[inline]
    fn next(&mut self) -> Option<Vec<u8>> {
        self.pop()
    }
}
