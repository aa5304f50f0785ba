//! A MIDI stream parser: the [`Tokenizer`] composed with the message decoder.

use crate::{
    decode::decode_unchecked,
    message::Message,
    tokenizer::Tokenizer,
};
use std::collections::VecDeque;

/// Turns a raw MIDI byte stream into typed messages.
///
/// The parser never blocks and never fails: invalid input is dropped the way the tokenizer drops
/// it. Parsed messages have `time = 0`.
///
/// ```
/// use midiwire::Parser;
///
/// let mut parser = Parser::new();
/// parser.feed(&[0x90, 0x40, 0x60]);
/// let msg = parser.poll().unwrap();
/// assert_eq!(msg.to_string(), "note_on channel=0 note=64 velocity=96 time=0");
/// ```
#[derive(Clone, Debug, Default)]
pub struct Parser {
    tokenizer: Tokenizer,
    messages: VecDeque<Message>,
}
impl Parser {
    pub fn new() -> Parser {
        Parser::default()
    }

    /// Feed a chunk of bytes, queueing every message they complete.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.tokenizer.feed(bytes);
        self.drain_tokenizer();
    }

    /// Feed a single byte.
    pub fn feed_byte(&mut self, byte: u8) {
        self.tokenizer.feed_byte(byte);
        self.drain_tokenizer();
    }

    fn drain_tokenizer(&mut self) {
        while let Some(bytes) = self.tokenizer.pop() {
            if let Ok(kind) = decode_unchecked(&bytes) {
                self.messages.push_back(Message::from_valid(kind, 0.0));
            }
        }
    }

    /// Take the next parsed message, if any.
    #[inline]
    pub fn poll(&mut self) -> Option<Message> {
        self.messages.pop_front()
    }

    /// Take the next parsed message, if any.
    ///
    /// This never blocks; waiting for input is the job of a port.
    #[inline]
    pub fn get(&mut self) -> Option<Message> {
        self.poll()
    }

    /// Number of parsed messages waiting to be taken.
    #[inline]
    pub fn pending(&self) -> usize {
        self.messages.len()
    }

    /// Take every pending message.
    pub fn iter_pending(&mut self) -> impl Iterator<Item = Message> + '_ {
        self.messages.drain(..)
    }
}
impl Iterator for Parser {
    type Item = Message;

    #[inline]
    fn next(&mut self) -> Option<Message> {
        self.poll()
    }
}

/// Parse every complete message in `bytes`.
pub fn parse_all(bytes: &[u8]) -> Vec<Message> {
    let mut parser = Parser::new();
    parser.feed(bytes);
    parser.collect()
}

/// Parse the first complete message in `bytes`, ignoring the rest.
pub fn parse(bytes: &[u8]) -> Option<Message> {
    let mut parser = Parser::new();
    parser.feed(bytes);
    parser.poll()
}
