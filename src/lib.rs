//! # Overview
//!
//! `midiwire` handles MIDI 1.0 in its three usual shapes: single messages on the wire, live byte
//! streams, and Standard MIDI Files (`.mid`). It also reads and writes `.syx` dumps and offers a
//! small port layer on top of pluggable drivers.
//!
//! Messages are plain values:
//!
//! ```rust
//! use midiwire::Message;
//!
//! let msg = Message::note_on(0, 60, 100).unwrap();
//! assert_eq!(msg.bytes(), [0x90, 60, 100]);
//! assert_eq!(msg.to_string(), "note_on channel=0 note=60 velocity=100 time=0");
//!
//! let back = Message::from_bytes(&[0x90, 60, 100], 0.0).unwrap();
//! assert_eq!(msg, back);
//! ```
//!
//! # Parsing live streams
//!
//! A [`Parser`] accepts bytes in arbitrary fragments and yields complete messages, handling
//! running status and realtime bytes interleaved in other messages:
//!
//! ```rust
//! use midiwire::Parser;
//!
//! let mut parser = Parser::new();
//! parser.feed(&[0x90, 0x40]);
//! assert!(parser.poll().is_none());
//! parser.feed(&[0x60, 0x41, 0x60]);
//! assert_eq!(parser.iter_pending().count(), 2);
//! ```
//!
//! # MIDI files
//!
//! [`MidiFile`] loads and saves files of all three types:
//!
//! ```rust
//! use midiwire::{Format, Message, MidiFile};
//!
//! let mut file = MidiFile::new(Format::Parallel);
//! let track = file.add_track("lead");
//! track.push(Message::note_on(0, 64, 64).unwrap().into());
//! track.push(Message::note_off(0, 64, 64).unwrap().with_time(480.0).into());
//!
//! let bytes = file.to_bytes().unwrap();
//! let again = MidiFile::parse(&bytes).unwrap();
//! assert_eq!(again.tracks()[0].name(), "lead");
//! assert_eq!(again.length().unwrap(), 0.5);
//! ```
//!
//! # About features
//!
//! - The `parallel` feature (default) decodes the tracks of multi-track files on several threads
//!   through `rayon`.
//! - The `relaxed` feature widens the accepted range of data bytes to `0..=255` and of pitch
//!   bend values to `-16384..=16383`, for talking to devices that bend the rules. The wire
//!   encoding is unchanged, so wide values do not survive it: pitches outside `-8192..=8191` wrap
//!   around within 14 bits (`16383` comes back as `-1`), and data bytes above 127 cannot be read
//!   back from a stream.

macro_rules! bail {
    ($err:expr) => {{
        return Err($err.into());
    }};
}
macro_rules! ensure {
    ($cond:expr, $err:expr) => {{
        if !$cond {
            bail!($err)
        }
    }};
}

/// All of the errors this crate produces.
#[macro_use]
mod error;

mod prelude {
    pub(crate) use crate::{
        error::{Error, ErrorKind, Result, ResultExt},
        primitive::{IntRead, SplitChecked},
    };
    pub(crate) use std::{convert::TryFrom, mem};
}

mod checks;
mod decode;
mod encode;
mod message;
mod meta;
mod parser;
mod primitive;
mod smf;
mod specs;
mod syx;
mod tokenizer;
mod track;
mod units;

pub mod ports;

pub use crate::{
    checks::{MAX_DATA_BYTE, PITCH_RANGE},
    decode::decode_message,
    encode::encode_message,
    error::{Error, ErrorKind, Result},
    message::{Message, MessageKind, Value},
    meta::{
        meta_spec_by_byte, meta_spec_by_type, Charset, Key, MetaKind, MetaMessage, MetaSpec,
        DEFAULT_TEMPO, META_SPECS,
    },
    parser::{parse, parse_all, Parser},
    primitive::{encode_varlen, read_varlen, Fps, MAX_VARLEN},
    smf::{Format, MidiFile, Playback, ReadOptions, TimedIter, DEFAULT_TICKS_PER_BEAT},
    specs::{
        spec_by_status, spec_by_type, MessageSpec, MAX_PITCHWHEEL, MAX_SONGPOS, MIN_PITCHWHEEL,
        MIN_SONGPOS, SPECS,
    },
    syx::{format_hex, parse_hex, parse_syx, read_syx_file, write_syx_file},
    tokenizer::Tokenizer,
    track::{fix_end_of_track, merge_tracks, to_abs, to_rel, Track, TrackEvent},
    units::{bpm2tempo, second2tick, tempo2bpm, tick2second},
};

#[cfg(test)]
mod test;
