//! Meta messages, which only occur inside Standard MIDI Files.

use crate::{
    checks::{bytes_value, int_value, normal_time, str_value, time_value},
    message::{fmt_bytes, fmt_time, parse_value, Value},
    prelude::*,
    primitive::{read_u24, read_varlen_slice, write_varlen_slice, Fps},
};
use std::{
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};

/// Status byte introducing a meta event in a track.
pub const META_STATUS: u8 = 0xFF;

/// Tempo in effect when a file does not say otherwise: 120 beats per minute.
pub const DEFAULT_TEMPO: u32 = 500_000;

const MAX_TEMPO: u32 = 0xFF_FFFF;

/// Text encoding used for the text-carrying meta events.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Default)]
pub enum Charset {
    /// Every byte maps to the code point of the same value.
    #[default]
    Latin1,
    /// 7-bit ASCII. Bytes above `0x7F` decode as U+FFFD.
    Ascii,
    /// UTF-8. Invalid sequences decode as U+FFFD.
    Utf8,
}
impl Charset {
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Charset::Latin1 => bytes.iter().map(|&b| b as char).collect(),
            Charset::Ascii => bytes
                .iter()
                .map(|&b| if b < 0x80 { b as char } else { char::REPLACEMENT_CHARACTER })
                .collect(),
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    /// Encode text, failing on characters the charset cannot represent.
    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        let limit = match self {
            Charset::Utf8 => return Ok(text.as_bytes().to_vec()),
            Charset::Latin1 => 0xFF,
            Charset::Ascii => 0x7F,
        };
        text.chars()
            .map(|c| {
                u8::try_from(c as u32)
                    .ok()
                    .filter(|&b| b as u32 <= limit)
                    .ok_or_else(|| {
                        Error::value(format_args!("character {:?} cannot be encoded as {:?}", c, self))
                    })
            })
            .collect()
    }
}

/// Names of the 15 major keys, indexed by `sharps_flats + 7`.
const MAJOR_KEYS: [&str; 15] = [
    "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
];
/// Names of the 15 minor keys, indexed by `sharps_flats + 7`.
const MINOR_KEYS: [&str; 15] = [
    "Abm", "Ebm", "Bbm", "Fm", "Cm", "Gm", "Dm", "Am", "Em", "Bm", "F#m", "C#m", "G#m", "D#m",
    "A#m",
];

/// A key signature: one of 15 major or 15 minor keys.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct Key {
    sharps_flats: i8,
    minor: bool,
}
impl Key {
    /// Build a key from its signed count of sharps (positive) or flats (negative) and a mode byte
    /// (`0` for major, `1` for minor).
    pub fn new(sharps_flats: i8, mode: u8) -> Result<Key> {
        ensure!(
            (-7..=7).contains(&sharps_flats) && mode <= 1,
            Error::KeySignature { sharps_flats, mode }
        );
        Ok(Key {
            sharps_flats,
            minor: mode == 1,
        })
    }

    /// Look up a key by name, such as `"Eb"` or `"F#m"`.
    pub fn from_name(name: &str) -> Result<Key> {
        let find = |table: &[&str; 15]| table.iter().position(|&key| key == name);
        match (find(&MAJOR_KEYS), find(&MINOR_KEYS)) {
            (Some(idx), _) => Ok(Key {
                sharps_flats: idx as i8 - 7,
                minor: false,
            }),
            (None, Some(idx)) => Ok(Key {
                sharps_flats: idx as i8 - 7,
                minor: true,
            }),
            (None, None) => Err(Error::value(format_args!("invalid key {:?}", name))),
        }
    }

    pub fn name(self) -> &'static str {
        let idx = (self.sharps_flats + 7) as usize;
        if self.minor {
            MINOR_KEYS[idx]
        } else {
            MAJOR_KEYS[idx]
        }
    }

    #[inline]
    pub fn sharps_flats(self) -> i8 {
        self.sharps_flats
    }

    #[inline]
    pub fn is_minor(self) -> bool {
        self.minor
    }
}
impl Default for Key {
    fn default() -> Key {
        Key {
            sharps_flats: 0,
            minor: false,
        }
    }
}
impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static description of a meta message type.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct MetaSpec {
    pub type_byte: u8,
    pub type_name: &'static str,
    pub value_names: &'static [&'static str],
}

macro_rules! meta_spec {
    ($byte:expr, $name:expr, [$($field:expr),*]) => {
        MetaSpec {
            type_byte: $byte,
            type_name: $name,
            value_names: &[$($field),*],
        }
    };
}

/// Every known meta message type, ordered by type byte.
pub const META_SPECS: [MetaSpec; 18] = [
    meta_spec!(0x00, "sequence_number", ["number"]),
    meta_spec!(0x01, "text", ["text"]),
    meta_spec!(0x02, "copyright", ["text"]),
    meta_spec!(0x03, "track_name", ["name"]),
    meta_spec!(0x04, "instrument_name", ["name"]),
    meta_spec!(0x05, "lyrics", ["text"]),
    meta_spec!(0x06, "marker", ["text"]),
    meta_spec!(0x07, "cue_marker", ["text"]),
    meta_spec!(0x08, "program_name", ["name"]),
    meta_spec!(0x09, "device_name", ["name"]),
    meta_spec!(0x20, "channel_prefix", ["channel"]),
    meta_spec!(0x21, "midi_port", ["port"]),
    meta_spec!(0x2F, "end_of_track", []),
    meta_spec!(0x51, "set_tempo", ["tempo"]),
    meta_spec!(
        0x54,
        "smpte_offset",
        ["frame_rate", "hours", "minutes", "seconds", "frames", "sub_frames"]
    ),
    meta_spec!(
        0x58,
        "time_signature",
        ["numerator", "denominator", "clocks_per_click", "notated_32nd_notes_per_beat"]
    ),
    meta_spec!(0x59, "key_signature", ["key"]),
    meta_spec!(0x7F, "sequencer_specific", ["data"]),
];

/// Spec of unknown meta messages.
pub const UNKNOWN_META_SPEC: MetaSpec = meta_spec!(0xFF, "unknown_meta", ["type_byte", "data"]);

pub fn meta_spec_by_type(type_name: &str) -> Option<&'static MetaSpec> {
    META_SPECS.iter().find(|spec| spec.type_name == type_name)
}

pub fn meta_spec_by_byte(type_byte: u8) -> Option<&'static MetaSpec> {
    META_SPECS.iter().find(|spec| spec.type_byte == type_byte)
}

/// The type and fields of a meta message.
#[derive(Clone, Debug)]
pub enum MetaKind {
    /// For `Format::Sequential` files, the number of this sequence.
    SequenceNumber { number: u16 },
    /// Arbitrary text associated to an instant.
    Text { text: String },
    Copyright { text: String },
    /// The name of this track, see [`Track::name`](crate::Track::name).
    TrackName { name: String },
    InstrumentName { name: String },
    Lyrics { text: String },
    Marker { text: String },
    CueMarker { text: String },
    ProgramName { name: String },
    DeviceName { name: String },
    /// The MIDI channel that following meta and sysex events refer to.
    ChannelPrefix { channel: u8 },
    MidiPort { port: u8 },
    /// Marks the end of a track. Added automatically when saving.
    EndOfTrack,
    /// Microseconds per beat (quarter note).
    SetTempo { tempo: u32 },
    /// Offset of the track start, in SMPTE time.
    SmpteOffset {
        frame_rate: Fps,
        hours: u8,
        minutes: u8,
        seconds: u8,
        frames: u8,
        sub_frames: u8,
    },
    /// The denominator is stored as its value, a power of two up to 128.
    TimeSignature {
        numerator: u8,
        denominator: u8,
        clocks_per_click: u8,
        notated_32nd_notes_per_beat: u8,
    },
    KeySignature { key: Key },
    /// Arbitrary data intended for the sequencer.
    SequencerSpecific { data: Vec<u8> },
    /// An unknown meta message, or a known one with a payload too short to decode.
    Unknown { type_byte: u8, data: Vec<u8> },
}
impl PartialEq for MetaKind {
    fn eq(&self, other: &MetaKind) -> bool {
        self.type_name() == other.type_name() && self.values() == other.values()
    }
}
impl Eq for MetaKind {}
impl Hash for MetaKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_name().hash(state);
        for value in self.values() {
            match value {
                Value::Int(int) => int.hash(state),
                Value::Float(float) => float.to_bits().hash(state),
                Value::Bytes(bytes) => bytes.hash(state),
                Value::Str(text) => text.hash(state),
            }
        }
    }
}
impl MetaKind {
    pub fn spec(&self) -> &'static MetaSpec {
        match self {
            MetaKind::Unknown { .. } => &UNKNOWN_META_SPEC,
            known => {
                let idx = match known {
                    MetaKind::SequenceNumber { .. } => 0,
                    MetaKind::Text { .. } => 1,
                    MetaKind::Copyright { .. } => 2,
                    MetaKind::TrackName { .. } => 3,
                    MetaKind::InstrumentName { .. } => 4,
                    MetaKind::Lyrics { .. } => 5,
                    MetaKind::Marker { .. } => 6,
                    MetaKind::CueMarker { .. } => 7,
                    MetaKind::ProgramName { .. } => 8,
                    MetaKind::DeviceName { .. } => 9,
                    MetaKind::ChannelPrefix { .. } => 10,
                    MetaKind::MidiPort { .. } => 11,
                    MetaKind::EndOfTrack => 12,
                    MetaKind::SetTempo { .. } => 13,
                    MetaKind::SmpteOffset { .. } => 14,
                    MetaKind::TimeSignature { .. } => 15,
                    MetaKind::KeySignature { .. } => 16,
                    MetaKind::SequencerSpecific { .. } => 17,
                    MetaKind::Unknown { .. } => unreachable!(),
                };
                &META_SPECS[idx]
            }
        }
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.spec().type_name
    }

    /// The raw meta type byte this message is stored under.
    pub fn type_byte(&self) -> u8 {
        match *self {
            MetaKind::Unknown { type_byte, .. } => type_byte,
            _ => self.spec().type_byte,
        }
    }

    /// Build a meta kind of the named type with default fields.
    pub fn default_for(type_name: &str) -> Result<MetaKind> {
        use MetaKind::*;
        Ok(match type_name {
            "sequence_number" => SequenceNumber { number: 0 },
            "text" => Text {
                text: String::new(),
            },
            "copyright" => Copyright {
                text: String::new(),
            },
            "track_name" => TrackName {
                name: String::new(),
            },
            "instrument_name" => InstrumentName {
                name: String::new(),
            },
            "lyrics" => Lyrics {
                text: String::new(),
            },
            "marker" => Marker {
                text: String::new(),
            },
            "cue_marker" => CueMarker {
                text: String::new(),
            },
            "program_name" => ProgramName {
                name: String::new(),
            },
            "device_name" => DeviceName {
                name: String::new(),
            },
            "channel_prefix" => ChannelPrefix { channel: 0 },
            "midi_port" => MidiPort { port: 0 },
            "end_of_track" => EndOfTrack,
            "set_tempo" => SetTempo {
                tempo: DEFAULT_TEMPO,
            },
            "smpte_offset" => SmpteOffset {
                frame_rate: Fps::Fps24,
                hours: 0,
                minutes: 0,
                seconds: 0,
                frames: 0,
                sub_frames: 0,
            },
            "time_signature" => TimeSignature {
                numerator: 4,
                denominator: 4,
                clocks_per_click: 24,
                notated_32nd_notes_per_beat: 8,
            },
            "key_signature" => KeySignature {
                key: Key::default(),
            },
            "sequencer_specific" => SequencerSpecific { data: Vec::new() },
            other => bail!(Error::UnknownType(other.to_string())),
        })
    }

    /// Field values in declaration order.
    fn values(&self) -> Vec<Value> {
        self.spec()
            .value_names
            .iter()
            .filter_map(|name| self.get(name))
            .collect()
    }

    /// Read a field by name.
    pub fn get(&self, name: &str) -> Option<Value> {
        use MetaKind::*;
        Some(match (self, name) {
            (SequenceNumber { number }, "number") => Value::from(*number),
            (
                Text { text }
                | Copyright { text }
                | Lyrics { text }
                | Marker { text }
                | CueMarker { text },
                "text",
            ) => Value::from(text.as_str()),
            (
                TrackName { name } | InstrumentName { name } | ProgramName { name }
                | DeviceName { name },
                "name",
            ) => Value::from(name.as_str()),
            (ChannelPrefix { channel }, "channel") => Value::from(*channel),
            (MidiPort { port }, "port") => Value::from(*port),
            (SetTempo { tempo }, "tempo") => Value::from(*tempo),
            (SmpteOffset { frame_rate, .. }, "frame_rate") => Value::Float(frame_rate.as_f64()),
            (SmpteOffset { hours, .. }, "hours") => Value::from(*hours),
            (SmpteOffset { minutes, .. }, "minutes") => Value::from(*minutes),
            (SmpteOffset { seconds, .. }, "seconds") => Value::from(*seconds),
            (SmpteOffset { frames, .. }, "frames") => Value::from(*frames),
            (SmpteOffset { sub_frames, .. }, "sub_frames") => Value::from(*sub_frames),
            (TimeSignature { numerator, .. }, "numerator") => Value::from(*numerator),
            (TimeSignature { denominator, .. }, "denominator") => Value::from(*denominator),
            (TimeSignature {
                clocks_per_click, ..
            }, "clocks_per_click") => Value::from(*clocks_per_click),
            (
                TimeSignature {
                    notated_32nd_notes_per_beat,
                    ..
                },
                "notated_32nd_notes_per_beat",
            ) => Value::from(*notated_32nd_notes_per_beat),
            (KeySignature { key }, "key") => Value::from(key.name()),
            (SequencerSpecific { data } | Unknown { data, .. }, "data") => {
                Value::from(data.clone())
            }
            (Unknown { type_byte, .. }, "type_byte") => Value::from(*type_byte),
            _ => return None,
        })
    }

    fn set(&mut self, name: &str, new: &Value) -> Result<()> {
        use MetaKind::*;
        let byte = |field: &'static str| -> Result<u8> {
            let int = int_value(field, new)?;
            u8::try_from(int).map_err(|_| Error::range(field, 0, 255, int))
        };
        let type_name = self.type_name();
        match (self, name) {
            (SequenceNumber { number }, "number") => {
                let int = int_value("number", new)?;
                *number = u16::try_from(int).map_err(|_| Error::range("number", 0, 0xFFFF, int))?;
            }
            (
                Text { text }
                | Copyright { text }
                | Lyrics { text }
                | Marker { text }
                | CueMarker { text },
                "text",
            ) => *text = str_value("text", new)?,
            (
                TrackName { name } | InstrumentName { name } | ProgramName { name }
                | DeviceName { name },
                "name",
            ) => *name = str_value("name", new)?,
            (ChannelPrefix { channel }, "channel") => {
                let int = int_value("channel", new)?;
                ensure!((0..=15).contains(&int), Error::range("channel", 0, 15, int));
                *channel = int as u8;
            }
            (MidiPort { port }, "port") => *port = byte("port")?,
            (SetTempo { tempo }, "tempo") => {
                let int = int_value("tempo", new)?;
                ensure!(
                    (0..=MAX_TEMPO as i64).contains(&int),
                    Error::range("tempo", 0, MAX_TEMPO as i64, int)
                );
                *tempo = int as u32;
            }
            (SmpteOffset { frame_rate, .. }, "frame_rate") => {
                let rate = time_value(new).map_err(|_| Error::Type {
                    field: "frame_rate",
                    expected: "a real number",
                })?;
                *frame_rate = Fps::from_f64(rate).ok_or_else(|| {
                    Error::value(format_args!("invalid frame rate {}, expected 24, 25, 29.97 or 30", rate))
                })?;
            }
            (SmpteOffset { hours, .. }, "hours") => {
                let int = int_value("hours", new)?;
                ensure!((0..=0x1F).contains(&int), Error::range("hours", 0, 0x1F, int));
                *hours = int as u8;
            }
            (SmpteOffset { minutes, .. }, "minutes") => *minutes = byte("minutes")?,
            (SmpteOffset { seconds, .. }, "seconds") => *seconds = byte("seconds")?,
            (SmpteOffset { frames, .. }, "frames") => *frames = byte("frames")?,
            (SmpteOffset { sub_frames, .. }, "sub_frames") => *sub_frames = byte("sub_frames")?,
            (TimeSignature { numerator, .. }, "numerator") => *numerator = byte("numerator")?,
            (TimeSignature { denominator, .. }, "denominator") => {
                let den = byte("denominator")?;
                ensure!(
                    den.is_power_of_two(),
                    Error::value(format_args!("time signature denominator {} is not a power of 2", den))
                );
                *denominator = den;
            }
            (
                TimeSignature {
                    clocks_per_click, ..
                },
                "clocks_per_click",
            ) => *clocks_per_click = byte("clocks_per_click")?,
            (
                TimeSignature {
                    notated_32nd_notes_per_beat,
                    ..
                },
                "notated_32nd_notes_per_beat",
            ) => *notated_32nd_notes_per_beat = byte("notated_32nd_notes_per_beat")?,
            (KeySignature { key }, "key") => *key = Key::from_name(&str_value("key", new)?)?,
            (SequencerSpecific { data } | Unknown { data, .. }, "data") => {
                *data = bytes_value("data", new)?
            }
            (_, "type") => bail!(Error::ImmutableAttribute("type")),
            (Unknown { .. }, "type_byte") => bail!(Error::ImmutableAttribute("type_byte")),
            (_, name) => bail!(Error::value(format_args!(
                "{} message has no attribute {:?}",
                type_name, name
            ))),
        }
        Ok(())
    }

    /// Validate fields that the Rust types alone do not constrain.
    fn check(&self) -> Result<()> {
        match *self {
            MetaKind::ChannelPrefix { channel } => {
                ensure!(channel <= 15, Error::range("channel", 0, 15, channel as i64))
            }
            MetaKind::SetTempo { tempo } => ensure!(
                tempo <= MAX_TEMPO,
                Error::range("tempo", 0, MAX_TEMPO as i64, tempo as i64)
            ),
            MetaKind::SmpteOffset { hours, .. } => {
                ensure!(hours <= 0x1F, Error::range("hours", 0, 0x1F, hours as i64))
            }
            MetaKind::TimeSignature { denominator, .. } => ensure!(
                denominator.is_power_of_two(),
                Error::value(format_args!(
                    "time signature denominator {} is not a power of 2",
                    denominator
                ))
            ),
            _ => {}
        }
        Ok(())
    }

    /// Decode the payload of a meta event.
    ///
    /// Payloads shorter than their type requires are kept as [`MetaKind::Unknown`].
    pub fn decode(type_byte: u8, mut data: &[u8], charset: Charset) -> Result<MetaKind> {
        use MetaKind::*;
        let raw = data;
        let text = || charset.decode(raw);
        Ok(match type_byte {
            0x00 if data.is_empty() => SequenceNumber { number: 0 },
            0x00 if data.len() >= 2 => SequenceNumber {
                number: u16::read(&mut data)?,
            },
            0x01 => Text { text: text() },
            0x02 => Copyright { text: text() },
            0x03 => TrackName { name: text() },
            0x04 => InstrumentName { name: text() },
            0x05 => Lyrics { text: text() },
            0x06 => Marker { text: text() },
            0x07 => CueMarker { text: text() },
            0x08 => ProgramName { name: text() },
            0x09 => DeviceName { name: text() },
            0x20 if !data.is_empty() && data[0] <= 15 => ChannelPrefix { channel: data[0] },
            0x21 if data.is_empty() => MidiPort { port: 0 },
            0x21 => MidiPort { port: data[0] },
            0x2F => EndOfTrack,
            0x51 if data.len() >= 3 => SetTempo {
                tempo: read_u24(&mut data)?,
            },
            0x54 if data.len() >= 5 && data[0] >> 5 <= 3 => SmpteOffset {
                frame_rate: Fps::from_code(data[0] >> 5),
                hours: data[0] & 0x1F,
                minutes: data[1],
                seconds: data[2],
                frames: data[3],
                sub_frames: data[4],
            },
            0x58 if data.len() >= 4 && data[1] <= 7 => TimeSignature {
                numerator: data[0],
                denominator: 1 << data[1],
                clocks_per_click: data[2],
                notated_32nd_notes_per_beat: data[3],
            },
            0x59 if data.len() >= 2 => KeySignature {
                key: Key::new(data[0] as i8, data[1])?,
            },
            0x7F => SequencerSpecific {
                data: data.to_vec(),
            },
            _ => Unknown {
                type_byte,
                data: data.to_vec(),
            },
        })
    }

    /// Encode the payload of a meta event.
    pub fn encode(&self, charset: Charset) -> Result<Vec<u8>> {
        use MetaKind::*;
        Ok(match self {
            SequenceNumber { number } => number.to_be_bytes().to_vec(),
            Text { text }
            | Copyright { text }
            | Lyrics { text }
            | Marker { text }
            | CueMarker { text } => charset.encode(text)?,
            TrackName { name } | InstrumentName { name } | ProgramName { name }
            | DeviceName { name } => charset.encode(name)?,
            ChannelPrefix { channel } => vec![*channel],
            MidiPort { port } => vec![*port],
            EndOfTrack => Vec::new(),
            SetTempo { tempo } => tempo.to_be_bytes()[1..].to_vec(),
            SmpteOffset {
                frame_rate,
                hours,
                minutes,
                seconds,
                frames,
                sub_frames,
            } => vec![
                frame_rate.as_code() << 5 | hours,
                *minutes,
                *seconds,
                *frames,
                *sub_frames,
            ],
            TimeSignature {
                numerator,
                denominator,
                clocks_per_click,
                notated_32nd_notes_per_beat,
            } => vec![
                *numerator,
                denominator.trailing_zeros() as u8,
                *clocks_per_click,
                *notated_32nd_notes_per_beat,
            ],
            KeySignature { key } => vec![key.sharps_flats as u8, key.minor as u8],
            SequencerSpecific { data } | Unknown { data, .. } => data.clone(),
        })
    }

    /// Read a meta event from the bytes following its `0xFF` status.
    pub(crate) fn read(raw: &mut &[u8], charset: Charset) -> Result<MetaKind> {
        let type_byte = u8::read(raw).context("failed to read meta message type")?;
        let data = read_varlen_slice(raw).context("failed to read meta message data")?;
        MetaKind::decode(type_byte, data, charset)
    }

    /// Write a complete meta event, `0xFF` status included.
    pub(crate) fn write(&self, charset: Charset, out: &mut Vec<u8>) -> Result<()> {
        let data = self.encode(charset)?;
        out.push(META_STATUS);
        out.push(self.type_byte());
        write_varlen_slice(&data, out)
    }
}

/// A meta message with a timestamp.
///
/// Behaves like [`Message`](crate::Message), but never appears on a MIDI wire.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MetaMessage {
    kind: MetaKind,
    time: TimeBits,
}

/// An `f64` compared and hashed by its bits.
#[derive(Copy, Clone, Debug)]
struct TimeBits(f64);
impl PartialEq for TimeBits {
    fn eq(&self, other: &TimeBits) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}
impl Eq for TimeBits {}
impl Hash for TimeBits {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state)
    }
}

impl MetaMessage {
    /// Create a meta message with `time = 0`, validating its fields.
    pub fn new(kind: MetaKind) -> Result<MetaMessage> {
        kind.check()?;
        Ok(MetaMessage {
            kind,
            time: TimeBits(0.0),
        })
    }

    #[inline]
    pub(crate) fn from_valid(kind: MetaKind, time: f64) -> MetaMessage {
        MetaMessage {
            kind,
            time: TimeBits(normal_time(time)),
        }
    }

    /// Create a meta message of the named type with default fields.
    pub fn from_type_name(type_name: &str) -> Result<MetaMessage> {
        Ok(MetaMessage::from_valid(MetaKind::default_for(type_name)?, 0.0))
    }

    /// Create a `track_name` meta message.
    pub fn track_name(name: &str) -> MetaMessage {
        MetaMessage::from_valid(
            MetaKind::TrackName {
                name: name.to_string(),
            },
            0.0,
        )
    }

    /// Create a `set_tempo` meta message, in microseconds per beat.
    pub fn set_tempo(tempo: u32) -> Result<MetaMessage> {
        MetaMessage::new(MetaKind::SetTempo { tempo })
    }

    /// Create the `end_of_track` meta message that closes every track.
    pub fn end_of_track() -> MetaMessage {
        MetaMessage::from_valid(MetaKind::EndOfTrack, 0.0)
    }

    /// Decode a complete meta event: `0xFF`, type byte, varlen length and payload.
    pub fn from_bytes(bytes: &[u8], charset: Charset) -> Result<MetaMessage> {
        let mut raw = bytes;
        ensure!(
            u8::read(&mut raw)? == META_STATUS,
            Error::value("meta message must start with 0xFF")
        );
        let kind = MetaKind::read(&mut raw, charset)?;
        ensure!(raw.is_empty(), Error::value("trailing bytes after meta message"));
        Ok(MetaMessage::from_valid(kind, 0.0))
    }

    /// Encode as a complete meta event, as stored in a track.
    pub fn bytes(&self, charset: Charset) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.kind.write(charset, &mut out)?;
        Ok(out)
    }

    #[inline]
    pub fn kind(&self) -> &MetaKind {
        &self.kind
    }

    #[inline]
    pub fn into_kind(self) -> MetaKind {
        self.kind
    }

    #[inline]
    pub fn time(&self) -> f64 {
        self.time.0
    }

    #[inline]
    pub fn with_time(mut self, time: f64) -> MetaMessage {
        self.time = TimeBits(normal_time(time));
        self
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        match name {
            "type" => Some(Value::from(self.type_name())),
            "time" => Some(Value::Float(self.time.0)),
            _ => self.kind.get(name),
        }
    }

    pub fn with_field(&self, name: &str, value: impl Into<Value>) -> Result<MetaMessage> {
        self.copy([(name, value.into())])
    }

    /// Return a copy with any number of attributes replaced.
    pub fn copy<'a>(
        &self,
        overrides: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> Result<MetaMessage> {
        let mut msg = self.clone();
        for (name, value) in overrides {
            if name == "time" {
                msg.time = TimeBits(time_value(&value)?);
            } else {
                msg.kind.set(name, &value)?;
            }
        }
        Ok(msg)
    }

    #[inline]
    pub fn is_end_of_track(&self) -> bool {
        matches!(self.kind, MetaKind::EndOfTrack)
    }
}

impl fmt::Display for MetaMessage {
    /// Formats as `<meta message set_tempo tempo=500000 time=0>`.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<meta message {}", self.type_name())?;
        for name in self.kind.spec().value_names {
            if let Some(value) = self.kind.get(name) {
                write!(f, " {}=", name)?;
                match value {
                    Value::Bytes(bytes) => fmt_bytes(&bytes, f)?,
                    other => write!(f, "{}", other)?,
                }
            }
        }
        f.write_str(" time=")?;
        fmt_time(self.time.0, f)?;
        f.write_str(">")
    }
}

impl FromStr for MetaMessage {
    type Err = Error;

    /// Parse the text form produced by `Display`. Text values may not contain spaces.
    fn from_str(text: &str) -> Result<MetaMessage> {
        let inner = text
            .trim()
            .strip_prefix("<meta message")
            .and_then(|rest| rest.strip_suffix('>'))
            .ok_or_else(|| Error::value("meta message text must look like <meta message ...>"))?;
        let mut words = inner.split_whitespace();
        let type_name = words
            .next()
            .ok_or_else(|| Error::value("missing meta message type"))?;
        let msg = MetaMessage::from_type_name(type_name)?;
        let mut overrides = Vec::new();
        for word in words {
            let (name, raw) = word
                .split_once('=')
                .ok_or_else(|| Error::value(format_args!("missing '=' in {:?}", word)))?;
            let value = match (parse_value(name, raw)?, name) {
                (Value::Int(int), "frame_rate") => Value::Float(int as f64),
                (Value::Int(int), "text" | "name" | "key") => Value::Str(int.to_string()),
                (value, _) => value,
            };
            overrides.push((name, value));
        }
        msg.copy(overrides)
    }
}
