//! Typed MIDI 1.0 messages.
//!
//! A [`Message`] is a [`MessageKind`] paired with a `time` value whose meaning is chosen by
//! whoever produced it: wall-clock seconds for live input, seconds since the previous event for a
//! file player and integer ticks inside a track.
//!
//! Messages are immutable. Changing a field goes through [`Message::with_field`] or
//! [`Message::copy`], which validate the new value and return a new message.

use crate::{
    checks::{
        bytes_value, check_7bit, check_channel, check_data, check_frame_type, check_frame_value,
        check_kind, check_pitch, check_pos, int_value, normal_time, time_value,
    },
    decode::decode_message,
    encode::encode_message,
    prelude::*,
    specs::{MessageSpec, SPECS},
};
use std::{
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};

/// A dynamically typed field value, used by the name-based accessors of [`Message`] and
/// [`MetaMessage`](crate::MetaMessage).
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Integer fields, such as `note` or `pitch`.
    Int(i64),
    /// Real numbers. Only `time` and the SMPTE `frame_rate` hold one.
    Float(f64),
    /// Byte sequences: sysex and sequencer-specific `data`.
    Bytes(Vec<u8>),
    /// Text carried by meta messages, and key names.
    Str(String),
}
impl Value {
    /// Get the value as an integer, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Value::Int(int) => Some(int),
            _ => None,
        }
    }

    /// Get the value as a real number. Integers are widened.
    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Value::Int(int) => Some(int as f64),
            Value::Float(float) => Some(float),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(text) => Some(text),
            _ => None,
        }
    }
}
macro_rules! impl_value_from_int {
    {$( $int:ty ),*} => {
        $(
            impl From<$int> for Value {
                #[inline]
                fn from(int: $int) -> Value {
                    Value::Int(int as i64)
                }
            }
        )*
    }
}
impl_value_from_int! {u8, i8, u16, i16, u32, i32, i64}
impl From<f64> for Value {
    fn from(float: f64) -> Value {
        Value::Float(float)
    }
}
impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Value {
        Value::Bytes(bytes)
    }
}
impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Value {
        Value::Bytes(bytes.to_vec())
    }
}
impl From<String> for Value {
    fn from(text: String) -> Value {
        Value::Str(text)
    }
}
impl From<&str> for Value {
    fn from(text: &str) -> Value {
        Value::Str(text.to_string())
    }
}
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int(int) => write!(f, "{}", int),
            Value::Float(float) => fmt_time(*float, f),
            Value::Bytes(bytes) => fmt_bytes(bytes, f),
            Value::Str(text) => write!(f, "{:?}", text),
        }
    }
}

/// Write a real number, dropping the fractional part when it is zero.
pub(crate) fn fmt_time(time: f64, f: &mut fmt::Formatter) -> fmt::Result {
    if time.is_finite() && time.fract() == 0.0 && time.abs() < 1e15 {
        write!(f, "{}", time as i64)
    } else {
        write!(f, "{}", time)
    }
}

/// Write bytes as a parenthesized decimal tuple, such as `(1,2,3)`.
pub(crate) fn fmt_bytes(bytes: &[u8], f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str("(")?;
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{}", byte)?;
    }
    f.write_str(")")
}

/// The type and fields of a MIDI 1.0 message.
///
/// Channel messages carry a `channel` in `0..=15`. All 7-bit fields are in `0..=127`.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub enum MessageKind {
    /// Stop playing a note.
    NoteOff { channel: u8, note: u8, velocity: u8 },
    /// Start playing a note.
    NoteOn { channel: u8, note: u8, velocity: u8 },
    /// Modify the velocity of a note after it has been played.
    PolyTouch { channel: u8, note: u8, value: u8 },
    /// Modify the value of a MIDI controller.
    ControlChange { channel: u8, control: u8, value: u8 },
    /// Change the program (also known as instrument) for a channel.
    ProgramChange { channel: u8, program: u8 },
    /// Change the note velocity of a whole channel at once.
    Aftertouch { channel: u8, value: u8 },
    /// Set the pitch bend value, centered at `0`, in `-8192..=8191`.
    PitchWheel { channel: u8, pitch: i16 },
    /// A system exclusive message, without its framing `0xF0` and `0xF7` bytes.
    SysEx { data: Vec<u8> },
    /// A MIDI Time Code quarter frame.
    QuarterFrame { frame_type: u8, frame_value: u8 },
    /// Song position pointer, in MIDI beats.
    SongPos { pos: u16 },
    SongSelect { song: u8 },
    TuneRequest,
    /// Sent 24 times per quarter note.
    Clock,
    Start,
    Continue,
    Stop,
    ActiveSensing,
    Reset,
}
impl MessageKind {
    /// The static table entry describing this kind of message.
    pub fn spec(&self) -> &'static MessageSpec {
        use MessageKind::*;
        let idx = match self {
            NoteOff { .. } => 0,
            NoteOn { .. } => 1,
            PolyTouch { .. } => 2,
            ControlChange { .. } => 3,
            ProgramChange { .. } => 4,
            Aftertouch { .. } => 5,
            PitchWheel { .. } => 6,
            SysEx { .. } => 7,
            QuarterFrame { .. } => 8,
            SongPos { .. } => 9,
            SongSelect { .. } => 10,
            TuneRequest => 11,
            Clock => 12,
            Start => 13,
            Continue => 14,
            Stop => 15,
            ActiveSensing => 16,
            Reset => 17,
        };
        &SPECS[idx]
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.spec().type_name
    }

    /// Build a message kind with every field set to its default: zero, or empty sysex data.
    pub fn default_for(type_name: &str) -> Result<MessageKind> {
        use MessageKind::*;
        Ok(match type_name {
            "note_off" => NoteOff {
                channel: 0,
                note: 0,
                velocity: 0,
            },
            "note_on" => NoteOn {
                channel: 0,
                note: 0,
                velocity: 0,
            },
            "polytouch" => PolyTouch {
                channel: 0,
                note: 0,
                value: 0,
            },
            "control_change" => ControlChange {
                channel: 0,
                control: 0,
                value: 0,
            },
            "program_change" => ProgramChange {
                channel: 0,
                program: 0,
            },
            "aftertouch" => Aftertouch {
                channel: 0,
                value: 0,
            },
            "pitchwheel" => PitchWheel {
                channel: 0,
                pitch: 0,
            },
            "sysex" => SysEx { data: Vec::new() },
            "quarter_frame" => QuarterFrame {
                frame_type: 0,
                frame_value: 0,
            },
            "songpos" => SongPos { pos: 0 },
            "song_select" => SongSelect { song: 0 },
            "tune_request" => TuneRequest,
            "clock" => Clock,
            "start" => Start,
            "continue" => Continue,
            "stop" => Stop,
            "active_sensing" => ActiveSensing,
            "reset" => Reset,
            other => bail!(Error::UnknownType(other.to_string())),
        })
    }

    /// The channel of a channel message.
    pub fn channel(&self) -> Option<u8> {
        use MessageKind::*;
        match *self {
            NoteOff { channel, .. }
            | NoteOn { channel, .. }
            | PolyTouch { channel, .. }
            | ControlChange { channel, .. }
            | ProgramChange { channel, .. }
            | Aftertouch { channel, .. }
            | PitchWheel { channel, .. } => Some(channel),
            _ => None,
        }
    }

    /// Read a field by name. `type` and `time` are not fields of the kind.
    pub fn get(&self, name: &str) -> Option<Value> {
        use MessageKind::*;
        Some(match (self, name) {
            (_, "channel") => Value::from(self.channel()?),
            (NoteOff { note, .. } | NoteOn { note, .. } | PolyTouch { note, .. }, "note") => {
                Value::from(*note)
            }
            (NoteOff { velocity, .. } | NoteOn { velocity, .. }, "velocity") => {
                Value::from(*velocity)
            }
            (
                PolyTouch { value, .. } | ControlChange { value, .. } | Aftertouch { value, .. },
                "value",
            ) => Value::from(*value),
            (ControlChange { control, .. }, "control") => Value::from(*control),
            (ProgramChange { program, .. }, "program") => Value::from(*program),
            (PitchWheel { pitch, .. }, "pitch") => Value::from(*pitch),
            (SysEx { data }, "data") => Value::from(data.clone()),
            (QuarterFrame { frame_type, .. }, "frame_type") => Value::from(*frame_type),
            (QuarterFrame { frame_value, .. }, "frame_value") => Value::from(*frame_value),
            (SongPos { pos }, "pos") => Value::from(*pos),
            (SongSelect { song }, "song") => Value::from(*song),
            _ => return None,
        })
    }

    /// Assign a field by name, validating the new value.
    fn set(&mut self, name: &str, new: &Value) -> Result<()> {
        use MessageKind::*;
        let type_name = self.type_name();
        match (self, name) {
            (
                NoteOff { channel, .. }
                | NoteOn { channel, .. }
                | PolyTouch { channel, .. }
                | ControlChange { channel, .. }
                | ProgramChange { channel, .. }
                | Aftertouch { channel, .. }
                | PitchWheel { channel, .. },
                "channel",
            ) => *channel = check_channel(int_value("channel", new)?)?,
            (NoteOff { note, .. } | NoteOn { note, .. } | PolyTouch { note, .. }, "note") => {
                *note = check_7bit("note", int_value("note", new)?)?
            }
            (NoteOff { velocity, .. } | NoteOn { velocity, .. }, "velocity") => {
                *velocity = check_7bit("velocity", int_value("velocity", new)?)?
            }
            (
                PolyTouch { value, .. } | ControlChange { value, .. } | Aftertouch { value, .. },
                "value",
            ) => *value = check_7bit("value", int_value("value", new)?)?,
            (ControlChange { control, .. }, "control") => {
                *control = check_7bit("control", int_value("control", new)?)?
            }
            (ProgramChange { program, .. }, "program") => {
                *program = check_7bit("program", int_value("program", new)?)?
            }
            (PitchWheel { pitch, .. }, "pitch") => *pitch = check_pitch(int_value("pitch", new)?)?,
            (SysEx { data }, "data") => {
                let bytes = bytes_value("data", new)?;
                check_data(&bytes)?;
                *data = bytes;
            }
            (QuarterFrame { frame_type, .. }, "frame_type") => {
                *frame_type = check_frame_type(int_value("frame_type", new)?)?
            }
            (QuarterFrame { frame_value, .. }, "frame_value") => {
                *frame_value = check_frame_value(int_value("frame_value", new)?)?
            }
            (SongPos { pos }, "pos") => *pos = check_pos(int_value("pos", new)?)?,
            (SongSelect { song }, "song") => *song = check_7bit("song", int_value("song", new)?)?,
            (_, "type") => bail!(Error::ImmutableAttribute("type")),
            (_, name) => bail!(Error::value(format_args!(
                "{} message has no attribute {:?}",
                type_name, name
            ))),
        }
        Ok(())
    }
}

/// A MIDI 1.0 message with a timestamp.
///
/// Two messages are equal when their kinds are equal and their times are bitwise identical.
/// Negative zero times are stored as positive zero.
#[derive(Clone, Debug)]
pub struct Message {
    kind: MessageKind,
    time: f64,
}
impl Message {
    /// Create a message with `time = 0`, validating every field.
    pub fn new(kind: MessageKind) -> Result<Message> {
        check_kind(&kind)?;
        Ok(Message { kind, time: 0.0 })
    }

    /// Wrap a kind that is already known to be valid.
    #[inline]
    pub(crate) fn from_valid(kind: MessageKind, time: f64) -> Message {
        Message {
            kind,
            time: normal_time(time),
        }
    }

    /// Create a message of the named type with every field at its default.
    pub fn from_type_name(type_name: &str) -> Result<Message> {
        Ok(Message::from_valid(MessageKind::default_for(type_name)?, 0.0))
    }

    /// Create a `note_on` message, checking every field.
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Result<Message> {
        Message::new(MessageKind::NoteOn {
            channel,
            note,
            velocity,
        })
    }

    /// Create a `note_off` message, checking every field.
    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Result<Message> {
        Message::new(MessageKind::NoteOff {
            channel,
            note,
            velocity,
        })
    }

    /// Create a `control_change` message, checking every field.
    pub fn control_change(channel: u8, control: u8, value: u8) -> Result<Message> {
        Message::new(MessageKind::ControlChange {
            channel,
            control,
            value,
        })
    }

    /// Create a `program_change` message, checking every field.
    pub fn program_change(channel: u8, program: u8) -> Result<Message> {
        Message::new(MessageKind::ProgramChange { channel, program })
    }

    /// Create a `pitchwheel` message. `pitch` is signed, with `0` meaning no bend.
    pub fn pitchwheel(channel: u8, pitch: i16) -> Result<Message> {
        Message::new(MessageKind::PitchWheel { channel, pitch })
    }

    /// Create a `sysex` message from its payload, without the framing `F0`/`F7` bytes.
    pub fn sysex(data: impl Into<Vec<u8>>) -> Result<Message> {
        Message::new(MessageKind::SysEx { data: data.into() })
    }

    /// Decode a message from the complete bytes of exactly one message.
    pub fn from_bytes(bytes: &[u8], time: f64) -> Result<Message> {
        Ok(Message::from_valid(decode_message(bytes)?, time))
    }

    /// Decode a message from hex text such as `"90 40 60"`.
    ///
    /// With no separator any whitespace splits bytes. Case is ignored.
    pub fn from_hex(text: &str, time: f64, sep: Option<&str>) -> Result<Message> {
        let bytes = crate::syx::parse_hex(text, sep)?;
        Message::from_bytes(&bytes, time)
    }

    /// The type and fields of the message.
    #[inline]
    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    #[inline]
    pub fn into_kind(self) -> MessageKind {
        self.kind
    }

    /// The timestamp, whose unit depends on where the message came from.
    #[inline]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Replace the timestamp. Times are never validated, but `-0.0` is stored as `0.0`.
    #[inline]
    pub fn with_time(mut self, time: f64) -> Message {
        self.time = normal_time(time);
        self
    }

    #[inline]
    pub fn spec(&self) -> &'static MessageSpec {
        self.kind.spec()
    }

    /// The type name, such as `"note_on"`.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Read any attribute by name, including `type` and `time`.
    pub fn get(&self, name: &str) -> Option<Value> {
        match name {
            "type" => Some(Value::from(self.type_name())),
            "time" => Some(Value::Float(self.time)),
            _ => self.kind.get(name),
        }
    }

    /// Return a copy of this message with one attribute replaced.
    pub fn with_field(&self, name: &str, value: impl Into<Value>) -> Result<Message> {
        self.copy([(name, value.into())])
    }

    /// Return a copy of this message with any number of attributes replaced.
    ///
    /// Overrides are applied in order; the first invalid one aborts the copy.
    pub fn copy<'a>(&self, overrides: impl IntoIterator<Item = (&'a str, Value)>) -> Result<Message> {
        let mut msg = self.clone();
        for (name, value) in overrides {
            if name == "time" {
                msg.time = time_value(&value)?;
            } else {
                msg.kind.set(name, &value)?;
            }
        }
        Ok(msg)
    }

    /// Encode the message into its wire bytes.
    #[inline]
    pub fn bytes(&self) -> Vec<u8> {
        encode_message(&self.kind)
    }

    /// The wire bytes as upper-case hex separated by single spaces.
    pub fn hex(&self) -> String {
        crate::syx::format_hex(&self.bytes(), " ")
    }

    #[inline]
    pub fn is_realtime(&self) -> bool {
        self.spec().is_realtime()
    }

    #[inline]
    pub fn is_channel(&self) -> bool {
        self.spec().is_channel()
    }

    /// Whether this is a control change, optionally for a specific controller.
    pub fn is_cc(&self, control: Option<u8>) -> bool {
        match self.kind {
            MessageKind::ControlChange { control: c, .. } => control.map_or(true, |n| n == c),
            _ => false,
        }
    }

    #[inline]
    pub fn channel(&self) -> Option<u8> {
        self.kind.channel()
    }
}
impl PartialEq for Message {
    fn eq(&self, other: &Message) -> bool {
        self.kind == other.kind && self.time.to_bits() == other.time.to_bits()
    }
}
impl Eq for Message {}
impl Hash for Message {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.time.to_bits().hash(state);
    }
}
impl From<Message> for MessageKind {
    fn from(msg: Message) -> MessageKind {
        msg.kind
    }
}

impl fmt::Display for Message {
    /// Formats as `note_on channel=0 note=64 velocity=64 time=0`.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.type_name())?;
        for name in self.spec().value_names {
            if let Some(value) = self.kind.get(name) {
                match value {
                    Value::Bytes(bytes) => {
                        write!(f, " {}=", name)?;
                        fmt_bytes(&bytes, f)?;
                    }
                    other => write!(f, " {}={}", name, other)?,
                }
            }
        }
        f.write_str(" time=")?;
        fmt_time(self.time, f)
    }
}

impl FromStr for Message {
    type Err = Error;

    /// Parse the text form produced by `Display`. Missing fields take their defaults.
    fn from_str(text: &str) -> Result<Message> {
        let mut words = text.split_whitespace();
        let type_name = words
            .next()
            .ok_or_else(|| Error::value("empty message string"))?;
        let msg = Message::from_type_name(type_name)?;
        let mut overrides = Vec::new();
        for word in words {
            let (name, raw) = word
                .split_once('=')
                .ok_or_else(|| Error::value(format_args!("missing '=' in {:?}", word)))?;
            overrides.push((name, parse_value(name, raw)?));
        }
        msg.copy(overrides)
    }
}

/// Parse one `name=value` right-hand side of the text form.
pub(crate) fn parse_value(name: &str, raw: &str) -> Result<Value> {
    let invalid = || Error::value(format_args!("invalid value {:?} for {}", raw, name));
    if let Some(inner) = raw.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        let bytes = inner
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| item.parse::<u8>().map_err(|_| invalid()))
            .collect::<Result<Vec<u8>>>()?;
        Ok(Value::Bytes(bytes))
    } else if name == "time" {
        raw.parse::<f64>().map(Value::Float).map_err(|_| invalid())
    } else if let Ok(int) = raw.parse::<i64>() {
        Ok(Value::Int(int))
    } else if let Ok(float) = raw.parse::<f64>() {
        Ok(Value::Float(float))
    } else {
        let unquoted = raw
            .strip_prefix('"')
            .and_then(|r| r.strip_suffix('"'))
            .unwrap_or(raw);
        Ok(Value::Str(unquoted.to_string()))
    }
}
