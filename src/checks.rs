//! Field validation shared by message construction, dynamic field assignment and decoding.

use crate::{
    message::{MessageKind, Value},
    prelude::*,
    specs::{MAX_PITCHWHEEL, MAX_SONGPOS, MIN_PITCHWHEEL, MIN_SONGPOS},
};

/// Largest value accepted in data byte fields and sysex `data`.
#[cfg(not(feature = "relaxed"))]
pub const MAX_DATA_BYTE: i64 = 127;
#[cfg(feature = "relaxed")]
pub const MAX_DATA_BYTE: i64 = 255;

/// Accepted `pitch` range.
///
/// The relaxed range is twice as wide as the wire format. The encoder wraps it into 14 bits.
#[cfg(not(feature = "relaxed"))]
pub const PITCH_RANGE: (i64, i64) = (MIN_PITCHWHEEL as i64, MAX_PITCHWHEEL as i64);
#[cfg(feature = "relaxed")]
pub const PITCH_RANGE: (i64, i64) = (2 * MIN_PITCHWHEEL as i64, 2 * MAX_PITCHWHEEL as i64 + 1);

#[inline]
fn check_range(field: &'static str, value: i64, min: i64, max: i64) -> Result<i64> {
    if value < min || value > max {
        Err(Error::range(field, min, max, value))
    } else {
        Ok(value)
    }
}

pub fn check_channel(channel: i64) -> Result<u8> {
    check_range("channel", channel, 0, 15).map(|c| c as u8)
}

/// Check any of the data byte fields: `note`, `velocity`, `control`, `program`, `value`, `song`.
pub fn check_7bit(field: &'static str, value: i64) -> Result<u8> {
    check_range(field, value, 0, MAX_DATA_BYTE).map(|v| v as u8)
}

pub fn check_pitch(pitch: i64) -> Result<i16> {
    check_range("pitch", pitch, PITCH_RANGE.0, PITCH_RANGE.1).map(|p| p as i16)
}

pub fn check_pos(pos: i64) -> Result<u16> {
    check_range("pos", pos, MIN_SONGPOS as i64, MAX_SONGPOS as i64).map(|p| p as u16)
}

pub fn check_frame_type(frame_type: i64) -> Result<u8> {
    check_range("frame_type", frame_type, 0, 7).map(|v| v as u8)
}

pub fn check_frame_value(frame_value: i64) -> Result<u8> {
    check_range("frame_value", frame_value, 0, 15).map(|v| v as u8)
}

/// Check sysex data element-wise.
pub fn check_data(data: &[u8]) -> Result<()> {
    for &byte in data {
        check_range("data byte", byte as i64, 0, MAX_DATA_BYTE)?;
    }
    Ok(())
}

/// Validate every field of a message.
pub(crate) fn check_kind(kind: &MessageKind) -> Result<()> {
    use MessageKind::*;
    let check_chan = |channel: u8| check_channel(channel as i64).map(drop);
    let check_u7 = |field, value: u8| check_7bit(field, value as i64).map(drop);
    match *kind {
        NoteOff {
            channel,
            note,
            velocity,
        }
        | NoteOn {
            channel,
            note,
            velocity,
        } => {
            check_chan(channel)?;
            check_u7("note", note)?;
            check_u7("velocity", velocity)
        }
        PolyTouch {
            channel,
            note,
            value,
        } => {
            check_chan(channel)?;
            check_u7("note", note)?;
            check_u7("value", value)
        }
        ControlChange {
            channel,
            control,
            value,
        } => {
            check_chan(channel)?;
            check_u7("control", control)?;
            check_u7("value", value)
        }
        ProgramChange { channel, program } => {
            check_chan(channel)?;
            check_u7("program", program)
        }
        Aftertouch { channel, value } => {
            check_chan(channel)?;
            check_u7("value", value)
        }
        PitchWheel { channel, pitch } => {
            check_chan(channel)?;
            check_pitch(pitch as i64).map(drop)
        }
        SysEx { ref data } => check_data(data),
        QuarterFrame {
            frame_type,
            frame_value,
        } => {
            check_frame_type(frame_type as i64)?;
            check_frame_value(frame_value as i64).map(drop)
        }
        SongPos { pos } => check_pos(pos as i64).map(drop),
        SongSelect { song } => check_u7("song", song),
        TuneRequest | Clock | Start | Continue | Stop | ActiveSensing | Reset => Ok(()),
    }
}

/// Extract an integer from a dynamic value.
pub(crate) fn int_value(field: &'static str, value: &Value) -> Result<i64> {
    match *value {
        Value::Int(int) => Ok(int),
        _ => Err(Error::Type {
            field,
            expected: "an integer",
        }),
    }
}

/// Fold `-0.0` into `0.0`, so that equal timestamps compare equal bit for bit.
#[inline]
pub(crate) fn normal_time(time: f64) -> f64 {
    if time == 0.0 {
        0.0
    } else {
        time
    }
}

/// Extract a timestamp from a dynamic value. Integers are accepted.
pub(crate) fn time_value(value: &Value) -> Result<f64> {
    match *value {
        Value::Int(int) => Ok(int as f64),
        Value::Float(float) => Ok(normal_time(float)),
        _ => Err(Error::Type {
            field: "time",
            expected: "a real number",
        }),
    }
}

pub(crate) fn bytes_value(field: &'static str, value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::Bytes(bytes) => Ok(bytes.clone()),
        _ => Err(Error::Type {
            field,
            expected: "a byte sequence",
        }),
    }
}

pub(crate) fn str_value(field: &'static str, value: &Value) -> Result<String> {
    match value {
        Value::Str(text) => Ok(text.clone()),
        _ => Err(Error::Type {
            field,
            expected: "a string",
        }),
    }
}
