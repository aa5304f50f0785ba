//! Decoding of the complete bytes of a single MIDI message.

use crate::{
    checks::check_kind,
    message::MessageKind,
    prelude::*,
    specs::{spec_by_status, MIN_PITCHWHEEL, SYSEX_END, SYSEX_START},
};

/// Decode exactly one complete message, including the trailing `0xF7` of a sysex.
///
/// Fails with [`ErrorKind::Malformed`](crate::ErrorKind::Malformed) when the bytes are empty, the
/// status byte is a data byte, undefined or a stray `0xF7`, a sysex is not terminated, or the
/// length does not match the status.
pub fn decode_message(bytes: &[u8]) -> Result<MessageKind> {
    let kind = decode(bytes)?;
    check_kind(&kind)?;
    Ok(kind)
}

/// Decode bytes emitted by the tokenizer, skipping field validation.
///
/// The tokenizer only emits defined statuses with exact lengths, so no field check can fail on
/// its output. Framing is still checked so that any input is safe.
pub(crate) fn decode_unchecked(bytes: &[u8]) -> Result<MessageKind> {
    decode(bytes)
}

fn decode(bytes: &[u8]) -> Result<MessageKind> {
    use MessageKind::*;
    let (&status, mut data) = bytes
        .split_first()
        .ok_or(err_malformed!("message is 0 bytes long"))?;
    ensure!(status != SYSEX_END, err_malformed!("stray sysex end byte"));
    let spec = spec_by_status(status).ok_or(err_malformed!("invalid status byte"))?;
    match spec.length {
        None => {
            let (&end, body) = data
                .split_last()
                .ok_or(err_malformed!("sysex without end byte"))?;
            ensure!(end == SYSEX_END, err_malformed!("sysex without end byte"));
            data = body;
        }
        Some(len) => {
            ensure!(data.len() + 1 >= len, err_malformed!("message too short"));
            ensure!(data.len() + 1 <= len, err_malformed!("message too long"));
        }
    }
    let channel = status & 0x0F;
    Ok(match status {
        0x80..=0x8F => NoteOff {
            channel,
            note: data[0],
            velocity: data[1],
        },
        0x90..=0x9F => NoteOn {
            channel,
            note: data[0],
            velocity: data[1],
        },
        0xA0..=0xAF => PolyTouch {
            channel,
            note: data[0],
            value: data[1],
        },
        0xB0..=0xBF => ControlChange {
            channel,
            control: data[0],
            value: data[1],
        },
        0xC0..=0xCF => ProgramChange {
            channel,
            program: data[0],
        },
        0xD0..=0xDF => Aftertouch {
            channel,
            value: data[0],
        },
        0xE0..=0xEF => PitchWheel {
            channel,
            pitch: (data[0] as i16 | (data[1] as i16) << 7) + MIN_PITCHWHEEL,
        },
        SYSEX_START => SysEx {
            data: data.to_vec(),
        },
        0xF1 => QuarterFrame {
            frame_type: data[0] >> 4,
            frame_value: data[0] & 0x0F,
        },
        0xF2 => SongPos {
            pos: data[0] as u16 | (data[1] as u16) << 7,
        },
        0xF3 => SongSelect { song: data[0] },
        0xF6 => TuneRequest,
        0xF8 => Clock,
        0xFA => Start,
        0xFB => Continue,
        0xFC => Stop,
        0xFE => ActiveSensing,
        0xFF => Reset,
        _ => bail!(err_malformed!("invalid status byte")),
    })
}
