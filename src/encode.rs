//! Encoding of typed messages into wire bytes.

use crate::{
    message::MessageKind,
    specs::{MIN_PITCHWHEEL, SYSEX_END, SYSEX_START},
};

/// Mask applied to data bytes. Relaxed data bytes are written as they are.
#[cfg(not(feature = "relaxed"))]
const DATA_MASK: u8 = 0x7F;
#[cfg(feature = "relaxed")]
const DATA_MASK: u8 = 0xFF;

/// Encode a message into the exact bytes that decode back to it.
///
/// The encoder does not validate: every field is masked to the bits its wire slot holds, so an
/// out-of-range field never produces a stray status byte. `channel` keeps its low 4 bits, data
/// bytes their low 7 bits, `pos` and `pitch` 14 bits, `frame_type` 3 bits and `frame_value` 4
/// bits. Kinds held by a [`Message`](crate::Message) are already in range and are written as
/// they are.
pub fn encode_message(kind: &MessageKind) -> Vec<u8> {
    let mut out = Vec::with_capacity(3);
    encode_into(kind, &mut out);
    out
}

/// Append the wire bytes of a message to `out`.
pub(crate) fn encode_into(kind: &MessageKind, out: &mut Vec<u8>) {
    use MessageKind::*;
    let d = |byte: u8| byte & DATA_MASK;
    let status = kind.spec().status_byte | (kind.channel().unwrap_or(0) & 0x0F);
    match kind {
        NoteOff { note, velocity, .. } | NoteOn { note, velocity, .. } => {
            out.extend_from_slice(&[status, d(*note), d(*velocity)])
        }
        PolyTouch { note, value, .. } => out.extend_from_slice(&[status, d(*note), d(*value)]),
        ControlChange { control, value, .. } => {
            out.extend_from_slice(&[status, d(*control), d(*value)])
        }
        ProgramChange { program, .. } => out.extend_from_slice(&[status, d(*program)]),
        Aftertouch { value, .. } => out.extend_from_slice(&[status, d(*value)]),
        PitchWheel { pitch, .. } => {
            //Relaxed-range pitches wrap around within 14 bits
            let raw = (*pitch as i32 - MIN_PITCHWHEEL as i32) as u16 & 0x3FFF;
            out.extend_from_slice(&[status, (raw & 0x7F) as u8, (raw >> 7) as u8]);
        }
        SysEx { data } => {
            out.reserve(data.len() + 2);
            out.push(SYSEX_START);
            out.extend(data.iter().map(|&byte| d(byte)));
            out.push(SYSEX_END);
        }
        QuarterFrame {
            frame_type,
            frame_value,
        } => out.extend_from_slice(&[status, (frame_type & 0x07) << 4 | (frame_value & 0x0F)]),
        SongPos { pos } => {
            let pos = pos & 0x3FFF;
            out.extend_from_slice(&[status, (pos & 0x7F) as u8, (pos >> 7) as u8])
        }
        SongSelect { song } => out.extend_from_slice(&[status, d(*song)]),
        TuneRequest | Clock | Start | Continue | Stop | ActiveSensing | Reset => out.push(status),
    }
}
