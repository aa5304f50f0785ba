//! The table of MIDI 1.0 message types.
//!
//! Every other part of the crate that needs to know a status byte, a message length or a field
//! list goes through this table.

/// Static description of one MIDI 1.0 message type.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct MessageSpec {
    /// The message type name, such as `"note_on"`.
    pub type_name: &'static str,
    /// The status byte. Channel messages use the channel 0 status.
    pub status_byte: u8,
    /// Total length on the wire including the status byte, or `None` for sysex.
    pub length: Option<usize>,
    /// Field names in wire order.
    pub value_names: &'static [&'static str],
}

impl MessageSpec {
    /// Whether this is a channel message (status `0x80..=0xEF`).
    #[inline]
    pub fn is_channel(&self) -> bool {
        self.status_byte < 0xF0
    }

    /// Whether this is a single-byte system realtime message.
    #[inline]
    pub fn is_realtime(&self) -> bool {
        self.status_byte >= 0xF8
    }

    /// Whether `name` is a legal attribute of this message: a field, `type` or `time`.
    pub fn has_attribute(&self, name: &str) -> bool {
        name == "type" || name == "time" || self.value_names.contains(&name)
    }

    /// Iterate all legal attribute names: the field list plus `type` and `time`.
    pub fn attribute_names(&self) -> impl Iterator<Item = &'static str> {
        core::iter::once("type")
            .chain(self.value_names.iter().copied())
            .chain(core::iter::once("time"))
    }
}

macro_rules! spec {
    ($name:expr, $status:expr, $len:expr, [$($field:expr),*]) => {
        MessageSpec {
            type_name: $name,
            status_byte: $status,
            length: $len,
            value_names: &[$($field),*],
        }
    };
}

/// Every MIDI 1.0 message, channel messages first.
pub const SPECS: [MessageSpec; 18] = [
    // Channel messages.
    spec!("note_off", 0x80, Some(3), ["channel", "note", "velocity"]),
    spec!("note_on", 0x90, Some(3), ["channel", "note", "velocity"]),
    spec!("polytouch", 0xA0, Some(3), ["channel", "note", "value"]),
    spec!("control_change", 0xB0, Some(3), ["channel", "control", "value"]),
    spec!("program_change", 0xC0, Some(2), ["channel", "program"]),
    spec!("aftertouch", 0xD0, Some(2), ["channel", "value"]),
    spec!("pitchwheel", 0xE0, Some(3), ["channel", "pitch"]),
    // System common messages.
    spec!("sysex", 0xF0, None, ["data"]),
    spec!("quarter_frame", 0xF1, Some(2), ["frame_type", "frame_value"]),
    spec!("songpos", 0xF2, Some(3), ["pos"]),
    spec!("song_select", 0xF3, Some(2), ["song"]),
    spec!("tune_request", 0xF6, Some(1), []),
    // System realtime messages.
    spec!("clock", 0xF8, Some(1), []),
    spec!("start", 0xFA, Some(1), []),
    spec!("continue", 0xFB, Some(1), []),
    spec!("stop", 0xFC, Some(1), []),
    spec!("active_sensing", 0xFE, Some(1), []),
    spec!("reset", 0xFF, Some(1), []),
];

/// Look up a message spec by status byte.
///
/// Channel statuses resolve regardless of their channel nibble. Data bytes, `0xF7` and the
/// undefined statuses `0xF4`, `0xF5`, `0xF9` and `0xFD` resolve to `None`.
pub fn spec_by_status(status: u8) -> Option<&'static MessageSpec> {
    let idx = match status {
        0x80..=0xEF => (status >> 4) as usize - 8,
        0xF0 => 7,
        0xF1 => 8,
        0xF2 => 9,
        0xF3 => 10,
        0xF6 => 11,
        0xF8 => 12,
        0xFA => 13,
        0xFB => 14,
        0xFC => 15,
        0xFE => 16,
        0xFF => 17,
        _ => return None,
    };
    Some(&SPECS[idx])
}

/// Look up a message spec by type name.
pub fn spec_by_type(type_name: &str) -> Option<&'static MessageSpec> {
    SPECS.iter().find(|spec| spec.type_name == type_name)
}

/// Whether `status` is one of the defined single-byte realtime statuses.
#[inline]
pub fn is_realtime_status(status: u8) -> bool {
    matches!(status, 0xF8 | 0xFA..=0xFC | 0xFE | 0xFF)
}

pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;

pub const MIN_PITCHWHEEL: i16 = -8192;
pub const MAX_PITCHWHEEL: i16 = 8191;
pub const MIN_SONGPOS: u16 = 0;
pub const MAX_SONGPOS: u16 = 16383;
