//! Single message encoding, decoding and the message model.

use crate::{
    decode_message, encode_message, encode_varlen, read_varlen, spec_by_status, ErrorKind,
    Message, MessageKind, Value, MAX_VARLEN, SPECS,
};
use std::collections::HashSet;

/// Every defined status byte, with the sysex start standing in for sysex.
fn defined_statuses() -> impl Iterator<Item = u8> {
    (0x80..=0xFFu8).filter(|&status| status != 0xF7 && spec_by_status(status).is_some())
}

#[test]
fn status_table() {
    assert_eq!(SPECS.len(), 18);
    for status in [0xF4, 0xF5, 0xF7, 0xF9, 0xFD, 0x00, 0x7F] {
        assert!(spec_by_status(status).is_none(), "{:#04X}", status);
    }
    assert_eq!(defined_statuses().count(), 7 * 16 + 11);
    assert_eq!(spec_by_status(0x9A).unwrap().type_name, "note_on");
    assert_eq!(spec_by_status(0xF0).unwrap().length, None);
    assert_eq!(spec_by_status(0xC3).unwrap().length, Some(2));
    assert!(spec_by_status(0xFE).unwrap().is_realtime());
    assert!(!spec_by_status(0xF6).unwrap().is_realtime());
}

#[test]
fn round_trip_every_status() {
    for status in defined_statuses() {
        let spec = spec_by_status(status).unwrap();
        let mut inputs = Vec::new();
        match spec.length {
            None => {
                inputs.push(vec![0xF0, 0xF7]);
                inputs.push(vec![0xF0, 0x00, 0xF7]);
                inputs.push(vec![0xF0, 0x7F, 0x00, 0x7F, 0xF7]);
            }
            Some(1) => inputs.push(vec![status]),
            Some(2) => {
                for a in [0x00, 0x7F] {
                    inputs.push(vec![status, a]);
                }
            }
            Some(_) => {
                for a in [0x00, 0x7F] {
                    for b in [0x00, 0x7F] {
                        inputs.push(vec![status, a, b]);
                    }
                }
            }
        }
        for bytes in inputs {
            let kind = decode_message(&bytes)
                .unwrap_or_else(|err| panic!("failed to decode {:02X?}: {}", bytes, err));
            assert_eq!(kind.type_name(), spec.type_name);
            assert_eq!(encode_message(&kind), bytes, "{:?}", kind);
        }
    }
}

#[test]
fn encode_note_on() {
    let msg = Message::note_on(1, 60, 100).unwrap();
    assert_eq!(msg.bytes(), [0x91, 0x3C, 0x64]);
    assert_eq!(msg.hex(), "91 3C 64");
}

#[test]
fn decode_sysex() {
    let msg = Message::from_bytes(&[0xF0, 0x7E, 0x7F, 0x06, 0x02, 0xF7], 0.0).unwrap();
    assert_eq!(msg.type_name(), "sysex");
    assert_eq!(msg.get("data"), Some(Value::Bytes(vec![0x7E, 0x7F, 0x06, 0x02])));
    assert_eq!(msg.to_string(), "sysex data=(126,127,6,2) time=0");
}

#[test]
fn pitchwheel_bounds() {
    for (pitch, bytes) in [
        (-8192, [0xE0, 0x00, 0x00]),
        (0, [0xE0, 0x00, 0x40]),
        (8191, [0xE0, 0x7F, 0x7F]),
    ] {
        let msg = Message::pitchwheel(0, pitch).unwrap();
        assert_eq!(msg.bytes(), bytes);
        assert_eq!(
            decode_message(&bytes).unwrap(),
            MessageKind::PitchWheel { channel: 0, pitch }
        );
    }
}

#[test]
fn songpos_bounds() {
    for (pos, bytes) in [(0, [0xF2, 0x00, 0x00]), (16383, [0xF2, 0x7F, 0x7F])] {
        let kind = MessageKind::SongPos { pos };
        assert_eq!(encode_message(&kind), bytes);
        assert_eq!(decode_message(&bytes).unwrap(), kind);
    }
}

#[test]
fn quarter_frame_packing() {
    let msg = msg!("quarter_frame frame_type=5 frame_value=12");
    assert_eq!(msg.bytes(), [0xF1, 0x5C]);
    assert_eq!(Message::from_bytes(&[0xF1, 0x5C], 0.0).unwrap(), msg);
}

#[test]
fn varlen_battery() {
    for (int, len) in [
        (0, 1),
        (0x40, 1),
        (0x7F, 1),
        (0x80, 2),
        (0x2000, 2),
        (0x1F_FFFF, 3),
        (0x0FFF_FFFF, 4),
    ] {
        let bytes = encode_varlen(int).unwrap();
        assert_eq!(bytes.len(), len, "{:#X}", int);
        let mut raw = &bytes[..];
        assert_eq!(read_varlen(&mut raw).unwrap(), int);
        assert!(raw.is_empty());
    }
    assert_eq!(encode_varlen(0x80).unwrap(), [0x81, 0x00]);
    assert_eq!(encode_varlen(0x0FFF_FFFF).unwrap(), [0xFF, 0xFF, 0xFF, 0x7F]);
    assert_eq!(
        encode_varlen(MAX_VARLEN + 1).unwrap_err().kind(),
        ErrorKind::Range
    );
}

#[test]
fn varlen_stops_after_four_bytes() {
    let mut raw: &[u8] = &[0xFF, 0xFF, 0xFF, 0xFF, 0x01];
    assert_eq!(read_varlen(&mut raw).unwrap(), 0x0FFF_FFFF);
    assert_eq!(raw, [0x01]);

    let mut raw: &[u8] = &[0x81];
    assert_eq!(read_varlen(&mut raw).unwrap_err().kind(), ErrorKind::FileFormat);
}

#[test]
fn malformed_bytes() {
    let cases: &[&[u8]] = &[
        &[],
        &[0x40, 0x40],
        &[0xF7],
        &[0xF4],
        &[0xFD],
        &[0xF0, 0x01, 0x02],
        &[0x90, 0x40],
        &[0x90, 0x40, 0x40, 0x40],
        &[0xF8, 0x00],
    ];
    for bytes in cases {
        let err = decode_message(bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed, "{:02X?}: {}", bytes, err);
    }
}

#[cfg(not(feature = "relaxed"))]
#[test]
fn decoded_fields_are_checked() {
    let err = decode_message(&[0x90, 0x80, 0x00]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Range);
    let err = decode_message(&[0xF0, 0x80, 0xF7]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Range);
}

#[cfg(not(feature = "relaxed"))]
#[test]
fn field_ranges() {
    assert_eq!(Message::note_on(16, 0, 0).unwrap_err().kind(), ErrorKind::Range);
    assert_eq!(Message::note_on(0, 128, 0).unwrap_err().kind(), ErrorKind::Range);
    assert_eq!(Message::pitchwheel(0, 8192).unwrap_err().kind(), ErrorKind::Range);
    assert_eq!(Message::pitchwheel(0, -8193).unwrap_err().kind(), ErrorKind::Range);
    assert_eq!(Message::sysex(vec![1, 200]).unwrap_err().kind(), ErrorKind::Range);
    assert_eq!(
        Message::new(MessageKind::SongPos { pos: 16384 }).unwrap_err().kind(),
        ErrorKind::Range
    );
    assert_eq!(
        Message::new(MessageKind::QuarterFrame {
            frame_type: 8,
            frame_value: 0
        })
        .unwrap_err()
        .kind(),
        ErrorKind::Range
    );
}

#[cfg(feature = "relaxed")]
#[test]
fn relaxed_ranges() {
    assert!(Message::note_on(0, 200, 255).is_ok());
    assert!(Message::pitchwheel(0, -16384).is_ok());
    assert!(Message::pitchwheel(0, 16383).is_ok());
    assert_eq!(Message::note_on(16, 0, 0).unwrap_err().kind(), ErrorKind::Range);
}

#[cfg(feature = "relaxed")]
#[test]
fn relaxed_pitch_wraps_on_the_wire() {
    let bytes = Message::pitchwheel(0, 16383).unwrap().bytes();
    assert_eq!(bytes, [0xE0, 0x7F, 0x3F]);
    assert_eq!(
        decode_message(&bytes).unwrap(),
        MessageKind::PitchWheel {
            channel: 0,
            pitch: -1
        }
    );
    assert_eq!(Message::pitchwheel(0, -16384).unwrap().bytes(), [0xE0, 0x00, 0x40]);
}

#[cfg(not(feature = "relaxed"))]
#[test]
fn encoder_masks_out_of_range_fields() {
    let cases: Vec<(MessageKind, &[u8])> = vec![
        (
            MessageKind::NoteOn {
                channel: 17,
                note: 200,
                velocity: 255,
            },
            &[0x91, 0x48, 0x7F][..],
        ),
        (MessageKind::SongPos { pos: 0xFFFF }, &[0xF2, 0x7F, 0x7F][..]),
        (
            MessageKind::QuarterFrame {
                frame_type: 9,
                frame_value: 0x1F,
            },
            &[0xF1, 0x1F][..],
        ),
        (MessageKind::SysEx { data: vec![0x80, 1] }, &[0xF0, 0x00, 0x01, 0xF7][..]),
        (MessageKind::SongSelect { song: 0x81 }, &[0xF3, 0x01][..]),
    ];
    for (kind, expected) in cases {
        let bytes = encode_message(&kind);
        assert_eq!(bytes, expected, "{:?}", kind);
        //Always a single well-formed message
        assert!(decode_message(&bytes).is_ok());
    }
}

#[test]
fn defaults_by_name() {
    assert_eq!(
        Message::from_type_name("note_on").unwrap().to_string(),
        "note_on channel=0 note=0 velocity=0 time=0"
    );
    assert_eq!(
        Message::from_type_name("sysex").unwrap().to_string(),
        "sysex data=() time=0"
    );
    assert_eq!(Message::from_type_name("clock").unwrap().bytes(), [0xF8]);
    let err = Message::from_type_name("note_sideways").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownType);
}

#[test]
fn text_form() {
    for text in [
        "note_off channel=3 note=10 velocity=20 time=0",
        "control_change channel=15 control=7 value=127 time=1.5",
        "pitchwheel channel=0 pitch=-100 time=0",
        "sysex data=(1,2,3) time=0",
        "songpos pos=1000 time=0",
        "song_select song=3 time=0",
        "tune_request time=0",
        "reset time=12",
    ] {
        assert_eq!(msg!(text).to_string(), text);
    }
    assert_eq!(msg!("note_on note=64").bytes(), [0x90, 64, 0]);
    assert!("note_on note".parse::<Message>().is_err());
    assert!("".parse::<Message>().is_err());
    assert_eq!(
        "note_on note=abc".parse::<Message>().unwrap_err().kind(),
        ErrorKind::Type
    );
}

#[test]
fn hex_forms() {
    let msg = Message::from_hex("90 4c 20", 0.0, None).unwrap();
    assert_eq!(msg, Message::note_on(0, 0x4C, 0x20).unwrap());
    let msg = Message::from_hex(" F0\n01\t02 F7 ", 0.0, None).unwrap();
    assert_eq!(msg.get("data"), Some(Value::Bytes(vec![1, 2])));
    let msg = Message::from_hex("C1,05", 2.0, Some(",")).unwrap();
    assert_eq!(msg.to_string(), "program_change channel=1 program=5 time=2");
    assert_eq!(
        Message::from_hex("90 4c2 20", 0.0, None).unwrap_err().kind(),
        ErrorKind::Value
    );
    assert_eq!(
        Message::from_hex("zz", 0.0, None).unwrap_err().kind(),
        ErrorKind::Value
    );
}

#[test]
fn dynamic_fields() {
    let msg = Message::note_on(0, 60, 100).unwrap();
    assert_eq!(msg.get("type"), Some(Value::from("note_on")));
    assert_eq!(msg.get("note"), Some(Value::Int(60)));
    assert_eq!(msg.get("time"), Some(Value::Float(0.0)));
    assert_eq!(msg.get("pitch"), None);

    let moved = msg.with_field("note", 61).unwrap();
    assert_eq!(moved.bytes(), [0x90, 61, 100]);
    assert_eq!(msg.bytes(), [0x90, 60, 100]);

    let copy = msg
        .copy([("channel", Value::Int(9)), ("time", Value::Float(0.25))])
        .unwrap();
    assert_eq!(copy.to_string(), "note_on channel=9 note=60 velocity=100 time=0.25");

    let err = msg.with_field("type", "note_off").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ImmutableAttribute);
    let err = msg.with_field("pitch", 10).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Value);
    let err = msg.with_field("note", vec![1u8]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    let err = msg.with_field("time", "soon").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
}

#[test]
fn predicates() {
    let cc = Message::control_change(4, 64, 127).unwrap();
    assert!(cc.is_cc(None));
    assert!(cc.is_cc(Some(64)));
    assert!(!cc.is_cc(Some(1)));
    assert!(cc.is_channel());
    assert_eq!(cc.channel(), Some(4));

    let clock = Message::from_type_name("clock").unwrap();
    assert!(clock.is_realtime());
    assert!(!clock.is_channel());
    assert_eq!(clock.channel(), None);
    assert!(!Message::sysex(vec![]).unwrap().is_realtime());
}

#[test]
fn equality_includes_time() {
    let a = Message::note_on(0, 1, 2).unwrap();
    let b = a.clone().with_time(1.0);
    assert_ne!(a, b);
    assert_eq!(a, b.clone().with_time(0.0));
    let negative_zero = a.clone().with_time(-0.0);
    assert_eq!(a, negative_zero);
    assert!(negative_zero.time().is_sign_positive());
    assert_eq!(a, a.with_field("time", -0.0).unwrap());
    assert_eq!(a, "note_on channel=0 note=1 velocity=2 time=-0".parse::<Message>().unwrap());

    let set: HashSet<Message> = [a.clone(), a.clone(), b].into_iter().collect();
    assert_eq!(set.len(), 2);
}
