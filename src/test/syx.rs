//! SYX files, binary and text.

use crate::{format_hex, parse_hex, parse_syx, read_syx_file, write_syx_file, ErrorKind, Message};
use std::fs;

fn dumps() -> Vec<Message> {
    vec![
        msg!("sysex data=(65,16,66,18,64,0,127,0,65)"),
        msg!("note_on channel=0 note=1 velocity=1"),
        msg!("sysex data=(126,127,6,1)"),
    ]
}

#[test]
fn binary_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("patch.syx");
    write_syx_file(&path, &dumps(), false).unwrap();

    let raw = fs::read(&path).unwrap();
    assert_eq!(raw.first(), Some(&0xF0));
    assert_eq!(raw.len(), 11 + 6);

    let read = read_syx_file(&path).unwrap();
    assert_eq!(read, [dumps()[0].clone(), dumps()[2].clone()]);
}

#[test]
fn text_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("patch.txt");
    write_syx_file(&path, &dumps(), true).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text, "F0 41 10 42 12 40 00 7F 00 41 F7\nF0 7E 7F 06 01 F7\n");

    let read = read_syx_file(&path).unwrap();
    assert_eq!(read.len(), 2);
    assert_eq!(read[1], dumps()[2]);
}

#[test]
fn loose_text() {
    let msgs = parse_syx(b"f0 1 2 f7\r\n\tF0 03 F7 90 01 02").unwrap();
    assert_eq!(msgs.len(), 2);
    assert_eq!(msgs[0], msg!("sysex data=(1,2)"));
    assert_eq!(msgs[1], msg!("sysex data=(3)"));
    assert!(parse_syx(b"").unwrap().is_empty());
    assert_eq!(parse_syx(b"F0 GG F7").unwrap_err().kind(), ErrorKind::Value);
    assert_eq!(parse_syx(&[0x20, 0xFF, 0xFE]).unwrap_err().kind(), ErrorKind::Value);
}

#[test]
fn missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_syx_file(dir.path().join("none.syx")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn hex_helpers() {
    assert_eq!(format_hex(&[0x00, 0xAB, 0x7F], " "), "00 AB 7F");
    assert_eq!(format_hex(&[1, 2], ""), "0102");
    assert_eq!(format_hex(&[], " "), "");
    assert_eq!(parse_hex("0 a ff", None).unwrap(), [0x00, 0x0A, 0xFF]);
    assert_eq!(parse_hex("01:02:03", Some(":")).unwrap(), [1, 2, 3]);
    assert!(parse_hex("", None).unwrap().is_empty());
    assert_eq!(parse_hex("100", None).unwrap_err().kind(), ErrorKind::Value);
    assert_eq!(parse_hex("01::02", Some(":")).unwrap(), [1, 2]);
}
