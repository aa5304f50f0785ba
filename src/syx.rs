//! Reading and writing of `.syx` files, in binary or in hex text.

use crate::{message::Message, parser::Parser, prelude::*};
use std::{fmt::Write as _, fs, path::Path};
use tracing::debug;

/// Read the sysex messages stored in a `.syx` file.
///
/// A file starting with `0xF0` is read as binary, anything else as hex text. Messages other than
/// sysex are skipped.
pub fn read_syx_file(path: impl AsRef<Path>) -> Result<Vec<Message>> {
    let raw = fs::read(path.as_ref())?;
    let msgs = parse_syx(&raw)?;
    debug!(
        "read {} sysex messages from {}",
        msgs.len(),
        path.as_ref().display()
    );
    Ok(msgs)
}

/// Parse the contents of a `.syx` file, see [`read_syx_file`].
pub fn parse_syx(raw: &[u8]) -> Result<Vec<Message>> {
    let mut parser = Parser::new();
    match raw.first() {
        None => return Ok(Vec::new()),
        Some(0xF0) => parser.feed(raw),
        Some(_) => {
            let text = std::str::from_utf8(raw)
                .map_err(|_| Error::value("syx text is not valid hex"))?;
            parser.feed(&parse_hex(text, None)?);
        }
    }
    Ok(parser
        .filter(|msg| msg.type_name() == "sysex")
        .collect())
}

/// Write sysex messages to a `.syx` file, skipping any other messages.
///
/// With `plaintext` each message is written as a line of hex, otherwise as raw bytes.
pub fn write_syx_file<'a>(
    path: impl AsRef<Path>,
    messages: impl IntoIterator<Item = &'a Message>,
    plaintext: bool,
) -> Result<()> {
    let mut out = Vec::new();
    let mut count = 0;
    for msg in messages
        .into_iter()
        .filter(|msg| msg.type_name() == "sysex")
    {
        if plaintext {
            out.extend_from_slice(msg.hex().as_bytes());
            out.push(b'\n');
        } else {
            out.extend_from_slice(&msg.bytes());
        }
        count += 1;
    }
    fs::write(path.as_ref(), out)?;
    debug!(
        "wrote {} sysex messages to {}",
        count,
        path.as_ref().display()
    );
    Ok(())
}

/// Parse hex text into bytes.
///
/// Without a separator, bytes are split by any run of whitespace and each must be one or two hex
/// digits. With a separator, the text is split on exactly that string.
pub fn parse_hex(text: &str, sep: Option<&str>) -> Result<Vec<u8>> {
    let parse_byte = |word: &str| {
        let word = word.trim();
        ensure!(
            (1..=2).contains(&word.len()),
            Error::value(format_args!("invalid hex byte {:?}", word))
        );
        u8::from_str_radix(word, 16)
            .map_err(|_| Error::value(format_args!("invalid hex byte {:?}", word)))
    };
    match sep {
        Some(sep) if !sep.trim().is_empty() => text
            .trim()
            .split(sep)
            .filter(|word| !word.trim().is_empty())
            .map(parse_byte)
            .collect(),
        _ => text.split_whitespace().map(parse_byte).collect(),
    }
}

/// Format bytes as upper-case hex joined by `sep`.
pub fn format_hex(bytes: &[u8], sep: &str) -> String {
    let mut out = String::with_capacity(bytes.len() * (2 + sep.len()));
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        let _ = write!(out, "{:02X}", byte);
    }
    out
}
