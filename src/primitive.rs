//! Simple building-block data that can be read in one go.
//! All primitives except variable-length integers have a known, fixed size.
//! Also, primitives advance the read slice when read.

use crate::prelude::*;

/// Largest value representable by a 4-byte variable-length integer.
pub const MAX_VARLEN: u32 = 0x0FFF_FFFF;

/// Largest payload accepted for a single meta or sysex event in a MIDI file.
pub(crate) const MAX_MESSAGE_LENGTH: usize = 1_000_000;

pub(crate) trait SplitChecked: Sized {
    fn split_checked(&mut self, at: usize) -> Option<Self>;
}
impl<'a> SplitChecked for &'a [u8] {
    #[inline]
    fn split_checked(&mut self, at: usize) -> Option<&'a [u8]> {
        if at > self.len() {
            None
        } else {
            let (extracted, remainder) = self.split_at(at);
            *self = remainder;
            Some(extracted)
        }
    }
}

/// Implemented on integer types for reading as big-endian.
pub(crate) trait IntRead: Sized {
    /// Reads a big-endian integer.
    fn read(data: &mut &[u8]) -> Result<Self>;
}

/// Implement simple big endian integer reads.
macro_rules! impl_read_int {
    {$( $int:ty ),*} => {
        $(
            impl IntRead for $int {
                #[inline]
                fn read(raw: &mut &[u8]) -> Result<$int> {
                    let bytes = raw.split_checked(mem::size_of::<$int>())
                        .ok_or(err_format!("failed to read the expected integer"))?;
                    Ok(bytes.iter().fold(0, |acc, byte| {
                        acc.checked_shl(8).unwrap_or(0) | *byte as $int
                    }))
                }
            }
        )*
    }
}
impl_read_int! {u8, u16, u32}

/// Read a 24-bit big-endian integer, as used by `set_tempo`.
pub(crate) fn read_u24(raw: &mut &[u8]) -> Result<u32> {
    let bytes = raw
        .split_checked(3)
        .ok_or(err_format!("failed to read u24 bytes"))?;
    Ok(bytes.iter().fold(0, |acc, byte| acc << 8 | *byte as u32))
}

/// Read a variable-length integer: big-endian base 128, with the top bit set on every byte but
/// the last.
///
/// At most 4 bytes are consumed. A fourth byte with its top bit set still ends the integer, so any
/// continuation sequence decodes.
pub fn read_varlen(raw: &mut &[u8]) -> Result<u32> {
    let mut int: u32 = 0;
    for _ in 0..4 {
        let byte = raw
            .split_checked(1)
            .ok_or(err_format!("unexpected eof while reading varlen int"))?[0];
        int = int << 7 | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Ok(int);
        }
    }
    Ok(int)
}

/// Encode a variable-length integer into its shortest representation.
///
/// Fails if the value does not fit in 28 bits.
pub fn encode_varlen(int: u32) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(4);
    write_varlen(int, &mut out)?;
    Ok(out)
}

pub(crate) fn write_varlen(int: u32, out: &mut Vec<u8>) -> Result<()> {
    if int > MAX_VARLEN {
        return Err(Error::range("variable-length int", 0, MAX_VARLEN as i64, int as i64));
    }
    let mut skipping = true;
    for i in (0..4).rev() {
        let byte = ((int >> (i * 7)) & 0x7F) as u8;
        if skipping && byte == 0 && i != 0 {
            //Skip these leading zeros
        } else {
            skipping = false;
            out.push(if i == 0 { byte } else { byte | 0x80 });
        }
    }
    Ok(())
}

/// Reads a slice represented in the input as a varlen `len` followed by `len` bytes.
pub(crate) fn read_varlen_slice<'a>(raw: &mut &'a [u8]) -> Result<&'a [u8]> {
    let len = read_varlen(raw).context("failed to read varlen slice length")? as usize;
    ensure!(
        len <= MAX_MESSAGE_LENGTH,
        err_format!("message length exceeds the maximum accepted length")
    );
    raw.split_checked(len)
        .ok_or(err_format!("incomplete varlen slice"))
}

/// Write a slice as its varlen length followed by the raw bytes.
pub(crate) fn write_varlen_slice(slice: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let len = u32::try_from(slice.len())
        .map_err(|_| Error::value("varlen slice exceeds 28 bits"))?;
    write_varlen(len, out)?;
    out.extend_from_slice(slice);
    Ok(())
}

/// One of the four frame rates available for SMPTE offsets, as defined by the MIDI standard.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Default)]
pub enum Fps {
    /// 24 frames per second.
    #[default]
    Fps24,
    /// 25 frames per second.
    Fps25,
    /// Actually `29.97 = 30 / 1.001` frames per second.
    ///
    /// Quite an exotic value because of interesting historical reasons.
    Fps29,
    /// 30 frames per second.
    Fps30,
}
impl Fps {
    /// Does the conversion from the 2-bit code stored in the top of the SMPTE hour byte.
    pub(crate) fn from_code(code: u8) -> Fps {
        match code & 0x3 {
            0 => Fps::Fps24,
            1 => Fps::Fps25,
            2 => Fps::Fps29,
            _ => Fps::Fps30,
        }
    }

    /// Does the conversion to a 2-bit fps code.
    pub(crate) fn as_code(self) -> u8 {
        match self {
            Fps::Fps24 => 0,
            Fps::Fps25 => 1,
            Fps::Fps29 => 2,
            Fps::Fps30 => 3,
        }
    }

    /// Converts a semantic frame rate (`24.0`, `25.0`, `29.97` or `30.0`) into an `Fps` value.
    #[inline]
    pub fn from_f64(rate: f64) -> Option<Fps> {
        [Fps::Fps24, Fps::Fps25, Fps::Fps29, Fps::Fps30]
            .into_iter()
            .find(|fps| (fps.as_f64() - rate).abs() < 0.01)
    }

    /// Get the frame rate as it is usually written (`29.97` for drop-frame).
    #[inline]
    pub fn as_f64(self) -> f64 {
        match self {
            Fps::Fps24 => 24.0,
            Fps::Fps25 => 25.0,
            Fps::Fps29 => 29.97,
            Fps::Fps30 => 30.0,
        }
    }
}
impl From<Fps> for f64 {
    fn from(x: Fps) -> Self {
        x.as_f64()
    }
}
