use std::{fmt, io};
use thiserror::Error;

/// Represents an error produced while building, encoding or decoding MIDI data, or while talking
/// to a port.
///
/// Structural errors in MIDI files are wrapped in [`Error::Context`] layers describing what was
/// being read when the failure happened. Use [`Error::kind`] to classify an error regardless of how
/// many context layers surround it.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A field was given a value of the wrong kind, such as bytes where an integer is required.
    #[error("{field} must be {expected}")]
    Type {
        /// The field being assigned.
        field: &'static str,
        /// A description of the accepted kind of value.
        expected: &'static str,
    },

    /// A field value lies outside its declared range.
    #[error("{field} must be in range {min}..={max}, got {value}")]
    Range {
        /// The field being assigned.
        field: &'static str,
        /// Smallest accepted value.
        min: i64,
        /// Largest accepted value.
        max: i64,
        /// The rejected value.
        value: i64,
    },

    /// A message type name that is not part of the MIDI 1.0 or meta message tables.
    #[error("unknown message type {0:?}")]
    UnknownType(String),

    /// Bytes that cannot form a single legal MIDI message.
    #[error("malformed midi message: {0}")]
    Malformed(&'static str),

    /// Structural error in a Standard MIDI File or SYX file.
    #[error("invalid midi file: {0}")]
    FileFormat(&'static str),

    /// The payload of a `key_signature` meta event does not name a known key.
    #[error("could not decode key signature with {sharps_flats} sharps/flats and mode {mode}")]
    KeySignature {
        /// Signed count of sharps (positive) or flats (negative).
        sharps_flats: i8,
        /// Raw mode byte, `0` for major and `1` for minor.
        mode: u8,
    },

    /// Attempt to change an attribute that is fixed for the life of a message.
    #[error("{0} attribute is read only")]
    ImmutableAttribute(&'static str),

    /// Operation on a closed port, or the port was closed while blocking.
    #[error("port is closed")]
    PortClosed,

    /// Any other invalid argument.
    #[error("{0}")]
    Value(String),

    /// Operating system I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// An error with a description of what was being done when it happened.
    #[error("{context}")]
    Context {
        /// What was being done.
        context: &'static str,
        /// The underlying cause.
        #[source]
        source: Box<Error>,
    },
}

/// Broad classification of an [`Error`], ignoring context layers.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum ErrorKind {
    /// See [`Error::Type`].
    Type,
    /// See [`Error::Range`].
    Range,
    /// See [`Error::UnknownType`].
    UnknownType,
    /// A one-shot decode of bytes that are not exactly one legal message.
    Malformed,
    /// A Standard MIDI File or SYX file that breaks the file structure.
    FileFormat,
    /// See [`Error::KeySignature`].
    KeySignature,
    /// See [`Error::ImmutableAttribute`].
    ImmutableAttribute,
    /// The port is closed, or was closed while an operation was waiting on it.
    PortClosed,
    /// Any other invalid argument, such as a realtime message inside a track.
    Value,
    /// The operating system failed to read or write a file.
    Io,
}

impl Error {
    /// Classify this error, looking through any context layers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Type { .. } => ErrorKind::Type,
            Error::Range { .. } => ErrorKind::Range,
            Error::UnknownType(_) => ErrorKind::UnknownType,
            Error::Malformed(_) => ErrorKind::Malformed,
            Error::FileFormat(_) => ErrorKind::FileFormat,
            Error::KeySignature { .. } => ErrorKind::KeySignature,
            Error::ImmutableAttribute(_) => ErrorKind::ImmutableAttribute,
            Error::PortClosed => ErrorKind::PortClosed,
            Error::Value(_) => ErrorKind::Value,
            Error::Io(_) => ErrorKind::Io,
            Error::Context { source, .. } => source.kind(),
        }
    }

    /// The innermost error, below every context layer.
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub(crate) fn value(msg: impl fmt::Display) -> Error {
        Error::Value(msg.to_string())
    }

    pub(crate) fn range(field: &'static str, min: i64, max: i64, value: i64) -> Error {
        Error::Range {
            field,
            min,
            max,
            value,
        }
    }
}

macro_rules! err_malformed {
    ($msg:expr) => {
        $crate::error::Error::Malformed($msg)
    };
}

macro_rules! err_format {
    ($msg:expr) => {
        $crate::error::Error::FileFormat($msg)
    };
}

pub(crate) trait ResultExt<T> {
    fn context(self, ctx: &'static str) -> Result<T>;
}
impl<T> ResultExt<T> for Result<T> {
    #[inline]
    fn context(self, ctx: &'static str) -> Result<T> {
        self.map_err(|err| Error::Context {
            context: ctx,
            source: Box::new(err),
        })
    }
}

/// The result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
