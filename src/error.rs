//! All error types used in this crate

use crate::{fsm::Stage, parse::Method};

use super::encoding;

/// Any zip-related error, from invalid archives to encoding problems.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Not a valid zip file, or a corrupted one.
    #[error("format: {0}")]
    Format(#[from] FormatError),

    /// Something is not supported by this crate
    #[error("unsupported: {0}")]
    Unsupported(#[from] UnsupportedError),

    /// Invalid UTF-8, Shift-JIS, or any problem encountered while decoding text in general.
    #[error("encoding: {0:?}")]
    Encoding(#[from] encoding::DecodingError),

    /// I/O-related error
    #[error("io: {0}")]
    IO(#[from] std::io::Error),

    /// Decompression-related error
    #[error("{method:?} decompression error: {msg}")]
    Decompression {
        /// The compression method that failed
        method: Method,
        /// Additional information
        msg: String,
    },

    /// The state machine already returned an error, and won't process
    /// any more input.
    #[error("state machine is poisoned by an earlier error")]
    Poisoned,
}

impl Error {
    /// Create a new error indicating that the given method is not supported.
    pub fn method_not_supported(method: Method) -> Self {
        Self::Unsupported(UnsupportedError::MethodNotSupported(method))
    }

    /// Create a new error indicating that the given method is not enabled.
    pub fn method_not_enabled(method: Method) -> Self {
        Self::Unsupported(UnsupportedError::MethodNotEnabled(method))
    }
}

/// Some part of the zip format is not supported by this crate.
#[derive(Debug, thiserror::Error)]
pub enum UnsupportedError {
    /// The compression method is not supported.
    #[error("compression method not supported: {0:?}")]
    MethodNotSupported(Method),

    /// The compression method is supported, but not enabled in this build.
    #[error("compression method supported, but not enabled in this build: {0:?}")]
    MethodNotEnabled(Method),

    /// The entry's sizes and checksum are stored in a data descriptor after
    /// its data (general purpose flag bit 3), so they're unknown when the
    /// data starts.
    #[error("entries followed by a data descriptor are not supported")]
    DataDescriptor,

    /// The local header declares a size of `0xFFFFFFFF`: the real sizes are
    /// in a zip64 extra field.
    #[error("entries with zip64 sizes are not supported")]
    Zip64,
}

/// Specific zip format errors, mostly due to invalid or corrupted archives.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// The local file header (before the file data) could not be parsed correctly.
    #[error("invalid local file header")]
    InvalidLocalHeader,

    /// After an entry's data, none of the bytes that followed looked like the
    /// start of a zip record.
    #[error("no recognizable signature after entry data")]
    SignatureNotFound,

    /// The file name and extra field of a local header are larger than
    /// [FsmOptions::max_variable_header_len](crate::fsm::FsmOptions::max_variable_header_len).
    #[error("file name and extra field too large: {len} bytes, max is {max}")]
    VariableHeaderTooLarge {
        /// name length + extra field length, from the local header
        len: usize,
        /// configured maximum
        max: usize,
    },

    /// Input ended before the current record was complete.
    #[error("unexpected end of input while in stage {stage:?}")]
    UnexpectedEof {
        /// the stage the state machine was in
        stage: Stage,
    },

    /// The uncompressed size didn't match
    #[error("uncompressed size didn't match: expected {expected}, got {actual}")]
    WrongSize {
        /// expected size in bytes (from the local header)
        expected: u64,
        /// actual size in bytes (from decompressing the entry)
        actual: u64,
    },

    /// The CRC-32 checksum didn't match.
    #[error("checksum didn't match: expected {expected:x?}, got {actual:x?}")]
    WrongChecksum {
        /// expected checksum (from the local header)
        expected: u32,
        /// actual checksum (from decompressing the entry)
        actual: u32,
    },
}

impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::IO(e) => e,
            e => std::io::Error::other(e),
        }
    }
}
