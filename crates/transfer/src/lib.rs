//! Unit-level building blocks for resumable uploads.
//!
//! A file is split into fixed-size units ([`sizing`]); the service reports
//! which units it already holds as a word-packed bitmap ([`bitmap`]); each
//! unit and the whole file are fingerprinted by a streaming
//! [`HashBackend`]; unit bytes are read from a [`ByteSource`].

mod bitmap;
mod filetype;
mod hasher;
mod sizing;
mod source;

pub use bitmap::{decode_bitmap, encode_bitmap};
pub use filetype::{detect_content_type, parse_extension_list, passes_extension_filter};
pub use hasher::{HashBackend, HashStep, Hashes, Sha256Backend, checksum_bytes};
pub use sizing::{BASE_UNIT_SIZE, MAX_UNIT_SIZE, UnitLayout, unit_size};
pub use source::{ByteSource, SourceFile};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bitmap decode error: {0}")]
    Bitmap(String),

    #[error("invalid number: {0}")]
    InvalidNumber(String),

    #[error("range {start}..{end} out of bounds for {len} bytes")]
    OutOfRange { start: u64, end: u64, len: u64 },

    #[error("hash stream not started")]
    HashNotStarted,
}
