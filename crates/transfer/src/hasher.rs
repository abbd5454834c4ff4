use sha2::{Digest, Sha256};

use crate::TransferError;

/// Whole-file digest plus one digest per unit, in unit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hashes {
    pub full: String,
    pub units: Vec<String>,
}

/// Outcome of feeding one unit to a [`HashBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashStep {
    /// Bytes hashed so far for the current file.
    Progress(u64),
    /// The last announced unit was fed.
    Done { bytes: u64, hashes: Hashes },
}

/// Streaming digest engine.
///
/// The caller announces the unit count with [`begin`](Self::begin), then
/// feeds every unit in order. The final feed returns [`HashStep::Done`] and
/// resets the backend for the next file.
///
/// Implementations may wrap an accelerated or out-of-process hasher; the
/// engine drives them all through this protocol.
pub trait HashBackend: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Starts a new file of `unit_count` units, discarding any previous stream.
    fn begin(&mut self, unit_count: usize);

    /// Feeds the next unit.
    fn feed(&mut self, unit: &[u8]) -> Result<HashStep, TransferError>;
}

/// SHA-256 backend producing lowercase hex digests.
#[derive(Default)]
pub struct Sha256Backend {
    stream: Option<Stream>,
}

struct Stream {
    expected: usize,
    full: Sha256,
    units: Vec<String>,
    bytes: u64,
}

impl Sha256Backend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HashBackend for Sha256Backend {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn begin(&mut self, unit_count: usize) {
        self.stream = Some(Stream {
            expected: unit_count,
            full: Sha256::new(),
            units: Vec::with_capacity(unit_count),
            bytes: 0,
        });
    }

    fn feed(&mut self, unit: &[u8]) -> Result<HashStep, TransferError> {
        let stream = self.stream.as_mut().ok_or(TransferError::HashNotStarted)?;

        stream.full.update(unit);
        stream.units.push(checksum_bytes(unit));
        stream.bytes += unit.len() as u64;

        if stream.units.len() < stream.expected {
            return Ok(HashStep::Progress(stream.bytes));
        }

        let Some(done) = self.stream.take() else {
            return Err(TransferError::HashNotStarted);
        };
        Ok(HashStep::Done {
            bytes: done.bytes,
            hashes: Hashes {
                full: hex::encode(done.full.finalize()),
                units: done.units,
            },
        })
    }
}

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
