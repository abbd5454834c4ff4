//! Data types shared between the engine and its callers.

use std::fmt;

use serde::{Deserialize, Serialize};
use uplink_protocol::DuplicateAction;

/// Engine-assigned file identifier, unique per [`Uploader`](crate::Uploader).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub u64);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a file.
///
/// ```text
/// HashQueued -> Hashing -> Hashed -> UploadCheck -> UploadQueued | Uploading
///     -> Verifying -> Complete
/// Duplicate -> Skipped | UploadCheck | UploadQueued | Uploading
/// any non-terminal state -> Failed | Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileState {
    HashQueued,
    Hashing,
    Hashed,
    UploadCheck,
    UploadQueued,
    Uploading,
    Verifying,
    Complete,
    Duplicate,
    Aborted,
    Skipped,
    Failed,
}

impl FileState {
    /// Terminal states never change again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Complete | Self::Aborted | Self::Skipped | Self::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HashQueued => "hash-queue",
            Self::Hashing => "hashing",
            Self::Hashed => "hashed",
            Self::UploadCheck => "pre-upload",
            Self::UploadQueued => "upload-queue",
            Self::Uploading => "uploading",
            Self::Verifying => "verifying",
            Self::Complete => "complete",
            Self::Duplicate => "duplicate",
            Self::Aborted => "aborted",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the file's bytes reach the service, decided by the pre-upload check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadType {
    #[default]
    Undetermined,
    /// The service already has the content; no bytes are sent.
    Instant,
    /// Unit-by-unit transfer.
    Resumable,
}

/// Owned copy of a file's observable fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSnapshot {
    pub id: FileId,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub state: FileState,
    pub upload_type: UploadType,
    pub unit_size: u64,
    pub unit_count: usize,
    /// Per-unit completion, empty until the resumable path is chosen.
    pub units: Vec<bool>,
    pub bytes_hashed: u64,
    pub bytes_uploaded: u64,
    pub upload_retries: u32,
    /// Whole-file digest once hashing finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quickkey: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dupe_quickkey: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_action: Option<DuplicateAction>,
}

/// Notification emitted after every engine mutation, in order.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// The file entered `state`.
    StateChanged { file: FileSnapshot, state: FileState },
    /// Bytes of the file the service holds or is receiving.
    UploadProgress { id: FileId, bytes: u64 },
    /// Bytes hashed so far.
    HashProgress { id: FileId, bytes: u64 },
    /// The file's name collides at the destination; answer with
    /// [`Uploader::duplicate_action`](crate::Uploader::duplicate_action).
    DuplicateConfirm { file: FileSnapshot },
}

impl UploadEvent {
    /// The file this event concerns.
    pub fn file_id(&self) -> FileId {
        match self {
            Self::StateChanged { file, .. } | Self::DuplicateConfirm { file } => file.id,
            Self::UploadProgress { id, .. } | Self::HashProgress { id, .. } => *id,
        }
    }
}
