use serde::{Deserialize, Serialize};

use crate::constants::{
    HEADER_FILEHASH, HEADER_FILENAME, HEADER_FILESIZE, HEADER_FILETYPE, HEADER_UNIT_HASH,
    HEADER_UNIT_ID, HEADER_UNIT_SIZE, POLL_STATUS_FINISHED, RESULT_OK,
};
use crate::types::{DuplicateAction, NumberOrString, non_empty, yes_no};

/// Query parameters as ordered key/value pairs.
pub type Query = Vec<(&'static str, String)>;

fn push_optional(query: &mut Query, key: &'static str, value: Option<&str>) {
    if let Some(v) = value {
        query.push((key, v.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Pre-upload existence / resumability query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckRequest {
    pub hash: String,
    pub size: u64,
    pub filename: String,
    pub resumable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl CheckRequest {
    pub fn query(&self) -> Query {
        let mut q = vec![
            ("hash", self.hash.clone()),
            ("size", self.size.to_string()),
            ("filename", self.filename.clone()),
        ];
        if self.resumable {
            q.push(("resumable", "yes".into()));
        }
        push_optional(&mut q, "path", self.path.as_deref());
        q
    }
}

/// Requests completion of an upload from content the service already has.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstantRequest {
    pub hash: String,
    pub size: u64,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_on_duplicate: Option<DuplicateAction>,
}

impl InstantRequest {
    pub fn query(&self) -> Query {
        let mut q = vec![
            ("hash", self.hash.clone()),
            ("size", self.size.to_string()),
            ("filename", self.filename.clone()),
        ];
        push_optional(&mut q, "path", self.path.as_deref());
        push_optional(
            &mut q,
            "action_on_duplicate",
            self.action_on_duplicate.as_ref().map(DuplicateAction::as_str),
        );
        q
    }
}

/// Metadata sent alongside one unit's raw bytes.
///
/// File and unit identity travel as `X-*` headers; folder placement and the
/// duplicate directive travel in the query string.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitUploadRequest {
    pub filename: String,
    pub file_size: u64,
    pub file_type: String,
    pub file_hash: String,
    pub unit_id: usize,
    pub unit_hash: String,
    pub unit_size: u64,
    pub folder_key: String,
    pub path: Option<String>,
    pub action_on_duplicate: Option<DuplicateAction>,
}

impl UnitUploadRequest {
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            (HEADER_FILENAME, self.filename.clone()),
            (HEADER_FILESIZE, self.file_size.to_string()),
            (HEADER_FILETYPE, self.file_type.clone()),
            (HEADER_FILEHASH, self.file_hash.clone()),
            (HEADER_UNIT_ID, self.unit_id.to_string()),
            (HEADER_UNIT_HASH, self.unit_hash.clone()),
            (HEADER_UNIT_SIZE, self.unit_size.to_string()),
        ]
    }

    pub fn query(&self) -> Query {
        let mut q = vec![("uploadkey", self.folder_key.clone())];
        push_optional(&mut q, "path", self.path.as_deref());
        push_optional(
            &mut q,
            "action_on_duplicate",
            self.action_on_duplicate.as_ref().map(DuplicateAction::as_str),
        );
        q
    }
}

/// Finalization status query for an upload key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollRequest {
    pub key: String,
}

impl PollRequest {
    pub fn query(&self) -> Query {
        vec![("key", self.key.clone()), ("resumable", "yes".into())]
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Word-packed unit bitmap, 16 units per word, LSB first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bitmap {
    pub count: NumberOrString,
    #[serde(default)]
    pub words: Vec<NumberOrString>,
}

/// Resumable upload descriptor returned by `check`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResumableUpload {
    #[serde(default, deserialize_with = "yes_no")]
    pub all_units_ready: bool,
    pub number_of_units: NumberOrString,
    #[serde(default)]
    pub unit_size: Option<NumberOrString>,
    pub bitmap: Bitmap,
    #[serde(default, deserialize_with = "non_empty")]
    pub upload_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CheckResponse {
    #[serde(default, deserialize_with = "yes_no")]
    pub hash_exists: bool,
    #[serde(default, deserialize_with = "yes_no")]
    pub file_exists: bool,
    #[serde(default, deserialize_with = "non_empty")]
    pub duplicate_quickkey: Option<String>,
    #[serde(default)]
    pub resumable_upload: Option<ResumableUpload>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InstantResponse {
    #[serde(default, deserialize_with = "non_empty")]
    pub quickkey: Option<String>,
}

/// The `doupload` object shared by unit-upload and poll replies.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DoUpload {
    #[serde(default)]
    pub result: Option<NumberOrString>,
    #[serde(default, deserialize_with = "non_empty")]
    pub key: Option<String>,
    #[serde(default)]
    pub status: Option<NumberOrString>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub quickkey: Option<String>,
    #[serde(default)]
    pub fileerror: Option<NumberOrString>,
}

impl DoUpload {
    /// `result` is present and zero.
    pub fn is_ok(&self) -> bool {
        self.result.as_ref().and_then(NumberOrString::as_i64) == Some(RESULT_OK)
    }

    /// The service has no further processing steps for this key.
    pub fn is_finished(&self) -> bool {
        self.is_ok()
            && self.status.as_ref().and_then(NumberOrString::as_i64) == Some(POLL_STATUS_FINISHED)
    }

    /// Non-zero file error code reported during finalization.
    ///
    /// Empty strings and zero mean "no error".
    pub fn file_error(&self) -> Option<i64> {
        match self.fileerror.as_ref()? {
            NumberOrString::String(s) if s.trim().is_empty() => None,
            other => match other.as_i64() {
                Some(0) => None,
                Some(code) => Some(code),
                None => Some(-1),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UnitUploadResponse {
    #[serde(default)]
    pub doupload: DoUpload,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PollResponse {
    #[serde(default)]
    pub doupload: DoUpload,
}
