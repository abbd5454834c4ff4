//! Endpoint names, header names and well-known codes.

/// Pre-upload existence and resumability query.
pub const ENDPOINT_CHECK: &str = "check";
/// Zero-byte upload of content the service already stores.
pub const ENDPOINT_INSTANT: &str = "instant";
/// Binary unit upload.
pub const ENDPOINT_RESUMABLE: &str = "resumable";
/// Finalization status query.
pub const ENDPOINT_POLL_UPLOAD: &str = "poll_upload";

/// Folder key used when the caller does not name one.
pub const DEFAULT_FOLDER_KEY: &str = "myfiles";

/// `doupload.status` reported once the service has no further steps for a key.
pub const POLL_STATUS_FINISHED: i64 = 99;

/// `doupload.result` signalling success.
pub const RESULT_OK: i64 = 0;

/// Envelope `result` value for a failed call.
pub const ENVELOPE_ERROR: &str = "Error";

pub const HEADER_FILENAME: &str = "X-Filename";
pub const HEADER_FILESIZE: &str = "X-Filesize";
pub const HEADER_FILETYPE: &str = "X-Filetype";
pub const HEADER_FILEHASH: &str = "X-Filehash";
pub const HEADER_UNIT_ID: &str = "X-Unit-Id";
pub const HEADER_UNIT_HASH: &str = "X-Unit-Hash";
pub const HEADER_UNIT_SIZE: &str = "X-Unit-Size";
