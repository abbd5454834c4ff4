//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uplink_protocol::DuplicateAction;
use uplink_protocol::constants::DEFAULT_FOLDER_KEY;

use crate::error::UploadError;

const DEFAULT_API_URL: &str = "https://www.mediafire.com/api/";

/// Settings for one [`Uploader`](crate::Uploader) instance.
///
/// Every field has a default so partial TOML/JSON documents deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploaderConfig {
    /// Session token sent with every request. Required.
    pub session_token: String,

    /// Base API URL, ending in `/`.
    pub api_url: String,

    /// Optional API version segment appended to `api_url` (e.g. `"1.5"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Base URL for unit uploads. Empty means "same as the API URL".
    #[serde(skip_serializing_if = "String::is_empty")]
    pub upload_url: String,

    /// Maximum unit uploads in flight.
    pub concurrent_uploads: usize,

    /// Retries per unit before the file fails.
    pub retry_attempts: u32,

    /// Always transfer bytes, even when the service already has the content.
    pub disable_instant_uploads: bool,

    /// Duplicate policy applied without asking.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_on_duplicate: Option<DuplicateAction>,

    /// Start the pre-upload check as soon as hashing finishes. When false,
    /// hashed files wait for [`Uploader::start_upload`](crate::Uploader::start_upload).
    pub upload_on_add: bool,

    /// Lowercase extensions accepted by `add`. Empty accepts everything.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filter_by_extension: Vec<String>,

    /// Destination path below the folder, sent as `path`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,

    /// Destination folder key, sent as `uploadkey`.
    pub folder_key: String,

    /// Delay between finalization polls, in milliseconds.
    pub poll_interval_ms: u64,

    /// Poll attempts before a file in verification fails. `None` polls
    /// forever; config files spell that `0`.
    #[serde(with = "poll_limit")]
    pub max_poll_attempts: Option<u32>,

    /// How long hashing waits for an accelerated backend, in milliseconds.
    pub hash_grace_period_ms: u64,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            session_token: String::new(),
            api_url: DEFAULT_API_URL.into(),
            api_version: None,
            upload_url: String::new(),
            concurrent_uploads: 3,
            retry_attempts: 3,
            disable_instant_uploads: false,
            action_on_duplicate: None,
            upload_on_add: true,
            filter_by_extension: Vec::new(),
            relative_path: None,
            folder_key: DEFAULT_FOLDER_KEY.into(),
            poll_interval_ms: 3_000,
            max_poll_attempts: Some(400),
            hash_grace_period_ms: 3_000,
        }
    }
}

impl UploaderConfig {
    /// Creates a config with defaults and the given session token.
    pub fn new(session_token: impl Into<String>) -> Self {
        Self {
            session_token: session_token.into(),
            ..Self::default()
        }
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), UploadError> {
        if self.session_token.trim().is_empty() {
            return Err(UploadError::Unsupported(
                "missing or invalid session token".into(),
            ));
        }
        if self.concurrent_uploads == 0 {
            return Err(UploadError::Unsupported(
                "concurrent_uploads must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// API base including the version segment, always ending in `/`.
    pub fn api_base(&self) -> String {
        let mut base = with_trailing_slash(&self.api_url);
        if let Some(version) = self.api_version.as_deref().filter(|v| !v.is_empty()) {
            base.push_str(version.trim_matches('/'));
            base.push('/');
        }
        base
    }

    /// Unit upload base, falling back to [`api_base`](Self::api_base).
    pub fn upload_base(&self) -> String {
        if self.upload_url.is_empty() {
            self.api_base()
        } else {
            with_trailing_slash(&self.upload_url)
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn hash_grace_period(&self) -> Duration {
        Duration::from_millis(self.hash_grace_period_ms)
    }
}

/// `Option<u32>` stored as a plain number, `0` standing for `None`.
mod poll_limit {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(value.unwrap_or(0))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        let value = Option::<u32>::deserialize(deserializer)?;
        Ok(value.filter(|n| *n > 0))
    }
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}
