use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::constants::ENVELOPE_ERROR;
use crate::types::NumberOrString;

/// Outer wrapper of every service reply.
///
/// `response` is kept raw so the status fields can be inspected before the
/// endpoint-specific body is decoded.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub response: Box<serde_json::value::RawValue>,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<NumberOrString>,
}

/// Errors produced while decoding a service reply.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("service error {code}: {message}")]
    Service { code: i64, message: String },
}

/// Decodes an enveloped reply into the endpoint's response type.
///
/// A reply whose envelope `result` is `"Error"` becomes
/// [`ApiError::Service`] regardless of the body shape.
pub fn parse_response<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let envelope: Envelope = serde_json::from_slice(body)?;
    let status: Status = serde_json::from_str(envelope.response.get())?;

    if status.result.as_deref() == Some(ENVELOPE_ERROR) {
        return Err(ApiError::Service {
            code: status.error.and_then(|e| e.as_i64()).unwrap_or(-1),
            message: status.message.unwrap_or_default(),
        });
    }

    Ok(serde_json::from_str(envelope.response.get())?)
}
