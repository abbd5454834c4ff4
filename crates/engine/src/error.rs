//! Upload error types.

/// Errors produced by the upload engine and its transports.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: {0}")]
    Api(#[from] uplink_protocol::ApiError),

    #[error("transfer error: {0}")]
    Transfer(#[from] uplink_transfer::TransferError),

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("unsupported environment: {0}")]
    Unsupported(String),

    #[error("upload engine stopped")]
    Closed,

    #[error("cancelled")]
    Cancelled,
}
