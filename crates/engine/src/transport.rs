//! Service transport trait.
//!
//! The engine never talks HTTP directly. [`HttpTransport`](crate::HttpTransport)
//! is the production implementation; tests drive the engine with mocks.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use uplink_protocol::{
    CheckRequest, CheckResponse, InstantRequest, InstantResponse, PollRequest, PollResponse,
    UnitUploadRequest, UnitUploadResponse,
};

use crate::error::UploadError;

/// Boxed future returned by [`Transport`] methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, UploadError>> + Send + 'a>>;

/// Receives the cumulative number of body bytes sent for one unit request.
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

/// Abstract connection to the upload service.
pub trait Transport: Send + Sync {
    /// Pre-upload existence and resumability query.
    fn check(&self, req: CheckRequest) -> TransportFuture<'_, CheckResponse>;

    /// Zero-byte completion of content the service already stores.
    fn instant(&self, req: InstantRequest) -> TransportFuture<'_, InstantResponse>;

    /// Sends one unit's bytes. `progress` is called as the body goes out.
    fn upload_unit(
        &self,
        req: UnitUploadRequest,
        body: Vec<u8>,
        progress: ProgressFn,
    ) -> TransportFuture<'_, UnitUploadResponse>;

    /// Finalization status for an upload key.
    fn poll_upload(&self, req: PollRequest) -> TransportFuture<'_, PollResponse>;
}
