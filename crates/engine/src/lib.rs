//! Resumable upload engine.
//!
//! An [`Uploader`] hashes added files one at a time, asks the service
//! whether each file is already known, and then completes it instantly or
//! transfers its missing units over a bounded pool of concurrent requests.
//! Filename collisions are confirmed with the caller one file at a time.
//! Every state change is reported as an [`UploadEvent`].

mod config;
mod duplicate;
mod engine;
mod error;
mod hashing;
mod http;
mod scheduler;
#[cfg(test)]
mod testing;
mod transport;
mod types;
mod uploader;

pub use config::UploaderConfig;
pub use error::UploadError;
pub use http::HttpTransport;
pub use transport::{ProgressFn, Transport, TransportFuture};
pub use types::{FileId, FileSnapshot, FileState, UploadEvent, UploadType};
pub use uploader::Uploader;

pub use uplink_protocol::DuplicateAction;
pub use uplink_transfer::{
    ByteSource, HashBackend, HashStep, Hashes, Sha256Backend, SourceFile, parse_extension_list,
};
