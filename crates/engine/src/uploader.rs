//! Public handle to a running upload engine.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};
use uplink_protocol::DuplicateAction;
use uplink_transfer::{HashBackend, SourceFile, parse_extension_list, passes_extension_filter};

use crate::config::UploaderConfig;
use crate::engine::{Engine, Msg};
use crate::error::UploadError;
use crate::http::HttpTransport;
use crate::transport::Transport;
use crate::types::{FileId, FileSnapshot, UploadEvent};

type BackendFuture = Pin<Box<dyn Future<Output = Option<Box<dyn HashBackend>>> + Send>>;

/// Handle to an upload engine running on the current tokio runtime.
///
/// Commands are fire-and-forget; progress arrives on the event stream from
/// [`take_events`](Self::take_events). Dropping the handle stops the engine
/// and cancels outstanding work.
pub struct Uploader {
    tx: mpsc::UnboundedSender<Msg>,
    events: Option<mpsc::UnboundedReceiver<UploadEvent>>,
    next_id: AtomicU64,
    filter: Vec<String>,
}

impl Uploader {
    /// Starts an engine talking to the service over HTTP.
    pub fn connect(config: UploaderConfig) -> Result<Self, UploadError> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Self::new(config, Arc::new(transport))
    }

    /// Starts an engine over `transport`, hashing with SHA-256.
    pub fn new(config: UploaderConfig, transport: Arc<dyn Transport>) -> Result<Self, UploadError> {
        Self::build(config, transport, None)
    }

    /// Starts an engine whose hashing waits for `backend` to initialise.
    ///
    /// Hashing holds off until the backend resolves or the configured grace
    /// period elapses, whichever comes first; a backend that resolves to
    /// `None` leaves the SHA-256 fallback in place.
    pub fn with_accelerated_backend<F>(
        config: UploaderConfig,
        transport: Arc<dyn Transport>,
        backend: F,
    ) -> Result<Self, UploadError>
    where
        F: Future<Output = Option<Box<dyn HashBackend>>> + Send + 'static,
    {
        Self::build(config, transport, Some(Box::pin(backend)))
    }

    fn build(
        config: UploaderConfig,
        transport: Arc<dyn Transport>,
        backend: Option<BackendFuture>,
    ) -> Result<Self, UploadError> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| UploadError::Unsupported("no tokio runtime".into()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let filter = parse_extension_list(&config.filter_by_extension.join(","));

        let accelerated = backend.is_some();
        if let Some(backend) = backend {
            let ready_tx = tx.clone();
            runtime.spawn(async move {
                let _ = ready_tx.send(Msg::BackendReady(backend.await));
            });
            let grace_tx = tx.clone();
            let grace = config.hash_grace_period();
            runtime.spawn(async move {
                tokio::time::sleep(grace).await;
                let _ = grace_tx.send(Msg::GraceElapsed);
            });
        }

        info!(
            concurrency = config.concurrent_uploads,
            retries = config.retry_attempts,
            accelerated,
            "upload engine started"
        );
        let engine = Engine::new(config, transport, tx.clone(), events_tx, accelerated);
        runtime.spawn(engine.run(rx));

        Ok(Self {
            tx,
            events: Some(events_rx),
            next_id: AtomicU64::new(1),
            filter,
        })
    }

    /// Takes the event stream. Returns `None` after the first call.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<UploadEvent>> {
        self.events.take()
    }

    fn send_msg(&self, msg: Msg) -> Result<(), UploadError> {
        self.tx.send(msg).map_err(|_| UploadError::Closed)
    }

    /// Adds a file. Returns `None` when the extension filter rejects it.
    pub fn add(&self, file: SourceFile) -> Result<Option<FileId>, UploadError> {
        if !passes_extension_filter(&file.name, &self.filter) {
            debug!(name = %file.name, "file rejected by extension filter");
            return Ok(None);
        }
        let id = FileId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.send_msg(Msg::Add { id, file })?;
        Ok(Some(id))
    }

    /// Adds the file at `path`.
    pub async fn add_path(&self, path: &Path) -> Result<Option<FileId>, UploadError> {
        let file = SourceFile::from_path(path).await?;
        self.add(file)
    }

    /// Adds several files, returning the ids of those accepted.
    pub fn send(
        &self,
        files: impl IntoIterator<Item = SourceFile>,
    ) -> Result<Vec<FileId>, UploadError> {
        let mut ids = Vec::new();
        for file in files {
            if let Some(id) = self.add(file)? {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Starts the check for every hashed file held back by
    /// `upload_on_add = false`.
    pub fn start_upload(&self) -> Result<(), UploadError> {
        self.send_msg(Msg::StartUpload)
    }

    /// Answers a duplicate confirmation for `id`. With `apply_all` the
    /// action also becomes the policy for every other collision.
    pub fn duplicate_action(
        &self,
        id: FileId,
        action: DuplicateAction,
        apply_all: bool,
    ) -> Result<(), UploadError> {
        self.send_msg(Msg::DuplicateAction {
            id,
            action,
            apply_all,
        })
    }

    /// Stops work on `id`. Terminal files are left as they are.
    pub fn abort(&self, id: FileId) -> Result<(), UploadError> {
        self.send_msg(Msg::Abort { id })
    }

    pub async fn snapshot(&self, id: FileId) -> Result<Option<FileSnapshot>, UploadError> {
        let (reply, rx) = oneshot::channel();
        self.send_msg(Msg::Snapshot { id, reply })?;
        rx.await.map_err(|_| UploadError::Closed)
    }

    /// Snapshots of every file, in the order they were added.
    pub async fn files(&self) -> Result<Vec<FileSnapshot>, UploadError> {
        let (reply, rx) = oneshot::channel();
        self.send_msg(Msg::Files { reply })?;
        rx.await.map_err(|_| UploadError::Closed)
    }

    /// Stops the engine and cancels outstanding work.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Msg::Shutdown);
    }
}

impl Drop for Uploader {
    fn drop(&mut self) {
        self.shutdown();
    }
}
