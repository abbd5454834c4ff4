//! Hash coordination: one file hashing at a time, FIFO queue, backend
//! hand-over between the fallback and an accelerated backend.

use std::collections::VecDeque;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uplink_transfer::{ByteSource, HashBackend, HashStep, Hashes, Sha256Backend, UnitLayout};

use crate::engine::Msg;
use crate::error::UploadError;
use crate::types::FileId;

/// A file that may start hashing now, with the backend lent to it.
pub(crate) type HashStart = (FileId, Box<dyn HashBackend>);

/// Serializes hashing across files.
///
/// The backend is lent to the active hash task and returned on completion,
/// so at most one file is ever mid-stream.
pub(crate) struct HashCoordinator {
    backend: Option<Box<dyn HashBackend>>,
    /// Accelerated backend that arrived while a file was active.
    upgrade: Option<Box<dyn HashBackend>>,
    active: Option<FileId>,
    queue: VecDeque<FileId>,
    accelerated_pending: bool,
    grace_elapsed: bool,
}

impl HashCoordinator {
    /// `accelerated_pending` holds new work back until the accelerated
    /// backend arrives or the grace period ends.
    pub(crate) fn new(accelerated_pending: bool) -> Self {
        Self {
            backend: Some(Box::new(Sha256Backend::new())),
            upgrade: None,
            active: None,
            queue: VecDeque::new(),
            accelerated_pending,
            grace_elapsed: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn active(&self) -> Option<FileId> {
        self.active
    }

    #[cfg(test)]
    pub(crate) fn queued(&self) -> usize {
        self.queue.len()
    }

    fn can_start(&self) -> bool {
        self.active.is_none()
            && self.backend.is_some()
            && (!self.accelerated_pending || self.grace_elapsed)
    }

    fn next(&mut self) -> Option<HashStart> {
        if !self.can_start() {
            return None;
        }
        let id = self.queue.pop_front()?;
        let backend = self.backend.take()?;
        self.active = Some(id);
        Some((id, backend))
    }

    /// Queues `id`; returns it with a backend if it can start immediately.
    pub(crate) fn submit(&mut self, id: FileId) -> Option<HashStart> {
        self.queue.push_back(id);
        self.next()
    }

    /// The active file finished (successfully or not). Returns the next
    /// file to start, if any.
    pub(crate) fn finish(
        &mut self,
        id: FileId,
        backend: Option<Box<dyn HashBackend>>,
    ) -> Option<HashStart> {
        if self.active != Some(id) {
            warn!(file = %id, "hash completion for inactive file");
            return None;
        }
        self.active = None;
        self.backend = self
            .upgrade
            .take()
            .or(backend)
            .or_else(|| Some(Box::new(Sha256Backend::new()) as Box<dyn HashBackend>));
        self.next()
    }

    /// The accelerated backend finished initialising (`None` if it failed).
    pub(crate) fn backend_ready(
        &mut self,
        backend: Option<Box<dyn HashBackend>>,
    ) -> Option<HashStart> {
        self.accelerated_pending = false;
        if let Some(backend) = backend {
            debug!(backend = backend.name(), "accelerated hash backend ready");
            if self.active.is_none() {
                self.backend = Some(backend);
            } else {
                self.upgrade = Some(backend);
            }
        }
        self.next()
    }

    /// The warm-up grace period ended; queued work starts on the fallback.
    pub(crate) fn grace_elapsed(&mut self) -> Option<HashStart> {
        self.grace_elapsed = true;
        self.next()
    }

    /// Drops a queued file. An active file is stopped via its cancel token.
    pub(crate) fn remove(&mut self, id: FileId) {
        self.queue.retain(|queued| *queued != id);
    }
}

/// Streams one file through `backend`, unit by unit.
///
/// Reports `HashProgress` after every unit and a final `HashDone` carrying
/// the backend back to the coordinator.
pub(crate) async fn run_hash_task(
    id: FileId,
    source: ByteSource,
    layout: UnitLayout,
    mut backend: Box<dyn HashBackend>,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<Msg>,
) {
    let count = layout.count();
    backend.begin(count);

    let mut outcome: Result<Option<Hashes>, UploadError> = Ok(None);
    for unit in 0..count {
        if cancel.is_cancelled() {
            outcome = Err(UploadError::Cancelled);
            break;
        }

        let data = match source.read_range(layout.range(unit)).await {
            Ok(data) => data,
            Err(e) => {
                outcome = Err(e.into());
                break;
            }
        };

        let joined = tokio::task::spawn_blocking(move || {
            let step = backend.feed(&data);
            (backend, step)
        })
        .await;

        let (returned, step) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                let _ = tx.send(Msg::HashDone {
                    id,
                    result: Err(UploadError::Transport(format!("hash task failed: {e}"))),
                    backend: None,
                });
                return;
            }
        };
        backend = returned;

        match step {
            Ok(HashStep::Progress(bytes)) => {
                let _ = tx.send(Msg::HashProgress { id, bytes });
            }
            Ok(HashStep::Done { bytes, hashes }) => {
                let _ = tx.send(Msg::HashProgress { id, bytes });
                outcome = Ok(Some(hashes));
                break;
            }
            Err(e) => {
                outcome = Err(e.into());
                break;
            }
        }
    }

    let result = match outcome {
        Ok(Some(hashes)) => Ok(hashes),
        Ok(None) => Err(UploadError::Transport(format!(
            "{} finished without a digest",
            backend.name()
        ))),
        Err(e) => Err(e),
    };
    let _ = tx.send(Msg::HashDone {
        id,
        result,
        backend: Some(backend),
    });
}
