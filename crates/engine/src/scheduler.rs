//! Unit upload scheduling: the bounded slot pool, the per-unit transfer
//! task and the finalization poll loop.

use std::collections::VecDeque;
use std::future::Future;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uplink_protocol::{PollRequest, UnitUploadRequest};
use uplink_transfer::ByteSource;

use crate::engine::Msg;
use crate::error::UploadError;
use crate::transport::{ProgressFn, Transport};
use crate::types::FileId;

/// At most `limit` unit transfers in flight; the rest wait FIFO.
pub(crate) struct UploadPool {
    limit: usize,
    active: usize,
    queue: VecDeque<(FileId, usize)>,
}

impl UploadPool {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            active: 0,
            queue: VecDeque::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn active(&self) -> usize {
        self.active
    }

    #[cfg(test)]
    pub(crate) fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Takes a slot if one is free.
    pub(crate) fn try_acquire(&mut self) -> bool {
        if self.active < self.limit {
            self.active += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn release(&mut self) {
        self.active = self.active.saturating_sub(1);
    }

    pub(crate) fn enqueue(&mut self, id: FileId, unit: usize) {
        self.queue.push_back((id, unit));
    }

    /// Pops the queue head into a free slot. The caller owns the slot and
    /// must [`release`](Self::release) it if the entry turns out stale.
    pub(crate) fn dequeue(&mut self) -> Option<(FileId, usize)> {
        if self.active >= self.limit {
            return None;
        }
        let next = self.queue.pop_front()?;
        self.active += 1;
        Some(next)
    }

    pub(crate) fn remove(&mut self, id: FileId) {
        self.queue.retain(|(queued, _)| *queued != id);
    }
}

/// Runs `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, UploadError>>,
) -> Result<T, UploadError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(UploadError::Cancelled),
        result = fut => result,
    }
}

/// One unit transfer.
pub(crate) struct UnitJob {
    pub id: FileId,
    pub unit: usize,
    /// Tags every message from this transfer so late ones can be told apart.
    pub attempt: u64,
    pub source: ByteSource,
    pub range: Range<u64>,
    pub request: UnitUploadRequest,
}

/// Reads the unit's bytes and sends them, reporting `UnitProgress` while
/// the body goes out and `UnitDone` at the end.
pub(crate) async fn run_unit_task(
    transport: Arc<dyn Transport>,
    job: UnitJob,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<Msg>,
) {
    let UnitJob {
        id,
        unit,
        attempt,
        source,
        range,
        request,
    } = job;

    let progress: ProgressFn = {
        let tx = tx.clone();
        Arc::new(move |sent| {
            let _ = tx.send(Msg::UnitProgress {
                id,
                unit,
                attempt,
                sent,
            });
        })
    };

    let result = cancellable(&cancel, async {
        let body = source.read_range(range).await?;
        transport.upload_unit(request, body, progress).await
    })
    .await;

    let _ = tx.send(Msg::UnitDone {
        id,
        unit,
        attempt,
        result,
    });
}

/// How verification polling is paced.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
}

/// Polls `key` until the service finishes the upload.
///
/// Returns the file's quickkey. A transport error, a reported file error,
/// a finished reply without a quickkey, or running out of attempts fails.
pub(crate) async fn poll_until_finished(
    transport: &dyn Transport,
    key: &str,
    policy: PollPolicy,
) -> Result<String, UploadError> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let reply = transport
            .poll_upload(PollRequest { key: key.to_string() })
            .await?
            .doupload;

        if let Some(code) = reply.file_error() {
            return Err(UploadError::Verification(format!(
                "service reported file error {code}"
            )));
        }
        if reply.is_finished() {
            return reply.quickkey.ok_or_else(|| {
                UploadError::Verification("upload finished without a quickkey".into())
            });
        }
        if policy.max_attempts.is_some_and(|max| attempt >= max) {
            return Err(UploadError::Verification(format!(
                "not finished after {attempt} polls"
            )));
        }

        debug!(key, attempt, status = ?reply.status, "upload not finished yet");
        tokio::time::sleep(policy.interval).await;
    }
}

/// Runs [`poll_until_finished`] and reports `PollDone`.
pub(crate) async fn run_poll_task(
    transport: Arc<dyn Transport>,
    id: FileId,
    key: String,
    policy: PollPolicy,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<Msg>,
) {
    let result = cancellable(
        &cancel,
        poll_until_finished(transport.as_ref(), &key, policy),
    )
    .await;
    let _ = tx.send(Msg::PollDone { id, result });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, Recorded, poll_pending, poll_reply};
    use uplink_protocol::{DoUpload, NumberOrString, PollResponse};

    fn id(n: u64) -> FileId {
        FileId(n)
    }

    #[test]
    fn pool_respects_limit() {
        let mut pool = UploadPool::new(2);
        assert!(pool.try_acquire());
        assert!(pool.try_acquire());
        assert!(!pool.try_acquire());
        assert_eq!(pool.active(), 2);

        pool.enqueue(id(3), 0);
        assert!(pool.dequeue().is_none(), "no free slot yet");

        pool.release();
        assert_eq!(pool.dequeue(), Some((id(3), 0)));
        assert_eq!(pool.active(), 2);
    }

    #[test]
    fn pool_dequeue_is_fifo_and_skips_removed() {
        let mut pool = UploadPool::new(1);
        pool.enqueue(id(1), 0);
        pool.enqueue(id(2), 4);
        pool.enqueue(id(3), 1);
        pool.remove(id(2));
        assert_eq!(pool.queued(), 2);

        assert_eq!(pool.dequeue(), Some((id(1), 0)));
        pool.release();
        assert_eq!(pool.dequeue(), Some((id(3), 1)));
    }

    #[test]
    fn pool_zero_limit_clamped() {
        let mut pool = UploadPool::new(0);
        assert!(pool.try_acquire());
    }

    fn policy(max: Option<u32>) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(3),
            max_attempts: max,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn poll_waits_until_finished() {
        let mock = MockTransport::new().with_poll_script(vec![
            Ok(poll_pending()),
            Ok(poll_pending()),
            Ok(poll_reply(Some("qk9"))),
        ]);

        let started = tokio::time::Instant::now();
        let quickkey = poll_until_finished(&mock, "uk", policy(None)).await.unwrap();
        assert_eq!(quickkey, "qk9");
        assert_eq!(started.elapsed(), Duration::from_secs(6));

        let polls = mock.recorded();
        assert_eq!(polls.len(), 3);
        assert!(matches!(&polls[0], Recorded::Poll(req) if req.key == "uk"));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_finished_without_quickkey_fails() {
        let mock = MockTransport::new().with_poll_script(vec![Ok(poll_reply(None))]);
        let err = poll_until_finished(&mock, "uk", policy(None)).await.unwrap_err();
        assert!(matches!(err, UploadError::Verification(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_file_error_fails() {
        let reply = PollResponse {
            doupload: DoUpload {
                result: Some(NumberOrString::from("0")),
                status: Some(NumberOrString::from("17")),
                fileerror: Some(NumberOrString::from("5")),
                ..DoUpload::default()
            },
        };
        let mock = MockTransport::new().with_poll_script(vec![Ok(reply)]);
        let err = poll_until_finished(&mock, "uk", policy(None)).await.unwrap_err();
        assert!(err.to_string().contains("file error 5"));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_gives_up_after_cap() {
        let mock = MockTransport::new().with_poll_script(vec![
            Ok(poll_pending()),
            Ok(poll_pending()),
            Ok(poll_pending()),
            Ok(poll_pending()),
        ]);
        let err = poll_until_finished(&mock, "uk", policy(Some(3))).await.unwrap_err();
        assert!(err.to_string().contains("3 polls"));
        assert_eq!(mock.recorded().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_transport_error_fails() {
        let mock = MockTransport::new()
            .with_poll_script(vec![Err(UploadError::Transport("reset".into()))]);
        let err = poll_until_finished(&mock, "uk", policy(None)).await.unwrap_err();
        assert!(matches!(err, UploadError::Transport(_)));
    }

    #[tokio::test]
    async fn unit_task_reports_progress_then_result() {
        let mock = Arc::new(MockTransport::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let job = UnitJob {
            id: id(1),
            unit: 2,
            attempt: 7,
            source: ByteSource::from_bytes(b"AABBCCDDEE".to_vec()),
            range: 8..10,
            request: crate::testing::unit_request(2, 2),
        };

        run_unit_task(mock.clone(), job, CancellationToken::new(), tx).await;

        let mut progress = Vec::new();
        let mut done = false;
        while let Some(msg) = rx.recv().await {
            match msg {
                Msg::UnitProgress {
                    unit,
                    attempt,
                    sent,
                    ..
                } => {
                    assert_eq!((unit, attempt), (2, 7));
                    progress.push(sent);
                }
                Msg::UnitDone {
                    unit,
                    attempt,
                    result,
                    ..
                } => {
                    assert_eq!((unit, attempt), (2, 7));
                    assert!(result.unwrap().doupload.is_ok());
                    done = true;
                }
                _ => panic!("unexpected message"),
            }
        }
        assert!(done);
        assert_eq!(progress.last(), Some(&2));
        assert!(matches!(
            &mock.recorded()[0],
            Recorded::Unit { body, .. } if body == b"EE"
        ));
    }

    #[tokio::test]
    async fn unit_task_cancelled() {
        let mock = Arc::new(MockTransport::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let job = UnitJob {
            id: id(1),
            unit: 0,
            attempt: 1,
            source: ByteSource::from_bytes(vec![1u8; 4]),
            range: 0..4,
            request: crate::testing::unit_request(0, 4),
        };
        run_unit_task(mock, job, cancel, tx).await;

        let Some(Msg::UnitDone { result, .. }) = rx.recv().await else {
            panic!("expected UnitDone");
        };
        assert!(matches!(result, Err(UploadError::Cancelled)));
    }
}
