//! Scriptable in-memory transport for engine tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use uplink_protocol::{
    Bitmap, CheckRequest, CheckResponse, DoUpload, InstantRequest, InstantResponse,
    NumberOrString, PollRequest, PollResponse, ResumableUpload, UnitUploadRequest,
    UnitUploadResponse,
};

use crate::error::UploadError;
use crate::transport::{ProgressFn, Transport, TransportFuture};

type Handler<Req, Resp> = Box<dyn Fn(&Req) -> Result<Resp, UploadError> + Send + Sync>;

/// A request the mock received.
#[derive(Debug, Clone)]
pub(crate) enum Recorded {
    Check(CheckRequest),
    Instant(InstantRequest),
    Unit {
        request: UnitUploadRequest,
        body: Vec<u8>,
    },
    Poll(PollRequest),
}

pub(crate) struct MockTransport {
    check: Handler<CheckRequest, CheckResponse>,
    instant: Handler<InstantRequest, InstantResponse>,
    unit: Handler<UnitUploadRequest, UnitUploadResponse>,
    poll_script: Mutex<VecDeque<Result<PollResponse, UploadError>>>,
    unit_delay: Duration,
    requests: Mutex<Vec<Recorded>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    /// Defaults: check finds nothing, instant and unit uploads succeed,
    /// polls finish immediately.
    pub(crate) fn new() -> Self {
        Self {
            check: Box::new(|_| Ok(CheckResponse::default())),
            instant: Box::new(|_| {
                Ok(InstantResponse {
                    quickkey: Some("qk-instant".into()),
                })
            }),
            unit: Box::new(|_| Ok(unit_ok("uk1"))),
            poll_script: Mutex::new(VecDeque::new()),
            unit_delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_check(
        mut self,
        f: impl Fn(&CheckRequest) -> Result<CheckResponse, UploadError> + Send + Sync + 'static,
    ) -> Self {
        self.check = Box::new(f);
        self
    }

    pub(crate) fn with_instant(
        mut self,
        f: impl Fn(&InstantRequest) -> Result<InstantResponse, UploadError> + Send + Sync + 'static,
    ) -> Self {
        self.instant = Box::new(f);
        self
    }

    pub(crate) fn with_unit(
        mut self,
        f: impl Fn(&UnitUploadRequest) -> Result<UnitUploadResponse, UploadError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.unit = Box::new(f);
        self
    }

    /// Poll replies in order; once exhausted every poll finishes with `qk1`.
    pub(crate) fn with_poll_script(self, script: Vec<Result<PollResponse, UploadError>>) -> Self {
        *self.poll_script.lock().unwrap() = script.into();
        self
    }

    /// Holds every unit upload open for `delay`.
    pub(crate) fn with_unit_delay(mut self, delay: Duration) -> Self {
        self.unit_delay = delay;
        self
    }

    pub(crate) fn recorded(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn unit_requests(&self) -> Vec<UnitUploadRequest> {
        self.recorded()
            .into_iter()
            .filter_map(|r| match r {
                Recorded::Unit { request, .. } => Some(request),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, req: Recorded) {
        self.requests.lock().unwrap().push(req);
    }
}

impl Transport for MockTransport {
    fn check(&self, req: CheckRequest) -> TransportFuture<'_, CheckResponse> {
        Box::pin(async move {
            let resp = (self.check)(&req);
            self.record(Recorded::Check(req));
            resp
        })
    }

    fn instant(&self, req: InstantRequest) -> TransportFuture<'_, InstantResponse> {
        Box::pin(async move {
            let resp = (self.instant)(&req);
            self.record(Recorded::Instant(req));
            resp
        })
    }

    fn upload_unit(
        &self,
        req: UnitUploadRequest,
        body: Vec<u8>,
        progress: ProgressFn,
    ) -> TransportFuture<'_, UnitUploadResponse> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let len = body.len() as u64;
            progress(len / 2);
            if !self.unit_delay.is_zero() {
                tokio::time::sleep(self.unit_delay).await;
            }
            progress(len);

            let resp = (self.unit)(&req);
            self.record(Recorded::Unit { request: req, body });
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            resp
        })
    }

    fn poll_upload(&self, req: PollRequest) -> TransportFuture<'_, PollResponse> {
        Box::pin(async move {
            self.record(Recorded::Poll(req));
            self.poll_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(poll_reply(Some("qk1"))))
        })
    }
}

pub(crate) fn unit_ok(key: &str) -> UnitUploadResponse {
    UnitUploadResponse {
        doupload: DoUpload {
            result: Some(NumberOrString::from("0")),
            key: Some(key.into()),
            ..DoUpload::default()
        },
    }
}

pub(crate) fn unit_rejected() -> UnitUploadResponse {
    UnitUploadResponse {
        doupload: DoUpload {
            result: Some(NumberOrString::from("-1")),
            ..DoUpload::default()
        },
    }
}

pub(crate) fn poll_reply(quickkey: Option<&str>) -> PollResponse {
    PollResponse {
        doupload: DoUpload {
            result: Some(NumberOrString::from("0")),
            status: Some(NumberOrString::from("99")),
            quickkey: quickkey.map(String::from),
            ..DoUpload::default()
        },
    }
}

pub(crate) fn poll_pending() -> PollResponse {
    PollResponse {
        doupload: DoUpload {
            result: Some(NumberOrString::from("0")),
            status: Some(NumberOrString::from("17")),
            ..DoUpload::default()
        },
    }
}

/// Check reply describing a resumable upload with the given bitmap words.
pub(crate) fn resumable_check(
    units: u64,
    words: &[&str],
    upload_key: Option<&str>,
    file_exists: bool,
) -> CheckResponse {
    CheckResponse {
        hash_exists: false,
        file_exists,
        duplicate_quickkey: file_exists.then(|| "dq1".to_string()),
        resumable_upload: Some(ResumableUpload {
            all_units_ready: false,
            number_of_units: NumberOrString::Number(units as i64),
            unit_size: None,
            bitmap: Bitmap {
                count: NumberOrString::Number(words.len() as i64),
                words: words.iter().map(|w| NumberOrString::from(*w)).collect(),
            },
            upload_key: upload_key.map(String::from),
        }),
    }
}

pub(crate) fn unit_request(unit: usize, size: u64) -> UnitUploadRequest {
    UnitUploadRequest {
        filename: "test.bin".into(),
        file_size: size,
        file_type: "application/octet-stream".into(),
        file_hash: "ff".into(),
        unit_id: unit,
        unit_hash: "ee".into(),
        unit_size: size,
        folder_key: "myfiles".into(),
        path: None,
        action_on_duplicate: None,
    }
}
