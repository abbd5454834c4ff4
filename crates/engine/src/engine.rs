//! The engine actor.
//!
//! One task owns every file and all scheduling state. Caller commands and
//! completions from spawned work (hashing, checks, unit transfers, polls)
//! arrive as [`Msg`]s on one channel and are handled one at a time; each
//! mutation is followed by its [`UploadEvent`].

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uplink_protocol::{
    CheckRequest, CheckResponse, DuplicateAction, InstantRequest, InstantResponse,
    UnitUploadRequest, UnitUploadResponse,
};
use uplink_transfer::{HashBackend, Hashes, SourceFile, UnitLayout, decode_bitmap};

use crate::config::UploaderConfig;
use crate::duplicate::{Arrival, DuplicateResolver, Resolution};
use crate::error::UploadError;
use crate::hashing::{HashCoordinator, HashStart, run_hash_task};
use crate::scheduler::{
    PollPolicy, UnitJob, UploadPool, cancellable, run_poll_task, run_unit_task,
};
use crate::transport::Transport;
use crate::types::{FileId, FileSnapshot, FileState, UploadEvent, UploadType};

/// Messages handled by the engine actor.
pub(crate) enum Msg {
    // Caller commands.
    Add {
        id: FileId,
        file: SourceFile,
    },
    StartUpload,
    DuplicateAction {
        id: FileId,
        action: DuplicateAction,
        apply_all: bool,
    },
    Abort {
        id: FileId,
    },
    Snapshot {
        id: FileId,
        reply: oneshot::Sender<Option<FileSnapshot>>,
    },
    Files {
        reply: oneshot::Sender<Vec<FileSnapshot>>,
    },
    Shutdown,

    // Hashing.
    BackendReady(Option<Box<dyn HashBackend>>),
    GraceElapsed,
    HashProgress {
        id: FileId,
        bytes: u64,
    },
    HashDone {
        id: FileId,
        result: Result<Hashes, UploadError>,
        backend: Option<Box<dyn HashBackend>>,
    },

    // Service calls.
    CheckDone {
        id: FileId,
        result: Result<CheckResponse, UploadError>,
    },
    InstantDone {
        id: FileId,
        result: Result<InstantResponse, UploadError>,
    },
    UnitProgress {
        id: FileId,
        unit: usize,
        attempt: u64,
        sent: u64,
    },
    UnitDone {
        id: FileId,
        unit: usize,
        attempt: u64,
        result: Result<UnitUploadResponse, UploadError>,
    },
    PollDone {
        id: FileId,
        result: Result<String, UploadError>,
    },
}

/// Engine-side record of one file.
struct FileTask {
    id: FileId,
    source: SourceFile,
    layout: UnitLayout,
    units: Vec<bool>,
    hashes: Option<Hashes>,
    bytes_hashed: u64,
    bytes_uploaded: u64,
    upload_retries: u32,
    upload_type: UploadType,
    /// Resumable descriptor said every unit is already stored.
    all_units_ready: bool,
    upload_key: Option<String>,
    quickkey: Option<String>,
    dupe_quickkey: Option<String>,
    duplicate_action: Option<DuplicateAction>,
    state: FileState,
    /// Unit currently being transferred in this file's slot.
    in_flight: Option<usize>,
    /// Transfers started for this file, retries included.
    attempt: u64,
    /// `bytes_uploaded` before the in-flight attempt started.
    attempt_base: u64,
    cancel: CancellationToken,
}

impl FileTask {
    fn new(id: FileId, source: SourceFile) -> Self {
        let layout = UnitLayout::new(source.size);
        Self {
            id,
            source,
            layout,
            units: Vec::new(),
            hashes: None,
            bytes_hashed: 0,
            bytes_uploaded: 0,
            upload_retries: 0,
            upload_type: UploadType::Undetermined,
            all_units_ready: false,
            upload_key: None,
            quickkey: None,
            dupe_quickkey: None,
            duplicate_action: None,
            state: FileState::HashQueued,
            in_flight: None,
            attempt: 0,
            attempt_base: 0,
            cancel: CancellationToken::new(),
        }
    }

    fn next_unit(&self) -> Option<usize> {
        self.units.iter().position(|done| !done)
    }

    fn snapshot(&self) -> FileSnapshot {
        FileSnapshot {
            id: self.id,
            name: self.source.name.clone(),
            size: self.source.size,
            mime_type: self.source.mime_type.clone(),
            state: self.state,
            upload_type: self.upload_type,
            unit_size: self.layout.unit_size(),
            unit_count: self.layout.count(),
            units: self.units.clone(),
            bytes_hashed: self.bytes_hashed,
            bytes_uploaded: self.bytes_uploaded,
            upload_retries: self.upload_retries,
            hash: self.hashes.as_ref().map(|h| h.full.clone()),
            upload_key: self.upload_key.clone(),
            quickkey: self.quickkey.clone(),
            dupe_quickkey: self.dupe_quickkey.clone(),
            duplicate_action: self.duplicate_action,
        }
    }
}

pub(crate) struct Engine {
    config: UploaderConfig,
    transport: Arc<dyn Transport>,
    files: BTreeMap<FileId, FileTask>,
    hashing: HashCoordinator,
    pool: UploadPool,
    duplicates: DuplicateResolver,
    /// Hashed files waiting for `start_upload` when `upload_on_add` is off.
    ready: Vec<FileId>,
    tx: mpsc::UnboundedSender<Msg>,
    events: mpsc::UnboundedSender<UploadEvent>,
}

impl Engine {
    pub(crate) fn new(
        config: UploaderConfig,
        transport: Arc<dyn Transport>,
        tx: mpsc::UnboundedSender<Msg>,
        events: mpsc::UnboundedSender<UploadEvent>,
        accelerated_pending: bool,
    ) -> Self {
        Self {
            hashing: HashCoordinator::new(accelerated_pending),
            pool: UploadPool::new(config.concurrent_uploads),
            duplicates: DuplicateResolver::new(config.action_on_duplicate),
            config,
            transport,
            files: BTreeMap::new(),
            ready: Vec::new(),
            tx,
            events,
        }
    }

    /// Processes messages until shutdown, then cancels outstanding work.
    pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Msg>) {
        while let Some(msg) = rx.recv().await {
            if matches!(msg, Msg::Shutdown) {
                break;
            }
            self.handle(msg);
        }
        for task in self.files.values() {
            task.cancel.cancel();
        }
        debug!(files = self.files.len(), "upload engine stopped");
    }

    fn handle(&mut self, msg: Msg) {
        match msg {
            Msg::Add { id, file } => self.on_add(id, file),
            Msg::StartUpload => self.on_start_upload(),
            Msg::DuplicateAction {
                id,
                action,
                apply_all,
            } => self.on_duplicate_action(id, action, apply_all),
            Msg::Abort { id } => self.on_abort(id),
            Msg::Snapshot { id, reply } => {
                let _ = reply.send(self.files.get(&id).map(FileTask::snapshot));
            }
            Msg::Files { reply } => {
                let _ = reply.send(self.files.values().map(FileTask::snapshot).collect());
            }
            Msg::Shutdown => {}
            Msg::BackendReady(backend) => {
                let next = self.hashing.backend_ready(backend);
                self.start_hashing(next);
            }
            Msg::GraceElapsed => {
                let next = self.hashing.grace_elapsed();
                self.start_hashing(next);
            }
            Msg::HashProgress { id, bytes } => self.on_hash_progress(id, bytes),
            Msg::HashDone {
                id,
                result,
                backend,
            } => self.on_hash_done(id, result, backend),
            Msg::CheckDone { id, result } => self.on_check_done(id, result),
            Msg::InstantDone { id, result } => self.on_instant_done(id, result),
            Msg::UnitProgress {
                id,
                unit,
                attempt,
                sent,
            } => self.on_unit_progress(id, unit, attempt, sent),
            Msg::UnitDone {
                id,
                unit,
                attempt,
                result,
            } => self.on_unit_done(id, unit, attempt, result),
            Msg::PollDone { id, result } => self.on_poll_done(id, result),
        }
    }

    // --- events ---

    fn emit(&self, event: UploadEvent) {
        let _ = self.events.send(event);
    }

    /// Moves `id` to `state` and notifies. Terminal states are final.
    fn set_state(&mut self, id: FileId, state: FileState) -> bool {
        let Some(task) = self.files.get_mut(&id) else {
            return false;
        };
        if task.state.is_terminal() {
            warn!(file = %id, from = %task.state, to = %state, "ignoring transition out of terminal state");
            return false;
        }
        debug!(file = %id, from = %task.state, to = %state, "state change");
        task.state = state;
        let file = task.snapshot();
        self.emit(UploadEvent::StateChanged { file, state });
        true
    }

    fn fail(&mut self, id: FileId, reason: &str) {
        warn!(file = %id, reason, "upload failed");
        self.set_state(id, FileState::Failed);
    }

    fn emit_upload_progress(&self, id: FileId) {
        if let Some(task) = self.files.get(&id) {
            self.emit(UploadEvent::UploadProgress {
                id,
                bytes: task.bytes_uploaded,
            });
        }
    }

    fn emit_confirm(&self, id: FileId) {
        if let Some(task) = self.files.get(&id) {
            self.emit(UploadEvent::DuplicateConfirm {
                file: task.snapshot(),
            });
        }
    }

    fn state_of(&self, id: FileId) -> Option<FileState> {
        self.files.get(&id).map(|t| t.state)
    }

    /// Duplicate directive for requests about `id`: the file's own choice,
    /// else the global policy.
    fn effective_action(&self, task: &FileTask) -> Option<DuplicateAction> {
        task.duplicate_action.or(self.duplicates.policy())
    }

    // --- intake and hashing ---

    fn on_add(&mut self, id: FileId, file: SourceFile) {
        info!(file = %id, name = %file.name, size = file.size, "file added");
        let task = FileTask::new(id, file);
        let state = task.state;
        let snapshot = task.snapshot();
        self.files.insert(id, task);
        self.emit(UploadEvent::StateChanged {
            file: snapshot,
            state,
        });

        let next = self.hashing.submit(id);
        self.start_hashing(next);
    }

    fn start_hashing(&mut self, mut next: Option<HashStart>) {
        while let Some((id, backend)) = next.take() {
            match self.files.get(&id) {
                Some(task) if !task.state.is_terminal() => {
                    debug!(file = %id, backend = backend.name(), "hashing started");
                    tokio::spawn(run_hash_task(
                        id,
                        task.source.data.clone(),
                        task.layout,
                        backend,
                        task.cancel.clone(),
                        self.tx.clone(),
                    ));
                }
                _ => next = self.hashing.finish(id, Some(backend)),
            }
        }
    }

    fn on_hash_progress(&mut self, id: FileId, bytes: u64) {
        match self.state_of(id) {
            Some(FileState::HashQueued) => {
                self.set_state(id, FileState::Hashing);
            }
            Some(FileState::Hashing) => {}
            _ => return,
        }
        if let Some(task) = self.files.get_mut(&id) {
            task.bytes_hashed = bytes;
        }
        self.emit(UploadEvent::HashProgress { id, bytes });
    }

    fn on_hash_done(
        &mut self,
        id: FileId,
        result: Result<Hashes, UploadError>,
        backend: Option<Box<dyn HashBackend>>,
    ) {
        let next = self.hashing.finish(id, backend);

        let live = self
            .state_of(id)
            .is_some_and(|s| matches!(s, FileState::HashQueued | FileState::Hashing));
        if live {
            match result {
                Ok(hashes) => {
                    if let Some(task) = self.files.get_mut(&id) {
                        task.hashes = Some(hashes);
                    }
                    self.set_state(id, FileState::Hashed);
                    if self.config.upload_on_add {
                        self.begin_check(id);
                    } else {
                        self.ready.push(id);
                    }
                }
                Err(e) => self.fail(id, &format!("hashing: {e}")),
            }
        }

        self.start_hashing(next);
    }

    fn on_start_upload(&mut self) {
        for id in std::mem::take(&mut self.ready) {
            if self.state_of(id) == Some(FileState::Hashed) {
                self.begin_check(id);
            }
        }
    }

    // --- pre-upload check ---

    fn begin_check(&mut self, id: FileId) {
        let Some(task) = self.files.get(&id) else {
            return;
        };
        let Some(hashes) = task.hashes.as_ref() else {
            self.fail(id, "no digest");
            return;
        };
        let req = CheckRequest {
            hash: hashes.full.clone(),
            size: task.source.size,
            filename: task.source.name.clone(),
            resumable: true,
            path: self.config.relative_path.clone(),
        };

        let transport = self.transport.clone();
        let cancel = task.cancel.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = cancellable(&cancel, transport.check(req)).await;
            let _ = tx.send(Msg::CheckDone { id, result });
        });
    }

    fn on_check_done(&mut self, id: FileId, result: Result<CheckResponse, UploadError>) {
        if self.state_of(id) != Some(FileState::Hashed) {
            return;
        }
        let resp = match result {
            Ok(resp) => resp,
            Err(e) => return self.fail(id, &format!("check: {e}")),
        };

        if let Err(reason) = self.classify(id, &resp) {
            return self.fail(id, &reason);
        }

        if resp.file_exists {
            if let Some(task) = self.files.get_mut(&id) {
                task.dupe_quickkey = resp.duplicate_quickkey;
            }
            self.set_state(id, FileState::Duplicate);
            match self.duplicates.arrive(id) {
                Arrival::Apply(action) => self.apply_decision(id, action),
                Arrival::Confirm => self.emit_confirm(id),
                Arrival::Queued => debug!(file = %id, "duplicate queued for confirmation"),
            }
            return;
        }

        let upload_type = self.files.get(&id).map(|t| t.upload_type);
        match upload_type {
            Some(UploadType::Instant) => {
                self.set_state(id, FileState::UploadCheck);
                self.send_instant(id);
            }
            Some(UploadType::Resumable) => {
                self.set_state(id, FileState::UploadCheck);
                self.resumable(id);
            }
            _ => self.fail(id, "service offered neither instant nor resumable upload"),
        }
    }

    /// Decides the upload type from the check reply and loads the
    /// resumable bitmap.
    fn classify(&mut self, id: FileId, resp: &CheckResponse) -> Result<(), String> {
        let instant_allowed = !self.config.disable_instant_uploads;
        let Some(task) = self.files.get_mut(&id) else {
            return Ok(());
        };

        if instant_allowed && resp.hash_exists {
            task.upload_type = UploadType::Instant;
            return Ok(());
        }
        let Some(ru) = resp.resumable_upload.as_ref() else {
            return Ok(());
        };

        let count = task.layout.count();
        let reported = ru
            .number_of_units
            .as_u64()
            .ok_or_else(|| format!("invalid number_of_units {}", ru.number_of_units))?;
        if reported as usize != count && task.source.size > 0 {
            return Err(format!(
                "service expects {reported} units, file has {count}"
            ));
        }

        let units = decode_bitmap(&ru.bitmap, count).map_err(|e| e.to_string())?;
        task.upload_type = UploadType::Resumable;
        task.bytes_uploaded = task.layout.bytes_for(&units);
        task.units = units;
        task.all_units_ready = ru.all_units_ready;
        if ru.upload_key.is_some() {
            task.upload_key = ru.upload_key.clone();
        }

        debug!(
            file = %id,
            units = count,
            present = task.units.iter().filter(|u| **u).count(),
            bytes = task.bytes_uploaded,
            "resumable state loaded"
        );
        if task.bytes_uploaded > 0 {
            self.emit_upload_progress(id);
        }
        Ok(())
    }

    // --- duplicates ---

    fn on_duplicate_action(&mut self, id: FileId, action: DuplicateAction, apply_all: bool) {
        if self.state_of(id) != Some(FileState::Duplicate) {
            debug!(file = %id, %action, "duplicate action for file not awaiting one");
            return;
        }
        info!(file = %id, %action, apply_all, "duplicate resolved");

        let resolution = self.duplicates.resolve(id, action, apply_all);
        self.apply_decision(id, action);

        match resolution {
            Resolution::ApplyAll(rest) => {
                for other in rest {
                    if self.state_of(other) == Some(FileState::Duplicate) {
                        self.apply_decision(other, action);
                    }
                }
            }
            Resolution::Confirm(next) => self.emit_confirm(next),
            Resolution::Idle => {}
        }
    }

    fn apply_decision(&mut self, id: FileId, action: DuplicateAction) {
        if action == DuplicateAction::Skip {
            self.set_state(id, FileState::Skipped);
            return;
        }
        if let Some(task) = self.files.get_mut(&id) {
            task.duplicate_action = Some(action);
        }
        match self.files.get(&id).map(|t| t.upload_type) {
            Some(UploadType::Instant) => {
                self.set_state(id, FileState::UploadCheck);
                self.send_instant(id);
            }
            Some(UploadType::Resumable) => self.resumable(id),
            _ => self.fail(id, "duplicate resolved but upload type undetermined"),
        }
    }

    // --- instant ---

    fn send_instant(&mut self, id: FileId) {
        let Some(task) = self.files.get(&id) else {
            return;
        };
        let Some(hashes) = task.hashes.as_ref() else {
            return self.fail(id, "no digest");
        };
        let req = InstantRequest {
            hash: hashes.full.clone(),
            size: task.source.size,
            filename: task.source.name.clone(),
            path: self.config.relative_path.clone(),
            action_on_duplicate: self.effective_action(task),
        };

        let transport = self.transport.clone();
        let cancel = task.cancel.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = cancellable(&cancel, transport.instant(req)).await;
            let _ = tx.send(Msg::InstantDone { id, result });
        });
    }

    fn on_instant_done(&mut self, id: FileId, result: Result<InstantResponse, UploadError>) {
        if self.state_of(id) != Some(FileState::UploadCheck) {
            return;
        }
        match result {
            Ok(InstantResponse {
                quickkey: Some(quickkey),
                ..
            }) => {
                if let Some(task) = self.files.get_mut(&id) {
                    task.bytes_uploaded = task.source.size;
                    task.quickkey = Some(quickkey);
                }
                info!(file = %id, "instant upload complete");
                self.set_state(id, FileState::Complete);
            }
            Ok(_) => self.fail(id, "instant upload returned no quickkey"),
            Err(e) => self.fail(id, &format!("instant: {e}")),
        }
    }

    // --- resumable ---

    /// Starts or queues the file's first missing unit.
    fn resumable(&mut self, id: FileId) {
        let Some(task) = self.files.get(&id) else {
            return;
        };
        let next = if task.all_units_ready {
            None
        } else {
            task.next_unit()
        };
        let Some(unit) = next else {
            return self.all_units_present(id);
        };

        if self.pool.try_acquire() {
            self.set_state(id, FileState::Uploading);
            self.start_unit(id, unit);
        } else {
            self.pool.enqueue(id, unit);
            self.set_state(id, FileState::UploadQueued);
        }
    }

    /// Every unit is already stored: verify if the service gave a key.
    fn all_units_present(&mut self, id: FileId) {
        let has_key = self
            .files
            .get(&id)
            .is_some_and(|t| t.upload_key.is_some());
        if has_key {
            self.set_state(id, FileState::Verifying);
            self.start_poll(id);
        } else {
            self.fail(id, "all units present but no upload key to verify");
        }
    }

    fn unit_request(&self, task: &FileTask, unit: usize) -> Option<UnitUploadRequest> {
        let hashes = task.hashes.as_ref()?;
        Some(UnitUploadRequest {
            filename: task.source.name.clone(),
            file_size: task.source.size,
            file_type: task.source.mime_type.clone(),
            file_hash: hashes.full.clone(),
            unit_id: unit,
            unit_hash: hashes.units.get(unit)?.clone(),
            unit_size: task.layout.len(unit),
            folder_key: self.config.folder_key.clone(),
            path: self.config.relative_path.clone(),
            action_on_duplicate: self.effective_action(task),
        })
    }

    /// Sends `unit` in the slot the file already holds.
    fn start_unit(&mut self, id: FileId, unit: usize) {
        let Some(task) = self.files.get(&id) else {
            self.pool.release();
            return;
        };
        let Some(request) = self.unit_request(task, unit) else {
            self.pool.release();
            self.fail(id, &format!("no digest for unit {unit}"));
            self.fill_slots();
            return;
        };
        let source = task.source.data.clone();
        let range = task.layout.range(unit);
        let cancel = task.cancel.clone();

        let Some(task) = self.files.get_mut(&id) else {
            return;
        };
        task.in_flight = Some(unit);
        task.attempt += 1;
        task.attempt_base = task.bytes_uploaded;
        let job = UnitJob {
            id,
            unit,
            attempt: task.attempt,
            source,
            range,
            request,
        };
        debug!(file = %id, unit, attempt = task.attempt, "unit upload started");
        tokio::spawn(run_unit_task(
            self.transport.clone(),
            job,
            cancel,
            self.tx.clone(),
        ));
    }

    /// Whether a message from `attempt` at `unit` belongs to the transfer
    /// currently in the file's slot.
    fn in_flight(&self, id: FileId, unit: usize, attempt: u64) -> bool {
        self.files.get(&id).is_some_and(|t| {
            t.state == FileState::Uploading && t.in_flight == Some(unit) && t.attempt == attempt
        })
    }

    fn on_unit_progress(&mut self, id: FileId, unit: usize, attempt: u64, sent: u64) {
        if !self.in_flight(id, unit, attempt) {
            return;
        }
        if let Some(task) = self.files.get_mut(&id) {
            task.bytes_uploaded = (task.attempt_base + sent).min(task.source.size);
        }
        self.emit_upload_progress(id);
    }

    fn on_unit_done(
        &mut self,
        id: FileId,
        unit: usize,
        attempt: u64,
        result: Result<UnitUploadResponse, UploadError>,
    ) {
        if !self.in_flight(id, unit, attempt) {
            return;
        }

        let outcome = match result {
            Ok(resp) if resp.doupload.is_ok() => resp
                .doupload
                .key
                .ok_or_else(|| "accepted without an upload key".to_string()),
            Ok(resp) => Err(format!(
                "rejected: result {}",
                resp.doupload
                    .result
                    .map(|r| r.to_string())
                    .unwrap_or_default()
            )),
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(key) => self.unit_succeeded(id, unit, key),
            Err(reason) => self.unit_failed(id, unit, &reason),
        }
    }

    fn unit_succeeded(&mut self, id: FileId, unit: usize, key: String) {
        let Some(task) = self.files.get_mut(&id) else {
            return;
        };
        task.units[unit] = true;
        task.bytes_uploaded = task.attempt_base + task.layout.len(unit);
        task.upload_key = Some(key);
        task.upload_retries = 0;
        let next = task.next_unit();
        debug!(file = %id, unit, "unit uploaded");
        self.emit_upload_progress(id);

        match next {
            Some(next) => self.start_unit(id, next),
            None => {
                if let Some(task) = self.files.get_mut(&id) {
                    task.in_flight = None;
                }
                self.pool.release();
                self.set_state(id, FileState::Verifying);
                self.start_poll(id);
                self.fill_slots();
            }
        }
    }

    fn unit_failed(&mut self, id: FileId, unit: usize, reason: &str) {
        let cap = self.config.retry_attempts;
        let Some(task) = self.files.get_mut(&id) else {
            return;
        };
        task.bytes_uploaded = task.attempt_base;

        if task.upload_retries < cap {
            task.upload_retries += 1;
            warn!(file = %id, unit, attempt = task.upload_retries, reason, "retrying unit");
            self.emit_upload_progress(id);
            self.start_unit(id, unit);
            return;
        }

        task.in_flight = None;
        self.emit_upload_progress(id);
        self.pool.release();
        self.fail(id, &format!("unit {unit} failed after {cap} retries: {reason}"));
        self.fill_slots();
    }

    /// Hands free slots to the wait queue head, skipping stale entries.
    fn fill_slots(&mut self) {
        while let Some((id, unit)) = self.pool.dequeue() {
            if self.state_of(id) != Some(FileState::UploadQueued) {
                self.pool.release();
                continue;
            }
            self.set_state(id, FileState::Uploading);
            self.start_unit(id, unit);
        }
    }

    // --- verification ---

    fn start_poll(&mut self, id: FileId) {
        let Some(task) = self.files.get(&id) else {
            return;
        };
        let Some(key) = task.upload_key.clone() else {
            return self.fail(id, "no upload key to verify");
        };
        let policy = PollPolicy {
            interval: self.config.poll_interval(),
            max_attempts: self.config.max_poll_attempts.filter(|n| *n > 0),
        };
        tokio::spawn(run_poll_task(
            self.transport.clone(),
            id,
            key,
            policy,
            task.cancel.clone(),
            self.tx.clone(),
        ));
    }

    fn on_poll_done(&mut self, id: FileId, result: Result<String, UploadError>) {
        if self.state_of(id) != Some(FileState::Verifying) {
            return;
        }
        match result {
            Ok(quickkey) => {
                if let Some(task) = self.files.get_mut(&id) {
                    task.quickkey = Some(quickkey);
                    task.bytes_uploaded = task.source.size;
                }
                info!(file = %id, "upload complete");
                self.set_state(id, FileState::Complete);
            }
            Err(e) => self.fail(id, &format!("verification: {e}")),
        }
    }

    // --- abort ---

    fn on_abort(&mut self, id: FileId) {
        let Some(task) = self.files.get_mut(&id) else {
            return;
        };
        if task.state.is_terminal() {
            return;
        }
        task.cancel.cancel();
        let held_slot = task.in_flight.take().is_some();
        if held_slot {
            task.bytes_uploaded = task.attempt_base;
        }

        self.hashing.remove(id);
        self.pool.remove(id);
        self.ready.retain(|r| *r != id);
        let resolution = self.duplicates.remove(id);

        info!(file = %id, "upload aborted");
        self.set_state(id, FileState::Aborted);

        if let Resolution::Confirm(next) = resolution {
            self.emit_confirm(next);
        }
        if held_slot {
            self.pool.release();
            self.fill_slots();
        }
    }
}
