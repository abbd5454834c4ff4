//! The `upload` command: drives one engine run to completion.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use anyhow::{Context, bail};
use tracing::warn;
use uplink_engine::{FileId, FileSnapshot, FileState, UploadEvent, Uploader, UploaderConfig};

use crate::prompt;

/// Per-file terminal output.
pub struct Report {
    files: HashMap<FileId, Entry>,
    verbose: bool,
}

struct Entry {
    name: String,
    size: u64,
    /// Last printed progress, in tenths.
    shown: u64,
    state: FileState,
}

impl Report {
    pub fn new(verbose: bool) -> Self {
        Self {
            files: HashMap::new(),
            verbose,
        }
    }

    /// Records a state change and returns the line to print, if any.
    pub fn state(&mut self, file: &FileSnapshot, state: FileState) -> Option<String> {
        let entry = self.files.entry(file.id).or_insert_with(|| Entry {
            name: file.name.clone(),
            size: file.size,
            shown: 0,
            state,
        });
        entry.state = state;

        match state {
            FileState::Complete => Some(format!(
                "{}: complete ({})",
                entry.name,
                file.quickkey.as_deref().unwrap_or("no quickkey")
            )),
            FileState::Failed | FileState::Skipped | FileState::Aborted => {
                Some(format!("{}: {state}", entry.name))
            }
            _ if self.verbose => Some(format!("{}: {state}", entry.name)),
            _ => None,
        }
    }

    /// Records upload progress; prints every 10% (every update when verbose).
    pub fn progress(&mut self, id: FileId, bytes: u64) -> Option<String> {
        let entry = self.files.get_mut(&id)?;
        if entry.size == 0 {
            return None;
        }
        let tenths = bytes.saturating_mul(10) / entry.size;
        if !self.verbose && tenths <= entry.shown {
            return None;
        }
        entry.shown = tenths;
        Some(format!(
            "{}: {}% ({bytes}/{} bytes)",
            entry.name,
            bytes.saturating_mul(100) / entry.size,
            entry.size
        ))
    }

    pub fn failed(&self) -> usize {
        self.files
            .values()
            .filter(|e| e.state == FileState::Failed)
            .count()
    }
}

/// Uploads `paths` and waits until every file settles.
pub async fn run(mut config: UploaderConfig, paths: &[PathBuf], verbose: bool) -> anyhow::Result<()> {
    // The CLI has no separate start step.
    config.upload_on_add = true;

    let mut uploader = Uploader::connect(config).context("starting upload engine")?;
    let mut events = uploader
        .take_events()
        .context("event stream already taken")?;

    let mut pending = HashSet::new();
    for path in paths {
        let added = uploader
            .add_path(path)
            .await
            .with_context(|| format!("adding {}", path.display()))?;
        match added {
            Some(id) => {
                pending.insert(id);
            }
            None => warn!(path = %path.display(), "skipped by extension filter"),
        }
    }
    if pending.is_empty() {
        bail!("nothing to upload");
    }

    let mut report = Report::new(verbose);
    while !pending.is_empty() {
        let Some(event) = events.recv().await else {
            bail!("upload engine stopped unexpectedly");
        };
        match event {
            UploadEvent::StateChanged { file, state } => {
                if let Some(line) = report.state(&file, state) {
                    println!("{line}");
                }
                if state.is_terminal() {
                    pending.remove(&file.id);
                }
            }
            UploadEvent::UploadProgress { id, bytes } => {
                if let Some(line) = report.progress(id, bytes) {
                    println!("{line}");
                }
            }
            UploadEvent::HashProgress { .. } => {}
            UploadEvent::DuplicateConfirm { file } => {
                let (action, apply_all) = prompt::ask(&file).await?;
                uploader.duplicate_action(file.id, action, apply_all)?;
            }
        }
    }

    match report.failed() {
        0 => Ok(()),
        n => bail!("{n} file(s) failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uplink_engine::UploadType;

    fn snapshot(id: u64, size: u64) -> FileSnapshot {
        FileSnapshot {
            id: FileId(id),
            name: format!("f{id}.bin"),
            size,
            mime_type: "application/octet-stream".into(),
            state: FileState::HashQueued,
            upload_type: UploadType::Undetermined,
            unit_size: 4 * 1024 * 1024,
            unit_count: 1,
            units: Vec::new(),
            bytes_hashed: 0,
            bytes_uploaded: 0,
            upload_retries: 0,
            hash: None,
            upload_key: None,
            quickkey: None,
            dupe_quickkey: None,
            duplicate_action: None,
        }
    }

    #[test]
    fn quiet_report_prints_terminal_states_only() {
        let mut report = Report::new(false);
        let file = snapshot(1, 100);
        assert_eq!(report.state(&file, FileState::HashQueued), None);
        assert_eq!(report.state(&file, FileState::Uploading), None);

        let done = FileSnapshot {
            quickkey: Some("qk".into()),
            ..file
        };
        assert_eq!(
            report.state(&done, FileState::Complete).as_deref(),
            Some("f1.bin: complete (qk)")
        );
    }

    #[test]
    fn progress_printed_in_steps() {
        let mut report = Report::new(false);
        report.state(&snapshot(1, 100), FileState::Uploading);

        assert!(report.progress(FileId(1), 5).is_none());
        assert_eq!(
            report.progress(FileId(1), 12).as_deref(),
            Some("f1.bin: 12% (12/100 bytes)")
        );
        assert!(report.progress(FileId(1), 15).is_none());
        assert!(report.progress(FileId(1), 100).is_some());
        assert!(report.progress(FileId(2), 10).is_none());
    }

    #[test]
    fn counts_failures() {
        let mut report = Report::new(false);
        report.state(&snapshot(1, 10), FileState::Failed);
        report.state(&snapshot(2, 10), FileState::Complete);
        report.state(&snapshot(3, 10), FileState::Skipped);
        assert_eq!(report.failed(), 1);
    }
}
