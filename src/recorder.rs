// src/recorder.rs
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use log::info;
use serde::Serialize;

use crate::analysis::aggregate::BatchResult;
use crate::analysis::ledger::{SessionCounters, SessionLedger};

#[derive(Serialize)]
struct SessionInfo {
    start_time: NaiveDateTime,
    total_batches: u64,
    total_samples: u64,
    session_duration: f64,
}

#[derive(Serialize)]
struct SnapshotDocument<'a> {
    analysis: &'a BatchResult,
    session: SessionInfo,
    timestamp: NaiveDateTime,
}

#[derive(Serialize)]
struct SessionSummary<'a> {
    session_start: NaiveDateTime,
    session_end: NaiveDateTime,
    total_batches: u64,
    total_samples: u64,
    batch_history: Vec<&'a BatchResult>,
}

/// Writes `bytes` next to `path` and renames it into place, so readers never see a partial file.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to move {} into place", path.display()))?;
    Ok(())
}

/// Keeps a JSON file with the latest analysis for an external web layer.
pub struct SnapshotWriter {
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn write(&self, result: &BatchResult, start_time: NaiveDateTime, counters: &SessionCounters) -> Result<()> {
        let doc = SnapshotDocument {
            analysis: result,
            session: SessionInfo {
                start_time,
                total_batches: counters.total_batches,
                total_samples: counters.total_samples,
                session_duration: counters.duration_seconds,
            },
            timestamp: Local::now().naive_local(),
        };
        let bytes = serde_json::to_vec_pretty(&doc).context("failed to encode snapshot")?;
        write_atomically(&self.path, &bytes)
    }
}

/// Dumps the retained session history once, at shutdown.
pub struct SessionExporter {
    dir: PathBuf,
}

impl SessionExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn export(&self, ledger: &SessionLedger, session_end: NaiveDateTime) -> Result<PathBuf> {
        let counters = ledger.counters();
        let summary = SessionSummary {
            session_start: ledger.start_time(),
            session_end,
            total_batches: counters.total_batches,
            total_samples: counters.total_samples,
            batch_history: ledger.retained().map(|r| &**r).collect(),
        };
        let filename = format!("eeg_session_{}.json", session_end.format("%Y%m%d_%H%M%S"));
        let path = self.dir.join(filename);
        let bytes = serde_json::to_vec_pretty(&summary).context("failed to encode session summary")?;
        write_atomically(&path, &bytes)?;
        info!("💾 session saved to {}", path.display());
        Ok(path)
    }
}
