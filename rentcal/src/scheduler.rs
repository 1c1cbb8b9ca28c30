//! Request-driven batch scheduling.
//!
//! There is no dedicated timer process: qualifying HTTP requests
//! opportunistically evaluate whether a batch is due. That trades timing
//! precision for operational simplicity, and makes the gate the single
//! authority on run state. Acquisition is an atomic check-and-set, so
//! racing evaluations admit at most one batch, and the last-run stamp is
//! written on release regardless of outcome so persistently failing
//! batches cannot retry-storm.

use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use fs2::FileExt;
use tracing::error;

use rentcal_core::{BatchSummary, SyncResult};

use crate::batch;
use crate::state::AppState;

/// Narrow interface over shared run state. Callers never see the raw
/// timestamp or flag; they either get the slot or they don't.
pub trait SyncGate: Send + Sync {
    /// Atomically begin a run if the interval has elapsed since the last
    /// one and no run is in flight.
    fn try_acquire(&self, interval: Duration) -> bool;

    /// Mark the run finished, stamping the last-run time regardless of
    /// whether the batch succeeded.
    fn release(&self);
}

/// In-process gate for single-process deployments and tests.
#[derive(Default)]
pub struct MemoryGate {
    state: Mutex<GateState>,
}

#[derive(Default)]
struct GateState {
    running: bool,
    last_run: Option<Instant>,
}

impl MemoryGate {
    pub fn new() -> Self {
        MemoryGate::default()
    }
}

impl SyncGate for MemoryGate {
    fn try_acquire(&self, interval: Duration) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.running {
            return false;
        }
        if let Some(last) = state.last_run {
            if last.elapsed() < interval {
                return false;
            }
        }
        state.running = true;
        true
    }

    fn release(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.running = false;
        state.last_run = Some(Instant::now());
    }
}

const LOCK_FILE: &str = "sync.lock";
const STAMP_FILE: &str = "last_sync";

/// Cross-process gate: an exclusive file lock marks a run in flight, and
/// the last-run timestamp is persisted beside it. Two server processes
/// (or a server and a CLI sync) sharing a data directory coordinate
/// through this.
pub struct FileGate {
    dir: PathBuf,
    // Lock file handle, held while a run is in flight in this process.
    lock: Mutex<Option<File>>,
}

impl FileGate {
    pub fn new(dir: impl Into<PathBuf>) -> SyncResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(FileGate {
            dir,
            lock: Mutex::new(None),
        })
    }

    fn last_run(&self) -> Option<SystemTime> {
        let contents = fs::read_to_string(self.dir.join(STAMP_FILE)).ok()?;
        let secs: u64 = contents.trim().parse().ok()?;
        Some(UNIX_EPOCH + Duration::from_secs(secs))
    }
}

impl SyncGate for FileGate {
    fn try_acquire(&self, interval: Duration) -> bool {
        let mut slot = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return false;
        }

        if let Some(last) = self.last_run() {
            // Clock skew reads as elapsed; better one early sync than none.
            let elapsed = last.elapsed().unwrap_or(interval);
            if elapsed < interval {
                return false;
            }
        }

        let file = match File::create(self.dir.join(LOCK_FILE)) {
            Ok(file) => file,
            Err(_) => return false,
        };
        if file.try_lock_exclusive().is_err() {
            // Another process holds the run.
            return false;
        }

        *slot = Some(file);
        true
    }

    fn release(&self) {
        let mut slot = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let stamp = self.dir.join(STAMP_FILE);
        let temp = self.dir.join(format!("{STAMP_FILE}.tmp"));
        let _ = fs::write(&temp, now.to_string()).and_then(|_| fs::rename(&temp, &stamp));

        if let Some(file) = slot.take() {
            let _ = FileExt::unlock(&file);
        }
    }
}

/// Evaluate the gate and, if a batch is due, run it on a background task.
///
/// Fire-and-forget: the caller (a request handler) is never blocked and
/// its response is never altered.
pub fn maybe_trigger(state: &AppState) {
    if !state.gate.try_acquire(state.config.sync_interval()) {
        return;
    }

    let state = state.clone();
    tokio::spawn(async move {
        let result = batch::sync_all(
            state.fetcher.as_ref(),
            state.store.as_ref(),
            &state.config,
            false,
        )
        .await;
        if let Err(e) = result {
            error!(error = %e, "sync batch failed");
        }
        state.gate.release();
    });
}

/// Run a batch inline, through the same gate as the background trigger.
///
/// Returns `Ok(None)` when another batch is already in flight. The
/// interval is bypassed (this is an explicit request), the overlap guard
/// is not.
pub async fn run_now(state: &AppState, force: bool) -> SyncResult<Option<BatchSummary>> {
    if !state.gate.try_acquire(Duration::ZERO) {
        return Ok(None);
    }

    let result = batch::sync_all(
        state.fetcher.as_ref(),
        state.store.as_ref(),
        &state.config,
        force,
    )
    .await;
    state.gate.release();
    result.map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_memory_gate_admits_exactly_one_concurrent_caller() {
        let gate = Arc::new(MemoryGate::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                std::thread::spawn(move || gate.try_acquire(Duration::from_secs(60)))
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&acquired| acquired)
            .count();
        assert_eq!(admitted, 1, "concurrent evaluations must admit one batch");
    }

    #[test]
    fn test_memory_gate_blocks_within_interval_after_release() {
        let gate = MemoryGate::new();

        assert!(gate.try_acquire(Duration::from_secs(60)));
        gate.release();

        assert!(
            !gate.try_acquire(Duration::from_secs(60)),
            "interval has not elapsed since the last run"
        );
        assert!(
            gate.try_acquire(Duration::ZERO),
            "a zero interval only guards against overlap"
        );
    }

    #[test]
    fn test_memory_gate_release_stamps_even_after_failure() {
        // release() is called on the failure path too; the stamp must be
        // written regardless so failing batches cannot retry-storm.
        let gate = MemoryGate::new();
        assert!(gate.try_acquire(Duration::from_secs(60)));
        gate.release();
        assert!(!gate.try_acquire(Duration::from_secs(60)));
    }

    #[test]
    fn test_file_gate_blocks_second_acquire_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let gate = FileGate::new(dir.path()).unwrap();

        assert!(gate.try_acquire(Duration::ZERO));
        assert!(!gate.try_acquire(Duration::ZERO), "run already in flight");

        gate.release();
        assert!(gate.try_acquire(Duration::ZERO));
    }

    #[test]
    fn test_file_gate_persists_last_run_stamp() {
        let dir = tempfile::tempdir().unwrap();

        {
            let gate = FileGate::new(dir.path()).unwrap();
            assert!(gate.try_acquire(Duration::ZERO));
            gate.release();
        }

        // A fresh gate over the same directory sees the stamp.
        let gate = FileGate::new(dir.path()).unwrap();
        assert!(!gate.try_acquire(Duration::from_secs(3600)));
        assert!(gate.try_acquire(Duration::ZERO));
    }

    #[test]
    fn test_file_gate_honors_stale_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let gate = FileGate::new(dir.path()).unwrap();

        // A stamp from an hour ago.
        let old = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            - 3600;
        fs::write(dir.path().join(STAMP_FILE), old.to_string()).unwrap();

        assert!(gate.try_acquire(Duration::from_secs(60)));
    }
}
