//! Minimal operation metrics.
//! Process-local counters for save/load outcomes, suitable for periodic
//! logging or a status readout; no exporter wired up.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

static SAVES_COMPLETED: AtomicU64 = AtomicU64::new(0);
static SAVES_FAILED: AtomicU64 = AtomicU64::new(0);
static LOADS_COMPLETED: AtomicU64 = AtomicU64::new(0);
static LOADS_FAILED: AtomicU64 = AtomicU64::new(0);
static STORAGE_TIMEOUTS: AtomicU64 = AtomicU64::new(0);
static QUEUE_OVERFLOWS: AtomicU64 = AtomicU64::new(0);

static LOAD_REASONS: OnceLock<Mutex<HashMap<String, ReasonCounter>>> = OnceLock::new();

pub fn inc_save_completed() {
    SAVES_COMPLETED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_save_failed() {
    SAVES_FAILED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_storage_timeout() {
    STORAGE_TIMEOUTS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_queue_overflow() {
    QUEUE_OVERFLOWS.fetch_add(1, Ordering::Relaxed);
}

/// Per-load-reason completion/failure tallies.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReasonCounter {
    pub completed: u64,
    pub failed: u64,
}

fn load_reason_lock() -> &'static Mutex<HashMap<String, ReasonCounter>> {
    LOAD_REASONS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Record a finished load, tagged with its trigger reason.
pub fn record_load(reason: &str, completed: bool) {
    if completed {
        LOADS_COMPLETED.fetch_add(1, Ordering::Relaxed);
    } else {
        LOADS_FAILED.fetch_add(1, Ordering::Relaxed);
    }
    let mut guard = load_reason_lock()
        .lock()
        .expect("load reason mutex poisoned");
    let counter = guard.entry(reason.to_string()).or_default();
    if completed {
        counter.completed = counter.completed.saturating_add(1);
    } else {
        counter.failed = counter.failed.saturating_add(1);
    }
}

/// Point-in-time copy of all counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OpsSnapshot {
    pub saves_completed: u64,
    pub saves_failed: u64,
    pub loads_completed: u64,
    pub loads_failed: u64,
    pub storage_timeouts: u64,
    pub queue_overflows: u64,
    pub load_reasons: HashMap<String, ReasonCounter>,
}

pub fn ops_snapshot() -> OpsSnapshot {
    let load_reasons = load_reason_lock()
        .lock()
        .expect("load reason mutex poisoned")
        .clone();
    OpsSnapshot {
        saves_completed: SAVES_COMPLETED.load(Ordering::Relaxed),
        saves_failed: SAVES_FAILED.load(Ordering::Relaxed),
        loads_completed: LOADS_COMPLETED.load(Ordering::Relaxed),
        loads_failed: LOADS_FAILED.load(Ordering::Relaxed),
        storage_timeouts: STORAGE_TIMEOUTS.load(Ordering::Relaxed),
        queue_overflows: QUEUE_OVERFLOWS.load(Ordering::Relaxed),
        load_reasons,
    }
}
