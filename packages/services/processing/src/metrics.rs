use std::sync::Mutex;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};

// Very lightweight histogram buckets (ms) for stage latency
static STAGE_LATENCY_BUCKETS: &[u64] = &[5, 25, 100, 250, 500, 1000, 1500, 2500, 5000, 10000, 30000];

#[derive(Default, Debug, Clone)]
pub struct Histogram { pub buckets: Vec<u64>, pub counts: Vec<u64>, pub sum: u128, pub total: u64 }

impl Histogram {
    pub fn new(buckets: &[u64]) -> Self { Self { buckets: buckets.to_vec(), counts: vec![0; buckets.len()+1], sum: 0, total: 0 } }
    pub fn record(&mut self, v_ms: u64) {
        self.total += 1;
        self.sum += v_ms as u128;
        let slot = self.buckets.iter().position(|b| v_ms <= *b).unwrap_or(self.buckets.len());
        self.counts[slot] += 1;
    }
}

pub static STAGE_LATENCY: Lazy<Mutex<Histogram>> = Lazy::new(|| Mutex::new(Histogram::new(STAGE_LATENCY_BUCKETS)));

// Batch counters
pub static BATCHES_ACCEPTED: Lazy<AtomicU64> = Lazy::new(|| AtomicU64::new(0));
pub static BATCHES_REJECTED: Lazy<AtomicU64> = Lazy::new(|| AtomicU64::new(0));
pub static BATCHES_COMPLETED: Lazy<AtomicU64> = Lazy::new(|| AtomicU64::new(0));
pub static BATCHES_FAILED: Lazy<AtomicU64> = Lazy::new(|| AtomicU64::new(0));
pub static FILES_STORED: Lazy<AtomicU64> = Lazy::new(|| AtomicU64::new(0));
pub static FILES_DELETED: Lazy<AtomicU64> = Lazy::new(|| AtomicU64::new(0));
pub static STAGE_FAILURES: Lazy<AtomicU64> = Lazy::new(|| AtomicU64::new(0));

pub fn record_stage_latency(ms: u64) { if let Ok(mut h) = STAGE_LATENCY.lock() { h.record(ms); } }
pub fn record_stage_failure() { STAGE_FAILURES.fetch_add(1, Ordering::Relaxed); }
pub fn record_batch_accepted(files: usize) {
    BATCHES_ACCEPTED.fetch_add(1, Ordering::Relaxed);
    FILES_STORED.fetch_add(files as u64, Ordering::Relaxed);
}
pub fn record_batch_rejected() { BATCHES_REJECTED.fetch_add(1, Ordering::Relaxed); }
pub fn record_batch_completed() { BATCHES_COMPLETED.fetch_add(1, Ordering::Relaxed); }
pub fn record_batch_failed() { BATCHES_FAILED.fetch_add(1, Ordering::Relaxed); }
pub fn record_files_deleted(n: usize) { FILES_DELETED.fetch_add(n as u64, Ordering::Relaxed); }

pub fn export_metrics_json() -> serde_json::Value {
    let h = STAGE_LATENCY.lock().ok();
    serde_json::json!({
        "stage_latency_ms": h.map(|hh| serde_json::json!({
            "buckets": hh.buckets,
            "counts": hh.counts,
            "sum_ms": hh.sum,
            "total": hh.total,
        })).unwrap_or(serde_json::json!(null)),
        "batches": {
            "accepted": BATCHES_ACCEPTED.load(Ordering::Relaxed),
            "rejected": BATCHES_REJECTED.load(Ordering::Relaxed),
            "completed": BATCHES_COMPLETED.load(Ordering::Relaxed),
            "failed": BATCHES_FAILED.load(Ordering::Relaxed)
        },
        "files": {
            "stored": FILES_STORED.load(Ordering::Relaxed),
            "deleted": FILES_DELETED.load(Ordering::Relaxed)
        },
        "stage_failures": STAGE_FAILURES.load(Ordering::Relaxed)
    })
}
