//! Counting admission gate bounding concurrent fetch+extract work.
//!
//! A thin wrapper over `tokio::sync::Semaphore` that also tracks the live
//! occupancy and its high-water mark, so the concurrency bound is
//! observable and assertable under load. Created once at service start and
//! lives for the process lifetime.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Default)]
struct GateCounters {
    active: AtomicUsize,
    high_water: AtomicUsize,
}

/// Capacity-bounded concurrency limiter for the fetch+extract phase.
#[derive(Debug)]
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
    counters: Arc<GateCounters>,
    capacity: usize,
}

impl AdmissionGate {
    /// Creates a gate admitting at most `capacity` holders at once.
    ///
    /// A capacity of 0 would deadlock every request, so it is clamped to 1.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            counters: Arc::new(GateCounters::default()),
            capacity,
        }
    }

    /// Acquires one slot, suspending the caller (not the service) until one
    /// is free. The slot is released when the returned guard drops, on
    /// every exit path.
    pub async fn admit(&self) -> AdmissionSlot {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .expect("admission gate semaphore is never closed");

        let now_active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.high_water.fetch_max(now_active, Ordering::SeqCst);

        AdmissionSlot {
            _permit: permit,
            counters: Arc::clone(&self.counters),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of currently admitted holders.
    #[must_use]
    pub fn active(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }

    /// Highest concurrent occupancy observed since startup.
    #[must_use]
    pub fn high_water(&self) -> usize {
        self.counters.high_water.load(Ordering::SeqCst)
    }
}

/// RAII guard for one admission slot.
#[derive(Debug)]
pub struct AdmissionSlot {
    _permit: OwnedSemaphorePermit,
    counters: Arc<GateCounters>,
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        self.counters.active.fetch_sub(1, Ordering::SeqCst);
    }
}
