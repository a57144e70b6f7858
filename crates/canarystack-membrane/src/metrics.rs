//! Atomic counters for integrity observability.
//!
//! All counters use relaxed ordering: they are diagnostic, not
//! synchronization primitives.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::fault::StackFault;
use crate::layer::{LayerKind, Violation};

/// Process-wide integrity counters.
pub struct IntegrityMetrics {
    /// Full validations performed.
    pub validations: AtomicU64,
    /// Poison fill violations.
    pub poison_failures: AtomicU64,
    /// Buffer or struct guard mismatches.
    pub guard_failures: AtomicU64,
    /// Checksum mismatches.
    pub checksum_failures: AtomicU64,
    /// Bookkeeping violations (size bound, missing buffer).
    pub bookkeeping_failures: AtomicU64,
    /// Successful growth reallocations.
    pub growths: AtomicU64,
    /// Successful shrink reallocations.
    pub shrinks: AtomicU64,
    /// Refused allocations.
    pub allocation_failures: AtomicU64,
    /// Faults latched on any container.
    pub faults_latched: AtomicU64,
}

impl IntegrityMetrics {
    /// Create a new zeroed metrics instance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            validations: AtomicU64::new(0),
            poison_failures: AtomicU64::new(0),
            guard_failures: AtomicU64::new(0),
            checksum_failures: AtomicU64::new(0),
            bookkeeping_failures: AtomicU64::new(0),
            growths: AtomicU64::new(0),
            shrinks: AtomicU64::new(0),
            allocation_failures: AtomicU64::new(0),
            faults_latched: AtomicU64::new(0),
        }
    }

    /// Increment a counter by 1.
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read a counter value.
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Count a violation against the layer that saw it.
    pub fn record_violation(&self, violation: &Violation) {
        let counter = match violation.layer() {
            Some(LayerKind::Poison) => &self.poison_failures,
            Some(LayerKind::Guard) => &self.guard_failures,
            Some(LayerKind::Checksum) => &self.checksum_failures,
            None => &self.bookkeeping_failures,
        };
        Self::inc(counter);
    }

    /// Count a newly latched fault.
    pub fn record_fault(&self, fault: StackFault) {
        if fault.is_allocation_failure() {
            Self::inc(&self.allocation_failures);
        }
        Self::inc(&self.faults_latched);
    }

    /// Snapshot all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            validations: Self::get(&self.validations),
            poison_failures: Self::get(&self.poison_failures),
            guard_failures: Self::get(&self.guard_failures),
            checksum_failures: Self::get(&self.checksum_failures),
            bookkeeping_failures: Self::get(&self.bookkeeping_failures),
            growths: Self::get(&self.growths),
            shrinks: Self::get(&self.shrinks),
            allocation_failures: Self::get(&self.allocation_failures),
            faults_latched: Self::get(&self.faults_latched),
        }
    }
}

impl Default for IntegrityMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of all counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub validations: u64,
    pub poison_failures: u64,
    pub guard_failures: u64,
    pub checksum_failures: u64,
    pub bookkeeping_failures: u64,
    pub growths: u64,
    pub shrinks: u64,
    pub allocation_failures: u64,
    pub faults_latched: u64,
}

static GLOBAL_METRICS: IntegrityMetrics = IntegrityMetrics::new();

/// Access the global metrics singleton.
#[must_use]
pub fn global_metrics() -> &'static IntegrityMetrics {
    &GLOBAL_METRICS
}
