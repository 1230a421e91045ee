//! Per-lifeline bookkeeping.
//!
//! A lifeline is one seeded position in the endpoint list together with the
//! endless chain of tasks that monitors it. The counters here only observe
//! the monitor; they never decide what runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use super::types::{Endpoint, LifelineId, Outcome};

#[derive(Debug, Default)]
struct Counters {
    active: AtomicUsize,
    peak_active: AtomicUsize,
    probes: AtomicU64,
    up: AtomicU64,
    down: AtomicU64,
}

/// Point-in-time copy of one lifeline's counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifelineStats {
    pub lifeline: LifelineId,
    pub endpoint: Endpoint,
    /// Tasks currently responsible for the next event
    pub active: usize,
    /// Highest `active` ever observed, 1 while single-flight holds
    pub peak_active: usize,
    pub probes: u64,
    pub up: u64,
    pub down: u64,
}

/// The fixed set of lifelines, one per configured endpoint
#[derive(Debug)]
pub struct Lifelines {
    endpoints: Vec<Endpoint>,
    counters: Vec<Counters>,
}

impl Lifelines {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        let counters = endpoints.iter().map(|_| Counters::default()).collect();
        Self { endpoints, counters }
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = LifelineId> + use<> {
        (0..self.endpoints.len()).map(LifelineId)
    }

    pub fn endpoint(&self, id: LifelineId) -> Option<&Endpoint> {
        self.endpoints.get(id.0)
    }

    /// Mark a task as responsible for `id` until the returned guard drops.
    ///
    /// Returns `None` for an unknown lifeline.
    pub fn enter(self: &Arc<Self>, id: LifelineId) -> Option<ActiveGuard> {
        let counters = self.counters.get(id.0)?;
        let active = counters.active.fetch_add(1, Ordering::AcqRel) + 1;
        counters.peak_active.fetch_max(active, Ordering::AcqRel);

        if active > 1 {
            tracing::error!(lifeline = %id, active, "more than one task in flight for lifeline");
        }

        Some(ActiveGuard { lifelines: Arc::clone(self), id })
    }

    /// Count a drained outcome.
    pub fn record(&self, id: LifelineId, outcome: &Outcome) {
        let Some(counters) = self.counters.get(id.0) else {
            return;
        };

        counters.probes.fetch_add(1, Ordering::Relaxed);
        if outcome.is_up() {
            counters.up.fetch_add(1, Ordering::Relaxed);
        } else {
            counters.down.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> Vec<LifelineStats> {
        self.ids()
            .zip(self.endpoints.iter().zip(&self.counters))
            .map(|(lifeline, (endpoint, counters))| LifelineStats {
                lifeline,
                endpoint: endpoint.clone(),
                active: counters.active.load(Ordering::Acquire),
                peak_active: counters.peak_active.load(Ordering::Acquire),
                probes: counters.probes.load(Ordering::Relaxed),
                up: counters.up.load(Ordering::Relaxed),
                down: counters.down.load(Ordering::Relaxed),
            })
            .collect()
    }
}

/// Responsibility for a lifeline's next event.
///
/// Travels with the task and then with its event through the result channel,
/// so it is released only once the monitor loop has taken the event.
#[derive(Debug)]
pub struct ActiveGuard {
    lifelines: Arc<Lifelines>,
    id: LifelineId,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if let Some(counters) = self.lifelines.counters.get(self.id.0) {
            counters.active.fetch_sub(1, Ordering::AcqRel);
        }
    }
}
