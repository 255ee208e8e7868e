//! Distributed claim coordination for discovered uploads (spec §5
//! backpressure, §4.7 worker coordination). Generalizes the
//! heartbeat-staleness tracking used for grid-agent liveness
//! (`Healthy`/`Degraded`/`Offline` transitions on elapsed time since
//! the last heartbeat) to upload leases: a claim past its lease is
//! treated the same way an overdue heartbeat is, and becomes eligible
//! for another worker to steal.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct ClaimEntry {
    worker_id: String,
    claimed_at: Instant,
    lease_expires_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    Stolen { from_worker: String },
    AlreadyClaimed { by_worker: String },
}

/// One row per in-flight upload, keyed by `upload_id`. A row is
/// removed on `release` (ack or dead-letter); it is never silently
/// dropped merely because its lease expired — only `try_claim`
/// stealing it, or an explicit `release`, removes a row.
pub struct ClaimTable {
    entries: RwLock<HashMap<String, ClaimEntry>>,
    default_lease: Duration,
}

impl ClaimTable {
    pub fn new(default_lease: Duration) -> Self {
        Self { entries: RwLock::new(HashMap::new()), default_lease }
    }

    /// Claims `upload_id` for `worker_id`. An unclaimed upload is
    /// claimed outright; an upload whose lease expired is stolen from
    /// its previous holder; otherwise the claim is refused.
    pub fn try_claim(&self, upload_id: &str, worker_id: &str, now: Instant) -> ClaimOutcome {
        let mut guard = self.entries.write();
        match guard.get(upload_id) {
            None => {
                guard.insert(upload_id.to_string(), self.new_entry(worker_id, now));
                ClaimOutcome::Claimed
            }
            Some(entry) if now >= entry.lease_expires_at => {
                let from_worker = entry.worker_id.clone();
                tracing::warn!(upload_id, from_worker = %from_worker, to_worker = worker_id, "stealing expired claim");
                guard.insert(upload_id.to_string(), self.new_entry(worker_id, now));
                ClaimOutcome::Stolen { from_worker }
            }
            Some(entry) => ClaimOutcome::AlreadyClaimed { by_worker: entry.worker_id.clone() },
        }
    }

    fn new_entry(&self, worker_id: &str, now: Instant) -> ClaimEntry {
        ClaimEntry { worker_id: worker_id.to_string(), claimed_at: now, lease_expires_at: now + self.default_lease }
    }

    /// Extends the lease in place; fails (returns `false`) if the
    /// claim was lost to another worker since.
    pub fn renew(&self, upload_id: &str, worker_id: &str, now: Instant) -> bool {
        let mut guard = self.entries.write();
        match guard.get_mut(upload_id) {
            Some(entry) if entry.worker_id == worker_id => {
                entry.lease_expires_at = now + self.default_lease;
                true
            }
            _ => false,
        }
    }

    /// Frees the slot on acknowledgement or dead-lettering (spec §4.7
    /// step 3).
    pub fn release(&self, upload_id: &str) {
        self.entries.write().remove(upload_id);
    }

    /// Reports currently-expired rows without removing them — they
    /// remain stealable via `try_claim` until a worker actually does
    /// so. Mirrors the periodic logging pass over stale agents.
    pub fn sweep_expired(&self, now: Instant) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .filter(|(_, entry)| now >= entry.lease_expires_at)
            .map(|(upload_id, _)| upload_id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
