//! Self-observability counters for the agent.
//!
//! Plain atomics: every background task and every instrumented call site
//! bumps these without taking a lock.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time copy of [`AgentStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatsSnapshot {
    pub points_recorded: u64,
    pub flushes: u64,
    pub points_exported: u64,
    pub export_failures: u64,
    pub polls_succeeded: u64,
    pub polls_failed: u64,
    pub registrations_sent: u64,
    pub registrations_failed: u64,
    pub snapshots_submitted: u64,
    pub snapshots_failed: u64,
    pub values_redacted: u64,
}

/// Counters shared by every agent component.
#[derive(Debug, Default)]
pub struct AgentStats {
    points_recorded: AtomicU64,
    flushes: AtomicU64,
    points_exported: AtomicU64,
    export_failures: AtomicU64,
    polls_succeeded: AtomicU64,
    polls_failed: AtomicU64,
    registrations_sent: AtomicU64,
    registrations_failed: AtomicU64,
    snapshots_submitted: AtomicU64,
    snapshots_failed: AtomicU64,
    values_redacted: AtomicU64,
}

impl AgentStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_point(&self) {
        self.points_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_export(&self, points: usize, ok: bool) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        if ok {
            self.points_exported.fetch_add(points as u64, Ordering::Relaxed);
        } else {
            self.export_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_poll(&self, ok: bool) {
        let counter = if ok { &self.polls_succeeded } else { &self.polls_failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_registration(&self, ok: bool) {
        self.registrations_sent.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.registrations_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_submission(&self, ok: bool) {
        let counter = if ok { &self.snapshots_submitted } else { &self.snapshots_failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_redactions(&self, count: usize) {
        self.values_redacted.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AgentStatsSnapshot {
        AgentStatsSnapshot {
            points_recorded: self.points_recorded.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            points_exported: self.points_exported.load(Ordering::Relaxed),
            export_failures: self.export_failures.load(Ordering::Relaxed),
            polls_succeeded: self.polls_succeeded.load(Ordering::Relaxed),
            polls_failed: self.polls_failed.load(Ordering::Relaxed),
            registrations_sent: self.registrations_sent.load(Ordering::Relaxed),
            registrations_failed: self.registrations_failed.load(Ordering::Relaxed),
            snapshots_submitted: self.snapshots_submitted.load(Ordering::Relaxed),
            snapshots_failed: self.snapshots_failed.load(Ordering::Relaxed),
            values_redacted: self.values_redacted.load(Ordering::Relaxed),
        }
    }
}
