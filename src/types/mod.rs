use std::fmt;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

use zeroize_derive::{Zeroize, ZeroizeOnDrop};

pub mod error;
pub mod token;

/// One object found under the source prefix. Produced by the lister,
/// consumed exactly once by the key mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: Option<i64>,
}

/// A mapped copy unit ready for dispatch to a copy worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRequest {
    pub source_key: String,
    pub dest_key: String,
    pub size: Option<i64>,
}

/// A key that exhausted its copy attempts. The last error is retained as a
/// string so the record stays cheap to clone into the final result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedObject {
    pub key: String,
    pub error: String,
    pub attempts: u32,
}

/// Aggregate outcome of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    pub succeeded: u64,
    pub failed: u64,
    pub failures: Vec<FailedObject>,
}

/// Shared live counters for one run. Workers mutate them atomically on task
/// start and terminal transitions; the progress reporter reads them without
/// locks, so a snapshot is advisory, not a consistent cut.
#[derive(Debug, Default)]
pub struct JobCounters {
    pub in_flight: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
}

impl JobCounters {
    pub fn task_started(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    pub fn task_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn task_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// Releases an in-flight slot without a terminal outcome. Used when a
    /// worker is cancelled mid-attempt.
    pub fn task_cancelled(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// Records a failure for a key that never occupied a pool slot,
    /// e.g. a mapping failure.
    pub fn record_failed_without_slot(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.in_flight.load(Ordering::SeqCst),
            self.succeeded.load(Ordering::SeqCst),
            self.failed.load(Ordering::SeqCst),
        )
    }
}

/// Progress events sent by the pipeline stages and rendered by the CLI
/// indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatistics {
    CopyComplete { key: String },
    CopyBytes(u64),
    CopyWarning { key: String },
    CopyError { key: String },
}

/// A parsed `s3://bucket/prefix` location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePath {
    pub bucket: String,
    pub prefix: String,
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccessKeys {
    pub access_key: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Debug for AccessKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut keys = f.debug_struct("AccessKeys");
        let session_token = self
            .session_token
            .as_ref()
            .map_or("None", |_| "** redacted **");
        keys.field("access_key", &self.access_key)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &session_token);
        keys.finish()
    }
}

#[derive(Debug, Clone)]
pub enum S3Credentials {
    Credentials { access_keys: AccessKeys },
    Profile(String),
    FromEnvironment,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_terminal_transitions() {
        let counters = JobCounters::default();

        counters.task_started();
        assert_eq!(counters.snapshot(), (1, 0, 0));

        counters.task_succeeded();
        assert_eq!(counters.snapshot(), (0, 1, 0));

        counters.task_started();
        counters.task_failed();
        assert_eq!(counters.snapshot(), (0, 1, 1));
    }

    #[test]
    fn counters_failure_without_slot() {
        let counters = JobCounters::default();

        counters.record_failed_without_slot();
        assert_eq!(counters.snapshot(), (0, 0, 1));
    }
}
