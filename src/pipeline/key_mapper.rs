use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing::{debug, error};

use crate::types::SyncStatistics::CopyError;
use crate::types::error::S3MirrorError;
use crate::types::{CopyRequest, FailedObject, JobCounters, ObjectEntry};

use super::stage::{SendResult, Stage};

pub struct KeyMapper {
    base: Stage<ObjectEntry, CopyRequest>,
    counters: Arc<JobCounters>,
    failures: Arc<Mutex<Vec<FailedObject>>>,
}

impl KeyMapper {
    pub fn new(
        base: Stage<ObjectEntry, CopyRequest>,
        counters: Arc<JobCounters>,
        failures: Arc<Mutex<Vec<FailedObject>>>,
    ) -> Self {
        Self {
            base,
            counters,
            failures,
        }
    }

    pub async fn map(&self) -> Result<()> {
        let source_prefix = self.base.source.as_ref().unwrap().prefix().to_string();
        let target_prefix = self.base.target.as_ref().unwrap().prefix().to_string();

        loop {
            tokio::select! {
                result = self.base.receiver.as_ref().unwrap().recv() => {
                    match result {
                        Ok(entry) => {
                            match map_key(&source_prefix, &target_prefix, &entry.key) {
                                Ok(dest_key) => {
                                    let request = CopyRequest {
                                        source_key: entry.key,
                                        dest_key,
                                        size: entry.size,
                                    };
                                    if self.base.send(request).await? == SendResult::Closed {
                                        return Ok(());
                                    }
                                }
                                Err(e) => {
                                    self.record_mapping_failure(&entry.key, &e).await;
                                }
                            }
                        },
                        Err(_) => {
                            debug!("key mapper has been completed.");
                            return Ok(());
                        }
                    }
                },
                _ = self.base.cancellation_token.cancelled() => {
                    debug!("key mapper has been cancelled.");
                    return Ok(());
                }
            }
        }
    }

    async fn record_mapping_failure(&self, key: &str, e: &S3MirrorError) {
        error!(key = key, error = e.to_string(), "key mapping failed.");

        self.counters.record_failed_without_slot();
        self.failures.lock().unwrap().push(FailedObject {
            key: key.to_string(),
            error: e.to_string(),
            attempts: 0,
        });

        self.base
            .send_stats(CopyError {
                key: key.to_string(),
            })
            .await;
    }
}

/// Rebases `key` from the source prefix onto the target prefix. The part of
/// the key after the source prefix is preserved verbatim.
pub fn map_key(
    source_prefix: &str,
    target_prefix: &str,
    key: &str,
) -> Result<String, S3MirrorError> {
    let Some(relative_key) = key.strip_prefix(source_prefix) else {
        return Err(S3MirrorError::KeyOutsidePrefix {
            key: key.to_string(),
            prefix: source_prefix.to_string(),
        });
    };

    if target_prefix.is_empty() {
        return Ok(relative_key.to_string());
    }

    if target_prefix.ends_with('/') {
        Ok(format!("{target_prefix}{relative_key}"))
    } else {
        Ok(format!("{target_prefix}/{relative_key}"))
    }
}
