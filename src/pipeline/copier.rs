use std::sync::{Arc, Mutex};

use anyhow::{Error, Result, anyhow};
use tracing::{error, info, trace, warn};

use crate::types::SyncStatistics::{CopyBytes, CopyComplete, CopyError, CopyWarning};
use crate::types::{CopyRequest, FailedObject, JobCounters};

use super::stage::Stage;

pub struct ObjectCopier {
    base: Stage<CopyRequest, CopyRequest>,
    worker_index: u16,
    counters: Arc<JobCounters>,
    failures: Arc<Mutex<Vec<FailedObject>>>,
}

impl ObjectCopier {
    pub fn new(
        base: Stage<CopyRequest, CopyRequest>,
        worker_index: u16,
        counters: Arc<JobCounters>,
        failures: Arc<Mutex<Vec<FailedObject>>>,
    ) -> Self {
        Self {
            base,
            worker_index,
            counters,
            failures,
        }
    }

    pub async fn copy(&self) -> Result<()> {
        trace!(worker_index = self.worker_index, "copy worker has started.");

        loop {
            tokio::select! {
                recv_result = self.base.receiver.as_ref().unwrap().recv() => {
                    match recv_result {
                        Ok(request) => {
                            self.copy_object_with_retry(request).await?;
                        },
                        Err(_) => {
                            // normal shutdown
                            trace!(worker_index = self.worker_index, "copy worker has been completed.");
                            break;
                        }
                    }
                },
                _ = self.base.cancellation_token.cancelled() => {
                    info!(worker_index = self.worker_index, "copy worker has been cancelled.");
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    /// A key that exhausts its attempts is recorded as failed and never
    /// aborts the worker.
    async fn copy_object_with_retry(&self, request: CopyRequest) -> Result<()> {
        let copy_attempts = self.base.config.copy_retry_config.copy_attempts;
        let source_bucket = self.base.source.as_ref().unwrap().bucket().to_string();
        let key = &request.source_key;

        self.counters.task_started();

        let mut last_error: Option<Error> = None;
        for attempt in 1..=copy_attempts {
            // No new attempt starts after cancellation. An attempt that is
            // already in flight runs to completion and keeps its outcome.
            if self.base.cancellation_token.is_cancelled() {
                info!(
                    worker_index = self.worker_index,
                    key = key,
                    "cancellation_token has been cancelled."
                );

                self.counters.task_cancelled();
                return Ok(());
            }

            let result = self
                .base
                .target
                .as_ref()
                .unwrap()
                .copy_object(&source_bucket, &request.source_key, &request.dest_key)
                .await;

            // A completed copy is a terminal outcome even when the token has
            // been cancelled in the meantime.
            match result {
                Ok(()) => {
                    self.counters.task_succeeded();

                    self.base
                        .send_stats(CopyComplete {
                            key: key.to_string(),
                        })
                        .await;
                    if let Some(size) = request.size {
                        self.base.send_stats(CopyBytes(size as u64)).await;
                    }

                    info!(
                        worker_index = self.worker_index,
                        key = key,
                        dest_key = &request.dest_key,
                        "object has been copied."
                    );

                    self.forward(request).await;
                    return Ok(());
                }
                Err(e) => {
                    if self.base.cancellation_token.is_cancelled() {
                        info!(
                            worker_index = self.worker_index,
                            key = key,
                            "cancellation_token has been cancelled."
                        );

                        self.counters.task_cancelled();
                        return Ok(());
                    }

                    if attempt < copy_attempts {
                        self.base
                            .send_stats(CopyWarning {
                                key: key.to_string(),
                            })
                            .await;

                        warn!(
                            worker_index = self.worker_index,
                            key = key,
                            attempt = attempt,
                            error = e.to_string(),
                            source = e.source(),
                            "copy attempt failed. retrying."
                        );

                        tokio::time::sleep(std::time::Duration::from_millis(
                            self.base
                                .config
                                .copy_retry_config
                                .retry_interval_milliseconds,
                        ))
                        .await;
                    }

                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error.unwrap_or_else(|| anyhow!("unknown error"));

        error!(
            worker_index = self.worker_index,
            key = key,
            attempts = copy_attempts,
            error = last_error.to_string(),
            source = last_error.source(),
            "copy attempts exhausted."
        );

        self.counters.task_failed();
        self.failures.lock().unwrap().push(FailedObject {
            key: key.to_string(),
            error: last_error.to_string(),
            attempts: copy_attempts,
        });

        self.base
            .send_stats(CopyError {
                key: key.to_string(),
            })
            .await;

        self.forward(request).await;
        Ok(())
    }

    async fn forward(&self, request: CopyRequest) {
        let _ = self.base.send(request).await;
    }
}
