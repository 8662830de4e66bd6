use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_channel::Sender;
use async_trait::async_trait;
use aws_sdk_s3::Client;

use crate::storage::{Storage, StorageTrait};
use crate::types::token::PipelineCancellationToken;
use crate::types::{ObjectEntry, SyncStatistics};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureMode {
    FailFirstAttempts(u32),
    AlwaysFail,
}

#[derive(Default)]
struct MockState {
    copies: Vec<(String, String)>,
    attempts: HashMap<String, u32>,
    failures: HashMap<String, FailureMode>,
}

#[derive(Default)]
struct ConcurrencyGauge {
    current: AtomicU64,
    max: AtomicU64,
}

impl ConcurrencyGauge {
    fn enter(&self) {
        let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(current, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct MockStorage {
    bucket: String,
    prefix: String,
    objects: Vec<ObjectEntry>,
    list_error: bool,
    copy_latency: Option<Duration>,
    cancel_after_copy: Option<PipelineCancellationToken>,
    state: Arc<Mutex<MockState>>,
    gauge: Arc<ConcurrencyGauge>,
    stats_sender: Sender<SyncStatistics>,
}

impl MockStorage {
    pub fn new(
        bucket: &str,
        prefix: &str,
        objects: Vec<ObjectEntry>,
        stats_sender: Sender<SyncStatistics>,
    ) -> Self {
        MockStorage {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            objects,
            list_error: false,
            copy_latency: None,
            cancel_after_copy: None,
            state: Arc::new(Mutex::new(MockState::default())),
            gauge: Arc::new(ConcurrencyGauge::default()),
            stats_sender,
        }
    }

    pub fn with_list_error(mut self) -> Self {
        self.list_error = true;
        self
    }

    pub fn with_copy_latency(mut self, latency: Duration) -> Self {
        self.copy_latency = Some(latency);
        self
    }

    /// Cancels `token` just before each copy returns, so a worker always
    /// observes a cancelled token right after the copy call.
    pub fn with_cancel_after_copy(mut self, token: PipelineCancellationToken) -> Self {
        self.cancel_after_copy = Some(token);
        self
    }

    pub fn fail_copy(&self, source_key: &str, mode: FailureMode) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(source_key.to_string(), mode);
    }

    pub fn copied_pairs(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().copies.clone()
    }

    pub fn attempt_count(&self, source_key: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .attempts
            .get(source_key)
            .copied()
            .unwrap_or_default()
    }

    pub fn max_concurrent_copies(&self) -> u64 {
        self.gauge.max.load(Ordering::SeqCst)
    }

    pub fn boxed(self) -> Storage {
        Box::new(self)
    }
}

#[async_trait]
impl StorageTrait for MockStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn list_objects(&self, sender: &Sender<ObjectEntry>, _max_keys: i32) -> Result<()> {
        if self.list_error {
            return Err(anyhow!("list_objects() failed."));
        }

        for object in &self.objects {
            if sender.send(object.clone()).await.is_err() {
                return Ok(());
            }
        }

        Ok(())
    }

    async fn copy_object(&self, _source_bucket: &str, source_key: &str, key: &str) -> Result<()> {
        self.gauge.enter();

        if let Some(latency) = self.copy_latency {
            tokio::time::sleep(latency).await;
        }

        let result = {
            let mut state = self.state.lock().unwrap();
            let attempt = state.attempts.entry(source_key.to_string()).or_default();
            *attempt += 1;
            let attempt = *attempt;

            let failed = match state.failures.get(source_key) {
                Some(FailureMode::AlwaysFail) => true,
                Some(FailureMode::FailFirstAttempts(count)) => attempt <= *count,
                None => false,
            };

            if failed {
                Err(anyhow!("copy_object() failed."))
            } else {
                state
                    .copies
                    .push((source_key.to_string(), key.to_string()));
                Ok(())
            }
        };

        self.gauge.leave();

        if let Some(token) = &self.cancel_after_copy {
            token.cancel();
        }

        result
    }

    fn get_client(&self) -> Option<Arc<Client>> {
        None
    }

    fn get_stats_sender(&self) -> Sender<SyncStatistics> {
        self.stats_sender.clone()
    }

    async fn send_stats(&self, stats: SyncStatistics) {
        let _ = self.stats_sender.send(stats).await;
    }
}
