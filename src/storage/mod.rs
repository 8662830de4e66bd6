use std::sync::Arc;

use anyhow::Result;
use async_channel::Sender;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use dyn_clone::DynClone;

use crate::config::ClientConfig;
use crate::types::token::PipelineCancellationToken;
use crate::types::{ObjectEntry, StoragePath, SyncStatistics};

pub mod s3;

#[cfg(test)]
pub mod mock;

pub type Storage = Box<dyn StorageTrait + Send + Sync>;

pub struct StoragePair {
    pub source: Storage,
    pub target: Storage,
}

#[async_trait]
pub trait StorageFactory {
    async fn create(
        path: StoragePath,
        client_config: ClientConfig,
        cancellation_token: PipelineCancellationToken,
        stats_sender: Sender<SyncStatistics>,
    ) -> Storage;
}

#[async_trait]
pub trait StorageTrait: DynClone {
    fn bucket(&self) -> &str;
    fn prefix(&self) -> &str;
    async fn list_objects(&self, sender: &Sender<ObjectEntry>, max_keys: i32) -> Result<()>;
    async fn copy_object(&self, source_bucket: &str, source_key: &str, key: &str) -> Result<()>;
    fn get_client(&self) -> Option<Arc<Client>>;
    fn get_stats_sender(&self) -> Sender<SyncStatistics>;
    async fn send_stats(&self, stats: SyncStatistics);
}
