use async_channel::Sender;

use crate::Config;
use crate::storage::s3::S3StorageFactory;
use crate::storage::{StorageFactory, StoragePair};
use crate::types::SyncStatistics;
use crate::types::token::PipelineCancellationToken;

pub async fn create_storage_pair(
    config: Config,
    cancellation_token: PipelineCancellationToken,
    stats_sender: Sender<SyncStatistics>,
) -> StoragePair {
    let source = S3StorageFactory::create(
        config.source.clone(),
        config.source_client_config.clone(),
        cancellation_token.clone(),
        stats_sender.clone(),
    )
    .await;

    let target = S3StorageFactory::create(
        config.target.clone(),
        config.target_client_config.clone(),
        cancellation_token,
        stats_sender,
    )
    .await;

    StoragePair { source, target }
}
