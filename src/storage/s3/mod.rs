use std::sync::Arc;

use anyhow::{Context, Result};
use async_channel::Sender;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::{debug, trace};

use crate::config::ClientConfig;
use crate::storage::{Storage, StorageFactory, StorageTrait};
use crate::types::token::PipelineCancellationToken;
use crate::types::{ObjectEntry, StoragePath, SyncStatistics};

mod client_builder;

// CopySource is sent as a header value. Everything except unreserved
// characters and the key delimiter must be percent-encoded.
const COPY_SOURCE_ESCAPE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub struct S3StorageFactory {}

#[async_trait]
impl StorageFactory for S3StorageFactory {
    async fn create(
        path: StoragePath,
        client_config: ClientConfig,
        cancellation_token: PipelineCancellationToken,
        stats_sender: Sender<SyncStatistics>,
    ) -> Storage {
        let client = Arc::new(client_config.create_client().await);

        S3Storage::boxed_new(path, client, cancellation_token, stats_sender)
    }
}

#[derive(Clone)]
struct S3Storage {
    bucket: String,
    prefix: String,
    client: Arc<Client>,
    cancellation_token: PipelineCancellationToken,
    stats_sender: Sender<SyncStatistics>,
}

impl S3Storage {
    fn boxed_new(
        path: StoragePath,
        client: Arc<Client>,
        cancellation_token: PipelineCancellationToken,
        stats_sender: Sender<SyncStatistics>,
    ) -> Storage {
        let storage = S3Storage {
            bucket: path.bucket,
            prefix: path.prefix,
            client,
            cancellation_token,
            stats_sender,
        };

        Box::new(storage)
    }
}

#[async_trait]
impl StorageTrait for S3Storage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn list_objects(&self, sender: &Sender<ObjectEntry>, max_keys: i32) -> Result<()> {
        let mut continuation_token = None;
        loop {
            let list_object_v2 = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&self.prefix)
                .set_continuation_token(continuation_token)
                .max_keys(max_keys);

            if self.cancellation_token.is_cancelled() {
                trace!("list_objects() canceled.");
                break;
            }

            let list_objects_output = list_object_v2
                .send()
                .await
                .context("aws_sdk_s3::client::list_objects_v2() failed.")?;

            for object in list_objects_output.contents() {
                let Some(key) = object.key() else {
                    continue;
                };

                if key == self.prefix {
                    debug!(key = key, "key that is same as prefix is skipped.");

                    continue;
                }

                let entry = ObjectEntry {
                    key: key.to_string(),
                    size: object.size(),
                };

                if let Err(e) = sender
                    .send(entry)
                    .await
                    .context("async_channel::Sender::send() failed.")
                {
                    return if !sender.is_closed() { Err(e) } else { Ok(()) };
                }
            }

            if !list_objects_output.is_truncated().unwrap_or_default() {
                break;
            }

            continuation_token = list_objects_output
                .next_continuation_token()
                .map(|token| token.to_string());
        }

        Ok(())
    }

    async fn copy_object(&self, source_bucket: &str, source_key: &str, key: &str) -> Result<()> {
        self.client
            .copy_object()
            .copy_source(build_copy_source(source_bucket, source_key))
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("aws_sdk_s3::client::copy_object() failed.")?;

        Ok(())
    }

    fn get_client(&self) -> Option<Arc<Client>> {
        Some(self.client.clone())
    }

    fn get_stats_sender(&self) -> Sender<SyncStatistics> {
        self.stats_sender.clone()
    }

    async fn send_stats(&self, stats: SyncStatistics) {
        let _ = self.stats_sender.send(stats).await;
    }
}

fn build_copy_source(bucket: &str, key: &str) -> String {
    format!(
        "{}/{}",
        bucket,
        utf8_percent_encode(key, COPY_SOURCE_ESCAPE_SET)
    )
}
