use anyhow::{Context, Result, anyhow};
use async_channel::{Receiver, Sender};

use crate::Config;
use crate::storage::Storage;
use crate::types::SyncStatistics;
use crate::types::token::PipelineCancellationToken;

/// One link in the pipeline. `I` is what the stage consumes, `O` what it
/// produces. Listers have no receiver, the terminator has no sender.
pub struct Stage<I, O> {
    pub config: Config,
    pub source: Option<Storage>,
    pub target: Option<Storage>,
    pub receiver: Option<Receiver<I>>,
    pub sender: Option<Sender<O>>,
    pub cancellation_token: PipelineCancellationToken,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    Success,
    Closed,
}

impl<I, O: Send + Sync + 'static> Stage<I, O> {
    pub fn new(
        config: Config,
        source: Option<Storage>,
        target: Option<Storage>,
        receiver: Option<Receiver<I>>,
        sender: Option<Sender<O>>,
        cancellation_token: PipelineCancellationToken,
    ) -> Self {
        Self {
            config,
            source,
            target,
            receiver,
            sender,
            cancellation_token,
        }
    }

    pub async fn send(&self, item: O) -> Result<SendResult> {
        let result = self
            .sender
            .as_ref()
            .unwrap()
            .send(item)
            .await
            .context("async_channel::Sender::send() failed.");

        if let Err(e) = result {
            return if !self.is_channel_closed() {
                Err(anyhow!(e))
            } else {
                Ok(SendResult::Closed)
            };
        }

        Ok(SendResult::Success)
    }

    pub fn is_channel_closed(&self) -> bool {
        self.sender.as_ref().unwrap().is_closed()
    }

    pub async fn send_stats(&self, stats: SyncStatistics) {
        let _ = self
            .target
            .as_ref()
            .unwrap()
            .get_stats_sender()
            .send(stats)
            .await;
    }
}
