use crate::types::{S3Credentials, StoragePath};

pub mod args;

#[derive(Debug, Clone)]
pub struct Config {
    pub source: StoragePath,
    pub target: StoragePath,
    pub source_client_config: ClientConfig,
    pub target_client_config: ClientConfig,
    pub copy_retry_config: CopyRetryConfig,
    pub tracing_config: Option<TracingConfig>,
    pub worker_size: u16,
    pub max_keys: i32,
    pub report_interval_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub credential: S3Credentials,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub retry_config: RetryConfig,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub aws_max_attempts: u32,
    pub initial_backoff_milliseconds: u64,
}

/// Pipeline-level retry, on top of the SDK's own request retries.
/// `copy_attempts` is the total number of tries for one key.
#[derive(Debug, Clone, Copy)]
pub struct CopyRetryConfig {
    pub copy_attempts: u32,
    pub retry_interval_milliseconds: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub aws_sdk_tracing: bool,
    pub disable_color_tracing: bool,
}
