use std::ffi::OsString;

use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use clap_verbosity_flag::{Verbosity, WarnLevel};

use crate::Config;
use crate::config::args::value_parser::{storage_path, url};
use crate::config::{ClientConfig, CopyRetryConfig, RetryConfig, TracingConfig};
use crate::types::{AccessKeys, S3Credentials};

mod value_parser;

const DEFAULT_WORKER_SIZE: u16 = 16;
const DEFAULT_COPY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_INTERVAL_MILLISECONDS: u64 = 100;
const DEFAULT_AWS_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_INITIAL_BACKOFF_MILLISECONDS: u64 = 100;
const DEFAULT_MAX_KEYS: i32 = 1000;
const DEFAULT_REPORT_INTERVAL_SECONDS: u64 = 15;
const DEFAULT_FORCE_PATH_STYLE: bool = false;
const DEFAULT_JSON_TRACING: bool = false;
const DEFAULT_AWS_SDK_TRACING: bool = false;
const DEFAULT_DISABLE_COLOR_TRACING: bool = false;

const ZERO_WORKER_SIZE: &str = "--worker-size must be 1 or more\n";
const ZERO_COPY_ATTEMPTS: &str = "--copy-attempts must be 1 or more\n";
const ZERO_REPORT_INTERVAL: &str = "--report-interval-seconds must be 1 or more\n";

#[derive(Parser, Clone, Debug)]
#[command(version, about)]
pub struct CLIArgs {
    #[arg(env, help = "s3://<BUCKET_NAME>[/prefix/]", value_parser = storage_path::check_storage_path)]
    source: String,

    #[arg(env, help = "s3://<BUCKET_NAME>[/prefix/]", value_parser = storage_path::check_storage_path)]
    target: String,

    /// number of concurrent copy workers
    #[arg(long, env, default_value_t = DEFAULT_WORKER_SIZE, help_heading = "General")]
    worker_size: u16,

    /// total attempts per object before it is recorded as failed
    #[arg(long, env, default_value_t = DEFAULT_COPY_ATTEMPTS, help_heading = "General")]
    copy_attempts: u32,

    /// pause between copy attempts for the same object
    #[arg(long, env, default_value_t = DEFAULT_RETRY_INTERVAL_MILLISECONDS, help_heading = "General")]
    retry_interval_milliseconds: u64,

    /// page size for source object listing
    #[arg(long, env, default_value_t = DEFAULT_MAX_KEYS, help_heading = "General")]
    max_keys: i32,

    /// seconds between progress report records
    #[arg(long, env, default_value_t = DEFAULT_REPORT_INTERVAL_SECONDS, help_heading = "General")]
    report_interval_seconds: u64,

    /// source AWS CLI profile
    #[arg(long, env, conflicts_with_all = ["source_access_key", "source_secret_access_key", "source_session_token"], help_heading = "AWS Configuration")]
    source_profile: Option<String>,

    /// source access key
    #[arg(long, env, conflicts_with_all = ["source_profile"], requires = "source_secret_access_key", help_heading = "AWS Configuration")]
    source_access_key: Option<String>,

    /// source secret access key
    #[arg(long, env, conflicts_with_all = ["source_profile"], requires = "source_access_key", help_heading = "AWS Configuration")]
    source_secret_access_key: Option<String>,

    /// source session token
    #[arg(long, env, conflicts_with_all = ["source_profile"], requires = "source_access_key", help_heading = "AWS Configuration")]
    source_session_token: Option<String>,

    /// source region
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), help_heading = "Source Options")]
    source_region: Option<String>,

    /// source endpoint url
    #[arg(long, env, value_parser = url::check_scheme, help_heading = "Source Options")]
    source_endpoint_url: Option<String>,

    /// force path-style addressing for source endpoint
    #[arg(long, env, default_value_t = DEFAULT_FORCE_PATH_STYLE, help_heading = "Source Options")]
    source_force_path_style: bool,

    /// target AWS CLI profile
    #[arg(long, env, conflicts_with_all = ["target_access_key", "target_secret_access_key", "target_session_token"], help_heading = "AWS Configuration")]
    target_profile: Option<String>,

    /// target access key
    #[arg(long, env, conflicts_with_all = ["target_profile"], requires = "target_secret_access_key", help_heading = "AWS Configuration")]
    target_access_key: Option<String>,

    /// target secret access key
    #[arg(long, env, conflicts_with_all = ["target_profile"], requires = "target_access_key", help_heading = "AWS Configuration")]
    target_secret_access_key: Option<String>,

    /// target session token
    #[arg(long, env, conflicts_with_all = ["target_profile"], requires = "target_access_key", help_heading = "AWS Configuration")]
    target_session_token: Option<String>,

    /// target region
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), help_heading = "Target Options")]
    target_region: Option<String>,

    /// target endpoint url
    #[arg(long, env, value_parser = url::check_scheme, help_heading = "Target Options")]
    target_endpoint_url: Option<String>,

    /// force path-style addressing for target endpoint
    #[arg(long, env, default_value_t = DEFAULT_FORCE_PATH_STYLE, help_heading = "Target Options")]
    target_force_path_style: bool,

    /// maximum request attempts inside the AWS SDK
    #[arg(long, env, default_value_t = DEFAULT_AWS_MAX_ATTEMPTS, help_heading = "AWS Configuration")]
    aws_max_attempts: u32,

    /// initial backoff for the AWS SDK's own retries
    #[arg(long, env, default_value_t = DEFAULT_INITIAL_BACKOFF_MILLISECONDS, help_heading = "AWS Configuration")]
    initial_backoff_milliseconds: u64,

    /// output trace records as JSON
    #[arg(long, env, default_value_t = DEFAULT_JSON_TRACING, help_heading = "Tracing")]
    json_tracing: bool,

    /// pass AWS SDK events through to the subscriber
    #[arg(long, env, default_value_t = DEFAULT_AWS_SDK_TRACING, help_heading = "Tracing")]
    aws_sdk_tracing: bool,

    /// disable ANSI color in trace output
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_COLOR_TRACING, help_heading = "Tracing")]
    disable_color_tracing: bool,

    /// trace verbosity(-v: show info, -vv: show debug, -vvv show trace)
    #[command(flatten)]
    verbosity: Verbosity<WarnLevel>,
}

pub fn parse_from_args<I, T>(args: I) -> Result<CLIArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CLIArgs::try_parse_from(args)
}

pub fn build_config_from_args<I, T>(args: I) -> Result<Config, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let config_args = CLIArgs::try_parse_from(args).map_err(|e| e.to_string())?;
    Config::try_from(config_args)
}

impl CLIArgs {
    fn validate(&self) -> Result<(), String> {
        if self.worker_size == 0 {
            return Err(ZERO_WORKER_SIZE.to_string());
        }

        if self.copy_attempts == 0 {
            return Err(ZERO_COPY_ATTEMPTS.to_string());
        }

        if self.report_interval_seconds == 0 {
            return Err(ZERO_REPORT_INTERVAL.to_string());
        }

        Ok(())
    }

    fn build_client_configs(&self) -> (ClientConfig, ClientConfig) {
        let retry_config = RetryConfig {
            aws_max_attempts: self.aws_max_attempts,
            initial_backoff_milliseconds: self.initial_backoff_milliseconds,
        };

        let source_client_config = ClientConfig {
            credential: build_credentials(
                self.source_profile.clone(),
                self.source_access_key.clone(),
                self.source_secret_access_key.clone(),
                self.source_session_token.clone(),
            ),
            region: self.source_region.clone(),
            endpoint_url: self.source_endpoint_url.clone(),
            force_path_style: self.source_force_path_style,
            retry_config: retry_config.clone(),
        };

        let target_client_config = ClientConfig {
            credential: build_credentials(
                self.target_profile.clone(),
                self.target_access_key.clone(),
                self.target_secret_access_key.clone(),
                self.target_session_token.clone(),
            ),
            region: self.target_region.clone(),
            endpoint_url: self.target_endpoint_url.clone(),
            force_path_style: self.target_force_path_style,
            retry_config,
        };

        (source_client_config, target_client_config)
    }
}

fn build_credentials(
    profile: Option<String>,
    access_key: Option<String>,
    secret_access_key: Option<String>,
    session_token: Option<String>,
) -> S3Credentials {
    if let Some(profile_name) = profile {
        return S3Credentials::Profile(profile_name);
    }

    if let Some(access_key) = access_key {
        return S3Credentials::Credentials {
            access_keys: AccessKeys {
                access_key,
                secret_access_key: secret_access_key.unwrap(),
                session_token,
            },
        };
    }

    S3Credentials::FromEnvironment
}

impl TryFrom<CLIArgs> for Config {
    type Error = String;

    fn try_from(value: CLIArgs) -> Result<Self, Self::Error> {
        value.validate()?;

        let tracing_config = value.verbosity.log_level().map(|log_level| TracingConfig {
            tracing_level: log_level,
            json_tracing: value.json_tracing,
            aws_sdk_tracing: value.aws_sdk_tracing,
            disable_color_tracing: value.disable_color_tracing,
        });

        let (source_client_config, target_client_config) = value.build_client_configs();

        Ok(Config {
            source: storage_path::parse_storage_path(&value.source),
            target: storage_path::parse_storage_path(&value.target),

            source_client_config,
            target_client_config,

            copy_retry_config: CopyRetryConfig {
                copy_attempts: value.copy_attempts,
                retry_interval_milliseconds: value.retry_interval_milliseconds,
            },

            tracing_config,

            worker_size: value.worker_size,
            max_keys: value.max_keys,
            report_interval_seconds: value.report_interval_seconds,
        })
    }
}
