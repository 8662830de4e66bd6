use aws_config::meta::region::{ProvideRegion, RegionProviderChain};
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, ConfigLoader};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Builder;
use aws_types::SdkConfig;
use aws_types::region::Region;

use crate::config::ClientConfig;

impl ClientConfig {
    pub async fn create_client(&self) -> Client {
        let config_builder =
            Builder::from(&self.load_sdk_config().await).force_path_style(self.force_path_style);

        Client::from_conf(config_builder.build())
    }

    async fn load_sdk_config(&self) -> SdkConfig {
        let config_loader = aws_config::defaults(BehaviorVersion::latest());
        let mut config_loader = self
            .load_config_credential(config_loader)
            .region(self.build_region_provider())
            .retry_config(self.build_retry_config());

        if let Some(endpoint_url) = &self.endpoint_url {
            config_loader = config_loader.endpoint_url(endpoint_url);
        };

        config_loader.load().await
    }

    fn load_config_credential(&self, mut config_loader: ConfigLoader) -> ConfigLoader {
        match &self.credential {
            crate::types::S3Credentials::Credentials { access_keys } => {
                let credentials = aws_sdk_s3::config::Credentials::new(
                    access_keys.access_key.to_string(),
                    access_keys.secret_access_key.to_string(),
                    access_keys.session_token.clone(),
                    None,
                    "",
                );
                config_loader = config_loader.credentials_provider(credentials);
            }
            crate::types::S3Credentials::Profile(profile_name) => {
                let provider = aws_config::profile::ProfileFileCredentialsProvider::builder()
                    .profile_name(profile_name)
                    .build();
                config_loader = config_loader.credentials_provider(provider);
            }
            crate::types::S3Credentials::FromEnvironment => {}
        }
        config_loader
    }

    fn build_region_provider(&self) -> Box<dyn ProvideRegion> {
        let provider_region = if let crate::types::S3Credentials::Profile(profile_name) =
            &self.credential
        {
            let profile_region_provider =
                aws_config::profile::ProfileFileRegionProvider::builder()
                    .profile_name(profile_name)
                    .build();
            RegionProviderChain::first_try(self.region.clone().map(Region::new))
                .or_else(profile_region_provider)
        } else {
            RegionProviderChain::first_try(self.region.clone().map(Region::new))
                .or_default_provider()
        };

        Box::new(provider_region)
    }

    fn build_retry_config(&self) -> RetryConfig {
        RetryConfig::standard()
            .with_max_attempts(self.retry_config.aws_max_attempts)
            .with_initial_backoff(std::time::Duration::from_millis(
                self.retry_config.initial_backoff_milliseconds,
            ))
    }
}
