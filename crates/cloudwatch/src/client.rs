//! Builds the AWS SDK client with the retry/timeout/credential policy this
//! agent relies on: adaptive retries capped at 3 attempts, a 5s connect
//! timeout, a 30s read timeout, and a credential chain that prefers
//! explicit static keys, then a named profile, then the default IAM chain.

use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cloudwatchlogs::config::retry::RetryConfig;
use aws_sdk_cloudwatchlogs::config::timeout::TimeoutConfig;
use aws_sdk_cloudwatchlogs::config::Credentials;
use aws_sdk_cloudwatchlogs::Client;
use cwa_domain::config::RuntimeConfig;
use std::time::Duration;

pub async fn build_client(cfg: &RuntimeConfig) -> Client {
    let region_provider = RegionProviderChain::first_try(cfg.aws_region.clone().map(Region::new))
        .or_default_provider()
        .or_else(Region::new("us-east-1"));

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(region_provider)
        .retry_config(RetryConfig::adaptive().with_max_attempts(3))
        .timeout_config(
            TimeoutConfig::builder()
                .connect_timeout(Duration::from_secs(5))
                .read_timeout(Duration::from_secs(30))
                .build(),
        );

    if let (Some(access_key), Some(secret_key)) =
        (&cfg.aws_access_key_id, &cfg.aws_secret_access_key)
    {
        loader = loader.credentials_provider(Credentials::new(
            access_key,
            secret_key,
            None,
            None,
            "cwa-explicit",
        ));
    } else if let Some(profile) = &cfg.aws_profile {
        loader = loader.profile_name(profile);
    }

    let sdk_config = loader.load().await;
    Client::new(&sdk_config)
}
