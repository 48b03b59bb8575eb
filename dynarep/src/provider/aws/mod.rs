//! [`AwsProvider`]: DynamoDB, CloudFormation and Application Auto Scaling through the AWS SDK.
//!
//! One [`SdkConfig`] is loaded at startup. Every call builds a client for the requested region
//! from it, inheriting credentials, retry settings and the HTTP client, then applies the
//! configured endpoint and timeout overrides.

mod cloudformation;
mod dynamodb;
mod error;
mod scaling;

use std::fmt;
use std::time::Duration;

use aws_config::{BehaviorVersion, SdkConfig};
use aws_smithy_types::timeout::TimeoutConfig;
use dynarep_config::shared::ProviderConfig;

/// AWS backed implementation of [`crate::provider::TableProvider`] and
/// [`crate::provider::StackProvider`].
#[derive(Clone)]
pub struct AwsProvider {
    sdk_config: SdkConfig,
    endpoint: Option<String>,
    timeout: Option<Duration>,
}

impl fmt::Debug for AwsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsProvider")
            .field("region", &self.sdk_config.region())
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AwsProvider {
    /// Loads the default credential chain with `config.region` as the default region.
    pub async fn new(config: &ProviderConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        Self::from_sdk_config(sdk_config, config)
    }

    /// Creates a provider from an already loaded SDK configuration.
    pub fn from_sdk_config(sdk_config: SdkConfig, config: &ProviderConfig) -> Self {
        Self {
            sdk_config,
            endpoint: config.endpoint.clone(),
            timeout: config.timeout_ms.map(Duration::from_millis),
        }
    }

    fn timeout_config(&self) -> Option<TimeoutConfig> {
        self.timeout.map(|timeout| {
            TimeoutConfig::builder()
                .operation_timeout(timeout)
                .build()
        })
    }

    fn dynamodb(&self, region: &str) -> aws_sdk_dynamodb::Client {
        let mut builder = aws_sdk_dynamodb::config::Builder::from(&self.sdk_config)
            .region(aws_sdk_dynamodb::config::Region::new(region.to_string()));

        if let Some(endpoint) = &self.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        if let Some(timeout_config) = self.timeout_config() {
            builder = builder.timeout_config(timeout_config);
        }

        aws_sdk_dynamodb::Client::from_conf(builder.build())
    }

    fn cloudformation(&self, region: &str) -> aws_sdk_cloudformation::Client {
        let mut builder = aws_sdk_cloudformation::config::Builder::from(&self.sdk_config)
            .region(aws_sdk_cloudformation::config::Region::new(region.to_string()));

        if let Some(endpoint) = &self.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        if let Some(timeout_config) = self.timeout_config() {
            builder = builder.timeout_config(timeout_config);
        }

        aws_sdk_cloudformation::Client::from_conf(builder.build())
    }

    fn autoscaling(&self, region: &str) -> aws_sdk_applicationautoscaling::Client {
        let mut builder = aws_sdk_applicationautoscaling::config::Builder::from(&self.sdk_config)
            .region(aws_sdk_applicationautoscaling::config::Region::new(
                region.to_string(),
            ));

        if let Some(endpoint) = &self.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        if let Some(timeout_config) = self.timeout_config() {
            builder = builder.timeout_config(timeout_config);
        }

        aws_sdk_applicationautoscaling::Client::from_conf(builder.build())
    }
}

/// Reads an SDK getter generated either as `T` or as `Option<T>`.
///
/// Whether a member is optional depends on the service model, and some members differ between
/// services for the same concept.
fn present<T, V>(value: V) -> Option<T>
where
    V: Into<Option<T>>,
{
    value.into()
}
