use serde::Deserialize;

use crate::Config;
use crate::shared::{GlobalTablesConfig, PollingConfig, ProviderConfig, ValidationError};

fn default_stage() -> String {
    "dev".to_string()
}

/// Complete configuration of the deployer binary.
#[derive(Clone, Debug, Deserialize)]
pub struct DeployerConfig {
    /// Service name, used to derive the stack name.
    pub service: String,
    /// Deployment stage, used to derive the stack name.
    #[serde(default = "default_stage")]
    pub stage: String,
    /// Explicit stack name. Defaults to `{service}-{stage}`.
    #[serde(default)]
    pub stack_name: Option<String>,
    pub provider: ProviderConfig,
    pub global_tables: GlobalTablesConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

impl DeployerConfig {
    /// Name of the CloudFormation stack whose tables are replicated.
    pub fn stack_name(&self) -> String {
        match &self.stack_name {
            Some(name) => name.clone(),
            None => format!("{}-{}", self.service, self.stage),
        }
    }

    /// Configured replica regions without the source region and without duplicates.
    ///
    /// Order follows the configuration.
    pub fn target_regions(&self) -> Vec<String> {
        let mut regions: Vec<String> = Vec::with_capacity(self.global_tables.regions.len());
        for region in &self.global_tables.regions {
            let region = region.trim();
            if region == self.provider.region || regions.iter().any(|r| r == region) {
                continue;
            }

            regions.push(region.to_string());
        }

        regions
    }

    /// Returns `true` when the configured region list names the source region.
    pub fn lists_source_region(&self) -> bool {
        self.global_tables
            .regions
            .iter()
            .any(|region| region.trim() == self.provider.region)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.service.trim().is_empty() {
            return Err(ValidationError::EmptyField("service".to_string()));
        }

        if self.stage.trim().is_empty() {
            return Err(ValidationError::EmptyField("stage".to_string()));
        }

        if let Some(stack_name) = &self.stack_name
            && stack_name.trim().is_empty()
        {
            return Err(ValidationError::EmptyField("stack_name".to_string()));
        }

        self.provider.validate()?;
        self.global_tables.validate()?;
        self.polling.validate()?;

        Ok(())
    }
}

impl Config for DeployerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] =
        &["global_tables.regions", "global_tables.tables"];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> DeployerConfig {
        serde_json::from_str(json).unwrap()
    }

    const MINIMAL: &str = r#"{
        "service": "orders",
        "provider": { "region": "us-east-1" },
        "global_tables": { "regions": ["us-west-2", "us-east-1", "eu-west-1", "us-west-2"] }
    }"#;

    #[test]
    fn test_defaults_are_applied() {
        let config = parse(MINIMAL);

        assert_eq!(config.stage, "dev");
        assert_eq!(config.stack_name(), "orders-dev");
        assert_eq!(config.polling, PollingConfig::default());
        assert!(!config.global_tables.create_stack);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_target_regions_drop_source_and_duplicates() {
        let config = parse(MINIMAL);

        assert_eq!(
            config.target_regions(),
            vec!["us-west-2".to_string(), "eu-west-1".to_string()]
        );
        assert!(config.lists_source_region());
    }

    #[test]
    fn test_explicit_stack_name_wins() {
        let mut config = parse(MINIMAL);
        config.stack_name = Some("orders-api-prod".to_string());

        assert_eq!(config.stack_name(), "orders-api-prod");
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut config = parse(MINIMAL);
        config.polling.interval_ms = 0;

        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidFieldValue { .. })
        ));
    }
}
