use clap::{Parser, Subcommand};
use dynarep_config::load_config;
use dynarep_config::shared::DeployerConfig;

use crate::error::{DeployerError, DeployerResult};

/// Sets up DynamoDB global tables for the tables of a CloudFormation stack.
#[derive(Parser, Debug)]
#[command(name = "dynarep-deployer", version)]
pub struct Cli {
    /// Stack whose tables are replicated. Defaults to `{service}-{stage}`.
    #[arg(long, global = true)]
    pub stack_name: Option<String>,

    /// Source region of the stack.
    #[arg(long, global = true)]
    pub region: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Replicate every stack table to the configured regions.
    Deploy,
    /// Remove the configured regions from the replication of every stack table.
    Remove,
}

/// Loads the configuration, applies the command line overrides and validates the result.
pub fn load_deployer_config(cli: &Cli) -> DeployerResult<DeployerConfig> {
    let mut config = load_config::<DeployerConfig>().map_err(DeployerError::config)?;
    apply_overrides(&mut config, cli);
    config.validate().map_err(DeployerError::config)?;

    Ok(config)
}

fn apply_overrides(config: &mut DeployerConfig, cli: &Cli) {
    if let Some(stack_name) = &cli.stack_name {
        config.stack_name = Some(stack_name.clone());
    }

    if let Some(region) = &cli.region {
        config.provider.region = region.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynarep_config::shared::{
        GlobalTablesConfig, PollingConfig, ProviderConfig, ReplicationVersion,
    };

    fn config() -> DeployerConfig {
        DeployerConfig {
            service: "orders".to_string(),
            stage: "dev".to_string(),
            stack_name: None,
            provider: ProviderConfig {
                region: "us-east-1".to_string(),
                endpoint: None,
                timeout_ms: None,
            },
            global_tables: GlobalTablesConfig {
                version: ReplicationVersion::V2019,
                regions: vec!["us-west-2".to_string()],
                create_stack: false,
                template_path: None,
                tags: Default::default(),
                tables: Vec::new(),
            },
            polling: PollingConfig::default(),
        }
    }

    #[test]
    fn test_overrides_replace_stack_and_region() {
        let cli = Cli::parse_from([
            "dynarep-deployer",
            "deploy",
            "--stack-name",
            "orders-blue",
            "--region",
            "eu-central-1",
        ]);
        let mut config = config();

        apply_overrides(&mut config, &cli);

        assert_eq!(cli.command, Command::Deploy);
        assert_eq!(config.stack_name(), "orders-blue");
        assert_eq!(config.provider.region, "eu-central-1");
    }

    #[test]
    fn test_without_overrides_config_is_kept() {
        let cli = Cli::parse_from(["dynarep-deployer", "remove"]);
        let mut config = config();

        apply_overrides(&mut config, &cli);

        assert_eq!(cli.command, Command::Remove);
        assert_eq!(config.stack_name(), "orders-dev");
        assert_eq!(config.provider.region, "us-east-1");
    }

    #[test]
    fn test_command_is_required() {
        assert!(Cli::try_parse_from(["dynarep-deployer"]).is_err());
    }
}
