use std::fmt::Write;

use dynarep::deployer::GlobalTableDeployer;
use dynarep::provider::aws::AwsProvider;
use dynarep::types::DeploySummary;
use dynarep_config::shared::DeployerConfig;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, info, warn};

use crate::config::Command;
use crate::error::DeployerResult;

/// Runs `command` against AWS and logs the resulting summary.
///
/// SIGINT and SIGTERM cancel every wait in progress. The run then fails with a cancellation
/// error instead of leaving stacks or tables half observed.
pub async fn run_deployer(config: DeployerConfig, command: Command) -> DeployerResult<()> {
    log_config(&config);

    let provider = AwsProvider::new(&config.provider).await;
    let deployer = GlobalTableDeployer::new(config, provider);

    let shutdown_tx = deployer.shutdown_tx();
    let mut sigterm = signal(SignalKind::terminate())?;
    let shutdown_handle = tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("sigint (ctrl+c) received, cancelling deployment");
            }
            _ = sigterm.recv() => {
                info!("sigterm received, cancelling deployment");
            }
        }

        if let Err(err) = shutdown_tx.shutdown() {
            warn!(error = ?err, "failed to send shutdown signal");
        }
    });

    let result = match command {
        Command::Deploy => deployer.deploy().await,
        Command::Remove => deployer.remove().await,
    };

    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    let summary = result?;
    info!(
        command = ?command,
        stack_regions = ?summary.stack_regions,
        tables = summary.tables.len(),
        "deployer completed\n{}",
        render_summary(&summary)
    );

    Ok(())
}

/// One line per table, followed by the regions whose stack was deployed or deleted.
pub fn render_summary(summary: &DeploySummary) -> String {
    let mut out = String::new();

    for table in &summary.tables {
        let _ = write!(out, "{}: {}", table.table_name, table.action);
        if !table.regions.is_empty() {
            let _ = write!(out, " ({})", table.regions.join(", "));
        }
        out.push('\n');
    }

    if !summary.stack_regions.is_empty() {
        let _ = writeln!(out, "stacks: {}", summary.stack_regions.join(", "));
    }

    if out.is_empty() {
        out.push_str("no tables to replicate\n");
    }

    out
}

fn log_config(config: &DeployerConfig) {
    let global_tables = &config.global_tables;

    debug!(
        stack_name = %config.stack_name(),
        source_region = %config.provider.region,
        endpoint = ?config.provider.endpoint,
        timeout_ms = ?config.provider.timeout_ms,
        "using provider config"
    );
    debug!(
        version = %global_tables.version,
        regions = ?global_tables.regions,
        create_stack = global_tables.create_stack,
        template_path = ?global_tables.template_path,
        tables = ?global_tables.tables,
        "using global tables config"
    );
    debug!(
        interval_ms = config.polling.interval_ms,
        max_attempts = ?config.polling.max_attempts,
        "using polling config"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynarep::types::{TableAction, TableReport};

    #[test]
    fn test_render_deploy_summary() {
        let summary = DeploySummary {
            stack_regions: vec!["us-west-2".to_string(), "eu-west-1".to_string()],
            tables: vec![
                TableReport {
                    table_name: "orders-dev".to_string(),
                    action: TableAction::Created,
                    regions: vec!["us-west-2".to_string(), "eu-west-1".to_string()],
                },
                TableReport {
                    table_name: "audit-dev".to_string(),
                    action: TableAction::Unchanged,
                    regions: Vec::new(),
                },
            ],
        };

        insta::assert_snapshot!(render_summary(&summary), @r"
        orders-dev: created (us-west-2, eu-west-1)
        audit-dev: unchanged
        stacks: us-west-2, eu-west-1
        ");
    }

    #[test]
    fn test_render_empty_summary() {
        insta::assert_snapshot!(render_summary(&DeploySummary::default()), @"no tables to replicate");
    }
}
