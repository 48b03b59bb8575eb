//! Orchestration of a complete deploy or remove run.
//!
//! [`GlobalTableDeployer`] discovers the tables of the service stack, optionally deploys the
//! stack into every target region, resolves the missing regions of each table and links them
//! with the configured global tables version. Removal undoes the linking and optionally deletes
//! the regional stacks.

mod replication;
mod stacks;
mod tables;

use std::sync::Arc;

use dynarep_config::shared::{DeployerConfig, ReplicationVersion};
use tracing::{info, warn};

use crate::concurrency::shutdown::{ShutdownRx, ShutdownTx, create_shutdown_channel};
use crate::error::{DynarepError, DynarepResult};
use crate::poll::{PollConfig, Poller, ProgressObserver};
use crate::provider::{StackProvider, TableProvider};
use crate::resolver::{DiffStrategy, RegionDiffResolver, TopologyLookupError};
use crate::types::{DeploySummary, ReplicationTopology, TableAction, TableReport};

pub use stacks::read_template;
pub use tables::regional_arn;

/// Sets up and tears down DynamoDB global tables for the tables of a CloudFormation stack.
#[derive(Clone)]
pub struct GlobalTableDeployer<P> {
    config: Arc<DeployerConfig>,
    provider: P,
    shutdown_tx: ShutdownTx,
    shutdown_rx: ShutdownRx,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl<P> GlobalTableDeployer<P>
where
    P: TableProvider + StackProvider + Clone + Send + Sync + 'static,
{
    pub fn new(config: DeployerConfig, provider: P) -> Self {
        // The kept receiver records a shutdown requested between two waits.
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

        Self {
            config: Arc::new(config),
            provider,
            shutdown_tx,
            shutdown_rx,
            observer: None,
        }
    }

    /// Reports every status query of every wait to `observer` instead of the log.
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Returns a sender that cancels every wait in progress.
    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    pub fn config(&self) -> &DeployerConfig {
        &self.config
    }

    /// Replicates every stack table to the configured regions.
    pub async fn deploy(&self) -> DynarepResult<DeploySummary> {
        let stack_name = self.config.stack_name();
        let version = self.config.global_tables.version;
        let target_regions = self.target_regions();

        info!(
            %stack_name,
            source_region = self.source_region(),
            %version,
            ?target_regions,
            "deploying global tables"
        );

        let tables = self.discover_tables(&stack_name).await?;
        if tables.is_empty() {
            info!(%stack_name, "stack has no tables to replicate");
            return Ok(DeploySummary::default());
        }

        let mut summary = DeploySummary::default();

        // Regional stacks own the replica tables, so they must exist before linking.
        if self.config.global_tables.create_stack {
            let template_body = read_template(&self.config.global_tables).await?;
            self.deploy_stacks(&stack_name, &template_body, &target_regions)
                .await?;
            summary.stack_regions = target_regions.clone();
        }

        let resolver = RegionDiffResolver::new(self.source_region(), DiffStrategy::from(version));
        for table_name in &tables {
            let diff = resolver
                .resolve(&target_regions, || self.lookup_topology(table_name))
                .await?;

            if diff.is_noop() {
                info!(%table_name, "every region already replicates the table");
                summary.tables.push(TableReport {
                    table_name: table_name.clone(),
                    action: TableAction::Unchanged,
                    regions: Vec::new(),
                });
                continue;
            }

            let regions = match version {
                ReplicationVersion::V2017 => self.link_global_table(table_name, &diff).await?,
                ReplicationVersion::V2019 => self.add_table_replicas(table_name, &diff).await?,
            };

            let action = if diff.adding_new_regions {
                TableAction::Updated
            } else {
                TableAction::Created
            };

            info!(
                %table_name,
                %action,
                strategy = ?resolver.strategy(),
                ?regions,
                "table replication deployed"
            );
            summary.tables.push(TableReport {
                table_name: table_name.clone(),
                action,
                regions,
            });
        }

        Ok(summary)
    }

    /// Removes the configured regions from the replication of every stack table.
    pub async fn remove(&self) -> DynarepResult<DeploySummary> {
        let stack_name = self.config.stack_name();
        let version = self.config.global_tables.version;
        let target_regions = self.target_regions();

        info!(
            %stack_name,
            source_region = self.source_region(),
            %version,
            ?target_regions,
            "removing global tables"
        );

        let tables = self.discover_tables(&stack_name).await?;
        let mut summary = DeploySummary::default();

        for table_name in &tables {
            let regions = match version {
                ReplicationVersion::V2017 => {
                    self.unlink_global_table(table_name, &target_regions)
                        .await?
                }
                ReplicationVersion::V2019 => {
                    self.remove_table_replicas(table_name, &target_regions)
                        .await?
                }
            };

            let action = if regions.is_empty() {
                TableAction::Unchanged
            } else {
                TableAction::Removed
            };

            info!(%table_name, %action, ?regions, "table replication removed");
            summary.tables.push(TableReport {
                table_name: table_name.clone(),
                action,
                regions,
            });
        }

        if self.config.global_tables.create_stack {
            self.remove_stacks(&stack_name, &target_regions).await?;
            summary.stack_regions = target_regions;
        }

        Ok(summary)
    }

    fn source_region(&self) -> &str {
        &self.config.provider.region
    }

    fn target_regions(&self) -> Vec<String> {
        if self.config.lists_source_region() {
            warn!(
                source_region = self.source_region(),
                "the source region is listed as a replica region and will be ignored"
            );
        }

        self.config.target_regions()
    }

    /// Builds a poller observing the shutdown signal.
    fn poller(&self) -> Poller {
        let poller = Poller::new(PollConfig::from(&self.config.polling))
            .with_shutdown(self.shutdown_rx.clone());

        match &self.observer {
            Some(observer) => poller.with_observer(observer.clone()),
            None => poller,
        }
    }

    /// Lists the stack tables, restricted to the configured allow-list when there is one.
    async fn discover_tables(&self, stack_name: &str) -> DynarepResult<Vec<String>> {
        let stack_tables = self
            .provider
            .list_stack_tables(self.source_region(), stack_name)
            .await?;

        let allowed = &self.config.global_tables.tables;
        if allowed.is_empty() {
            return Ok(stack_tables);
        }

        for table_name in allowed {
            if !stack_tables.contains(table_name) {
                warn!(
                    %table_name,
                    stack_name,
                    "configured table is not part of the stack, skipping"
                );
            }
        }

        Ok(stack_tables
            .into_iter()
            .filter(|table_name| allowed.contains(table_name))
            .collect())
    }

    /// Fetches the current replication topology of a table in the source region.
    async fn lookup_topology(
        &self,
        table_name: &str,
    ) -> Result<ReplicationTopology, TopologyLookupError> {
        match self.config.global_tables.version {
            ReplicationVersion::V2017 => {
                self.provider
                    .describe_global_table(self.source_region(), table_name)
                    .await
            }
            ReplicationVersion::V2019 => {
                self.provider
                    .table_replicas(self.source_region(), table_name)
                    .await
            }
        }
    }
}

/// Collects the failures of independent regional operations into one error.
fn collect_errors(results: Vec<DynarepResult<()>>) -> DynarepResult<()> {
    let errors: Vec<DynarepError> = results.into_iter().filter_map(Result::err).collect();
    if errors.is_empty() {
        return Ok(());
    }

    Err(errors.into())
}
