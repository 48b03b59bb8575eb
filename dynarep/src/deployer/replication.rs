use futures::future::join_all;
use tracing::{info, warn};

use super::{GlobalTableDeployer, collect_errors, regional_arn};
use crate::error::DynarepResult;
use crate::provider::{StackProvider, TableProvider};
use crate::resolver::TopologyLookupError;
use crate::schema::ScalingSettings;
use crate::types::{RegionDiffResult, ReplicaChange, ReplicationTopology};

impl<P> GlobalTableDeployer<P>
where
    P: TableProvider + StackProvider + Clone + Send + Sync + 'static,
{
    /// Links `table_name` across regions with a version 2017.11.29 global table.
    ///
    /// Replica tables are copied from the source table unless the regional stacks created them.
    /// Returns the replica regions that were linked.
    pub(super) async fn link_global_table(
        &self,
        table_name: &str,
        diff: &RegionDiffResult,
    ) -> DynarepResult<Vec<String>> {
        let source_region = self.source_region();
        let replica_regions: Vec<String> = diff
            .missing_regions
            .iter()
            .filter(|region| region.as_str() != source_region)
            .cloned()
            .collect();

        if !self.config.global_tables.create_stack && !replica_regions.is_empty() {
            let source = self.wait_for_table(source_region, table_name).await?;
            if !source.schema.stream_enabled {
                warn!(
                    table_name,
                    "source table has no stream, global tables require NEW_AND_OLD_IMAGES streams"
                );
            }

            let scaling = if source.schema.billing_mode.is_provisioned() {
                self.provider
                    .describe_scaling(source_region, table_name)
                    .await?
            } else {
                ScalingSettings::default()
            };

            let results = join_all(
                replica_regions
                    .iter()
                    .map(|region| self.create_replica_table(&source, &scaling, region)),
            )
            .await;
            collect_errors(results)?;
        }

        if diff.adding_new_regions {
            for region in &diff.missing_regions {
                self.provider
                    .update_global_table(source_region, table_name, ReplicaChange::Add(region.clone()))
                    .await?;
            }
        } else {
            let mut regions = vec![source_region.to_string()];
            regions.extend(replica_regions.iter().cloned());

            self.provider
                .create_global_table(source_region, table_name, &regions)
                .await?;
        }

        info!(table_name, ?replica_regions, "global table linked");

        Ok(replica_regions)
    }

    /// Adds version 2019.11.21 replicas to `table_name`, one region at a time.
    ///
    /// The table only accepts one replica change at a time, so every addition waits for the
    /// table and its replicas to settle before the next one starts.
    pub(super) async fn add_table_replicas(
        &self,
        table_name: &str,
        diff: &RegionDiffResult,
    ) -> DynarepResult<Vec<String>> {
        let source_region = self.source_region();
        let mut added = Vec::with_capacity(diff.missing_regions.len());

        for region in &diff.missing_regions {
            self.wait_for_table(source_region, table_name).await?;

            info!(table_name, %region, "adding table replica");
            self.provider
                .update_table_replicas(source_region, table_name, ReplicaChange::Add(region.clone()))
                .await?;

            let description = self.wait_for_replicas(source_region, table_name).await?;
            self.tag_table(region, &regional_arn(&description.arn, region))
                .await?;

            added.push(region.clone());
        }

        Ok(added)
    }

    /// Removes the target regions from the version 2017.11.29 global table of `table_name` and
    /// deletes the replica tables the deployer created.
    ///
    /// A missing global table or replica table counts as already removed.
    pub(super) async fn unlink_global_table(
        &self,
        table_name: &str,
        target_regions: &[String],
    ) -> DynarepResult<Vec<String>> {
        let source_region = self.source_region();

        let topology = match self
            .provider
            .describe_global_table(source_region, table_name)
            .await
        {
            Ok(topology) => topology,
            Err(TopologyLookupError::NotFound) => {
                info!(table_name, "global table does not exist");
                ReplicationTopology::empty()
            }
            Err(TopologyLookupError::Other(err)) => return Err(err),
        };

        let mut removed = Vec::new();
        for region in target_regions {
            if !topology.contains(region) {
                continue;
            }

            match self
                .provider
                .update_global_table(
                    source_region,
                    table_name,
                    ReplicaChange::Remove(region.clone()),
                )
                .await
            {
                Ok(()) => removed.push(region.clone()),
                Err(err) if err.is_not_found() => {
                    info!(table_name, %region, "global table already gone");
                }
                Err(err) => return Err(err),
            }
        }

        // Replica tables created by regional stacks are deleted with the stacks.
        if !self.config.global_tables.create_stack {
            let results = join_all(
                target_regions
                    .iter()
                    .map(|region| self.delete_replica_table(region, table_name)),
            )
            .await;
            collect_errors(results)?;
        }

        Ok(removed)
    }

    async fn delete_replica_table(&self, region: &str, table_name: &str) -> DynarepResult<()> {
        match self.provider.delete_table(region, table_name).await {
            Ok(()) => {
                info!(table_name, region, "replica table deleted");
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                info!(table_name, region, "replica table does not exist");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Removes the target regions from the version 2019.11.21 replicas of `table_name`, one at a
    /// time.
    pub(super) async fn remove_table_replicas(
        &self,
        table_name: &str,
        target_regions: &[String],
    ) -> DynarepResult<Vec<String>> {
        let source_region = self.source_region();

        let topology = match self.provider.table_replicas(source_region, table_name).await {
            Ok(topology) => topology,
            Err(TopologyLookupError::NotFound) => {
                info!(table_name, "source table does not exist, skipping");
                return Ok(Vec::new());
            }
            Err(TopologyLookupError::Other(err)) => return Err(err),
        };

        let mut removed = Vec::new();
        for region in target_regions {
            if !topology.contains(region) {
                continue;
            }

            self.wait_for_table(source_region, table_name).await?;

            info!(table_name, %region, "removing table replica");
            self.provider
                .update_table_replicas(
                    source_region,
                    table_name,
                    ReplicaChange::Remove(region.clone()),
                )
                .await?;

            self.wait_for_replicas(source_region, table_name).await?;
            removed.push(region.clone());
        }

        Ok(removed)
    }
}
