use tracing::{info, warn};

use super::GlobalTableDeployer;
use crate::error::DynarepResult;
use crate::poll::PollState;
use crate::provider::{StackProvider, TableProvider};
use crate::schema::{ScalingSettings, TABLE_STATUS_ACTIVE, TableDescription};

/// Rewrites the region of a DynamoDB table ARN.
///
/// Replicas share the account and the table name of the source table, only the region differs.
/// ARNs that do not have the `arn:partition:service:region:...` shape are returned unchanged.
pub fn regional_arn(arn: &str, region: &str) -> String {
    let parts: Vec<&str> = arn.splitn(5, ':').collect();
    if parts.len() != 5 || parts[0] != "arn" {
        return arn.to_string();
    }

    format!("{}:{}:{}:{region}:{}", parts[0], parts[1], parts[2], parts[4])
}

/// Summarizes what a table is still waiting for.
fn settle_status(description: &TableDescription) -> String {
    if !description.is_active() {
        return description.status.clone();
    }

    description
        .replicas
        .iter()
        .find(|replica| replica.status != TABLE_STATUS_ACTIVE)
        .map(|replica| format!("replica {} {}", replica.region, replica.status))
        .unwrap_or_else(|| TABLE_STATUS_ACTIVE.to_string())
}

impl<P> GlobalTableDeployer<P>
where
    P: TableProvider + StackProvider + Clone + Send + Sync + 'static,
{
    /// Waits until the table is `ACTIVE` and returns its description.
    pub(super) async fn wait_for_table(
        &self,
        region: &str,
        table_name: &str,
    ) -> DynarepResult<TableDescription> {
        let target = format!("{table_name} in {region}");
        self.poller()
            .poll_until(&target, || async move {
                let description = self.provider.describe_table(region, table_name).await?;
                Ok(if description.is_active() {
                    PollState::Done {
                        status: description.status.clone(),
                        value: description,
                    }
                } else {
                    PollState::Pending {
                        status: description.status,
                    }
                })
            })
            .await
    }

    /// Waits until the table and every one of its replicas are `ACTIVE`.
    pub(super) async fn wait_for_replicas(
        &self,
        region: &str,
        table_name: &str,
    ) -> DynarepResult<TableDescription> {
        let target = format!("{table_name} replicas");
        self.poller()
            .poll_until(&target, || async move {
                let description = self.provider.describe_table(region, table_name).await?;
                let status = settle_status(&description);
                Ok(if description.is_settled() {
                    PollState::Done {
                        status,
                        value: description,
                    }
                } else {
                    PollState::Pending { status }
                })
            })
            .await
    }

    /// Creates a replica of `source` in `region` with the same schema and scaling settings.
    ///
    /// A table that already exists in `region` is reused, which makes interrupted runs
    /// resumable.
    pub(super) async fn create_replica_table(
        &self,
        source: &TableDescription,
        scaling: &ScalingSettings,
        region: &str,
    ) -> DynarepResult<()> {
        let table_name = source.schema.name.as_str();

        match self.provider.describe_table(region, table_name).await {
            Ok(_) => info!(table_name, region, "replica table already exists"),
            Err(err) if err.is_not_found() => {
                info!(table_name, region, "creating replica table");
                self.provider
                    .create_table(region, &source.schema.for_replica())
                    .await?;
            }
            Err(err) => return Err(err),
        }

        let replica = self.wait_for_table(region, table_name).await?;

        if source.schema.billing_mode.is_provisioned() && !scaling.is_empty() {
            self.provider.apply_scaling(region, scaling).await?;
            info!(
                table_name,
                region,
                targets = scaling.targets.len(),
                policies = scaling.policies.len(),
                "copied auto scaling settings"
            );
        }

        self.tag_table(region, &replica.arn).await
    }

    /// Applies the configured tags to a table. Does nothing without tags.
    pub(super) async fn tag_table(&self, region: &str, table_arn: &str) -> DynarepResult<()> {
        let tags = &self.config.global_tables.tags;
        if tags.is_empty() {
            return Ok(());
        }

        if table_arn.is_empty() {
            warn!(region, "table has no ARN, skipping tags");
            return Ok(());
        }

        self.provider.tag_resource(region, table_arn, tags).await
    }
}
