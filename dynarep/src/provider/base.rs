use std::future::Future;

use crate::error::DynarepResult;
use crate::resolver::TopologyLookupError;
use crate::schema::{ScalingSettings, TableDescription, TableSchema};
use crate::types::{ReplicaChange, ReplicationTopology, StackUpdate, Tags};

/// Operations on DynamoDB tables and global tables.
///
/// Implementations map "does not exist" responses onto the not-found [`crate::error::ErrorKind`]s
/// so callers can tolerate missing resources where that is expected.
pub trait TableProvider {
    /// Describes a table. Fails with [`crate::error::ErrorKind::TableNotFound`] when the table
    /// does not exist in `region`.
    fn describe_table(
        &self,
        region: &str,
        table_name: &str,
    ) -> impl Future<Output = DynarepResult<TableDescription>> + Send;

    /// Creates a table from `schema` and returns its ARN.
    ///
    /// When `schema.stream_enabled` is set the table streams `NEW_AND_OLD_IMAGES`.
    fn create_table(
        &self,
        region: &str,
        schema: &TableSchema,
    ) -> impl Future<Output = DynarepResult<String>> + Send;

    fn delete_table(
        &self,
        region: &str,
        table_name: &str,
    ) -> impl Future<Output = DynarepResult<()>> + Send;

    /// Returns the regions linked by a version 2017.11.29 global table.
    fn describe_global_table(
        &self,
        region: &str,
        global_table_name: &str,
    ) -> impl Future<Output = Result<ReplicationTopology, TopologyLookupError>> + Send;

    /// Returns the regions a version 2019.11.21 table replicates to, including `region` itself.
    fn table_replicas(
        &self,
        region: &str,
        table_name: &str,
    ) -> impl Future<Output = Result<ReplicationTopology, TopologyLookupError>> + Send;

    /// Links existing tables of the same name into a version 2017.11.29 global table.
    fn create_global_table(
        &self,
        region: &str,
        global_table_name: &str,
        regions: &[String],
    ) -> impl Future<Output = DynarepResult<()>> + Send;

    /// Adds or removes one region of a version 2017.11.29 global table.
    fn update_global_table(
        &self,
        region: &str,
        global_table_name: &str,
        change: ReplicaChange,
    ) -> impl Future<Output = DynarepResult<()>> + Send;

    /// Adds or removes one version 2019.11.21 replica of a table.
    fn update_table_replicas(
        &self,
        region: &str,
        table_name: &str,
        change: ReplicaChange,
    ) -> impl Future<Output = DynarepResult<()>> + Send;

    fn tag_resource(
        &self,
        region: &str,
        resource_arn: &str,
        tags: &Tags,
    ) -> impl Future<Output = DynarepResult<()>> + Send;

    /// Reads the scalable targets and target tracking policies of a table and its indexes.
    fn describe_scaling(
        &self,
        region: &str,
        table_name: &str,
    ) -> impl Future<Output = DynarepResult<ScalingSettings>> + Send;

    /// Registers every target, then puts every policy.
    fn apply_scaling(
        &self,
        region: &str,
        settings: &ScalingSettings,
    ) -> impl Future<Output = DynarepResult<()>> + Send;
}

/// Operations on CloudFormation stacks.
pub trait StackProvider {
    /// Physical ids of the `AWS::DynamoDB::Table` resources of a stack, in stack order.
    fn list_stack_tables(
        &self,
        region: &str,
        stack_name: &str,
    ) -> impl Future<Output = DynarepResult<Vec<String>>> + Send;

    /// Current status of a stack, `None` when the stack does not exist.
    fn stack_status(
        &self,
        region: &str,
        stack_name: &str,
    ) -> impl Future<Output = DynarepResult<Option<String>>> + Send;

    fn create_stack(
        &self,
        region: &str,
        stack_name: &str,
        template_body: &str,
    ) -> impl Future<Output = DynarepResult<()>> + Send;

    /// Starts an update. Returns [`StackUpdate::NoChanges`] when the stack already matches.
    fn update_stack(
        &self,
        region: &str,
        stack_name: &str,
        template_body: &str,
    ) -> impl Future<Output = DynarepResult<StackUpdate>> + Send;

    fn delete_stack(
        &self,
        region: &str,
        stack_name: &str,
    ) -> impl Future<Output = DynarepResult<()>> + Send;
}
