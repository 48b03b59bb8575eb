use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{DynarepError, DynarepResult, ErrorKind};
use crate::provider::{StackProvider, TableProvider};
use crate::resolver::TopologyLookupError;
use crate::schema::{
    ReplicaDescription, ScalingSettings, TABLE_STATUS_ACTIVE, TableDescription, TableSchema,
};
use crate::test_utils::fixtures::table_arn;
use crate::types::{ReplicaChange, ReplicationTopology, StackUpdate, Tags};

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCall {
    pub operation: &'static str,
    pub region: String,
    pub target: String,
}

#[derive(Debug)]
struct MemoryTable {
    description: TableDescription,
    /// Describes left before the table and its replicas report `ACTIVE`.
    pending_describes: u32,
}

#[derive(Debug)]
struct MemoryStack {
    tables: Vec<String>,
    current: String,
    upcoming: VecDeque<String>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Tables keyed by `(region, name)`.
    tables: HashMap<(String, String), MemoryTable>,
    /// Version 2017.11.29 global tables and their member regions.
    global_tables: HashMap<String, Vec<String>>,
    /// Stacks keyed by `(region, name)`.
    stacks: HashMap<(String, String), MemoryStack>,
    /// Status sequence used by the next stack operation in a region.
    stack_scripts: HashMap<String, VecDeque<String>>,
    scaling: HashMap<(String, String), ScalingSettings>,
    applied_scaling: Vec<(String, ScalingSettings)>,
    tags: HashMap<String, Tags>,
    failures: HashMap<(&'static str, String), DynarepError>,
    calls: Vec<ProviderCall>,
    settle_after: u32,
}

impl Inner {
    fn record(&mut self, operation: &'static str, region: &str, target: &str) -> DynarepResult<()> {
        self.calls.push(ProviderCall {
            operation,
            region: region.to_string(),
            target: target.to_string(),
        });

        match self.failures.remove(&(operation, region.to_string())) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_stack_statuses(&mut self, region: &str, default: &[&str]) -> VecDeque<String> {
        self.stack_scripts
            .remove(region)
            .unwrap_or_else(|| default.iter().map(|status| status.to_string()).collect())
    }

    fn insert_table(&mut self, region: &str, schema: TableSchema, status: &str, pending: u32) {
        let description = TableDescription {
            arn: table_arn(region, &schema.name),
            schema,
            status: status.to_string(),
            replicas: Vec::new(),
        };

        self.tables.insert(
            (region.to_string(), description.schema.name.clone()),
            MemoryTable {
                description,
                pending_describes: pending,
            },
        );
    }
}

fn table_not_found(region: &str, table_name: &str) -> DynarepError {
    dynarep_error!(
        ErrorKind::TableNotFound,
        "DynamoDB table not found",
        format!("{table_name} in {region}")
    )
}

/// In-memory [`TableProvider`] and [`StackProvider`].
///
/// Newly created tables, replica changes and stack operations settle after a configurable number
/// of status queries, which exercises the polling paths of the deployer. Failures can be
/// injected per operation and region, and every call is recorded.
#[derive(Debug, Clone)]
pub struct MemoryProvider {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        let inner = Inner {
            settle_after: 1,
            ..Inner::default()
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Number of describes reporting a transitional status before a change settles.
    pub async fn set_settle_after(&self, describes: u32) {
        self.inner.lock().await.settle_after = describes;
    }

    /// Adds an `ACTIVE` table.
    pub async fn add_table(&self, region: &str, schema: TableSchema) {
        self.inner
            .lock()
            .await
            .insert_table(region, schema, TABLE_STATUS_ACTIVE, 0);
    }

    /// Adds a deployed stack owning `tables`.
    pub async fn add_stack(&self, region: &str, stack_name: &str, status: &str, tables: &[&str]) {
        self.inner.lock().await.stacks.insert(
            (region.to_string(), stack_name.to_string()),
            MemoryStack {
                tables: tables.iter().map(|table| table.to_string()).collect(),
                current: status.to_string(),
                upcoming: VecDeque::new(),
            },
        );
    }

    pub async fn add_global_table(&self, global_table_name: &str, regions: &[&str]) {
        self.inner.lock().await.global_tables.insert(
            global_table_name.to_string(),
            regions.iter().map(|region| region.to_string()).collect(),
        );
    }

    /// Adds an already active version 2019.11.21 replica of a source table.
    pub async fn add_replica(&self, source_region: &str, table_name: &str, replica_region: &str) {
        let mut inner = self.inner.lock().await;
        let key = (source_region.to_string(), table_name.to_string());
        let Some(table) = inner.tables.get_mut(&key) else {
            return;
        };

        table.description.replicas.push(ReplicaDescription {
            region: replica_region.to_string(),
            status: TABLE_STATUS_ACTIVE.to_string(),
        });
        let schema = table.description.schema.clone();
        inner.insert_table(replica_region, schema, TABLE_STATUS_ACTIVE, 0);
    }

    pub async fn set_scaling(&self, region: &str, table_name: &str, settings: ScalingSettings) {
        self.inner
            .lock()
            .await
            .scaling
            .insert((region.to_string(), table_name.to_string()), settings);
    }

    /// Statuses the next stack create, update or delete in `region` goes through, in order.
    pub async fn script_stack(&self, region: &str, statuses: &[&str]) {
        self.inner.lock().await.stack_scripts.insert(
            region.to_string(),
            statuses.iter().map(|status| status.to_string()).collect(),
        );
    }

    /// Fails the next `operation` in `region` with `err`.
    pub async fn fail_next(&self, operation: &'static str, region: &str, err: DynarepError) {
        self.inner
            .lock()
            .await
            .failures
            .insert((operation, region.to_string()), err);
    }

    pub async fn table(&self, region: &str, table_name: &str) -> Option<TableDescription> {
        self.inner
            .lock()
            .await
            .tables
            .get(&(region.to_string(), table_name.to_string()))
            .map(|table| table.description.clone())
    }

    pub async fn global_table(&self, global_table_name: &str) -> Option<Vec<String>> {
        self.inner
            .lock()
            .await
            .global_tables
            .get(global_table_name)
            .cloned()
    }

    pub async fn stack(&self, region: &str, stack_name: &str) -> Option<String> {
        self.inner
            .lock()
            .await
            .stacks
            .get(&(region.to_string(), stack_name.to_string()))
            .map(|stack| stack.current.clone())
    }

    pub async fn tags(&self, arn: &str) -> Option<Tags> {
        self.inner.lock().await.tags.get(arn).cloned()
    }

    pub async fn applied_scaling(&self, region: &str) -> Vec<ScalingSettings> {
        self.inner
            .lock()
            .await
            .applied_scaling
            .iter()
            .filter(|(applied_region, _)| applied_region == region)
            .map(|(_, settings)| settings.clone())
            .collect()
    }

    pub async fn calls(&self) -> Vec<ProviderCall> {
        self.inner.lock().await.calls.clone()
    }

    /// Recorded calls of one operation.
    pub async fn calls_to(&self, operation: &str) -> Vec<ProviderCall> {
        self.inner
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .cloned()
            .collect()
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TableProvider for MemoryProvider {
    async fn describe_table(
        &self,
        region: &str,
        table_name: &str,
    ) -> DynarepResult<TableDescription> {
        let mut inner = self.inner.lock().await;
        inner.record("describe_table", region, table_name)?;

        let Some(table) = inner
            .tables
            .get_mut(&(region.to_string(), table_name.to_string()))
        else {
            return Err(table_not_found(region, table_name));
        };

        if table.pending_describes > 0 {
            table.pending_describes -= 1;
        } else {
            table.description.status = TABLE_STATUS_ACTIVE.to_string();
            for replica in &mut table.description.replicas {
                replica.status = TABLE_STATUS_ACTIVE.to_string();
            }
        }

        Ok(table.description.clone())
    }

    async fn create_table(&self, region: &str, schema: &TableSchema) -> DynarepResult<String> {
        let mut inner = self.inner.lock().await;
        inner.record("create_table", region, &schema.name)?;

        if inner
            .tables
            .contains_key(&(region.to_string(), schema.name.clone()))
        {
            bail!(
                ErrorKind::InvalidRequest,
                "AWS request rejected",
                format!("table {} already exists in {region}", schema.name)
            );
        }

        let pending = inner.settle_after;
        inner.insert_table(region, schema.clone(), "CREATING", pending);

        Ok(table_arn(region, &schema.name))
    }

    async fn delete_table(&self, region: &str, table_name: &str) -> DynarepResult<()> {
        let mut inner = self.inner.lock().await;
        inner.record("delete_table", region, table_name)?;

        match inner
            .tables
            .remove(&(region.to_string(), table_name.to_string()))
        {
            Some(_) => Ok(()),
            None => Err(table_not_found(region, table_name)),
        }
    }

    async fn describe_global_table(
        &self,
        region: &str,
        global_table_name: &str,
    ) -> Result<ReplicationTopology, TopologyLookupError> {
        let mut inner = self.inner.lock().await;
        inner.record("describe_global_table", region, global_table_name)?;

        match inner.global_tables.get(global_table_name) {
            Some(regions) => Ok(ReplicationTopology::new(regions.iter().cloned())),
            None => Err(TopologyLookupError::NotFound),
        }
    }

    async fn table_replicas(
        &self,
        region: &str,
        table_name: &str,
    ) -> Result<ReplicationTopology, TopologyLookupError> {
        let mut inner = self.inner.lock().await;
        inner.record("table_replicas", region, table_name)?;

        let Some(table) = inner
            .tables
            .get(&(region.to_string(), table_name.to_string()))
        else {
            return Err(TopologyLookupError::NotFound);
        };

        if table.description.replicas.is_empty() {
            return Ok(ReplicationTopology::empty());
        }

        let mut regions = vec![region.to_string()];
        regions.extend(
            table
                .description
                .replicas
                .iter()
                .map(|replica| replica.region.clone()),
        );

        Ok(ReplicationTopology::new(regions))
    }

    async fn create_global_table(
        &self,
        region: &str,
        global_table_name: &str,
        regions: &[String],
    ) -> DynarepResult<()> {
        let mut inner = self.inner.lock().await;
        inner.record("create_global_table", region, global_table_name)?;

        if inner.global_tables.contains_key(global_table_name) {
            bail!(
                ErrorKind::InvalidRequest,
                "AWS request rejected",
                format!("global table {global_table_name} already exists")
            );
        }

        inner
            .global_tables
            .insert(global_table_name.to_string(), regions.to_vec());

        Ok(())
    }

    async fn update_global_table(
        &self,
        region: &str,
        global_table_name: &str,
        change: ReplicaChange,
    ) -> DynarepResult<()> {
        let mut inner = self.inner.lock().await;
        inner.record("update_global_table", region, global_table_name)?;

        let Some(regions) = inner.global_tables.get_mut(global_table_name) else {
            bail!(
                ErrorKind::GlobalTableNotFound,
                "DynamoDB global table not found",
                global_table_name
            );
        };

        match change {
            ReplicaChange::Add(replica_region) => {
                if !regions.contains(&replica_region) {
                    regions.push(replica_region);
                }
            }
            ReplicaChange::Remove(replica_region) => {
                regions.retain(|member| *member != replica_region);
            }
        }

        Ok(())
    }

    async fn update_table_replicas(
        &self,
        region: &str,
        table_name: &str,
        change: ReplicaChange,
    ) -> DynarepResult<()> {
        let mut inner = self.inner.lock().await;
        inner.record("update_table_replicas", region, table_name)?;

        if change.region() == region {
            bail!(
                ErrorKind::InvalidRequest,
                "AWS request rejected",
                format!("{table_name} cannot replicate into its own region {region}")
            );
        }

        let pending = inner.settle_after;
        let key = (region.to_string(), table_name.to_string());
        let Some(table) = inner.tables.get_mut(&key) else {
            return Err(table_not_found(region, table_name));
        };

        if !table.description.is_settled() {
            bail!(
                ErrorKind::InvalidRequest,
                "AWS request rejected",
                format!("table {table_name} is being updated")
            );
        }

        table.description.status = "UPDATING".to_string();
        table.pending_describes = pending;

        match change {
            ReplicaChange::Add(replica_region) => {
                table.description.replicas.push(ReplicaDescription {
                    region: replica_region.clone(),
                    status: "CREATING".to_string(),
                });
                let schema = table.description.schema.for_replica();
                inner.insert_table(&replica_region, schema, TABLE_STATUS_ACTIVE, 0);
            }
            ReplicaChange::Remove(replica_region) => {
                table
                    .description
                    .replicas
                    .retain(|replica| replica.region != replica_region);
                inner.tables.remove(&(replica_region, table_name.to_string()));
            }
        }

        Ok(())
    }

    async fn tag_resource(&self, region: &str, resource_arn: &str, tags: &Tags) -> DynarepResult<()> {
        let mut inner = self.inner.lock().await;
        inner.record("tag_resource", region, resource_arn)?;

        inner
            .tags
            .entry(resource_arn.to_string())
            .or_default()
            .extend(tags.iter().map(|(key, value)| (key.clone(), value.clone())));

        Ok(())
    }

    async fn describe_scaling(
        &self,
        region: &str,
        table_name: &str,
    ) -> DynarepResult<ScalingSettings> {
        let mut inner = self.inner.lock().await;
        inner.record("describe_scaling", region, table_name)?;

        Ok(inner
            .scaling
            .get(&(region.to_string(), table_name.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn apply_scaling(&self, region: &str, settings: &ScalingSettings) -> DynarepResult<()> {
        let mut inner = self.inner.lock().await;
        inner.record("apply_scaling", region, "scaling")?;

        inner
            .applied_scaling
            .push((region.to_string(), settings.clone()));

        Ok(())
    }
}

impl StackProvider for MemoryProvider {
    async fn list_stack_tables(&self, region: &str, stack_name: &str) -> DynarepResult<Vec<String>> {
        let mut inner = self.inner.lock().await;
        inner.record("list_stack_tables", region, stack_name)?;

        match inner
            .stacks
            .get(&(region.to_string(), stack_name.to_string()))
        {
            Some(stack) => Ok(stack.tables.clone()),
            None => bail!(
                ErrorKind::StackNotFound,
                "CloudFormation stack not found",
                format!("{stack_name} in {region}")
            ),
        }
    }

    async fn stack_status(&self, region: &str, stack_name: &str) -> DynarepResult<Option<String>> {
        let mut inner = self.inner.lock().await;
        inner.record("stack_status", region, stack_name)?;

        let key = (region.to_string(), stack_name.to_string());
        let Some(stack) = inner.stacks.get_mut(&key) else {
            return Ok(None);
        };

        if let Some(next) = stack.upcoming.pop_front() {
            stack.current = next;
        }

        // Deleted stacks can no longer be described.
        if stack.current == "DELETE_COMPLETE" {
            inner.stacks.remove(&key);
            return Ok(None);
        }

        Ok(Some(stack.current.clone()))
    }

    async fn create_stack(
        &self,
        region: &str,
        stack_name: &str,
        _template_body: &str,
    ) -> DynarepResult<()> {
        let mut inner = self.inner.lock().await;
        inner.record("create_stack", region, stack_name)?;

        let key = (region.to_string(), stack_name.to_string());
        if inner.stacks.contains_key(&key) {
            bail!(
                ErrorKind::InvalidRequest,
                "AWS request rejected",
                format!("stack {stack_name} already exists in {region}")
            );
        }

        let mut upcoming =
            inner.next_stack_statuses(region, &["CREATE_IN_PROGRESS", "CREATE_COMPLETE"]);
        let current = upcoming
            .pop_front()
            .unwrap_or_else(|| "CREATE_IN_PROGRESS".to_string());

        inner.stacks.insert(
            key,
            MemoryStack {
                tables: Vec::new(),
                current,
                upcoming,
            },
        );

        Ok(())
    }

    async fn update_stack(
        &self,
        region: &str,
        stack_name: &str,
        _template_body: &str,
    ) -> DynarepResult<StackUpdate> {
        let mut inner = self.inner.lock().await;
        inner.record("update_stack", region, stack_name)?;

        // An empty script means the stack already matches the template.
        let mut upcoming =
            inner.next_stack_statuses(region, &["UPDATE_IN_PROGRESS", "UPDATE_COMPLETE"]);
        let Some(current) = upcoming.pop_front() else {
            return Ok(StackUpdate::NoChanges);
        };

        let key = (region.to_string(), stack_name.to_string());
        let Some(stack) = inner.stacks.get_mut(&key) else {
            bail!(
                ErrorKind::StackNotFound,
                "CloudFormation stack not found",
                format!("{stack_name} in {region}")
            );
        };

        stack.current = current;
        stack.upcoming = upcoming;

        Ok(StackUpdate::Started)
    }

    async fn delete_stack(&self, region: &str, stack_name: &str) -> DynarepResult<()> {
        let mut inner = self.inner.lock().await;
        inner.record("delete_stack", region, stack_name)?;

        let mut upcoming =
            inner.next_stack_statuses(region, &["DELETE_IN_PROGRESS", "DELETE_COMPLETE"]);
        let current = upcoming
            .pop_front()
            .unwrap_or_else(|| "DELETE_IN_PROGRESS".to_string());

        let key = (region.to_string(), stack_name.to_string());
        let Some(stack) = inner.stacks.get_mut(&key) else {
            bail!(
                ErrorKind::StackNotFound,
                "CloudFormation stack not found",
                format!("{stack_name} in {region}")
            );
        };

        stack.current = current;
        stack.upcoming = upcoming;

        Ok(())
    }
}
