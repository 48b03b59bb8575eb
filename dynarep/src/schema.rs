//! Provider-neutral description of a DynamoDB table and its auto scaling settings.
//!
//! Replica tables for version 2017.11.29 global tables must match the source table exactly,
//! so the deployer reads a [`TableSchema`] from the source region and recreates it elsewhere.

/// Table status reported once a table can serve requests.
pub const TABLE_STATUS_ACTIVE: &str = "ACTIVE";

/// Stream view type required by global tables.
pub const REPLICA_STREAM_VIEW_TYPE: &str = "NEW_AND_OLD_IMAGES";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Hash,
    Range,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Hash => "HASH",
            KeyType::Range => "RANGE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttribute {
    pub name: String,
    pub key_type: KeyType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDefinition {
    pub name: String,
    /// Scalar type: `S`, `N` or `B`.
    pub attribute_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throughput {
    pub read_capacity_units: i64,
    pub write_capacity_units: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingMode {
    PayPerRequest,
    Provisioned(Throughput),
}

impl BillingMode {
    pub fn is_provisioned(&self) -> bool {
        matches!(self, BillingMode::Provisioned(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryIndex {
    pub name: String,
    pub key_schema: Vec<KeyAttribute>,
    /// `ALL`, `KEYS_ONLY` or `INCLUDE`.
    pub projection_type: String,
    pub non_key_attributes: Vec<String>,
    /// Set for provisioned tables only.
    pub throughput: Option<Throughput>,
}

/// Definition needed to recreate a table in another region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub key_schema: Vec<KeyAttribute>,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub billing_mode: BillingMode,
    pub global_secondary_indexes: Vec<SecondaryIndex>,
    pub stream_enabled: bool,
}

impl TableSchema {
    /// Returns the schema a replica must be created with: identical, with streams enabled.
    pub fn for_replica(&self) -> TableSchema {
        TableSchema {
            stream_enabled: true,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaDescription {
    pub region: String,
    pub status: String,
}

/// Current state of a table as reported by `DescribeTable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescription {
    pub schema: TableSchema,
    pub arn: String,
    pub status: String,
    /// Version 2019.11.21 replicas. Empty for tables that are not global tables.
    pub replicas: Vec<ReplicaDescription>,
}

impl TableDescription {
    pub fn is_active(&self) -> bool {
        self.status == TABLE_STATUS_ACTIVE
    }

    pub fn replica(&self, region: &str) -> Option<&ReplicaDescription> {
        self.replicas.iter().find(|r| r.region == region)
    }

    /// Returns `true` when the table and all of its replicas are active.
    pub fn is_settled(&self) -> bool {
        self.is_active()
            && self
                .replicas
                .iter()
                .all(|replica| replica.status == TABLE_STATUS_ACTIVE)
    }
}

/// Scalable target registered with Application Auto Scaling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalingTarget {
    /// `table/{name}` or `table/{name}/index/{index}`.
    pub resource_id: String,
    /// For example `dynamodb:table:ReadCapacityUnits`.
    pub dimension: String,
    pub min_capacity: i32,
    pub max_capacity: i32,
}

/// Target tracking policy attached to a [`ScalingTarget`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingPolicy {
    pub name: String,
    pub resource_id: String,
    pub dimension: String,
    pub target_value: f64,
    /// For example `DynamoDBReadCapacityUtilization`.
    pub predefined_metric: Option<String>,
    pub scale_in_cooldown: Option<i32>,
    pub scale_out_cooldown: Option<i32>,
    pub disable_scale_in: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalingSettings {
    pub targets: Vec<ScalingTarget>,
    pub policies: Vec<ScalingPolicy>,
}

impl ScalingSettings {
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty() && self.policies.is_empty()
    }
}

/// Application Auto Scaling resource id of a table.
pub fn table_resource_id(table_name: &str) -> String {
    format!("table/{table_name}")
}

/// Application Auto Scaling resource id of a global secondary index.
pub fn index_resource_id(table_name: &str, index_name: &str) -> String {
    format!("table/{table_name}/index/{index_name}")
}
