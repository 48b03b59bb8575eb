use std::collections::BTreeMap;
use std::path::PathBuf;

use dynarep_config::shared::{
    DeployerConfig, GlobalTablesConfig, PollingConfig, ProviderConfig, ReplicationVersion,
};

use crate::schema::{
    AttributeDefinition, BillingMode, KeyAttribute, KeyType, TableSchema, Throughput,
};

pub const SOURCE_REGION: &str = "us-east-1";
pub const SERVICE: &str = "orders";
pub const STAGE: &str = "dev";
pub const STACK_NAME: &str = "orders-dev";

/// Account id used in every ARN built by the memory provider.
pub const ACCOUNT_ID: &str = "123456789012";

pub fn table_arn(region: &str, table_name: &str) -> String {
    format!("arn:aws:dynamodb:{region}:{ACCOUNT_ID}:table/{table_name}")
}

/// On-demand table with a single string hash key.
pub fn table_schema(table_name: &str) -> TableSchema {
    TableSchema {
        name: table_name.to_string(),
        key_schema: vec![KeyAttribute {
            name: "pk".to_string(),
            key_type: KeyType::Hash,
        }],
        attribute_definitions: vec![AttributeDefinition {
            name: "pk".to_string(),
            attribute_type: "S".to_string(),
        }],
        billing_mode: BillingMode::PayPerRequest,
        global_secondary_indexes: Vec::new(),
        stream_enabled: true,
    }
}

/// Provisioned variant of [`table_schema`].
pub fn provisioned_table_schema(table_name: &str) -> TableSchema {
    TableSchema {
        billing_mode: BillingMode::Provisioned(Throughput {
            read_capacity_units: 5,
            write_capacity_units: 5,
        }),
        ..table_schema(table_name)
    }
}

/// Deployer configuration for [`STACK_NAME`] in [`SOURCE_REGION`] with fast polling.
pub fn deployer_config(version: ReplicationVersion, regions: &[&str]) -> DeployerConfig {
    DeployerConfig {
        service: SERVICE.to_string(),
        stage: STAGE.to_string(),
        stack_name: None,
        provider: ProviderConfig {
            region: SOURCE_REGION.to_string(),
            endpoint: None,
            timeout_ms: None,
        },
        global_tables: GlobalTablesConfig {
            version,
            regions: regions.iter().map(|region| region.to_string()).collect(),
            create_stack: false,
            template_path: None,
            tags: BTreeMap::new(),
            tables: Vec::new(),
        },
        polling: PollingConfig {
            interval_ms: 1_000,
            max_attempts: Some(30),
        },
    }
}

/// Same as [`deployer_config`] with regional stacks deployed from `template_path`.
pub fn create_stack_config(regions: &[&str], template_path: PathBuf) -> DeployerConfig {
    let mut config = deployer_config(ReplicationVersion::V2017, regions);
    config.global_tables.create_stack = true;
    config.global_tables.template_path = Some(template_path);
    config
}
