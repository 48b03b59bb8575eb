use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Version of the DynamoDB global tables feature used to link replicas.
///
/// The two versions use unrelated APIs: version 2017.11.29 links independently created tables
/// through a dedicated global table resource, version 2019.11.21 adds replicas directly to the
/// source table.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ReplicationVersion {
    #[default]
    #[serde(rename = "2017.11.29", alias = "v1")]
    V2017,
    #[serde(rename = "2019.11.21", alias = "v2")]
    V2019,
}

impl ReplicationVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicationVersion::V2017 => "2017.11.29",
            ReplicationVersion::V2019 => "2019.11.21",
        }
    }
}

impl fmt::Display for ReplicationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Global table settings: which regions to replicate to and how.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GlobalTablesConfig {
    /// Replication feature version.
    #[serde(default)]
    pub version: ReplicationVersion,
    /// Regions that should hold a replica of every stack table.
    pub regions: Vec<String>,
    /// Deploy the service template into every target region before linking.
    ///
    /// Replica tables are then created by the regional stacks instead of being copied from the
    /// source table.
    #[serde(default)]
    pub create_stack: bool,
    /// Compiled CloudFormation template deployed when `create_stack` is set.
    #[serde(default)]
    pub template_path: Option<PathBuf>,
    /// Tags applied to every replica table.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Restricts replication to these table names. Empty means every stack table.
    #[serde(default)]
    pub tables: Vec<String>,
}

impl GlobalTablesConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.regions.is_empty() {
            return Err(ValidationError::EmptyField(
                "global_tables.regions".to_string(),
            ));
        }

        if self.regions.iter().any(|region| region.trim().is_empty()) {
            return Err(ValidationError::InvalidFieldValue {
                field: "global_tables.regions".to_string(),
                constraint: "region names must not be blank".to_string(),
            });
        }

        if self.create_stack {
            if self.version != ReplicationVersion::V2017 {
                return Err(ValidationError::CreateStackUnsupported {
                    required: ReplicationVersion::V2017.as_str(),
                    actual: self.version.as_str(),
                });
            }

            if self.template_path.is_none() {
                return Err(ValidationError::EmptyField(
                    "global_tables.template_path".to_string(),
                ));
            }
        }

        if self.tags.keys().any(|key| key.is_empty()) {
            return Err(ValidationError::InvalidFieldValue {
                field: "global_tables.tags".to_string(),
                constraint: "tag keys must not be empty".to_string(),
            });
        }

        Ok(())
    }
}
