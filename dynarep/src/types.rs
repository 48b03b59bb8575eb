//! Core value types shared by the resolver, the deployer and the providers.

use std::collections::BTreeMap;
use std::fmt;

/// Tags applied to replica tables.
pub type Tags = BTreeMap<String, String>;

/// Regions currently linked as replicas of a table.
///
/// A snapshot built from a single provider response. It is never cached: every reconciliation
/// fetches a fresh one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicationTopology {
    regions: Vec<String>,
}

impl ReplicationTopology {
    pub fn new<I, S>(regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            regions: regions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, region: &str) -> bool {
        self.regions.iter().any(|r| r == region)
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }
}

impl FromIterator<String> for ReplicationTopology {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// Outcome of diffing requested regions against a [`ReplicationTopology`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionDiffResult {
    /// Regions still lacking a replica, in requested order.
    pub missing_regions: Vec<String>,
    /// `true` when replication already existed and only some regions are missing.
    pub adding_new_regions: bool,
}

impl RegionDiffResult {
    /// Returns `true` when every requested region already replicates.
    pub fn is_noop(&self) -> bool {
        self.missing_regions.is_empty()
    }
}

/// Change to the replica set of a table or of a global table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicaChange {
    Add(String),
    Remove(String),
}

impl ReplicaChange {
    pub fn region(&self) -> &str {
        match self {
            ReplicaChange::Add(region) | ReplicaChange::Remove(region) => region,
        }
    }
}

impl fmt::Display for ReplicaChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicaChange::Add(region) => write!(f, "add replica in {region}"),
            ReplicaChange::Remove(region) => write!(f, "remove replica in {region}"),
        }
    }
}

/// Result of requesting a stack update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackUpdate {
    /// An update is running and must be waited on.
    Started,
    /// The deployed stack already matches the template.
    NoChanges,
}

/// What the deployer did for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableAction {
    /// Replication was set up for the first time.
    Created,
    /// Regions were added to existing replication.
    Updated,
    /// Every requested region already replicated.
    Unchanged,
    /// Replicas were removed.
    Removed,
}

impl fmt::Display for TableAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TableAction::Created => "created",
            TableAction::Updated => "updated",
            TableAction::Unchanged => "unchanged",
            TableAction::Removed => "removed",
        };

        f.write_str(name)
    }
}

/// Per-table entry of a [`DeploySummary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReport {
    pub table_name: String,
    pub action: TableAction,
    pub regions: Vec<String>,
}

/// Summary returned by a deploy or remove run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploySummary {
    /// Regions where the service stack was deployed or deleted.
    pub stack_regions: Vec<String>,
    pub tables: Vec<TableReport>,
}

impl DeploySummary {
    pub fn table(&self, table_name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table_name == table_name)
    }
}
