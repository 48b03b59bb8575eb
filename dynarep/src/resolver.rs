//! Region reconciliation.
//!
//! Decides which regions still need a replica of a table and whether the work is a first-time
//! setup or an addition to existing replication.

use std::future::Future;

use dynarep_config::shared::ReplicationVersion;
use tracing::debug;

use crate::error::{DynarepError, DynarepResult};
use crate::types::{RegionDiffResult, ReplicationTopology};

/// Failure of a topology lookup, as seen by the resolver.
///
/// Provider adapters map their error codes onto this closed set so the resolver only ever
/// distinguishes "nothing exists yet" from everything else.
#[derive(Debug, Clone)]
pub enum TopologyLookupError {
    /// The table or global table does not exist yet.
    NotFound,
    /// Any other failure. Propagated unchanged.
    Other(DynarepError),
}

impl From<DynarepError> for TopologyLookupError {
    fn from(err: DynarepError) -> Self {
        if err.is_not_found() {
            TopologyLookupError::NotFound
        } else {
            TopologyLookupError::Other(err)
        }
    }
}

/// How an existing topology is compared with the requested regions.
///
/// The two strategies differ on purpose and are kept apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffStrategy {
    /// Membership of a dedicated global table, compared with the source region plus the
    /// requested regions. Used by version 2017.11.29.
    GlobalTableDescriptor,
    /// Replicas listed by the table itself, compared with the requested regions only. The source
    /// region is always part of the table and never reported missing. Used by version 2019.11.21.
    TableReplicas,
}

impl From<ReplicationVersion> for DiffStrategy {
    fn from(version: ReplicationVersion) -> Self {
        match version {
            ReplicationVersion::V2017 => DiffStrategy::GlobalTableDescriptor,
            ReplicationVersion::V2019 => DiffStrategy::TableReplicas,
        }
    }
}

/// Computes the regions still missing a replica.
#[derive(Debug, Clone)]
pub struct RegionDiffResolver {
    source_region: String,
    strategy: DiffStrategy,
}

impl RegionDiffResolver {
    pub fn new(source_region: impl Into<String>, strategy: DiffStrategy) -> Self {
        Self {
            source_region: source_region.into(),
            strategy,
        }
    }

    pub fn strategy(&self) -> DiffStrategy {
        self.strategy
    }

    /// Looks up the current topology and diffs it against `requested_regions`.
    ///
    /// A [`TopologyLookupError::NotFound`] lookup and an empty topology are both a first-time
    /// setup: every requested region is missing and `adding_new_regions` is `false`. Any other
    /// lookup failure is returned as is. The lookup is the only side effect.
    pub async fn resolve<F, Fut>(
        &self,
        requested_regions: &[String],
        topology_lookup: F,
    ) -> DynarepResult<RegionDiffResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ReplicationTopology, TopologyLookupError>>,
    {
        let topology = match topology_lookup().await {
            Ok(topology) => topology,
            Err(TopologyLookupError::NotFound) => ReplicationTopology::empty(),
            Err(TopologyLookupError::Other(err)) => return Err(err),
        };

        let result = self.diff(requested_regions, &topology);

        debug!(
            source_region = %self.source_region,
            strategy = ?self.strategy,
            existing = ?topology.regions(),
            missing = ?result.missing_regions,
            adding_new_regions = result.adding_new_regions,
            "resolved replica regions"
        );

        Ok(result)
    }

    /// Diffs `requested_regions` against an already fetched topology.
    ///
    /// Duplicates are reported once. With [`DiffStrategy::TableReplicas`] the source region is
    /// never missing. With [`DiffStrategy::GlobalTableDescriptor`] the source region is missing
    /// only from an existing global table; an initial setup creates it alongside the requested
    /// regions.
    pub fn diff(
        &self,
        requested_regions: &[String],
        topology: &ReplicationTopology,
    ) -> RegionDiffResult {
        let initial_setup = topology.is_empty();

        let mut missing_regions: Vec<String> = Vec::new();
        for region in self.compared_regions(requested_regions, initial_setup) {
            if topology.contains(region) || missing_regions.iter().any(|r| r == region) {
                continue;
            }

            missing_regions.push(region.to_string());
        }

        let adding_new_regions = !initial_setup && !missing_regions.is_empty();

        RegionDiffResult {
            missing_regions,
            adding_new_regions,
        }
    }

    /// Regions the topology must contain, in comparison order.
    fn compared_regions<'a>(
        &'a self,
        requested_regions: &'a [String],
        initial_setup: bool,
    ) -> Box<dyn Iterator<Item = &'a str> + 'a> {
        let requested = requested_regions.iter().map(String::as_str);
        match self.strategy {
            DiffStrategy::GlobalTableDescriptor if initial_setup => Box::new(requested),
            DiffStrategy::GlobalTableDescriptor => {
                Box::new(std::iter::once(self.source_region.as_str()).chain(requested))
            }
            DiffStrategy::TableReplicas => {
                Box::new(requested.filter(move |region| *region != self.source_region))
            }
        }
    }
}
