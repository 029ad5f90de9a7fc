//! DiscoveryReport -- aggregated output of a chain-discovery run.
//!
//! The report carries the merged per-entity path map plus every
//! diagnostic the pass raised. Merging two reports is a pure reduce, so
//! corpus partitions scanned separately can be combined at the fan-in
//! barrier.

use facet_core::Diagnostics;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Aggregated navigation-chain discovery result.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryReport {
    /// Distinct non-empty slash paths per entity.
    pub chains: BTreeMap<String, BTreeSet<String>>,
    /// Corpus units scanned.
    pub call_sites_scanned: usize,
    /// Recognized chain uses before merging.
    pub chain_uses: usize,
    pub diagnostics: Diagnostics,
}

impl DiscoveryReport {
    pub fn new() -> DiscoveryReport {
        DiscoveryReport::default()
    }

    pub fn paths_for(&self, entity: &str) -> Option<&BTreeSet<String>> {
        self.chains.get(entity)
    }

    /// Fan-in merge of two partition reports: path sets union,
    /// counters add, diagnostics concatenate.
    pub fn merge(&mut self, other: DiscoveryReport) {
        for (entity, paths) in other.chains {
            self.chains.entry(entity).or_default().extend(paths);
        }
        self.call_sites_scanned += other.call_sites_scanned;
        self.chain_uses += other.chain_uses;
        self.diagnostics.merge(other.diagnostics);
    }
}
