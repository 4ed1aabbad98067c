//! Local copy of the active breakpoints, indexed two ways.
//!
//! The whole index is rebuilt on every successful poll and published with a
//! single `ArcSwap` store. Readers load one `Arc` and see either the old or
//! the new index, never a mix.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};

use super::definition::{BreakpointDefinition, LabelKey, LocationKey};

#[derive(Debug, Default)]
struct BreakpointIndex {
    count: usize,
    by_label: HashMap<LabelKey, Arc<BreakpointDefinition>>,
    by_location: HashMap<LocationKey, Arc<BreakpointDefinition>>,
}

impl BreakpointIndex {
    /// On duplicate keys the first definition in server order wins.
    fn build(definitions: Vec<BreakpointDefinition>) -> Self {
        let mut index = Self {
            count: definitions.len(),
            ..Self::default()
        };
        for definition in definitions {
            let definition = Arc::new(definition);
            if let Some(key) = definition.label_key() {
                index.by_label.entry(key).or_insert_with(|| definition.clone());
            }
            index
                .by_location
                .entry(definition.location_key())
                .or_insert(definition);
        }
        index
    }
}

/// Lock-free breakpoint lookup shared by every capture call site.
pub struct BreakpointCache {
    index: ArcSwap<BreakpointIndex>,
}

impl BreakpointCache {
    pub fn new() -> Self {
        Self {
            index: ArcSwap::from_pointee(BreakpointIndex::default()),
        }
    }

    /// Replace the entire cache. Anything not in `definitions` is gone.
    pub fn replace(&self, definitions: Vec<BreakpointDefinition>) {
        self.index.store(Arc::new(BreakpointIndex::build(definitions)));
    }

    /// Find a usable definition: label key first, then location key.
    pub fn lookup(
        &self,
        label: Option<&LabelKey>,
        location: &LocationKey,
    ) -> Option<Arc<BreakpointDefinition>> {
        self.lookup_at(label, location, Utc::now())
    }

    pub fn lookup_at(
        &self,
        label: Option<&LabelKey>,
        location: &LocationKey,
        now: DateTime<Utc>,
    ) -> Option<Arc<BreakpointDefinition>> {
        let index = self.index.load();
        let by_label = label
            .and_then(|key| index.by_label.get(key))
            .filter(|bp| bp.is_usable_at(now));
        by_label
            .or_else(|| {
                index
                    .by_location
                    .get(location)
                    .filter(|bp| bp.is_usable_at(now))
            })
            .cloned()
    }

    /// Number of definitions in the last accepted poll response.
    pub fn len(&self) -> usize {
        self.index.load().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BreakpointCache {
    fn default() -> Self {
        Self::new()
    }
}
