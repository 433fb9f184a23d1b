//! Node predicates and reclamation reports.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::ComputeError;

/// Outcome of `destroy_nodes_matching`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReclaimReport {
    /// Nodes that are gone, including ones that disappeared before we got to them
    pub destroyed: BTreeSet<String>,
    /// Nodes that could not be destroyed
    #[serde(serialize_with = "serialize_failures")]
    pub failed: BTreeMap<String, ComputeError>,
}

fn serialize_failures<S: serde::Serializer>(
    failed: &BTreeMap<String, ComputeError>,
    s: S,
) -> Result<S::Ok, S::Error> {
    s.collect_map(failed.iter().map(|(id, cause)| (id, cause.to_string())))
}

impl ReclaimReport {
    /// Every matched node is gone.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of nodes the predicate matched.
    pub fn matched(&self) -> usize {
        self.destroyed.len() + self.failed.len()
    }
}

/// Ready-made node matchers.
///
/// Every matcher is a plain `Fn(&NodeMetadata) -> bool` closure, so ad-hoc
/// closures work anywhere these do.
pub mod predicates {
    use std::collections::BTreeSet;

    use crate::types::{NodeMetadata, NodeState};

    /// Nodes in `group`.
    pub fn in_group(group: impl Into<String>) -> impl Fn(&NodeMetadata) -> bool + Clone + Send + Sync {
        let group = group.into();
        move |node| node.group == group
    }

    /// Nodes whose id is in `ids`.
    pub fn with_ids<I, S>(ids: I) -> impl Fn(&NodeMetadata) -> bool + Clone + Send + Sync
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: BTreeSet<String> = ids.into_iter().map(Into::into).collect();
        move |node| ids.contains(&node.id)
    }

    /// Nodes in `state`.
    pub fn in_state(state: NodeState) -> impl Fn(&NodeMetadata) -> bool + Clone + Send + Sync {
        move |node| node.state == state
    }

    /// Every node.
    pub fn all() -> impl Fn(&NodeMetadata) -> bool + Clone + Send + Sync {
        |_| true
    }

    /// Both predicates match.
    pub fn and<A, B>(a: A, b: B) -> impl Fn(&NodeMetadata) -> bool + Clone + Send + Sync
    where
        A: Fn(&NodeMetadata) -> bool + Clone + Send + Sync,
        B: Fn(&NodeMetadata) -> bool + Clone + Send + Sync,
    {
        move |node| a(node) && b(node)
    }

    /// The predicate does not match.
    pub fn not<A>(a: A) -> impl Fn(&NodeMetadata) -> bool + Clone + Send + Sync
    where
        A: Fn(&NodeMetadata) -> bool + Clone + Send + Sync,
    {
        move |node| !a(node)
    }
}
