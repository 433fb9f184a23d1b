//! Bulk node creation results.
//!
//! A bulk request of N attempts resolves every attempt into exactly one of:
//! a created node, a [`NodeError`], or a skip (no new attempts are issued after
//! a fatal provider error). Partial failure is a normal return value; callers
//! that prefer `?` can convert with [`BulkCreationResult::into_result`].

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thiserror::Error;

use crate::error::ComputeError;
use crate::types::NodeMetadata;

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeError {
    /// 1-based attempt ordinal
    pub ordinal: u32,
    /// Name the node was requested with
    pub name: String,
    /// Id of the node if the provider created it before failing
    pub node_id: Option<String>,
    /// Failure cause
    #[serde(serialize_with = "serialize_cause")]
    pub cause: ComputeError,
}

fn serialize_cause<S: serde::Serializer>(cause: &ComputeError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(cause)
}

/// Resolution of one attempt.
#[derive(Debug, Clone)]
pub(crate) enum Attempt {
    Created(u32, NodeMetadata),
    Failed(NodeError),
    Skipped,
}

/// Overall shape of a bulk result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkOutcome {
    /// Every requested node was created
    Complete,
    /// Some nodes were created, some were not
    Partial,
    /// No node was created
    Failed,
}

/// Outcome of `create_nodes_in_group`.
#[derive(Debug, Clone, Serialize)]
pub struct BulkCreationResult {
    /// Group the nodes were created in
    pub group: String,
    /// Number of nodes requested
    pub requested: u32,
    /// Created nodes, in attempt order
    pub successes: Vec<NodeMetadata>,
    /// Failed attempts keyed by ordinal
    pub errors: BTreeMap<u32, NodeError>,
    /// Attempts never issued because of a fatal provider error
    pub skipped: u32,
}

impl BulkCreationResult {
    pub(crate) fn from_attempts(group: &str, requested: u32, attempts: Vec<Attempt>) -> Self {
        let mut created = BTreeMap::new();
        let mut errors = BTreeMap::new();
        let mut skipped = 0;

        for attempt in attempts {
            match attempt {
                Attempt::Created(ordinal, node) => {
                    created.insert(ordinal, node);
                }
                Attempt::Failed(error) => {
                    errors.insert(error.ordinal, error);
                }
                Attempt::Skipped => skipped += 1,
            }
        }

        Self {
            group: group.to_string(),
            requested,
            successes: created.into_values().collect(),
            errors,
            skipped,
        }
    }

    /// Attempts that reached the provider.
    pub fn attempted(&self) -> u32 {
        (self.successes.len() + self.errors.len()) as u32
    }

    /// Every requested attempt was issued.
    pub fn is_complete(&self) -> bool {
        self.skipped == 0
    }

    /// Every requested node was created.
    pub fn is_success(&self) -> bool {
        self.outcome() == BulkOutcome::Complete
    }

    pub fn outcome(&self) -> BulkOutcome {
        if self.errors.is_empty() && self.skipped == 0 {
            BulkOutcome::Complete
        } else if self.successes.is_empty() {
            BulkOutcome::Failed
        } else {
            BulkOutcome::Partial
        }
    }

    /// The fatal error that stopped new attempts, if any.
    pub fn fatal_error(&self) -> Option<&ComputeError> {
        self.errors
            .values()
            .map(|e| &e.cause)
            .find(|cause| cause.is_fatal())
    }

    /// Ids of every node this request is known to have left on the provider:
    /// the successes plus nodes that failed after being created.
    pub fn nodes_to_reclaim(&self) -> BTreeSet<String> {
        self.successes
            .iter()
            .map(|n| n.id.clone())
            .chain(self.errors.values().filter_map(|e| e.node_id.clone()))
            .collect()
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "{} created, {} failed, {} skipped of {}",
            self.successes.len(),
            self.errors.len(),
            self.skipped,
            self.requested
        )
    }

    /// `Ok` with the nodes when complete, otherwise the partial-failure signal.
    pub fn into_result(self) -> Result<Vec<NodeMetadata>, RunNodesError> {
        if self.is_success() {
            Ok(self.successes)
        } else {
            Err(RunNodesError { result: self })
        }
    }
}

/// Partial-failure signal carrying the full result.
#[derive(Debug, Clone, Error)]
#[error("nodes in group {} not all created: {}", .result.group, .result.summary())]
pub struct RunNodesError {
    pub result: BulkCreationResult,
}

impl RunNodesError {
    pub fn successful_nodes(&self) -> &[NodeMetadata] {
        &self.result.successes
    }

    pub fn node_errors(&self) -> &BTreeMap<u32, NodeError> {
        &self.result.errors
    }
}
