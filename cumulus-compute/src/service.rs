//! Bulk node orchestration and reclamation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::bulk::{Attempt, BulkCreationResult, NodeError};
use crate::config::OrchestratorSettings;
use crate::error::{ComputeError, Result};
use crate::node_store::NodeStore;
use crate::provider::ComputeProvider;
use crate::reclaim::ReclaimReport;
use crate::template::{Template, TemplateBuilder};
use crate::types::{Location, NodeMetadata, NodeSpec};

/// Compute operations exposed by a context.
///
/// Cheap to clone; every clone talks to the same provider and node store.
#[derive(Clone)]
pub struct ComputeService {
    compute: Arc<dyn ComputeProvider>,
    node_store: Arc<dyn NodeStore>,
    settings: OrchestratorSettings,
}

impl ComputeService {
    pub fn new(
        compute: Arc<dyn ComputeProvider>,
        node_store: Arc<dyn NodeStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            compute,
            node_store,
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Start resolving a template against this provider.
    pub fn template_builder(&self) -> TemplateBuilder {
        TemplateBuilder::new(self.compute.clone())
    }

    pub async fn list_assignable_locations(&self) -> Result<Vec<Location>> {
        self.compute.list_assignable_locations().await
    }

    /// Nodes on the provider matching `predicate`.
    pub async fn list_nodes_matching<P>(&self, predicate: P) -> Result<Vec<NodeMetadata>>
    where
        P: Fn(&NodeMetadata) -> bool + Send + Sync,
    {
        let nodes = self.compute.list_nodes().await?;
        Ok(nodes.into_iter().filter(|n| predicate(n)).collect())
    }

    // =========================================================================
    // Bulk creation
    // =========================================================================

    /// Create `count` nodes in `group` from `template`.
    ///
    /// Only invalid arguments produce `Err`. Provider failures are reported
    /// per attempt in the returned result; after a fatal provider error no
    /// further attempts are issued and the remainder is counted as skipped.
    /// Every node created, including nodes that failed after creation, carries
    /// `group` and is recorded in the node store before this returns.
    #[instrument(skip_all, fields(group = %group, count = count, location = %template.location().id))]
    pub async fn create_nodes_in_group(
        &self,
        group: &str,
        count: u32,
        template: &Template,
    ) -> Result<BulkCreationResult> {
        if group.trim().is_empty() {
            return Err(ComputeError::InvalidRequest("group must not be empty".to_string()));
        }
        if count == 0 {
            return Err(ComputeError::InvalidRequest("count must be at least 1".to_string()));
        }

        info!(max_parallel = self.settings.max_parallel, "Creating nodes in group");

        let abort = AtomicBool::new(false);
        let attempts: Vec<Attempt> = stream::iter(1..=count)
            .map(|ordinal| self.attempt(group, ordinal, template, &abort))
            .buffer_unordered(self.settings.max_parallel)
            .collect()
            .await;

        let result = BulkCreationResult::from_attempts(group, count, attempts);

        if result.is_success() {
            info!(summary = %result.summary(), "Nodes created");
        } else {
            warn!(
                summary = %result.summary(),
                outcome = ?result.outcome(),
                "Bulk creation finished with failures"
            );
        }

        Ok(result)
    }

    async fn attempt(&self, group: &str, ordinal: u32, template: &Template, abort: &AtomicBool) -> Attempt {
        if abort.load(Ordering::SeqCst) {
            debug!(ordinal, "Skipping attempt after fatal provider error");
            return Attempt::Skipped;
        }

        let spec = NodeSpec::new(group, ordinal, template.clone());
        let name = spec.name.clone();
        debug!(ordinal, name = %name, "Creating node");

        let created = match tokio::time::timeout(self.settings.node_timeout, self.compute.create_node(spec)).await {
            Ok(result) => result,
            Err(_) => Err(ComputeError::Timeout(format!(
                "creating {} took longer than {}s",
                name,
                self.settings.node_timeout.as_secs()
            ))),
        };

        match created {
            Ok(node) => {
                info!(ordinal, node_id = %node.id, name = %node.name, "Node created");
                self.remember(node.clone());
                Attempt::Created(ordinal, node)
            }
            Err(cause) => {
                if cause.is_fatal() && !abort.swap(true, Ordering::SeqCst) {
                    warn!(ordinal, error = %cause, "Fatal provider error, no further attempts");
                } else {
                    warn!(ordinal, error = %cause, "Node creation failed");
                }

                let node_id = cause.leaked_node_id().map(str::to_string);
                if let Some(id) = &node_id {
                    match self.lookup(id).await {
                        Ok(Some(node)) => self.remember(node),
                        Ok(None) => debug!(node_id = %id, "Failed node already gone"),
                        Err(e) => warn!(node_id = %id, error = %e, "Could not look up failed node"),
                    }
                }

                Attempt::Failed(NodeError {
                    ordinal,
                    name,
                    node_id,
                    cause,
                })
            }
        }
    }

    /// Provider lookup bounded by the node timeout.
    async fn lookup(&self, node_id: &str) -> Result<Option<NodeMetadata>> {
        match tokio::time::timeout(self.settings.node_timeout, self.compute.get_node(node_id)).await {
            Ok(result) => result,
            Err(_) => Err(ComputeError::Timeout(format!(
                "looking up {} took longer than {}s",
                node_id,
                self.settings.node_timeout.as_secs()
            ))),
        }
    }

    fn remember(&self, node: NodeMetadata) {
        let node_id = node.id.clone();
        if let Err(e) = self.node_store.put(node) {
            // The provider listing still finds the node by group.
            warn!(node_id = %node_id, error = %e, "Failed to record node");
        }
    }

    // =========================================================================
    // Reclamation
    // =========================================================================

    /// Destroy every node matching `predicate`.
    ///
    /// Destroys are independent: one failure never stops the others. A node
    /// that is already gone counts as destroyed. A destroy exceeding the node
    /// timeout is reported as failed with `Timeout`. Only a failure to list
    /// nodes fails the whole call.
    #[instrument(skip_all)]
    pub async fn destroy_nodes_matching<P>(&self, predicate: P) -> Result<ReclaimReport>
    where
        P: Fn(&NodeMetadata) -> bool + Send + Sync,
    {
        let matched = self.list_nodes_matching(&predicate).await?;
        info!(matched = matched.len(), "Destroying matching nodes");

        let outcomes: Vec<(String, Result<()>)> = stream::iter(matched)
            .map(|node| async move {
                let result =
                    match tokio::time::timeout(self.settings.node_timeout, self.compute.destroy_node(&node.id)).await {
                        Ok(result) => result,
                        Err(_) => Err(ComputeError::Timeout(format!(
                            "destroying {} took longer than {}s",
                            node.id,
                            self.settings.node_timeout.as_secs()
                        ))),
                    };
                (node.id, result)
            })
            .buffer_unordered(self.settings.max_parallel)
            .collect()
            .await;

        let mut report = ReclaimReport::default();
        for (node_id, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    debug!(node_id = %node_id, "Node destroyed");
                    self.forget(&node_id);
                    report.destroyed.insert(node_id);
                }
                Err(ComputeError::NodeNotFound(_)) => {
                    debug!(node_id = %node_id, "Node already gone");
                    self.forget(&node_id);
                    report.destroyed.insert(node_id);
                }
                Err(e) => {
                    warn!(node_id = %node_id, error = %e, "Failed to destroy node");
                    report.failed.insert(node_id, e);
                }
            }
        }

        self.purge_stale(&predicate).await;

        info!(
            destroyed = report.destroyed.len(),
            failed = report.failed.len(),
            "Reclamation finished"
        );
        Ok(report)
    }

    fn forget(&self, node_id: &str) {
        if let Err(e) = self.node_store.remove(node_id) {
            warn!(node_id = %node_id, error = %e, "Failed to forget node");
        }
    }

    /// Drop stored nodes that match but no longer exist on the provider.
    async fn purge_stale<P>(&self, predicate: &P)
    where
        P: Fn(&NodeMetadata) -> bool + Send + Sync,
    {
        let stored = match self.node_store.list() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to list node store");
                return;
            }
        };

        for node in stored.into_iter().filter(|n| predicate(n)) {
            match self.lookup(&node.id).await {
                Ok(None) => {
                    debug!(node_id = %node.id, "Purging stale node store entry");
                    self.forget(&node.id);
                }
                Ok(Some(_)) => {}
                Err(e) => debug!(node_id = %node.id, error = %e, "Keeping node store entry"),
            }
        }
    }
}
