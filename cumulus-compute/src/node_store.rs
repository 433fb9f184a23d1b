//! Node descriptor stores.
//!
//! A context carries exactly one node store. The orchestrator records every
//! node it provisions (including nodes that failed after creation) and the
//! reclaimer forgets nodes once they are destroyed, so the store always holds
//! the nodes this context may still be responsible for.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ComputeError, Result};
use crate::types::NodeMetadata;

/// Key-value store of node descriptors keyed by node id.
pub trait NodeStore: Send + Sync {
    /// Short name of the backing implementation.
    fn kind(&self) -> &'static str;

    /// Insert or replace a node.
    fn put(&self, node: NodeMetadata) -> Result<()>;

    /// Get a node by id.
    fn get(&self, node_id: &str) -> Result<Option<NodeMetadata>>;

    /// Remove a node, returning it if present.
    fn remove(&self, node_id: &str) -> Result<Option<NodeMetadata>>;

    /// All stored nodes, ordered by id.
    fn list(&self) -> Result<Vec<NodeMetadata>>;
}

fn poisoned() -> ComputeError {
    ComputeError::Internal("Lock poisoned".to_string())
}

// =============================================================================
// IN-MEMORY
// =============================================================================

/// Node store that lives as long as the context.
#[derive(Default)]
pub struct InMemoryNodeStore {
    nodes: RwLock<BTreeMap<String, NodeMetadata>>,
}

impl InMemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeStore for InMemoryNodeStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn put(&self, node: NodeMetadata) -> Result<()> {
        let mut nodes = self.nodes.write().map_err(|_| poisoned())?;
        nodes.insert(node.id.clone(), node);
        Ok(())
    }

    fn get(&self, node_id: &str) -> Result<Option<NodeMetadata>> {
        let nodes = self.nodes.read().map_err(|_| poisoned())?;
        Ok(nodes.get(node_id).cloned())
    }

    fn remove(&self, node_id: &str) -> Result<Option<NodeMetadata>> {
        let mut nodes = self.nodes.write().map_err(|_| poisoned())?;
        Ok(nodes.remove(node_id))
    }

    fn list(&self) -> Result<Vec<NodeMetadata>> {
        let nodes = self.nodes.read().map_err(|_| poisoned())?;
        Ok(nodes.values().cloned().collect())
    }
}

// =============================================================================
// YAML FILE
// =============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct YamlDocument {
    #[serde(default)]
    nodes: BTreeMap<String, NodeMetadata>,
}

/// Node store persisted to a YAML file.
///
/// The whole document is rewritten on every mutation; writes go to a sibling
/// temp file that is then renamed over the original.
pub struct YamlNodeStore {
    path: PathBuf,
    nodes: RwLock<BTreeMap<String, NodeMetadata>>,
}

impl YamlNodeStore {
    /// Open the store at `path`, creating an empty one if the file is missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let document = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                ComputeError::NodeStore(format!("Failed to read {}: {}", path.display(), e))
            })?;
            if content.trim().is_empty() {
                YamlDocument::default()
            } else {
                serde_yaml::from_str(&content).map_err(|e| {
                    ComputeError::NodeStore(format!("Failed to parse {}: {}", path.display(), e))
                })?
            }
        } else {
            YamlDocument::default()
        };

        info!(path = %path.display(), nodes = document.nodes.len(), "Opened YAML node store");

        Ok(Self {
            path,
            nodes: RwLock::new(document.nodes),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, nodes: &BTreeMap<String, NodeMetadata>) -> Result<()> {
        #[derive(Serialize)]
        struct Borrowed<'a> {
            nodes: &'a BTreeMap<String, NodeMetadata>,
        }

        let content = serde_yaml::to_string(&Borrowed { nodes })
            .map_err(|e| ComputeError::NodeStore(format!("Failed to serialize nodes: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ComputeError::NodeStore(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let tmp = self.path.with_extension("yaml.tmp");
        std::fs::write(&tmp, content).map_err(|e| {
            ComputeError::NodeStore(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            ComputeError::NodeStore(format!("Failed to replace {}: {}", self.path.display(), e))
        })?;

        debug!(path = %self.path.display(), nodes = nodes.len(), "Node store flushed");
        Ok(())
    }
}

impl NodeStore for YamlNodeStore {
    fn kind(&self) -> &'static str {
        "yaml"
    }

    fn put(&self, node: NodeMetadata) -> Result<()> {
        let mut nodes = self.nodes.write().map_err(|_| poisoned())?;
        nodes.insert(node.id.clone(), node);
        self.flush(&nodes)
    }

    fn get(&self, node_id: &str) -> Result<Option<NodeMetadata>> {
        let nodes = self.nodes.read().map_err(|_| poisoned())?;
        Ok(nodes.get(node_id).cloned())
    }

    fn remove(&self, node_id: &str) -> Result<Option<NodeMetadata>> {
        let mut nodes = self.nodes.write().map_err(|_| poisoned())?;
        let removed = nodes.remove(node_id);
        if removed.is_some() {
            self.flush(&nodes)?;
        }
        Ok(removed)
    }

    fn list(&self) -> Result<Vec<NodeMetadata>> {
        let nodes = self.nodes.read().map_err(|_| poisoned())?;
        Ok(nodes.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeState;

    fn node(id: &str, group: &str) -> NodeMetadata {
        NodeMetadata {
            id: id.to_string(),
            name: format!("{}-{}", group, id),
            group: group.to_string(),
            state: NodeState::Running,
            location_id: "1".to_string(),
            image_id: "ubuntu-22.04".to_string(),
            hardware_id: "small".to_string(),
            network_ids: Vec::new(),
            private_addresses: vec!["10.0.0.2".to_string()],
            inbound_ports: Vec::new(),
            tags: Default::default(),
            user_metadata: Default::default(),
            key_pair: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryNodeStore::new();
        store.put(node("b", "web")).unwrap();
        store.put(node("a", "web")).unwrap();

        let ids: Vec<_> = store.list().unwrap().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        assert!(store.remove("a").unwrap().is_some());
        assert!(store.remove("a").unwrap().is_none());
        assert!(store.get("a").unwrap().is_none());
    }

    #[test]
    fn test_yaml_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("nodes.yaml");

        {
            let store = YamlNodeStore::open(&path).unwrap();
            store.put(node("n1", "web")).unwrap();
            store.put(node("n2", "db")).unwrap();
            store.remove("n2").unwrap();
        }

        let reopened = YamlNodeStore::open(&path).unwrap();
        let nodes = reopened.list().unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].group, "web");
        assert_eq!(reopened.kind(), "yaml");
    }

    #[test]
    fn test_yaml_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.yaml");
        std::fs::write(&path, "nodes: [not, a, map").unwrap();

        assert!(matches!(
            YamlNodeStore::open(&path),
            Err(ComputeError::NodeStore(_))
        ));
    }
}
