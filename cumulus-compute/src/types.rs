//! Type definitions for nodes, locations and provisioning requests.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::template::Template;

// =============================================================================
// NODES
// =============================================================================

/// Node lifecycle state as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    /// Accepted by the provider, not yet running
    #[default]
    Pending,
    /// Running
    Running,
    /// Suspended (stopped, still allocated)
    Suspended,
    /// Terminated, about to disappear from listings
    Terminated,
    /// Provider reports an error state
    Error,
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeState::Pending => write!(f, "pending"),
            NodeState::Running => write!(f, "running"),
            NodeState::Suspended => write!(f, "suspended"),
            NodeState::Terminated => write!(f, "terminated"),
            NodeState::Error => write!(f, "error"),
        }
    }
}

/// A provisioned compute resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Provider-assigned identifier
    pub id: String,
    /// Node name
    pub name: String,
    /// Group the node was created in
    pub group: String,
    /// Lifecycle state
    pub state: NodeState,
    /// Location the node runs in
    pub location_id: String,
    /// Image the node was built from
    pub image_id: String,
    /// Hardware profile
    pub hardware_id: String,
    /// Networks the node is attached to
    #[serde(default)]
    pub network_ids: Vec<String>,
    /// Private addresses
    #[serde(default)]
    pub private_addresses: Vec<String>,
    /// Ports open for inbound traffic
    #[serde(default)]
    pub inbound_ports: Vec<u16>,
    /// Tags applied at creation
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// User metadata applied at creation
    #[serde(default)]
    pub user_metadata: BTreeMap<String, String>,
    /// Key pair installed on the node
    #[serde(default)]
    pub key_pair: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl NodeMetadata {
    /// Whether the node belongs to `group`.
    pub fn in_group(&self, group: &str) -> bool {
        self.group == group
    }
}

// =============================================================================
// LOCATIONS, IMAGES, HARDWARE
// =============================================================================

/// Scope of a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LocationScope {
    Provider,
    Region,
    #[default]
    Zone,
    Host,
}

/// A place nodes can be launched into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Provider identifier (e.g. zone id)
    pub id: String,
    /// Human-readable description
    pub description: String,
    /// Location scope
    pub scope: LocationScope,
}

impl Location {
    /// Create a zone-scoped location.
    pub fn zone(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            scope: LocationScope::Zone,
        }
    }
}

/// A bootable image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Image identifier
    pub id: String,
    /// Image name
    pub name: String,
    /// Operating system family (e.g. "ubuntu")
    pub os_family: String,
}

/// A hardware profile (service offering, flavor, size).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hardware {
    /// Profile identifier
    pub id: String,
    /// Profile name
    pub name: String,
    /// Virtual CPUs
    pub cpus: u32,
    /// Memory in MiB
    pub memory_mib: u64,
}

// =============================================================================
// PROVISIONING REQUESTS
// =============================================================================

/// A single node creation attempt handed to a provider.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    /// Name for the new node
    pub name: String,
    /// Group the node is created in
    pub group: String,
    /// 1-based attempt ordinal within the bulk request
    pub ordinal: u32,
    /// Fully resolved template
    pub template: Template,
}

impl NodeSpec {
    /// Build the spec for attempt `ordinal` of `group`.
    pub fn new(group: &str, ordinal: u32, template: Template) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self {
            name: format!("{}-{}-{}", group, ordinal, &suffix[..8]),
            group: group.to_string(),
            ordinal,
            template,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_state_display() {
        assert_eq!(NodeState::Running.to_string(), "running");
        assert_eq!(NodeState::default(), NodeState::Pending);
    }

    #[test]
    fn test_node_metadata_yaml() {
        let yaml = r#"
id: node-1
name: web-1-abcd
group: web
state: running
location_id: zone-1
image_id: ubuntu-22.04
hardware_id: small
created_at: 2024-01-01T00:00:00Z
"#;
        let node: NodeMetadata = serde_yaml::from_str(yaml).expect("parse node");
        assert_eq!(node.state, NodeState::Running);
        assert!(node.in_group("web"));
        assert!(node.network_ids.is_empty());
    }
}
