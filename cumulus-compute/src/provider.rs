//! Provider abstraction traits.

use async_trait::async_trait;

use crate::error::Result;
use crate::network::{CreateNetworkOptions, Network, NetworkOffering, OfferingFilter};
use crate::options::TemplateOptions;
use crate::types::*;

/// Compute side of a cloud provider.
///
/// Implementations talk to one provider account. Everything above this trait
/// (bulk orchestration, reclamation, template resolution) is provider-agnostic.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    // =========================================================================
    // Metadata & Health
    // =========================================================================

    /// Short provider name (e.g. "mock", "cloudstack").
    fn provider_name(&self) -> &str;

    /// Check that the provider endpoint is reachable with the configured credentials.
    async fn health_check(&self) -> Result<bool>;

    /// Locations the account may launch nodes into.
    async fn list_assignable_locations(&self) -> Result<Vec<Location>>;

    /// Images available to the account.
    async fn list_images(&self) -> Result<Vec<Image>>;

    /// Hardware profiles available to the account.
    async fn list_hardware_profiles(&self) -> Result<Vec<Hardware>>;

    /// Fresh template options carrying this provider's extension type.
    fn default_options(&self) -> TemplateOptions {
        TemplateOptions::new()
    }

    // =========================================================================
    // Node Lifecycle
    // =========================================================================

    /// Create a single node.
    ///
    /// The returned node must carry `spec.group` so it can be found by group.
    /// A node that exists on the provider but failed a later step is reported
    /// as [`ComputeError::BootstrapFailed`](crate::ComputeError::BootstrapFailed).
    async fn create_node(&self, spec: NodeSpec) -> Result<NodeMetadata>;

    /// List every node visible to the account.
    async fn list_nodes(&self) -> Result<Vec<NodeMetadata>>;

    /// Get a node by id.
    async fn get_node(&self, node_id: &str) -> Result<Option<NodeMetadata>>;

    /// Destroy a node.
    ///
    /// Returns [`ComputeError::NodeNotFound`](crate::ComputeError::NodeNotFound)
    /// if the node does not exist.
    async fn destroy_node(&self, node_id: &str) -> Result<()>;
}

/// Network and offering side of a cloud provider.
#[async_trait]
pub trait NetworkProvider: Send + Sync {
    /// List network offerings matching `filter`.
    async fn list_network_offerings(&self, filter: &OfferingFilter) -> Result<Vec<NetworkOffering>>;

    /// Create a network in a zone from an offering.
    async fn create_network_in_zone(
        &self,
        zone_id: &str,
        offering_id: &str,
        name: &str,
        display_text: &str,
        options: &CreateNetworkOptions,
    ) -> Result<Network>;

    /// Delete a network.
    async fn delete_network(&self, network_id: &str) -> Result<()>;

    /// List all networks.
    async fn list_networks(&self) -> Result<Vec<Network>>;
}
