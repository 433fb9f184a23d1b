//! Mock cloud provider for testing and development.

use async_trait::async_trait;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::Properties;
use crate::context::{LoginCredentials, ProviderFactory};
use crate::error::{ComputeError, Result};
use crate::module::{Capability, Module, Wiring};
use crate::network::{CreateNetworkOptions, Network, NetworkOffering, OfferingFilter};
use crate::options::TemplateOptions;
use crate::provider::{ComputeProvider, NetworkProvider};
use crate::types::*;

/// Options only the mock provider understands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockTemplateOptions {
    /// Network every node is attached to
    pub network_id: Option<String>,
    /// Key pair installed on the node
    pub key_pair: Option<String>,
}

impl MockTemplateOptions {
    pub fn network_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.network_id = Some(id.into());
        self
    }

    pub fn key_pair(&mut self, name: impl Into<String>) -> &mut Self {
        self.key_pair = Some(name.into());
        self
    }
}

/// Failure injected into a single creation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    /// Refuse to create the node
    Reject(String),
    /// Create the node, then fail; the node stays behind in `Error` state
    Bootstrap(String),
    /// Never answer
    Hang,
}

#[derive(Default)]
struct Faults {
    attempts: HashMap<u32, MockFailure>,
    destroy: HashMap<String, String>,
    hung_destroys: HashSet<String>,
    quota: Option<usize>,
    auth_failure: bool,
    create_delay: Duration,
    attempt_delays: HashMap<u32, Duration>,
}

/// Mock cloud provider.
///
/// Keeps nodes and networks in memory. Two zones, two images and three
/// hardware profiles are always available. Failures can be injected per
/// attempt ordinal, per node destroy, or account-wide (quota, credentials).
pub struct MockProvider {
    nodes: RwLock<HashMap<String, NodeMetadata>>,
    networks: RwLock<HashMap<String, Network>>,
    faults: RwLock<Faults>,
    next_address: AtomicU32,
}

impl MockProvider {
    /// Create a new mock provider.
    pub fn new() -> Self {
        info!("Creating mock cloud provider");
        Self {
            nodes: RwLock::new(HashMap::new()),
            networks: RwLock::new(HashMap::new()),
            faults: RwLock::new(Faults::default()),
            next_address: AtomicU32::new(2),
        }
    }

    /// Fail the attempt with `ordinal` in every later bulk request.
    pub fn fail_attempt(&self, ordinal: u32, failure: MockFailure) -> Result<()> {
        self.faults_mut()?.attempts.insert(ordinal, failure);
        Ok(())
    }

    /// Make destroying `node_id` fail.
    pub fn fail_destroy(&self, node_id: impl Into<String>, reason: impl Into<String>) -> Result<()> {
        self.faults_mut()?.destroy.insert(node_id.into(), reason.into());
        Ok(())
    }

    /// Make destroying `node_id` never answer.
    pub fn hang_destroy(&self, node_id: impl Into<String>) -> Result<()> {
        self.faults_mut()?.hung_destroys.insert(node_id.into());
        Ok(())
    }

    /// Limit the number of live nodes; `None` removes the limit.
    pub fn set_quota(&self, quota: Option<usize>) -> Result<()> {
        self.faults_mut()?.quota = quota;
        Ok(())
    }

    /// Reject every call as if the credentials were revoked.
    pub fn set_auth_failure(&self, fail: bool) -> Result<()> {
        self.faults_mut()?.auth_failure = fail;
        Ok(())
    }

    /// Delay every node creation.
    pub fn set_create_delay(&self, delay: Duration) -> Result<()> {
        self.faults_mut()?.create_delay = delay;
        Ok(())
    }

    /// Delay the attempt with `ordinal`, overriding the delay for every creation.
    pub fn set_attempt_delay(&self, ordinal: u32, delay: Duration) -> Result<()> {
        self.faults_mut()?.attempt_delays.insert(ordinal, delay);
        Ok(())
    }

    /// Remove every injected failure.
    pub fn clear_failures(&self) -> Result<()> {
        *self.faults_mut()? = Faults::default();
        Ok(())
    }

    /// Number of nodes currently on the provider.
    pub fn node_count(&self) -> Result<usize> {
        Ok(self.read_nodes()?.len())
    }

    /// Number of networks currently on the provider.
    pub fn network_count(&self) -> Result<usize> {
        let networks = self.networks.read().map_err(|_| {
            ComputeError::Internal("Lock poisoned".to_string())
        })?;
        Ok(networks.len())
    }

    fn faults_mut(&self) -> Result<std::sync::RwLockWriteGuard<'_, Faults>> {
        self.faults.write().map_err(|_| {
            ComputeError::Internal("Lock poisoned".to_string())
        })
    }

    fn read_nodes(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, NodeMetadata>>> {
        self.nodes.read().map_err(|_| {
            ComputeError::Internal("Lock poisoned".to_string())
        })
    }

    fn check_auth(&self) -> Result<()> {
        let faults = self.faults.read().map_err(|_| {
            ComputeError::Internal("Lock poisoned".to_string())
        })?;
        if faults.auth_failure {
            return Err(ComputeError::AuthenticationFailed("invalid api key".to_string()));
        }
        Ok(())
    }

    fn zones() -> Vec<Location> {
        vec![Location::zone("1", "Zone 1"), Location::zone("2", "Zone 2")]
    }

    fn offerings() -> Vec<NetworkOffering> {
        vec![
            NetworkOffering {
                id: "1".to_string(),
                name: "DefaultIsolatedNetworkOffering".to_string(),
                specify_vlan: false,
                zone_ids: vec!["1".to_string(), "2".to_string()],
            },
            NetworkOffering {
                id: "2".to_string(),
                name: "DefaultSharedNetworkOffering".to_string(),
                specify_vlan: true,
                zone_ids: vec!["1".to_string(), "2".to_string()],
            },
            NetworkOffering {
                id: "3".to_string(),
                name: "Zone2VlanOffering".to_string(),
                specify_vlan: true,
                zone_ids: vec!["2".to_string()],
            },
        ]
    }

    /// Mock fields carried by `options`; plain options count as empty.
    fn mock_options(options: &TemplateOptions) -> Result<MockTemplateOptions> {
        if options.extension_type() == "none" {
            return Ok(MockTemplateOptions::default());
        }
        options.as_provider::<MockTemplateOptions>().cloned()
    }

    fn next_private_address(&self) -> String {
        let n = self.next_address.fetch_add(1, Ordering::SeqCst);
        format!("10.1.{}.{}", n / 256, n % 256)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComputeProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn health_check(&self) -> Result<bool> {
        self.check_auth()?;
        Ok(true)
    }

    async fn list_assignable_locations(&self) -> Result<Vec<Location>> {
        self.check_auth()?;
        Ok(Self::zones())
    }

    async fn list_images(&self) -> Result<Vec<Image>> {
        self.check_auth()?;
        Ok(vec![
            Image {
                id: "ubuntu-22.04".to_string(),
                name: "Ubuntu 22.04 LTS".to_string(),
                os_family: "ubuntu".to_string(),
            },
            Image {
                id: "debian-12".to_string(),
                name: "Debian 12".to_string(),
                os_family: "debian".to_string(),
            },
        ])
    }

    async fn list_hardware_profiles(&self) -> Result<Vec<Hardware>> {
        self.check_auth()?;
        Ok(vec![
            Hardware {
                id: "small".to_string(),
                name: "Small Instance".to_string(),
                cpus: 1,
                memory_mib: 1024,
            },
            Hardware {
                id: "medium".to_string(),
                name: "Medium Instance".to_string(),
                cpus: 2,
                memory_mib: 2048,
            },
            Hardware {
                id: "large".to_string(),
                name: "Large Instance".to_string(),
                cpus: 4,
                memory_mib: 4096,
            },
        ])
    }

    fn default_options(&self) -> TemplateOptions {
        TemplateOptions::with_extension(MockTemplateOptions::default())
    }

    #[instrument(skip(self, spec), fields(name = %spec.name, ordinal = spec.ordinal))]
    async fn create_node(&self, spec: NodeSpec) -> Result<NodeMetadata> {
        debug!("Creating mock node");

        let (failure, quota, delay) = {
            let faults = self.faults.read().map_err(|_| {
                ComputeError::Internal("Lock poisoned".to_string())
            })?;
            if faults.auth_failure {
                return Err(ComputeError::AuthenticationFailed("invalid api key".to_string()));
            }
            let delay = faults
                .attempt_delays
                .get(&spec.ordinal)
                .copied()
                .unwrap_or(faults.create_delay);
            (faults.attempts.get(&spec.ordinal).cloned(), faults.quota, delay)
        };

        let options = Self::mock_options(spec.template.options())?;
        if let Some(network_id) = &options.network_id {
            let networks = self.networks.read().map_err(|_| {
                ComputeError::Internal("Lock poisoned".to_string())
            })?;
            if !networks.contains_key(network_id) {
                return Err(ComputeError::NetworkNotFound(network_id.clone()));
            }
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match &failure {
            Some(MockFailure::Hang) => {
                warn!("Injected hang");
                return futures::future::pending().await;
            }
            Some(MockFailure::Reject(reason)) => {
                return Err(ComputeError::CreateFailed(reason.clone()));
            }
            _ => {}
        }

        let template_options = spec.template.options();
        let state = if template_options.block_until_running {
            NodeState::Running
        } else {
            NodeState::Pending
        };

        let mut node = NodeMetadata {
            id: uuid::Uuid::new_v4().to_string(),
            name: spec.name.clone(),
            group: spec.group.clone(),
            state,
            location_id: spec.template.location().id.clone(),
            image_id: spec.template.image().id.clone(),
            hardware_id: spec.template.hardware().id.clone(),
            network_ids: options.network_id.into_iter().collect(),
            private_addresses: vec![self.next_private_address()],
            inbound_ports: template_options.inbound_ports.clone(),
            tags: template_options.tags.clone(),
            user_metadata: template_options.user_metadata.clone(),
            key_pair: options.key_pair,
            created_at: chrono::Utc::now(),
        };

        let bootstrap_failure = match failure {
            Some(MockFailure::Bootstrap(reason)) => {
                node.state = NodeState::Error;
                Some(reason)
            }
            _ => None,
        };

        {
            let mut nodes = self.nodes.write().map_err(|_| {
                ComputeError::Internal("Lock poisoned".to_string())
            })?;
            if let Some(limit) = quota {
                if nodes.len() >= limit {
                    return Err(ComputeError::QuotaExceeded(format!(
                        "instance limit of {} reached",
                        limit
                    )));
                }
            }
            nodes.insert(node.id.clone(), node.clone());
        }

        if let Some(reason) = bootstrap_failure {
            warn!(node_id = %node.id, "Injected bootstrap failure");
            return Err(ComputeError::BootstrapFailed {
                node_id: node.id,
                reason,
            });
        }

        info!(node_id = %node.id, "Mock node created");
        Ok(node)
    }

    async fn list_nodes(&self) -> Result<Vec<NodeMetadata>> {
        self.check_auth()?;
        let nodes = self.read_nodes()?;
        let mut result: Vec<NodeMetadata> = nodes.values().cloned().collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));

        debug!(count = result.len(), "Listed nodes");
        Ok(result)
    }

    async fn get_node(&self, node_id: &str) -> Result<Option<NodeMetadata>> {
        self.check_auth()?;
        Ok(self.read_nodes()?.get(node_id).cloned())
    }

    #[instrument(skip(self), fields(node_id = %node_id))]
    async fn destroy_node(&self, node_id: &str) -> Result<()> {
        debug!("Destroying mock node");

        let hang = {
            let faults = self.faults.read().map_err(|_| {
                ComputeError::Internal("Lock poisoned".to_string())
            })?;
            if faults.auth_failure {
                return Err(ComputeError::AuthenticationFailed("invalid api key".to_string()));
            }
            if let Some(reason) = faults.destroy.get(node_id) {
                return Err(ComputeError::DestroyFailed(format!("{}: {}", node_id, reason)));
            }
            faults.hung_destroys.contains(node_id)
        };

        if hang {
            warn!("Injected destroy hang");
            return futures::future::pending().await;
        }

        let mut nodes = self.nodes.write().map_err(|_| {
            ComputeError::Internal("Lock poisoned".to_string())
        })?;
        nodes
            .remove(node_id)
            .ok_or_else(|| ComputeError::NodeNotFound(node_id.to_string()))?;

        info!("Mock node destroyed");
        Ok(())
    }
}

#[async_trait]
impl NetworkProvider for MockProvider {
    async fn list_network_offerings(&self, filter: &OfferingFilter) -> Result<Vec<NetworkOffering>> {
        self.check_auth()?;
        Ok(Self::offerings()
            .into_iter()
            .filter(|o| filter.matches(o))
            .collect())
    }

    #[instrument(skip(self, display_text, options), fields(zone = %zone_id, offering = %offering_id))]
    async fn create_network_in_zone(
        &self,
        zone_id: &str,
        offering_id: &str,
        name: &str,
        display_text: &str,
        options: &CreateNetworkOptions,
    ) -> Result<Network> {
        self.check_auth()?;
        options.validate()?;

        if !Self::zones().iter().any(|z| z.id == zone_id) {
            return Err(ComputeError::NetworkFailed(format!("unknown zone {}", zone_id)));
        }

        let offering = Self::offerings()
            .into_iter()
            .find(|o| o.id == offering_id)
            .ok_or_else(|| ComputeError::NetworkFailed(format!("unknown offering {}", offering_id)))?;

        if !offering.zone_ids.iter().any(|z| z == zone_id) {
            return Err(ComputeError::NetworkFailed(format!(
                "offering {} is not available in zone {}",
                offering_id, zone_id
            )));
        }
        if offering.specify_vlan && options.vlan.is_none() {
            return Err(ComputeError::InvalidRequest(format!(
                "offering {} requires a vlan",
                offering.name
            )));
        }

        let network = Network {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            display_text: display_text.to_string(),
            zone_id: zone_id.to_string(),
            offering_id: offering_id.to_string(),
            addressing: options.clone(),
        };

        let mut networks = self.networks.write().map_err(|_| {
            ComputeError::Internal("Lock poisoned".to_string())
        })?;
        networks.insert(network.id.clone(), network.clone());

        info!(network_id = %network.id, "Mock network created");
        Ok(network)
    }

    #[instrument(skip(self), fields(network_id = %network_id))]
    async fn delete_network(&self, network_id: &str) -> Result<()> {
        self.check_auth()?;

        let in_use = self
            .read_nodes()?
            .values()
            .filter(|n| n.network_ids.iter().any(|id| id == network_id))
            .count();
        if in_use > 0 {
            return Err(ComputeError::NetworkFailed(format!(
                "network {} still has {} node(s) attached",
                network_id, in_use
            )));
        }

        let mut networks = self.networks.write().map_err(|_| {
            ComputeError::Internal("Lock poisoned".to_string())
        })?;
        networks
            .remove(network_id)
            .ok_or_else(|| ComputeError::NetworkNotFound(network_id.to_string()))?;

        info!("Mock network deleted");
        Ok(())
    }

    async fn list_networks(&self) -> Result<Vec<Network>> {
        self.check_auth()?;
        let networks = self.networks.read().map_err(|_| {
            ComputeError::Internal("Lock poisoned".to_string())
        })?;
        Ok(networks.values().cloned().collect())
    }
}

// =============================================================================
// CONTEXT WIRING
// =============================================================================

/// Login identity for the mock provider.
///
/// Read from `mock.identity`, `mock.credential` and optionally `mock.endpoint`.
#[derive(Debug, Clone)]
pub struct MockCredentials {
    pub identity: String,
    pub credential: String,
    pub endpoint: Option<String>,
}

impl LoginCredentials for MockCredentials {
    fn from_properties(properties: &Properties) -> Result<Self> {
        Ok(Self {
            identity: properties.require("mock.identity")?.to_string(),
            credential: properties.require("mock.credential")?.to_string(),
            endpoint: properties.get("mock.endpoint").map(str::to_string),
        })
    }
}

/// Context factory for the mock provider.
#[derive(Default)]
pub struct MockProviderFactory {
    provider: Option<Arc<MockProvider>>,
}

impl MockProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire contexts to an existing provider instead of a fresh one.
    pub fn with_provider(provider: Arc<MockProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }
}

impl ProviderFactory for MockProviderFactory {
    type Credentials = MockCredentials;

    fn provider_name(&self) -> &str {
        "mock"
    }

    fn context_module(&self, credentials: MockCredentials, _properties: &Properties) -> Result<Arc<dyn Module>> {
        info!(
            identity = %credentials.identity,
            endpoint = credentials.endpoint.as_deref().unwrap_or("local"),
            "Using mock provider"
        );
        let provider = self
            .provider
            .clone()
            .unwrap_or_else(|| Arc::new(MockProvider::new()));
        Ok(Arc::new(MockComputeModule { provider }))
    }
}

/// Binds a [`MockProvider`] as both compute and network provider.
pub struct MockComputeModule {
    provider: Arc<MockProvider>,
}

impl MockComputeModule {
    pub fn provider(&self) -> &Arc<MockProvider> {
        &self.provider
    }
}

impl Module for MockComputeModule {
    fn name(&self) -> &str {
        "mock-compute"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Compute, Capability::Network]
    }

    fn configure(&self, wiring: &mut Wiring) -> Result<()> {
        wiring.bind_compute(self.provider.clone());
        wiring.bind_network(self.provider.clone());
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
