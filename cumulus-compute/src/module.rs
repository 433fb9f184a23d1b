//! Configuration modules and module composition.
//!
//! A context is wired by applying an ordered [`ModuleSet`] to a [`Wiring`]
//! table. Each module binds the slots it is responsible for; a later module
//! replaces whatever an earlier one bound in the same slot.
//!
//! ```text
//! ┌──────────────────────┐   ┌──────────────────┐   ┌───────────────────────┐
//! │ ComputeServiceModule │ → │ provider module  │ → │ caller modules ...    │
//! └──────────────────────┘   └──────────────────┘   └───────────┬───────────┘
//!                                                               │ compose()
//!                                                               ▼
//!                                              default node store, only if no
//!                                              module declares Capability::NodeStore
//! ```

use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::config::{OrchestratorSettings, Properties};
use crate::error::Result;
use crate::node_store::{InMemoryNodeStore, NodeStore, YamlNodeStore};
use crate::provider::{ComputeProvider, NetworkProvider};

/// What a module contributes to a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Binds the node store. At most one module per set carries this marker.
    NodeStore,
    /// Binds a compute provider
    Compute,
    /// Binds a network provider
    Network,
    /// Binds orchestration settings
    Service,
}

/// A unit of configuration wiring.
pub trait Module: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Capabilities this module declares.
    fn capabilities(&self) -> &'static [Capability] {
        &[]
    }

    /// Bind this module's slots.
    fn configure(&self, wiring: &mut Wiring) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}

/// Whether `module` declares the node-store marker.
pub fn has_node_store_marker(module: &dyn Module) -> bool {
    module.capabilities().contains(&Capability::NodeStore)
}

/// Binding table filled in by modules.
pub struct Wiring {
    properties: Properties,
    compute: Option<Arc<dyn ComputeProvider>>,
    network: Option<Arc<dyn NetworkProvider>>,
    node_store: Option<Arc<dyn NodeStore>>,
    settings: Option<OrchestratorSettings>,
}

impl Wiring {
    pub fn new(properties: Properties) -> Self {
        Self {
            properties,
            compute: None,
            network: None,
            node_store: None,
            settings: None,
        }
    }

    /// Properties the context is being built from.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn bind_compute(&mut self, provider: Arc<dyn ComputeProvider>) {
        self.compute = Some(provider);
    }

    pub fn bind_network(&mut self, provider: Arc<dyn NetworkProvider>) {
        self.network = Some(provider);
    }

    pub fn bind_node_store(&mut self, store: Arc<dyn NodeStore>) {
        self.node_store = Some(store);
    }

    pub fn bind_settings(&mut self, settings: OrchestratorSettings) {
        self.settings = Some(settings);
    }

    pub fn compute(&self) -> Option<&Arc<dyn ComputeProvider>> {
        self.compute.as_ref()
    }

    pub fn network(&self) -> Option<&Arc<dyn NetworkProvider>> {
        self.network.as_ref()
    }

    pub fn node_store(&self) -> Option<&Arc<dyn NodeStore>> {
        self.node_store.as_ref()
    }

    pub fn settings(&self) -> Option<&OrchestratorSettings> {
        self.settings.as_ref()
    }
}

// =============================================================================
// MODULE SET
// =============================================================================

/// Ordered sequence of modules.
#[derive(Clone, Default)]
pub struct ModuleSet {
    modules: Vec<Arc<dyn Module>>,
}

impl ModuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, module: Arc<dyn Module>) {
        self.modules.push(module);
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Module>> {
        self.modules.iter()
    }

    /// Module names in order.
    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    /// Modules carrying the node-store marker.
    pub fn node_store_modules(&self) -> impl Iterator<Item = &Arc<dyn Module>> {
        self.modules.iter().filter(|m| has_node_store_marker(&***m))
    }

    /// Apply every module to `wiring`, in order.
    pub fn configure(&self, wiring: &mut Wiring) -> Result<()> {
        for module in &self.modules {
            debug!(module = %module.name(), capabilities = ?module.capabilities(), "Configuring module");
            module.configure(wiring)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ModuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl FromIterator<Arc<dyn Module>> for ModuleSet {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Module>>>(iter: I) -> Self {
        Self {
            modules: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ModuleSet {
    type Item = Arc<dyn Module>;
    type IntoIter = std::vec::IntoIter<Arc<dyn Module>>;

    fn into_iter(self) -> Self::IntoIter {
        self.modules.into_iter()
    }
}

/// Finalize node-store selection for `modules`.
///
/// If any module already declares [`Capability::NodeStore`] the sequence is
/// returned unchanged and `default_node_store` is never called. Otherwise the
/// module it returns is appended.
pub fn compose<I, F>(modules: I, default_node_store: F) -> ModuleSet
where
    I: IntoIterator<Item = Arc<dyn Module>>,
    F: FnOnce() -> Arc<dyn Module>,
{
    let mut set: ModuleSet = modules.into_iter().collect();

    let supplied = set.node_store_modules().next().map(|m| m.name().to_string());
    if let Some(name) = supplied {
        debug!(module = %name, "Node store supplied by caller");
        return set;
    }

    let default = default_node_store();
    debug!(module = %default.name(), "Adding default node store module");
    set.push(default);
    set
}

// =============================================================================
// BUILT-IN MODULES
// =============================================================================

/// Generic service module: binds orchestration settings from properties.
#[derive(Debug, Default)]
pub struct ComputeServiceModule;

impl Module for ComputeServiceModule {
    fn name(&self) -> &str {
        "compute-service"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Service]
    }

    fn configure(&self, wiring: &mut Wiring) -> Result<()> {
        let settings = OrchestratorSettings::from_properties(wiring.properties())?;
        wiring.bind_settings(settings);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Binds a fresh [`InMemoryNodeStore`].
#[derive(Debug, Default)]
pub struct InMemoryNodeStoreModule;

impl Module for InMemoryNodeStoreModule {
    fn name(&self) -> &str {
        "memory-node-store"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::NodeStore]
    }

    fn configure(&self, wiring: &mut Wiring) -> Result<()> {
        wiring.bind_node_store(Arc::new(InMemoryNodeStore::new()));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Binds a [`YamlNodeStore`] at a fixed path.
#[derive(Debug)]
pub struct YamlNodeStoreModule {
    path: PathBuf,
}

impl YamlNodeStoreModule {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Module for YamlNodeStoreModule {
    fn name(&self) -> &str {
        "yaml-node-store"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::NodeStore]
    }

    fn configure(&self, wiring: &mut Wiring) -> Result<()> {
        wiring.bind_node_store(Arc::new(YamlNodeStore::open(&self.path)?));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Binds a node store the caller already holds.
pub struct NodeStoreModule {
    store: Arc<dyn NodeStore>,
}

impl NodeStoreModule {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self { store }
    }
}

impl Module for NodeStoreModule {
    fn name(&self) -> &str {
        "node-store"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::NodeStore]
    }

    fn configure(&self, wiring: &mut Wiring) -> Result<()> {
        wiring.bind_node_store(self.store.clone());
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
