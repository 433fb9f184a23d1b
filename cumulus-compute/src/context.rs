//! Context builder and the wired compute context.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::config::{OrchestratorSettings, Properties, PROPERTY_NODE_STORE_PATH};
use crate::error::{ComputeError, Result};
use crate::module::{compose, ComputeServiceModule, InMemoryNodeStoreModule, Module, ModuleSet, Wiring, YamlNodeStoreModule};
use crate::node_store::NodeStore;
use crate::provider::{ComputeProvider, NetworkProvider};
use crate::service::ComputeService;

/// Provider-specific login identity, read from context properties.
pub trait LoginCredentials: Sized + Send + Sync {
    fn from_properties(properties: &Properties) -> Result<Self>;
}

/// Everything a provider contributes to context construction.
pub trait ProviderFactory: Send + Sync {
    /// Login identity shape for this provider.
    type Credentials: LoginCredentials;

    fn provider_name(&self) -> &str;

    /// Module binding the provider's compute (and optionally network) side.
    fn context_module(&self, credentials: Self::Credentials, properties: &Properties) -> Result<Arc<dyn Module>>;

    /// Node store installed when no module supplies one.
    ///
    /// A YAML store when `cumulus.node-store.path` is set, otherwise in-memory.
    fn default_node_store_module(&self, properties: &Properties) -> Arc<dyn Module> {
        match properties.get(PROPERTY_NODE_STORE_PATH) {
            Some(path) => Arc::new(YamlNodeStoreModule::new(path)),
            None => Arc::new(InMemoryNodeStoreModule),
        }
    }
}

/// Assembles a [`ComputeContext`] for provider `P`.
///
/// Modules are applied in this order: [`ComputeServiceModule`], the provider
/// module, caller modules, then the default node store if no module declares
/// one. Building performs no provider calls.
pub struct ContextBuilder<P: ProviderFactory> {
    factory: P,
    properties: Properties,
    modules: Vec<Arc<dyn Module>>,
}

impl<P: ProviderFactory> ContextBuilder<P> {
    pub fn new(factory: P, properties: Properties) -> Self {
        Self {
            factory,
            properties,
            modules: Vec::new(),
        }
    }

    /// Add a caller module.
    pub fn with_module(mut self, module: Arc<dyn Module>) -> Self {
        self.modules.push(module);
        self
    }

    /// Add several caller modules.
    pub fn with_modules(mut self, modules: impl IntoIterator<Item = Arc<dyn Module>>) -> Self {
        self.modules.extend(modules);
        self
    }

    /// Set a property.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.set(key, value);
        self
    }

    /// Wire the context.
    #[instrument(skip_all, fields(provider = %self.factory.provider_name()))]
    pub fn build(self) -> Result<ComputeContext> {
        let credentials = P::Credentials::from_properties(&self.properties)?;

        let mut base: Vec<Arc<dyn Module>> = vec![
            Arc::new(ComputeServiceModule),
            self.factory.context_module(credentials, &self.properties)?,
        ];
        base.extend(self.modules);

        let factory = &self.factory;
        let properties = &self.properties;
        let modules = compose(base, || factory.default_node_store_module(properties));

        let mut wiring = Wiring::new(self.properties.clone());
        modules.configure(&mut wiring)?;

        let compute = wiring.compute().cloned().ok_or_else(|| {
            ComputeError::InvalidConfig("no module bound a compute provider".to_string())
        })?;
        let node_store = wiring.node_store().cloned().ok_or_else(|| {
            ComputeError::InvalidConfig("no module bound a node store".to_string())
        })?;
        let settings = wiring.settings().copied().unwrap_or_default();
        let network = wiring.network().cloned();

        debug!(modules = ?modules, "Modules configured");
        info!(
            node_store = node_store.kind(),
            network = network.is_some(),
            max_parallel = settings.max_parallel,
            "Compute context ready"
        );

        Ok(ComputeContext {
            inner: Arc::new(ContextInner {
                provider_name: self.factory.provider_name().to_string(),
                properties: self.properties,
                modules,
                compute,
                network,
                node_store,
                settings,
            }),
        })
    }
}

struct ContextInner {
    provider_name: String,
    properties: Properties,
    modules: ModuleSet,
    compute: Arc<dyn ComputeProvider>,
    network: Option<Arc<dyn NetworkProvider>>,
    node_store: Arc<dyn NodeStore>,
    settings: OrchestratorSettings,
}

/// Fully wired, immutable compute context.
///
/// Clones share the same wiring and may be used from concurrent tasks.
#[derive(Clone)]
pub struct ComputeContext {
    inner: Arc<ContextInner>,
}

impl ComputeContext {
    pub fn provider_name(&self) -> &str {
        &self.inner.provider_name
    }

    pub fn properties(&self) -> &Properties {
        &self.inner.properties
    }

    /// The composed module set.
    pub fn modules(&self) -> &ModuleSet {
        &self.inner.modules
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.inner.settings
    }

    /// Bulk orchestration and reclamation.
    pub fn compute_service(&self) -> ComputeService {
        ComputeService::new(
            self.inner.compute.clone(),
            self.inner.node_store.clone(),
            self.inner.settings,
        )
    }

    /// The bound compute provider.
    pub fn compute(&self) -> &Arc<dyn ComputeProvider> {
        &self.inner.compute
    }

    /// The bound network provider, if the provider module supplied one.
    pub fn network(&self) -> Option<&Arc<dyn NetworkProvider>> {
        self.inner.network.as_ref()
    }

    pub fn node_store(&self) -> &Arc<dyn NodeStore> {
        &self.inner.node_store
    }
}

impl std::fmt::Debug for ComputeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeContext")
            .field("provider", &self.inner.provider_name)
            .field("modules", &self.inner.modules)
            .field("node_store", &self.inner.node_store.kind())
            .field("settings", &self.inner.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockProvider, MockProviderFactory};
    use crate::module::{Capability, NodeStoreModule};
    use crate::node_store::InMemoryNodeStore;
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn properties() -> Properties {
        Properties::new()
            .with("mock.identity", "admin")
            .with("mock.credential", "secret")
    }

    /// Factory whose default node store counts how often it is built.
    struct CountingFactory {
        inner: MockProviderFactory,
        defaults_built: Arc<AtomicUsize>,
    }

    impl ProviderFactory for CountingFactory {
        type Credentials = <MockProviderFactory as ProviderFactory>::Credentials;

        fn provider_name(&self) -> &str {
            self.inner.provider_name()
        }

        fn context_module(&self, credentials: Self::Credentials, properties: &Properties) -> Result<Arc<dyn Module>> {
            self.inner.context_module(credentials, properties)
        }

        fn default_node_store_module(&self, _properties: &Properties) -> Arc<dyn Module> {
            self.defaults_built.fetch_add(1, Ordering::SeqCst);
            Arc::new(InMemoryNodeStoreModule)
        }
    }

    struct ReadOnlyStoreModule;

    impl Module for ReadOnlyStoreModule {
        fn name(&self) -> &str {
            "read-only-store"
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

    #[test]
    fn test_build_installs_default_store() {
        let context = ContextBuilder::new(MockProviderFactory::default(), properties())
            .build()
            .unwrap();

        assert_eq!(context.provider_name(), "mock");
        assert_eq!(
            context.modules().names(),
            vec!["compute-service", "mock-compute", "memory-node-store"]
        );
        assert_eq!(context.node_store().kind(), "memory");
        assert!(context.network().is_some());
    }

    #[test]
    fn test_caller_store_wins_and_default_is_never_built() {
        let defaults_built = Arc::new(AtomicUsize::new(0));
        let factory = CountingFactory {
            inner: MockProviderFactory::default(),
            defaults_built: defaults_built.clone(),
        };

        let context = ContextBuilder::new(factory, properties())
            .with_module(Arc::new(ReadOnlyStoreModule))
            .build()
            .unwrap();

        assert_eq!(defaults_built.load(Ordering::SeqCst), 0);
        assert_eq!(context.modules().node_store_modules().count(), 1);
        assert!(context
            .modules()
            .node_store_modules()
            .all(|m| m.as_any().is::<ReadOnlyStoreModule>()));
    }

    #[test]
    fn test_shared_store_module() {
        let store = Arc::new(InMemoryNodeStore::new());
        let context = ContextBuilder::new(MockProviderFactory::default(), properties())
            .with_module(Arc::new(NodeStoreModule::new(store)))
            .build()
            .unwrap();
        assert_eq!(context.modules().len(), 3);
    }

    #[test]
    fn test_yaml_store_from_property() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.yaml");
        let context = ContextBuilder::new(MockProviderFactory::default(), properties())
            .property(PROPERTY_NODE_STORE_PATH, path.to_string_lossy())
            .build()
            .unwrap();
        assert_eq!(context.node_store().kind(), "yaml");
    }

    #[test]
    fn test_missing_credentials() {
        let err = ContextBuilder::new(MockProviderFactory::default(), Properties::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, ComputeError::InvalidConfig(_)));
    }

    #[test]
    fn test_settings_flow_from_properties() {
        let context = ContextBuilder::new(
            MockProviderFactory::with_provider(Arc::new(MockProvider::new())),
            properties().with(crate::config::PROPERTY_MAX_PARALLEL, "2"),
        )
        .build()
        .unwrap();
        assert_eq!(context.settings().max_parallel, 2);
        assert_eq!(context.compute_service().settings().max_parallel, 2);
    }
}
