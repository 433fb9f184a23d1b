//! # Cumulus Compute
//!
//! Provider-agnostic compute client core.
//!
//! A [`ComputeContext`] is assembled from configuration modules for one cloud
//! provider. Through it callers resolve templates, create nodes in bulk with
//! per-node failure reporting, and reclaim nodes by predicate.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 ContextBuilder<P>                   │
//! │   credentials + modules ──compose()──► Wiring       │
//! └─────────────────────────┬───────────────────────────┘
//!                           ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                  ComputeContext                     │
//! │   ComputeService (bulk create, reclaim)             │
//! │   NodeStore      (memory | yaml | caller-supplied)  │
//! └─────────────────────────┬───────────────────────────┘
//!                           │
//!         ┌─────────────────┴─────────────────┐
//!         ▼                                   ▼
//! ┌───────────────────┐             ┌───────────────────┐
//! │  ComputeProvider  │             │  NetworkProvider  │
//! │ (nodes, catalog)  │             │ (offerings, nets) │
//! └───────────────────┘             └───────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cumulus_compute::{predicates, ContextBuilder, MockProviderFactory, Properties};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let properties = Properties::new()
//!         .with("mock.identity", "admin")
//!         .with("mock.credential", "secret");
//!     let context = ContextBuilder::new(MockProviderFactory::new(), properties).build()?;
//!
//!     let compute = context.compute_service();
//!     let template = compute.template_builder().build().await?;
//!     let result = compute.create_nodes_in_group("web", 3, &template).await?;
//!
//!     compute.destroy_nodes_matching(predicates::in_group("web")).await?;
//!     Ok(())
//! }
//! ```

pub mod bulk;
pub mod config;
pub mod context;
pub mod error;
pub mod mock;
pub mod module;
pub mod network;
pub mod node_store;
pub mod options;
pub mod provider;
pub mod reclaim;
pub mod service;
pub mod template;
pub mod types;

pub use bulk::{BulkCreationResult, BulkOutcome, NodeError, RunNodesError};
pub use config::{
    OrchestratorSettings, Properties, PROPERTY_MAX_PARALLEL, PROPERTY_NODE_STORE_PATH,
    PROPERTY_NODE_TIMEOUT_SECS,
};
pub use context::{ComputeContext, ContextBuilder, LoginCredentials, ProviderFactory};
pub use error::{ComputeError, Result};
pub use mock::{MockComputeModule, MockCredentials, MockFailure, MockProvider, MockProviderFactory, MockTemplateOptions};
pub use module::{
    compose, Capability, ComputeServiceModule, InMemoryNodeStoreModule, Module, ModuleSet,
    NodeStoreModule, Wiring, YamlNodeStoreModule,
};
pub use network::{CreateNetworkOptions, Network, NetworkOffering, OfferingFilter};
pub use node_store::{InMemoryNodeStore, NodeStore, YamlNodeStore};
pub use options::{OptionsExtension, TemplateOptions};
pub use provider::{ComputeProvider, NetworkProvider};
pub use reclaim::{predicates, ReclaimReport};
pub use service::ComputeService;
pub use template::{Template, TemplateBuilder};
pub use types::*;
