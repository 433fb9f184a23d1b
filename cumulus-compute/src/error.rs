//! Error types for the compute orchestration layer.

use thiserror::Error;

/// Errors that can occur during compute operations.
///
/// All payloads are plain strings so a cause can be stored inside a
/// [`BulkCreationResult`](crate::BulkCreationResult) and cloned freely.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComputeError {
    /// Failed to connect to the provider endpoint.
    #[error("Failed to connect to provider: {0}")]
    ConnectionFailed(String),

    /// The provider rejected the supplied credentials.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The account has no capacity left for new nodes.
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Node was not found.
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// The provider refused to create a node.
    #[error("Failed to create node: {0}")]
    CreateFailed(String),

    /// The node was provisioned but a post-create step failed.
    #[error("Node {node_id} was created but failed to bootstrap: {reason}")]
    BootstrapFailed { node_id: String, reason: String },

    /// Failed to destroy a node.
    #[error("Failed to destroy node: {0}")]
    DestroyFailed(String),

    /// A provider call did not complete in time.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Network was not found.
    #[error("Network not found: {0}")]
    NetworkNotFound(String),

    /// Network operation failed.
    #[error("Network operation failed: {0}")]
    NetworkFailed(String),

    /// No location, image or hardware profile satisfies the template request.
    #[error("No match for template: {0}")]
    NoMatchingTemplate(String),

    /// Template options were viewed as a provider type they were not built with.
    #[error("Template options type mismatch: expected {expected}, found {actual}")]
    OptionsTypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Invalid request arguments.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Node store read or write failed.
    #[error("Node store error: {0}")]
    NodeStore(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ComputeError {
    /// Whether this error means the provider cannot accept further work.
    ///
    /// A bulk operation stops issuing new attempts after a fatal error; all
    /// other errors only fail the attempt that produced them.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ComputeError::ConnectionFailed(_)
                | ComputeError::AuthenticationFailed(_)
                | ComputeError::QuotaExceeded(_)
        )
    }

    /// Id of a node this error left behind on the provider, if any.
    pub fn leaked_node_id(&self) -> Option<&str> {
        match self {
            ComputeError::BootstrapFailed { node_id, .. } => Some(node_id),
            _ => None,
        }
    }
}

/// Result type alias for compute operations.
pub type Result<T> = std::result::Result<T, ComputeError>;
