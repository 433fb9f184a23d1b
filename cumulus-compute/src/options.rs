//! Template options with a provider extension slot.
//!
//! Generic orchestration code only sees [`TemplateOptions`]. Providers seed the
//! options with their own extension type (see
//! [`ComputeProvider::default_options`](crate::ComputeProvider::default_options))
//! and call sites that know the provider borrow it back as that type:
//!
//! ```rust,ignore
//! template
//!     .options_mut()
//!     .as_provider_mut::<MockTemplateOptions>()?
//!     .network_id(&network.id);
//! ```
//!
//! The borrow is a view into the single extension value owned by the options,
//! so anything written through it is what the provider later reads.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{ComputeError, Result};

/// Provider-specific option fields stored in a [`TemplateOptions`] slot.
///
/// Implemented for every `Clone + Debug + Send + Sync + 'static` type; providers
/// just declare a plain struct.
pub trait OptionsExtension: Any + Send + Sync + fmt::Debug {
    /// Clone into a new box.
    fn clone_boxed(&self) -> Box<dyn OptionsExtension>;
    /// Upcast for downcasting.
    fn as_any(&self) -> &dyn Any;
    /// Mutable upcast for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Name of the concrete type.
    fn type_name(&self) -> &'static str;
}

impl<T> OptionsExtension for T
where
    T: Any + Clone + Send + Sync + fmt::Debug,
{
    fn clone_boxed(&self) -> Box<dyn OptionsExtension> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Mutable options attached to a template.
#[derive(Debug, Default)]
pub struct TemplateOptions {
    /// Ports to open for inbound traffic
    pub inbound_ports: Vec<u16>,
    /// Wait for nodes to reach the running state before reporting success;
    /// otherwise they are reported while still pending
    pub block_until_running: bool,
    /// Free-form metadata passed to the provider
    pub user_metadata: BTreeMap<String, String>,
    /// Tags applied to created nodes
    pub tags: BTreeSet<String>,
    extension: Option<Box<dyn OptionsExtension>>,
}

impl Clone for TemplateOptions {
    fn clone(&self) -> Self {
        Self {
            inbound_ports: self.inbound_ports.clone(),
            block_until_running: self.block_until_running,
            user_metadata: self.user_metadata.clone(),
            tags: self.tags.clone(),
            extension: self.extension.as_ref().map(|ext| (**ext).clone_boxed()),
        }
    }
}

impl TemplateOptions {
    /// Options with no provider extension.
    pub fn new() -> Self {
        Self {
            block_until_running: true,
            ..Default::default()
        }
    }

    /// Options carrying a provider extension.
    pub fn with_extension<E: OptionsExtension>(extension: E) -> Self {
        Self {
            extension: Some(Box::new(extension)),
            ..Self::new()
        }
    }

    /// Open an inbound port.
    pub fn inbound_port(&mut self, port: u16) -> &mut Self {
        if !self.inbound_ports.contains(&port) {
            self.inbound_ports.push(port);
        }
        self
    }

    /// Add a tag.
    pub fn tag(&mut self, tag: impl Into<String>) -> &mut Self {
        self.tags.insert(tag.into());
        self
    }

    /// Add a metadata entry.
    pub fn metadata(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.user_metadata.insert(key.into(), value.into());
        self
    }

    /// Whether an extension of type `E` is present.
    pub fn is<E: OptionsExtension>(&self) -> bool {
        self.extension
            .as_ref()
            .is_some_and(|ext| (**ext).as_any().is::<E>())
    }

    /// Name of the extension type, `"none"` when empty.
    pub fn extension_type(&self) -> &'static str {
        self.extension
            .as_ref()
            .map_or("none", |ext| (**ext).type_name())
    }

    /// View the options as provider type `E`.
    pub fn as_provider<E: OptionsExtension>(&self) -> Result<&E> {
        let actual = self.extension_type();
        self.extension
            .as_ref()
            .and_then(|ext| (**ext).as_any().downcast_ref::<E>())
            .ok_or_else(|| ComputeError::OptionsTypeMismatch {
                expected: std::any::type_name::<E>(),
                actual,
            })
    }

    /// Mutable view of the options as provider type `E`.
    pub fn as_provider_mut<E: OptionsExtension>(&mut self) -> Result<&mut E> {
        let actual = self.extension_type();
        self.extension
            .as_mut()
            .and_then(|ext| (**ext).as_any_mut().downcast_mut::<E>())
            .ok_or_else(|| ComputeError::OptionsTypeMismatch {
                expected: std::any::type_name::<E>(),
                actual,
            })
    }
}
