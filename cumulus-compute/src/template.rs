//! Templates and the template builder.

use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{ComputeError, Result};
use crate::options::TemplateOptions;
use crate::provider::ComputeProvider;
use crate::types::{Hardware, Image, Location};

/// What to provision: image, hardware profile and location plus options.
#[derive(Debug, Clone)]
pub struct Template {
    image: Image,
    hardware: Hardware,
    location: Location,
    options: TemplateOptions,
}

impl Template {
    /// Assemble a template from already resolved parts.
    pub fn new(image: Image, hardware: Hardware, location: Location, options: TemplateOptions) -> Self {
        Self {
            image,
            hardware,
            location,
            options,
        }
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn hardware(&self) -> &Hardware {
        &self.hardware
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn options(&self) -> &TemplateOptions {
        &self.options
    }

    /// Mutable access to the options; the only mutable part of a template.
    pub fn options_mut(&mut self) -> &mut TemplateOptions {
        &mut self.options
    }
}

/// Resolves a [`Template`] against what a provider offers.
///
/// Unset criteria fall back to the first assignable location, the first image
/// and the smallest hardware profile.
pub struct TemplateBuilder {
    provider: Arc<dyn ComputeProvider>,
    location_id: Option<String>,
    image_id: Option<String>,
    os_family: Option<String>,
    hardware_id: Option<String>,
    min_cpus: u32,
    min_memory_mib: u64,
    options: Option<TemplateOptions>,
}

impl TemplateBuilder {
    /// Create a builder for `provider`.
    pub fn new(provider: Arc<dyn ComputeProvider>) -> Self {
        Self {
            provider,
            location_id: None,
            image_id: None,
            os_family: None,
            hardware_id: None,
            min_cpus: 0,
            min_memory_mib: 0,
            options: None,
        }
    }

    /// Require a location.
    pub fn location_id(mut self, id: impl Into<String>) -> Self {
        self.location_id = Some(id.into());
        self
    }

    /// Require an image.
    pub fn image_id(mut self, id: impl Into<String>) -> Self {
        self.image_id = Some(id.into());
        self
    }

    /// Require an operating system family.
    pub fn os_family(mut self, family: impl Into<String>) -> Self {
        self.os_family = Some(family.into());
        self
    }

    /// Require a hardware profile.
    pub fn hardware_id(mut self, id: impl Into<String>) -> Self {
        self.hardware_id = Some(id.into());
        self
    }

    /// Minimum number of vCPUs.
    pub fn min_cpus(mut self, cpus: u32) -> Self {
        self.min_cpus = cpus;
        self
    }

    /// Minimum memory in MiB.
    pub fn min_memory_mib(mut self, mib: u64) -> Self {
        self.min_memory_mib = mib;
        self
    }

    /// Use these options instead of the provider defaults.
    pub fn options(mut self, options: TemplateOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Resolve the template.
    #[instrument(skip_all)]
    pub async fn build(self) -> Result<Template> {
        let locations = self.provider.list_assignable_locations().await?;
        let location = match &self.location_id {
            Some(id) => locations.into_iter().find(|l| &l.id == id),
            None => locations.into_iter().next(),
        }
        .ok_or_else(|| {
            ComputeError::NoMatchingTemplate(format!(
                "location {}",
                self.location_id.as_deref().unwrap_or("<any>")
            ))
        })?;

        let image = self
            .provider
            .list_images()
            .await?
            .into_iter()
            .filter(|i| self.image_id.as_ref().map_or(true, |id| &i.id == id))
            .find(|i| self.os_family.as_ref().map_or(true, |f| &i.os_family == f))
            .ok_or_else(|| {
                ComputeError::NoMatchingTemplate(format!(
                    "image {}",
                    self.image_id.as_deref().unwrap_or("<any>")
                ))
            })?;

        let hardware = self
            .provider
            .list_hardware_profiles()
            .await?
            .into_iter()
            .filter(|h| self.hardware_id.as_ref().map_or(true, |id| &h.id == id))
            .filter(|h| h.cpus >= self.min_cpus && h.memory_mib >= self.min_memory_mib)
            .min_by_key(|h| (h.cpus, h.memory_mib))
            .ok_or_else(|| {
                ComputeError::NoMatchingTemplate(format!(
                    "hardware with at least {} cpus and {} MiB",
                    self.min_cpus, self.min_memory_mib
                ))
            })?;

        let options = match self.options {
            Some(options) => options,
            None => self.provider.default_options(),
        };

        debug!(
            location = %location.id,
            image = %image.id,
            hardware = %hardware.id,
            provider = %self.provider.provider_name(),
            options = options.extension_type(),
            "Template resolved"
        );

        Ok(Template::new(image, hardware, location, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockProvider, MockTemplateOptions};

    #[tokio::test]
    async fn test_defaults_pick_first_location_and_smallest_hardware() {
        let provider = Arc::new(MockProvider::new());
        let template = TemplateBuilder::new(provider).build().await.unwrap();

        assert_eq!(template.location().id, "1");
        assert_eq!(template.hardware().id, "small");
        assert!(template.options().is::<MockTemplateOptions>());
    }

    #[tokio::test]
    async fn test_requirements_are_honoured() {
        let provider = Arc::new(MockProvider::new());
        let template = TemplateBuilder::new(provider)
            .location_id("2")
            .min_cpus(2)
            .min_memory_mib(3000)
            .build()
            .await
            .unwrap();

        assert_eq!(template.location().id, "2");
        assert_eq!(template.hardware().id, "large");
    }

    #[tokio::test]
    async fn test_unknown_location() {
        let provider = Arc::new(MockProvider::new());
        let err = TemplateBuilder::new(provider)
            .location_id("nowhere")
            .build()
            .await
            .unwrap_err();
        assert!(matches!(err, ComputeError::NoMatchingTemplate(_)));
    }
}
