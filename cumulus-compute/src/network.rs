//! Network and network offering types.

use serde::{Deserialize, Serialize};

use crate::error::{ComputeError, Result};

/// Template a network is created from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkOffering {
    /// Offering ID
    pub id: String,
    /// Offering name
    pub name: String,
    /// Whether networks from this offering take an explicit VLAN
    pub specify_vlan: bool,
    /// Zones the offering is available in
    pub zone_ids: Vec<String>,
}

/// Filter for [`NetworkProvider::list_network_offerings`](crate::NetworkProvider::list_network_offerings).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferingFilter {
    /// Only offerings that do (or do not) take an explicit VLAN
    pub specify_vlan: Option<bool>,
    /// Only offerings available in this zone
    pub zone_id: Option<String>,
}

impl OfferingFilter {
    /// Filter on VLAN support.
    pub fn specify_vlan(specify_vlan: bool) -> Self {
        Self {
            specify_vlan: Some(specify_vlan),
            ..Default::default()
        }
    }

    /// Restrict to a zone.
    pub fn zone_id(mut self, zone_id: impl Into<String>) -> Self {
        self.zone_id = Some(zone_id.into());
        self
    }

    /// Whether `offering` passes the filter.
    pub fn matches(&self, offering: &NetworkOffering) -> bool {
        self.specify_vlan.map_or(true, |v| offering.specify_vlan == v)
            && self
                .zone_id
                .as_ref()
                .map_or(true, |zone| offering.zone_ids.contains(zone))
    }
}

/// Addressing for a new network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateNetworkOptions {
    /// VLAN tag
    pub vlan: Option<String>,
    /// First assignable address
    pub start_ip: Option<String>,
    /// Last assignable address
    pub end_ip: Option<String>,
    /// Netmask
    pub netmask: Option<String>,
    /// Gateway
    pub gateway: Option<String>,
}

impl CreateNetworkOptions {
    /// Options with a VLAN tag.
    pub fn vlan(vlan: impl Into<String>) -> Self {
        Self {
            vlan: Some(vlan.into()),
            ..Default::default()
        }
    }

    pub fn start_ip(mut self, ip: impl Into<String>) -> Self {
        self.start_ip = Some(ip.into());
        self
    }

    pub fn end_ip(mut self, ip: impl Into<String>) -> Self {
        self.end_ip = Some(ip.into());
        self
    }

    pub fn netmask(mut self, netmask: impl Into<String>) -> Self {
        self.netmask = Some(netmask.into());
        self
    }

    pub fn gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = Some(gateway.into());
        self
    }

    /// Start IP, netmask and gateway must be given together; end IP needs a start IP.
    pub fn validate(&self) -> Result<()> {
        let set = [&self.start_ip, &self.netmask, &self.gateway]
            .iter()
            .filter(|v| v.is_some())
            .count();
        if set != 0 && set != 3 {
            return Err(ComputeError::InvalidRequest(
                "start_ip, netmask and gateway must be specified together".to_string(),
            ));
        }
        if self.end_ip.is_some() && self.start_ip.is_none() {
            return Err(ComputeError::InvalidRequest(
                "end_ip requires start_ip".to_string(),
            ));
        }
        Ok(())
    }
}

/// A provider network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// Network ID
    pub id: String,
    /// Network name
    pub name: String,
    /// Display text
    pub display_text: String,
    /// Zone the network lives in
    pub zone_id: String,
    /// Offering the network was created from
    pub offering_id: String,
    /// Addressing the network was created with
    pub addressing: CreateNetworkOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addressing_must_be_complete() {
        let partial = CreateNetworkOptions::vlan("2").start_ip("192.168.1.2");
        assert!(partial.validate().is_err());

        let full = CreateNetworkOptions::vlan("2")
            .start_ip("192.168.1.2")
            .netmask("255.255.255.0")
            .gateway("192.168.1.1");
        assert!(full.validate().is_ok());

        assert!(CreateNetworkOptions::vlan("2").validate().is_ok());
        assert!(CreateNetworkOptions::default().end_ip("10.0.0.9").validate().is_err());
    }

    #[test]
    fn test_offering_filter() {
        let offering = NetworkOffering {
            id: "7".into(),
            name: "vlan".into(),
            specify_vlan: true,
            zone_ids: vec!["1".into()],
        };
        assert!(OfferingFilter::specify_vlan(true).zone_id("1").matches(&offering));
        assert!(!OfferingFilter::specify_vlan(true).zone_id("2").matches(&offering));
        assert!(!OfferingFilter::specify_vlan(false).matches(&offering));
        assert!(OfferingFilter::default().matches(&offering));
    }
}
