//! Azure network API model and the load balancers client.
//!
//! Field names follow the `Microsoft.Network` 2016-09-01 REST schema. Unset
//! optional fields are omitted from request bodies.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::arm::{ArmClient, ArmError};

/// API version for `Microsoft.Network/loadBalancers`.
pub const API_VERSION: &str = "2016-09-01";

/// Reference to another ARM resource by ID.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubResource {
    /// Full resource ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl SubResource {
    /// Reference the resource with the given ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()) }
    }
}

/// A load balancer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadBalancer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub lb_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<LoadBalancerPropertiesFormat>,
}

/// Properties of a load balancer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerPropertiesFormat {
    #[serde(
        rename = "frontendIPConfigurations",
        skip_serializing_if = "Option::is_none"
    )]
    pub frontend_ip_configurations: Option<Vec<FrontendIpConfiguration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_address_pools: Option<Vec<BackendAddressPool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancing_rules: Option<Vec<LoadBalancingRule>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probes: Option<Vec<Probe>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

/// A frontend IP configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrontendIpConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<FrontendIpConfigurationPropertiesFormat>,
}

/// Properties of a frontend IP configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrontendIpConfigurationPropertiesFormat {
    #[serde(rename = "privateIPAddress", skip_serializing_if = "Option::is_none")]
    pub private_ip_address: Option<String>,
    #[serde(
        rename = "privateIPAllocationMethod",
        skip_serializing_if = "Option::is_none"
    )]
    pub private_ip_allocation_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet: Option<SubResource>,
}

/// A backend address pool.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BackendAddressPool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A load balancing rule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadBalancingRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<LoadBalancingRulePropertiesFormat>,
}

/// Properties of a load balancing rule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancingRulePropertiesFormat {
    #[serde(
        rename = "frontendIPConfiguration",
        skip_serializing_if = "Option::is_none"
    )]
    pub frontend_ip_configuration: Option<SubResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_address_pool: Option<SubResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe: Option<SubResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_distribution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontend_port: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_port: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout_in_minutes: Option<i32>,
    #[serde(rename = "enableFloatingIP", skip_serializing_if = "Option::is_none")]
    pub enable_floating_ip: Option<bool>,
}

/// A health probe.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Probe {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<ProbePropertiesFormat>,
}

/// Properties of a health probe.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbePropertiesFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_in_seconds: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_probes: Option<i32>,
}

/// ID of a load balancer.
pub fn load_balancer_id(subscription_id: &str, resource_group: &str, name: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/loadBalancers/{}",
        subscription_id, resource_group, name
    )
}

/// Operations on `Microsoft.Network/loadBalancers`.
pub struct LoadBalancersClient<'a> {
    arm: &'a ArmClient,
}

impl<'a> LoadBalancersClient<'a> {
    /// Wrap an ARM client.
    pub fn new(arm: &'a ArmClient) -> Self {
        Self { arm }
    }

    fn path(&self, resource_group: &str, name: &str) -> String {
        load_balancer_id(self.arm.subscription_id(), resource_group, name)
    }

    /// Create or replace a load balancer, waiting until provisioning completes.
    pub async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        parameters: &LoadBalancer,
    ) -> Result<(), ArmError> {
        debug!(resource_group, name, "PUT load balancer");
        self.arm
            .put(&self.path(resource_group, name), API_VERSION, parameters)
            .await
    }

    /// Fetch a load balancer by resource group and name.
    pub async fn get(&self, resource_group: &str, name: &str) -> Result<LoadBalancer, ArmError> {
        self.get_by_id(&self.path(resource_group, name)).await
    }

    /// Fetch a load balancer by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<LoadBalancer, ArmError> {
        debug!(id, "GET load balancer");
        self.arm.get(id, API_VERSION).await
    }

    /// Delete a load balancer by ID. A load balancer that is already gone is not an error.
    pub async fn delete_by_id(&self, id: &str) -> Result<(), ArmError> {
        debug!(id, "DELETE load balancer");
        match self.arm.delete(id, API_VERSION).await {
            Err(err) if err.is_not_found() => Ok(()),
            other => other,
        }
    }
}
