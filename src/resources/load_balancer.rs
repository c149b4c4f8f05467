//! `azurerm_lb`: an Azure Load Balancer.
//!
//! Configuration is decoded into typed blocks, the four set-typed blocks are
//! canonicalised by their set hash, and the expanders turn the blocks into
//! `Microsoft.Network` request objects.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::Resource;
use crate::arm::{ArmClient, ResourceId};
use crate::error::ProviderError;
use crate::hashcode::{self, Fingerprint, SetHash};
use crate::network::{
    self, BackendAddressPool, FrontendIpConfiguration, FrontendIpConfigurationPropertiesFormat,
    LoadBalancer, LoadBalancerPropertiesFormat, LoadBalancersClient, LoadBalancingRule,
    LoadBalancingRulePropertiesFormat, Probe, ProbePropertiesFormat, SubResource,
};
use crate::plan;
use crate::schema::{has_errors, Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::types::PlanResult;
use crate::validation;

/// Resource type name.
pub const LOAD_BALANCER: &str = "azurerm_lb";

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decoded `azurerm_lb` configuration or state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub lb_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub resource_group_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub frontend_ip_configuration: Vec<FrontendIpConfigurationBlock>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub backend_address_pool: Vec<BackendAddressPoolBlock>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub load_balancing_rule: Vec<LoadBalancingRuleBlock>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub probe: Vec<ProbeBlock>,
}

/// A `frontend_ip_configuration` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontendIpConfigurationBlock {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub private_ip_allocation_method: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub private_ip_address: String,
    pub subnet: String,
}

/// A `backend_address_pool` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendAddressPoolBlock {
    pub name: String,
}

/// A `load_balancing_rule` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancingRuleBlock {
    pub name: String,
    pub frontend_ip_configuration: String,
    pub backend_address_pool: String,
    pub probe: String,
    pub protocol: String,
    pub frontend_port: i32,
    pub backend_port: i32,
    pub idle_timeout_in_minutes: i32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub load_distribution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_floating_ip: Option<bool>,
}

/// A `probe` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeBlock {
    pub name: String,
    pub protocol: String,
    pub port: i32,
    pub number_of_probes: i32,
    pub interval_in_seconds: i32,
}

impl SetHash for FrontendIpConfigurationBlock {
    fn hash_key(&self) -> String {
        format!(
            "{}-{}-{}-{}-",
            self.name, self.private_ip_allocation_method, self.private_ip_address, self.subnet
        )
    }
}

impl SetHash for BackendAddressPoolBlock {
    fn hash_key(&self) -> String {
        format!("{}-", self.name)
    }
}

impl SetHash for LoadBalancingRuleBlock {
    fn hash_key(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}-{}-{}-{}-",
            self.name,
            self.frontend_ip_configuration,
            self.backend_address_pool,
            self.probe,
            self.protocol,
            self.frontend_port,
            self.backend_port,
            self.idle_timeout_in_minutes
        )
    }
}

impl SetHash for ProbeBlock {
    fn hash_key(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}-",
            self.name, self.protocol, self.port, self.number_of_probes, self.interval_in_seconds
        )
    }
}

impl LoadBalancerConfig {
    /// Drop duplicate set elements, order sets by hash and normalise the location.
    pub fn canonicalize(mut self) -> Self {
        self.location = normalize_location(&self.location);
        self.frontend_ip_configuration = hashcode::canonicalize(self.frontend_ip_configuration);
        self.backend_address_pool = hashcode::canonicalize(self.backend_address_pool);
        self.load_balancing_rule = hashcode::canonicalize(self.load_balancing_rule);
        self.probe = hashcode::canonicalize(self.probe);
        self
    }

    /// Names a rule may not reference because they are not declared.
    fn unresolved_references(&self) -> Vec<(usize, &'static str, String)> {
        let frontends: HashSet<&str> = self
            .frontend_ip_configuration
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        let pools: HashSet<&str> = self.backend_address_pool.iter().map(|p| p.name.as_str()).collect();
        let probes: HashSet<&str> = self.probe.iter().map(|p| p.name.as_str()).collect();

        let mut missing = Vec::new();
        for (i, rule) in self.load_balancing_rule.iter().enumerate() {
            if !frontends.contains(rule.frontend_ip_configuration.as_str()) {
                missing.push((i, "frontend_ip_configuration", rule.frontend_ip_configuration.clone()));
            }
            if !pools.contains(rule.backend_address_pool.as_str()) {
                missing.push((i, "backend_address_pool", rule.backend_address_pool.clone()));
            }
            if !probes.contains(rule.probe.as_str()) {
                missing.push((i, "probe", rule.probe.clone()));
            }
        }
        missing
    }
}

/// Lower-case and strip spaces, so `West US` and `westus` compare equal.
pub fn normalize_location(location: &str) -> String {
    location.replace(' ', "").to_lowercase()
}

/// Check that `value` names a load balancer type, case-insensitively.
pub fn validate_load_balancer_type(value: &str, key: &str) -> Vec<Diagnostic> {
    if value.eq_ignore_ascii_case("internal") || value.eq_ignore_ascii_case("public") {
        return Vec::new();
    }
    vec![
        Diagnostic::error(format!("\"{}\" must be either Internal or Public", key))
            .with_detail(format!("Got {:?}", value))
            .with_attribute(key),
    ]
}

/// Schema of the `azurerm_lb` resource.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("Manages an Azure Load Balancer")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string().with_force_new())
        .with_attribute(
            "type",
            Attribute::required_string()
                .with_force_new()
                .with_description("Internal or Public"),
        )
        .with_attribute("location", Attribute::optional_string().with_force_new())
        .with_attribute(
            "resource_group_name",
            Attribute::optional_string().with_force_new(),
        )
        .with_attribute("tags", Attribute::optional_string_map())
        .with_block(
            "frontend_ip_configuration",
            NestedBlock::set(
                Block::new()
                    .with_attribute("name", Attribute::required_string())
                    .with_attribute("private_ip_allocation_method", Attribute::optional_string())
                    .with_attribute("private_ip_address", Attribute::optional_string())
                    .with_attribute("subnet", Attribute::required_string()),
            )
            .required(),
        )
        .with_block(
            "backend_address_pool",
            NestedBlock::set(Block::new().with_attribute("name", Attribute::required_string()))
                .required(),
        )
        .with_block(
            "load_balancing_rule",
            NestedBlock::set(
                Block::new()
                    .with_attribute("name", Attribute::required_string())
                    .with_attribute("frontend_ip_configuration", Attribute::required_string())
                    .with_attribute("backend_address_pool", Attribute::required_string())
                    .with_attribute("probe", Attribute::required_string())
                    .with_attribute("protocol", Attribute::required_string())
                    .with_attribute("frontend_port", Attribute::required_int64())
                    .with_attribute("backend_port", Attribute::required_int64())
                    .with_attribute("idle_timeout_in_minutes", Attribute::required_int64())
                    .with_attribute("load_distribution", Attribute::optional_string())
                    .with_attribute("enable_floating_ip", Attribute::optional_bool()),
            )
            .required(),
        )
        .with_block(
            "probe",
            NestedBlock::set(
                Block::new()
                    .with_attribute("name", Attribute::required_string())
                    .with_attribute("protocol", Attribute::required_string())
                    .with_attribute("port", Attribute::required_int64())
                    .with_attribute("number_of_probes", Attribute::required_int64())
                    .with_attribute("interval_in_seconds", Attribute::required_int64()),
            )
            .required(),
        )
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// One API object per `frontend_ip_configuration` block; empty optional strings are omitted.
pub fn expand_frontend_ip_configurations(
    blocks: &[FrontendIpConfigurationBlock],
) -> Vec<FrontendIpConfiguration> {
    blocks
        .iter()
        .map(|block| FrontendIpConfiguration {
            id: None,
            name: Some(block.name.clone()),
            properties: Some(FrontendIpConfigurationPropertiesFormat {
                private_ip_address: non_empty(&block.private_ip_address),
                private_ip_allocation_method: non_empty(&block.private_ip_allocation_method),
                subnet: Some(SubResource::new(block.subnet.clone())),
            }),
        })
        .collect()
}

/// One API object per `backend_address_pool` block.
pub fn expand_backend_address_pools(blocks: &[BackendAddressPoolBlock]) -> Vec<BackendAddressPool> {
    blocks
        .iter()
        .map(|block| BackendAddressPool {
            id: None,
            name: Some(block.name.clone()),
        })
        .collect()
}

/// Rules point at their frontend, pool and probe by sub-resource ID under `lb_id`.
pub fn expand_load_balancing_rules(
    lb_id: &str,
    config: &LoadBalancerConfig,
) -> Result<Vec<LoadBalancingRule>, ProviderError> {
    if let Some((i, field, name)) = config.unresolved_references().into_iter().next() {
        return Err(ProviderError::Expand {
            what: "Load Balancing Rules",
            reason: format!(
                "rule {:?} references undeclared {} {:?}",
                config.load_balancing_rule[i].name, field, name
            ),
        });
    }

    let child = |collection: &str, name: &str| {
        Some(SubResource::new(format!("{}/{}/{}", lb_id, collection, name)))
    };

    Ok(config
        .load_balancing_rule
        .iter()
        .map(|rule| LoadBalancingRule {
            id: None,
            name: Some(rule.name.clone()),
            properties: Some(LoadBalancingRulePropertiesFormat {
                frontend_ip_configuration: child(
                    "frontendIPConfigurations",
                    &rule.frontend_ip_configuration,
                ),
                backend_address_pool: child("backendAddressPools", &rule.backend_address_pool),
                probe: child("probes", &rule.probe),
                protocol: Some(rule.protocol.clone()),
                load_distribution: non_empty(&rule.load_distribution),
                frontend_port: Some(rule.frontend_port),
                backend_port: Some(rule.backend_port),
                idle_timeout_in_minutes: Some(rule.idle_timeout_in_minutes),
                enable_floating_ip: rule.enable_floating_ip,
            }),
        })
        .collect())
}

/// One API object per `probe` block.
pub fn expand_probes(blocks: &[ProbeBlock]) -> Vec<Probe> {
    blocks
        .iter()
        .map(|block| Probe {
            id: None,
            name: Some(block.name.clone()),
            properties: Some(ProbePropertiesFormat {
                protocol: Some(block.protocol.clone()),
                port: Some(block.port),
                interval_in_seconds: Some(block.interval_in_seconds),
                number_of_probes: Some(block.number_of_probes),
            }),
        })
        .collect()
}

/// Build the request body for a create-or-update. Empty collections are omitted.
pub fn build_load_balancer(
    config: &LoadBalancerConfig,
    subscription_id: &str,
) -> Result<LoadBalancer, ProviderError> {
    let lb_id = network::load_balancer_id(
        subscription_id,
        &config.resource_group_name,
        &config.name,
    );

    let mut properties = LoadBalancerPropertiesFormat::default();
    if !config.frontend_ip_configuration.is_empty() {
        properties.frontend_ip_configurations =
            Some(expand_frontend_ip_configurations(&config.frontend_ip_configuration));
    }
    if !config.backend_address_pool.is_empty() {
        properties.backend_address_pools =
            Some(expand_backend_address_pools(&config.backend_address_pool));
    }
    if !config.load_balancing_rule.is_empty() {
        properties.load_balancing_rules = Some(expand_load_balancing_rules(&lb_id, config)?);
    }
    if !config.probe.is_empty() {
        properties.probes = Some(expand_probes(&config.probe));
    }

    Ok(LoadBalancer {
        id: None,
        name: Some(config.name.clone()),
        lb_type: Some(config.lb_type.clone()),
        location: non_empty(&normalize_location(&config.location)),
        tags: (!config.tags.is_empty()).then(|| config.tags.clone()),
        properties: Some(properties),
    })
}

fn set_fingerprint(path: &str, value: &Value) -> Option<Fingerprint> {
    fn decode<T: SetHash + for<'de> Deserialize<'de>>(value: &Value) -> Option<Fingerprint> {
        let items: Vec<T> = serde_json::from_value(value.clone()).ok()?;
        Some(hashcode::fingerprint(&items))
    }

    match path {
        "frontend_ip_configuration" => decode::<FrontendIpConfigurationBlock>(value),
        "backend_address_pool" => decode::<BackendAddressPoolBlock>(value),
        "load_balancing_rule" => decode::<LoadBalancingRuleBlock>(value),
        "probe" => decode::<ProbeBlock>(value),
        _ => None,
    }
}

fn state_id(state: &Value) -> Option<&str> {
    state.get("id").and_then(Value::as_str).filter(|id| !id.is_empty())
}

/// The `azurerm_lb` resource.
pub struct LoadBalancerResource;

#[async_trait::async_trait]
impl Resource for LoadBalancerResource {
    fn type_name(&self) -> &'static str {
        LOAD_BALANCER
    }

    fn schema(&self) -> Schema {
        schema()
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validation::validate(&schema(), config);

        if let Some(lb_type) = config.get("type").and_then(Value::as_str) {
            diagnostics.extend(validate_load_balancer_type(lb_type, "type"));
        }
        if has_errors(&diagnostics) {
            return diagnostics;
        }

        match serde_json::from_value::<LoadBalancerConfig>(config.clone()) {
            Ok(decoded) => {
                for (i, field, name) in decoded.unresolved_references() {
                    diagnostics.push(
                        Diagnostic::error(format!("Unknown {} {:?}", field.replace('_', " "), name))
                            .with_detail(format!(
                                "Load balancing rule {:?} must reference a {} declared on this load balancer",
                                decoded.load_balancing_rule[i].name, field
                            ))
                            .with_attribute(format!("load_balancing_rule.{}.{}", i, field)),
                    );
                }
            },
            Err(err) => diagnostics.push(
                Diagnostic::error("Invalid load balancer configuration").with_detail(err.to_string()),
            ),
        }
        diagnostics
    }

    fn plan(&self, prior: Option<&Value>, proposed: Value) -> Result<PlanResult, ProviderError> {
        let proposed = if proposed.is_null() {
            proposed
        } else {
            let config: LoadBalancerConfig = serde_json::from_value(proposed)?;
            serde_json::to_value(config.canonicalize())?
        };
        Ok(plan::plan_resource(&schema(), prior, proposed, set_fingerprint))
    }

    #[instrument(skip_all, fields(resource = LOAD_BALANCER))]
    async fn create(&self, client: &ArmClient, planned: Value) -> Result<Value, ProviderError> {
        let mut config: LoadBalancerConfig = serde_json::from_value(planned)?;
        config = config.canonicalize();
        let name = config.name.clone();
        let resource_group = config.resource_group_name.clone();

        if resource_group.is_empty() {
            return Err(ProviderError::Validation(format!(
                "resource_group_name is required to create Azure ARM Load Balancer '{}'",
                name
            )));
        }

        let body = build_load_balancer(&config, client.subscription_id())?;
        let lbs = LoadBalancersClient::new(client);

        info!(%name, %resource_group, "Creating load balancer");
        lbs.create_or_update(&resource_group, &name, &body)
            .await
            .map_err(|e| {
                ProviderError::azure(format!("Error creating Azure ARM Load Balancer '{}'", name), e)
            })?;

        let read = lbs.get(&resource_group, &name).await.map_err(|e| {
            ProviderError::azure(format!("Error reading Azure ARM Load Balancer '{}'", name), e)
        })?;
        let id = read.id.filter(|id| !id.is_empty()).ok_or_else(|| {
            ProviderError::MissingAttribute(format!(
                "Cannot read Azure ARM Load Balancer {} (resource group {}) ID",
                name, resource_group
            ))
        })?;

        debug!(%id, "Load balancer created");
        config.id = Some(id);
        Ok(serde_json::to_value(config)?)
    }

    #[instrument(skip_all, fields(resource = LOAD_BALANCER))]
    async fn read(&self, client: &ArmClient, current: Value) -> Result<Value, ProviderError> {
        let Some(id) = state_id(&current).map(str::to_string) else {
            debug!("No ID in state, nothing to read");
            return Ok(current);
        };

        let parsed = ResourceId::parse(&id).map_err(|e| ProviderError::Validation(e.to_string()))?;
        let name = parsed.path.get("loadBalancers").cloned().unwrap_or_default();

        match LoadBalancersClient::new(client).get_by_id(&id).await {
            Ok(_) => Ok(current),
            Err(err) if err.is_not_found() => {
                warn!(%name, resource_group = %parsed.resource_group, "Load balancer no longer exists");
                Ok(Value::Null)
            },
            Err(err) => Err(ProviderError::azure(
                format!(
                    "Error reading Azure ARM Load Balancer {} (resource group {})",
                    name, parsed.resource_group
                ),
                err,
            )),
        }
    }

    #[instrument(skip_all, fields(resource = LOAD_BALANCER))]
    async fn delete(&self, client: &ArmClient, current: Value) -> Result<(), ProviderError> {
        let Some(id) = state_id(&current) else {
            debug!("No ID in state, nothing to delete");
            return Ok(());
        };

        let parsed = ResourceId::parse(id).map_err(|e| ProviderError::Validation(e.to_string()))?;
        let name = parsed.path.get("loadBalancers").cloned().unwrap_or_default();

        info!(%name, resource_group = %parsed.resource_group, "Deleting load balancer");
        LoadBalancersClient::new(client)
            .delete_by_id(id)
            .await
            .map_err(|e| {
                ProviderError::azure(format!("Error deleting Azure ARM Load Balancer '{}'", name), e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{arm_client, mount_token, LB_ID, SUBSCRIPTION};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_value() -> Value {
        json!({
            "name": "lb1",
            "type": "Internal",
            "location": "West US",
            "resource_group_name": "rg1",
            "tags": {"env": "test"},
            "frontend_ip_configuration": [{
                "name": "lb-frontend",
                "private_ip_allocation_method": "Dynamic",
                "private_ip_address": "",
                "subnet": "/subnets/x"
            }],
            "backend_address_pool": [{"name": "pool"}],
            "load_balancing_rule": [{
                "name": "http",
                "frontend_ip_configuration": "lb-frontend",
                "backend_address_pool": "pool",
                "probe": "tcp",
                "protocol": "Tcp",
                "frontend_port": 80,
                "backend_port": 8080,
                "idle_timeout_in_minutes": 4
            }],
            "probe": [{
                "name": "tcp",
                "protocol": "Tcp",
                "port": 8080,
                "number_of_probes": 2,
                "interval_in_seconds": 5
            }]
        })
    }

    fn config() -> LoadBalancerConfig {
        serde_json::from_value(config_value()).unwrap()
    }

    #[test]
    fn test_validate_load_balancer_type() {
        for ok in ["Internal", "internal", "PUBLIC", "Public"] {
            assert!(validate_load_balancer_type(ok, "type").is_empty(), "{}", ok);
        }
        for bad in ["", "private", "internal ", "Basic"] {
            let diagnostics = validate_load_balancer_type(bad, "type");
            assert_eq!(diagnostics.len(), 1, "{}", bad);
            assert_eq!(diagnostics[0].summary, "\"type\" must be either Internal or Public");
        }
    }

    #[test]
    fn test_hash_keys() {
        let c = config();
        assert_eq!(c.backend_address_pool[0].hash_key(), "pool-");
        assert_eq!(
            c.frontend_ip_configuration[0].hash_key(),
            "lb-frontend-Dynamic--/subnets/x-"
        );
        assert_eq!(
            c.load_balancing_rule[0].hash_key(),
            "http-lb-frontend-pool-tcp-Tcp-80-8080-4-"
        );
        assert_eq!(c.probe[0].hash_key(), "tcp-Tcp-8080-2-5-");
        assert_eq!(
            c.probe[0].set_hash(),
            hashcode::string("tcp-Tcp-8080-2-5-")
        );
    }

    #[test]
    fn test_hash_ignores_json_key_order() {
        let a: ProbeBlock = serde_json::from_str(
            r#"{"name":"p","protocol":"Http","port":80,"number_of_probes":2,"interval_in_seconds":15}"#,
        )
        .unwrap();
        let b: ProbeBlock = serde_json::from_str(
            r#"{"interval_in_seconds":15,"port":80,"number_of_probes":2,"protocol":"Http","name":"p"}"#,
        )
        .unwrap();
        assert_eq!(a.set_hash(), b.set_hash());
    }

    #[test]
    fn test_absent_optional_strings_hash_as_empty() {
        let block: FrontendIpConfigurationBlock =
            serde_json::from_value(json!({"name": "fe", "subnet": "/s", "private_ip_address": null}))
                .unwrap();
        assert_eq!(block.hash_key(), "fe---/s-");
    }

    #[test]
    fn test_expand_frontend_ip_configuration() {
        let expanded = expand_frontend_ip_configurations(&config().frontend_ip_configuration);
        assert_eq!(expanded.len(), 1);

        let fe = &expanded[0];
        assert_eq!(fe.name.as_deref(), Some("lb-frontend"));
        let props = fe.properties.as_ref().unwrap();
        assert_eq!(props.private_ip_allocation_method.as_deref(), Some("Dynamic"));
        assert_eq!(props.private_ip_address, None);
        assert_eq!(props.subnet, Some(SubResource::new("/subnets/x")));
    }

    #[test]
    fn test_expand_backend_address_pools_and_probes() {
        let c = config();
        let pools = expand_backend_address_pools(&c.backend_address_pool);
        assert_eq!(pools[0].name.as_deref(), Some("pool"));

        let probes = expand_probes(&c.probe);
        let props = probes[0].properties.as_ref().unwrap();
        assert_eq!(props.protocol.as_deref(), Some("Tcp"));
        assert_eq!(props.port, Some(8080));
        assert_eq!(props.number_of_probes, Some(2));
        assert_eq!(props.interval_in_seconds, Some(5));
    }

    #[test]
    fn test_expand_rules_resolves_references() {
        let rules = expand_load_balancing_rules(LB_ID, &config()).unwrap();
        let props = rules[0].properties.as_ref().unwrap();

        assert_eq!(
            props.frontend_ip_configuration,
            Some(SubResource::new(format!("{}/frontendIPConfigurations/lb-frontend", LB_ID)))
        );
        assert_eq!(
            props.backend_address_pool,
            Some(SubResource::new(format!("{}/backendAddressPools/pool", LB_ID)))
        );
        assert_eq!(props.probe, Some(SubResource::new(format!("{}/probes/tcp", LB_ID))));
        assert_eq!(props.idle_timeout_in_minutes, Some(4));
        assert_eq!(props.load_distribution, None);
        assert_eq!(props.enable_floating_ip, None);
    }

    #[test]
    fn test_expand_rules_unknown_probe() {
        let mut c = config();
        c.load_balancing_rule[0].probe = "missing".to_string();

        let err = expand_load_balancing_rules(LB_ID, &c).unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("Error Building list of Load Balancing Rules: "));
        assert!(text.contains("\"missing\""));
    }

    #[test]
    fn test_build_omits_empty_probes() {
        let mut value = config_value();
        value["probe"] = json!([]);
        value["load_balancing_rule"] = json!([]);
        let c: LoadBalancerConfig = serde_json::from_value(value).unwrap();

        let lb = build_load_balancer(&c, SUBSCRIPTION).unwrap();
        let props = lb.properties.as_ref().unwrap();
        assert!(props.probes.is_none());
        assert!(props.load_balancing_rules.is_none());

        let body = serde_json::to_value(&lb).unwrap();
        assert!(body["properties"].get("probes").is_none());
        assert!(body["properties"].get("frontendIPConfigurations").is_some());
    }

    #[test]
    fn test_build_load_balancer_top_level_fields() {
        let lb = build_load_balancer(&config(), SUBSCRIPTION).unwrap();
        assert_eq!(lb.name.as_deref(), Some("lb1"));
        assert_eq!(lb.lb_type.as_deref(), Some("Internal"));
        assert_eq!(lb.location.as_deref(), Some("westus"));
        assert_eq!(lb.tags.unwrap()["env"], "test");
    }

    #[test]
    fn test_normalize_location() {
        assert_eq!(normalize_location("West Europe"), "westeurope");
        assert_eq!(normalize_location("westeurope"), "westeurope");
        assert_eq!(normalize_location(""), "");
    }

    #[test]
    fn test_canonicalize_dedupes_identical_blocks() {
        let mut value = config_value();
        value["backend_address_pool"] = json!([{"name": "b"}, {"name": "a"}, {"name": "b"}]);
        let c: LoadBalancerConfig = serde_json::from_value(value).unwrap();

        let canonical = c.canonicalize();
        assert_eq!(canonical.backend_address_pool.len(), 2);
        assert_eq!(canonical.location, "westus");
    }

    #[test]
    fn test_validate_reports_type_and_references() {
        let resource = LoadBalancerResource;
        assert!(resource.validate(&config_value()).is_empty());

        let mut value = config_value();
        value["type"] = json!("Basic");
        let diagnostics = resource.validate(&value);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("type"));

        let mut value = config_value();
        value["load_balancing_rule"][0]["backend_address_pool"] = json!("nope");
        let diagnostics = resource.validate(&value);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute.as_deref(),
            Some("load_balancing_rule.0.backend_address_pool")
        );
    }

    #[test]
    fn test_validate_requires_sets() {
        let mut value = config_value();
        value.as_object_mut().unwrap().remove("probe");
        let diagnostics = LoadBalancerResource.validate(&value);
        assert!(diagnostics.iter().any(|d| d.attribute.as_deref() == Some("probe")));
    }

    #[test]
    fn test_plan_create_normalises_location() {
        let result = LoadBalancerResource.plan(None, config_value()).unwrap();
        assert_eq!(result.planned_state["location"], "westus");
        assert!(!result.requires_replace);
        assert!(result.changes.iter().any(|c| c.path == "probe"));
    }

    #[test]
    fn test_plan_reordered_sets_no_change() {
        let mut prior_value = config_value();
        prior_value["backend_address_pool"] = json!([{"name": "a"}, {"name": "pool"}]);
        let prior = LoadBalancerResource.plan(None, prior_value.clone()).unwrap().planned_state;

        let mut proposed = prior_value;
        proposed["backend_address_pool"] = json!([{"name": "pool"}, {"name": "a"}]);
        let result = LoadBalancerResource.plan(Some(&prior), proposed).unwrap();
        assert!(result.changes.is_empty(), "{:?}", result.changes);
    }

    #[test]
    fn test_plan_name_change_requires_replace() {
        let mut prior = config_value();
        prior["id"] = json!(LB_ID);
        let mut proposed = config_value();
        proposed["name"] = json!("lb2");

        let result = LoadBalancerResource.plan(Some(&prior), proposed).unwrap();
        assert!(result.requires_replace);
        assert_eq!(result.planned_state["id"], LB_ID);
    }

    #[test]
    fn test_plan_tag_change_in_place() {
        let prior = LoadBalancerResource.plan(None, config_value()).unwrap().planned_state;
        let mut proposed = config_value();
        proposed["tags"] = json!({"env": "prod"});

        let result = LoadBalancerResource.plan(Some(&prior), proposed).unwrap();
        assert!(!result.requires_replace);
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].path, "tags");
    }

    #[test]
    fn test_plan_rule_fields_outside_hash_are_changes() {
        let mut prior_value = config_value();
        prior_value["load_balancing_rule"][0]["load_distribution"] = json!("Default");
        let prior = LoadBalancerResource.plan(None, prior_value).unwrap().planned_state;

        let mut proposed = config_value();
        proposed["load_balancing_rule"][0]["load_distribution"] = json!("SourceIP");
        let result = LoadBalancerResource.plan(Some(&prior), proposed.clone()).unwrap();
        assert!(!result.requires_replace);
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].path, "load_balancing_rule");
        assert_eq!(
            result.planned_state["load_balancing_rule"][0]["load_distribution"],
            "SourceIP"
        );

        proposed["load_balancing_rule"][0]["load_distribution"] = json!("Default");
        proposed["load_balancing_rule"][0]["enable_floating_ip"] = json!(true);
        let result = LoadBalancerResource.plan(Some(&prior), proposed).unwrap();
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].path, "load_balancing_rule");
    }

    #[test]
    fn test_canonicalize_keeps_rules_differing_outside_hash() {
        let mut value = config_value();
        let rule = value["load_balancing_rule"][0].clone();
        let mut other = rule.clone();
        other["load_distribution"] = json!("SourceIP");
        value["load_balancing_rule"] = json!([rule.clone(), other, rule]);
        let c: LoadBalancerConfig = serde_json::from_value(value).unwrap();

        let canonical = c.canonicalize();
        assert_eq!(canonical.load_balancing_rule.len(), 2);
        assert!(canonical
            .load_balancing_rule
            .iter()
            .any(|r| r.load_distribution == "SourceIP"));
    }

    #[tokio::test]
    async fn test_create_puts_then_reads_id() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("PUT"))
            .and(path(LB_ID))
            .and(body_partial_json(json!({
                "name": "lb1",
                "type": "Internal",
                "location": "westus",
                "properties": {
                    "backendAddressPools": [{"name": "pool"}],
                    "probes": [{"name": "tcp"}]
                }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"name": "lb1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(LB_ID))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": LB_ID,
                "name": "lb1",
                "properties": {"provisioningState": "Succeeded"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = arm_client(&server);
        let state = LoadBalancerResource.create(&client, config_value()).await.unwrap();
        assert_eq!(state["id"], LB_ID);
        assert_eq!(state["location"], "westus");
        assert_eq!(state["probe"][0]["name"], "tcp");
    }

    #[tokio::test]
    async fn test_create_missing_id() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "lb1"})))
            .mount(&server)
            .await;

        let client = arm_client(&server);
        let err = LoadBalancerResource.create(&client, config_value()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot read Azure ARM Load Balancer lb1 (resource group rg1) ID"
        );
    }

    #[tokio::test]
    async fn test_create_api_error_is_wrapped() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": "InvalidResourceReference", "message": "bad subnet"}
            })))
            .mount(&server)
            .await;

        let client = arm_client(&server);
        let err = LoadBalancerResource.create(&client, config_value()).await.unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("Error creating Azure ARM Load Balancer 'lb1': "));
        assert!(text.contains("bad subnet"));
    }

    #[tokio::test]
    async fn test_create_expander_error_makes_no_calls() {
        let server = MockServer::start().await;
        let mut value = config_value();
        value["load_balancing_rule"][0]["probe"] = json!("missing");

        let client = arm_client(&server);
        let err = LoadBalancerResource.create(&client, value).await.unwrap_err();
        assert!(matches!(err, ProviderError::Expand { .. }));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_requires_resource_group() {
        let server = MockServer::start().await;
        let mut value = config_value();
        value.as_object_mut().unwrap().remove("resource_group_name");

        let client = arm_client(&server);
        let err = LoadBalancerResource.create(&client, value).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_read_without_id_returns_state() {
        let server = MockServer::start().await;
        let client = arm_client(&server);

        let state = LoadBalancerResource.read(&client, config_value()).await.unwrap();
        assert_eq!(state, config_value());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_existing_and_gone() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path(LB_ID))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": LB_ID})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(LB_ID))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": "ResourceNotFound", "message": "gone"}
            })))
            .mount(&server)
            .await;

        let client = arm_client(&server);
        let mut state = config_value();
        state["id"] = json!(LB_ID);

        let read = LoadBalancerResource.read(&client, state.clone()).await.unwrap();
        assert_eq!(read, state);

        let read = LoadBalancerResource.read(&client, state).await.unwrap();
        assert!(read.is_null());
    }

    #[tokio::test]
    async fn test_delete() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("DELETE"))
            .and(path(LB_ID))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = arm_client(&server);
        let mut state = config_value();
        state["id"] = json!(LB_ID);
        LoadBalancerResource.delete(&client, state).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_already_gone_and_without_id() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": "ResourceNotFound", "message": "gone"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = arm_client(&server);
        LoadBalancerResource.delete(&client, config_value()).await.unwrap();

        let mut state = config_value();
        state["id"] = json!(LB_ID);
        LoadBalancerResource.delete(&client, state).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_rejects_malformed_id() {
        let server = MockServer::start().await;
        let client = arm_client(&server);

        let err = LoadBalancerResource
            .delete(&client, json!({"id": "not-an-id"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }
}
