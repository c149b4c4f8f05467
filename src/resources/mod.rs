//! Managed resource types.
//!
//! Each resource implements [`Resource`]; the provider dispatches requests to
//! it by type name.

pub mod load_balancer;

use std::sync::Arc;

use serde_json::Value;

use crate::arm::ArmClient;
use crate::error::ProviderError;
use crate::plan;
use crate::schema::{Diagnostic, Schema};
use crate::types::PlanResult;
use crate::validation;

pub use load_balancer::LoadBalancerResource;

/// Lifecycle of one managed resource type.
#[async_trait::async_trait]
pub trait Resource: Send + Sync {
    /// Type name used in configuration, e.g. `azurerm_lb`.
    fn type_name(&self) -> &'static str;

    /// Schema of the resource block.
    fn schema(&self) -> Schema;

    /// Validate configuration before planning.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        validation::validate(&self.schema(), config)
    }

    /// Compute the planned state and the changes it implies.
    fn plan(&self, prior: Option<&Value>, proposed: Value) -> Result<PlanResult, ProviderError> {
        Ok(plan::plan_resource(&self.schema(), prior, proposed, |_, _| None))
    }

    /// Create the resource and return its new state.
    async fn create(&self, client: &ArmClient, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh state. Returns `Value::Null` when the resource no longer exists.
    async fn read(&self, client: &ArmClient, current: Value) -> Result<Value, ProviderError>;

    /// Update the resource in place. Defaults to a full create-or-update.
    async fn update(
        &self,
        client: &ArmClient,
        _prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        self.create(client, planned).await
    }

    /// Delete the resource.
    async fn delete(&self, client: &ArmClient, current: Value) -> Result<(), ProviderError>;
}

/// Every resource this provider manages.
pub fn all() -> Vec<Arc<dyn Resource>> {
    vec![Arc::new(LoadBalancerResource)]
}
