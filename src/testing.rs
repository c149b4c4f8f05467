//! Harness for exercising a [`ProviderService`] without a gRPC server.
//!
//! ```ignore
//! use hemmer_provider_azurerm::testing::ProviderTester;
//! use hemmer_provider_azurerm::AzureRmProvider;
//!
//! let tester = ProviderTester::new(AzureRmProvider::new());
//! tester.configure(json!({"subscription_id": "...", /* ... */})).await?;
//! let state = tester.lifecycle_create("azurerm_lb", config).await?;
//! ```

use std::fmt;

use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::PlanResult;

/// Drives a provider through the same calls the host would make.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap a provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Resource type names from metadata.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Validate the provider block. Error diagnostics become `Err`.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider. Error diagnostics become `Err`.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    /// Validate a resource block. Error diagnostics become `Err`.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a create.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    /// Plan an update from `prior_state`.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(
                resource_type,
                Some(prior_state),
                proposed_state.clone(),
                proposed_state,
            )
            .await
    }

    /// Plan a destroy.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create a resource.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Refresh a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update a resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Plan, create, then read back. Returns the refreshed state.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// Plan, update, then read back. Returns the refreshed state.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read(resource_type, updated).await
    }

    /// Plan a destroy, then delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state).await
    }

    /// Create, update, then delete. Returns the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated.clone())
            .await?;
        Ok(updated)
    }
}

/// Failure from a harness call that reports diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// Error diagnostics returned by the provider.
    Diagnostics(Vec<Diagnostic>),
    /// The call itself failed.
    Provider(ProviderError),
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "{} error diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  {}", diag.summary)?;
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

fn changed_paths(plan: &PlanResult) -> Vec<&str> {
    plan.changes.iter().map(|c| c.path.as_str()).collect()
}

/// Assert the plan creates the resource.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(!plan.changes.is_empty(), "Expected a create, but the plan has no changes");
    assert!(
        plan.changes.iter().all(|c| c.before.is_none()),
        "Expected a create, but some attributes had prior values: {:?}",
        changed_paths(plan)
    );
    assert!(!plan.requires_replace, "Expected a create, not a replace");
}

/// Assert the plan changes nothing.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        !plan.has_changes(),
        "Expected no changes, but got: {:?}",
        changed_paths(plan)
    );
}

/// Assert the plan forces replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected replacement, but the plan updates in place: {:?}",
        changed_paths(plan)
    );
}

/// Assert the plan changes something without forcing replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(!plan.changes.is_empty(), "Expected an update, but the plan has no changes");
    assert!(!plan.requires_replace, "Expected an in-place update, but the plan replaces");
}

/// Assert the plan changes `path`.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "Expected '{}' to change. Changed: {:?}",
        path,
        changed_paths(plan)
    );
}

/// Assert the plan leaves `path` alone.
pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().all(|c| c.path != path),
        "Expected '{}' to be unchanged",
        path
    );
}

/// Assert no diagnostic is an error.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| &d.summary)
        .collect();
    assert!(errors.is_empty(), "Expected no errors, but got: {:?}", errors);
}

/// Assert some error diagnostic's summary contains `substring`.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    assert!(
        diagnostics
            .iter()
            .any(|d| d.is_error() && d.summary.contains(substring)),
        "Expected an error containing '{}'. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::AzureRmProvider;
    use crate::types::AttributeChange;
    use serde_json::json;

    fn tester() -> ProviderTester<AzureRmProvider> {
        ProviderTester::new(AzureRmProvider::new())
    }

    fn minimal_lb() -> Value {
        json!({
            "name": "lb1",
            "type": "Public",
            "resource_group_name": "rg1",
            "frontend_ip_configuration": [{"name": "fe", "subnet": "/subnets/a"}],
            "backend_address_pool": [{"name": "pool"}],
            "probe": [{"name": "p", "protocol": "Tcp", "port": 22, "interval_in_seconds": 5, "number_of_probes": 2}],
            "load_balancing_rule": [{
                "name": "r",
                "frontend_ip_configuration": "fe",
                "backend_address_pool": "pool",
                "probe": "p",
                "protocol": "Tcp",
                "frontend_port": 80,
                "backend_port": 8080,
                "idle_timeout_in_minutes": 4
            }]
        })
    }

    #[test]
    fn test_resource_types() {
        assert_eq!(tester().resource_types(), vec!["azurerm_lb".to_string()]);
        assert!(tester().schema().resources.contains_key("azurerm_lb"));
    }

    #[tokio::test]
    async fn test_validate_resource_config_collects_errors() {
        let mut config = minimal_lb();
        config["type"] = json!("External");
        config["load_balancing_rule"][0]["probe"] = json!("missing");

        match tester().validate_resource_config("azurerm_lb", config).await {
            Err(TestError::Diagnostics(diags)) => {
                assert_error_contains(&diags, "must be either Internal or Public");
            },
            other => panic!("expected diagnostics, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_plan_tags_update_in_place() {
        let mut prior = minimal_lb();
        prior["id"] = json!("/subscriptions/s/resourceGroups/rg1/providers/Microsoft.Network/loadBalancers/lb1");
        let mut proposed = minimal_lb();
        proposed["tags"] = json!({"env": "prod"});

        let plan = tester().plan_update("azurerm_lb", prior, proposed).await.unwrap();
        assert_plan_updates_in_place(&plan);
        assert_plan_changes_attribute(&plan, "tags");
        assert_plan_does_not_change_attribute(&plan, "id");
    }

    #[tokio::test]
    async fn test_plan_reordered_sets_is_no_change() {
        let mut prior = minimal_lb();
        prior["backend_address_pool"] = json!([{"name": "a"}, {"name": "b"}]);
        let mut proposed = minimal_lb();
        proposed["backend_address_pool"] = json!([{"name": "b"}, {"name": "a"}]);

        let plan = tester().plan_update("azurerm_lb", prior, proposed).await.unwrap();
        assert_plan_no_changes(&plan);
    }

    #[tokio::test]
    async fn test_plan_delete_removes() {
        let plan = tester().plan_delete("azurerm_lb", minimal_lb()).await.unwrap();
        assert!(plan.planned_state.is_null());
        assert!(plan.changes.iter().all(|c| c.after.is_none()));
    }

    #[test]
    fn test_plan_create_adds_every_configured_attribute() {
        let plan = tokio_test::block_on(tester().plan_create("azurerm_lb", minimal_lb())).unwrap();
        assert_plan_creates(&plan);
        for path in ["name", "type", "resource_group_name", "probe", "load_balancing_rule"] {
            assert_plan_changes_attribute(&plan, path);
        }
        assert_plan_does_not_change_attribute(&plan, "location");
    }

    #[test]
    fn test_assert_no_errors_accepts_warnings() {
        assert_no_errors(&[Diagnostic::warning("deprecated")]);
    }

    #[test]
    #[should_panic(expected = "Expected no errors")]
    fn test_assert_no_errors_fails() {
        assert_no_errors(&[Diagnostic::error("boom")]);
    }

    #[test]
    #[should_panic(expected = "Expected a create")]
    fn test_assert_plan_creates_rejects_updates() {
        let plan = PlanResult::with_changes(
            json!({}),
            vec![AttributeChange::modified("tags", json!({}), json!({"a": "b"}))],
            false,
        );
        assert_plan_creates(&plan);
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![Diagnostic::error("Missing required attribute 'name'")
            .with_attribute("name")
            .with_detail("set it")]);
        let text = err.to_string();
        assert!(text.starts_with("1 error diagnostic(s):"));
        assert!(text.contains("Missing required attribute 'name' (at name): set it"));

        let err: TestError = ProviderError::NotConfigured("x".to_string()).into();
        assert_eq!(err.to_string(), "Provider error: Provider not configured: x");
    }
}
