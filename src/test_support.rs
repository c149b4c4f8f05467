//! Shared fixtures for tests that talk to a mocked Azure.

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::arm::{ArmClient, ArmClientOptions};
use crate::config::ProviderConfig;

pub const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000001";
pub const LB_ID: &str = "/subscriptions/00000000-0000-0000-0000-000000000001/resourceGroups/rg1/providers/Microsoft.Network/loadBalancers/lb1";

/// Provider block pointing both endpoints at the mock server.
pub fn provider_config_value(server: &MockServer) -> Value {
    json!({
        "subscription_id": SUBSCRIPTION,
        "client_id": "app",
        "client_secret": "secret",
        "tenant_id": "tenant",
        "resource_manager_endpoint": server.uri(),
        "active_directory_endpoint": server.uri(),
    })
}

pub fn provider_config(server: &MockServer) -> ProviderConfig {
    ProviderConfig::from_value_with_env(&provider_config_value(server), |_| None).unwrap()
}

pub fn fast_options() -> ArmClientOptions {
    ArmClientOptions::default()
        .with_poll_interval(Duration::from_millis(10))
        .with_operation_timeout(Duration::from_secs(5))
}

pub fn arm_client(server: &MockServer) -> ArmClient {
    ArmClient::new(&provider_config(server), fast_options()).unwrap()
}

/// Answer the client credentials flow with a one hour token `tok`.
pub async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/tenant/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok",
            "token_type": "Bearer",
            "expires_in": 3599,
        })))
        .mount(server)
        .await;
}
