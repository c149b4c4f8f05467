//! Provider configuration: credentials and cloud endpoints.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::schema::{Attribute, Diagnostic, Schema};
use crate::validation;

/// The Azure cloud a subscription lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AzureEnvironment {
    /// Azure public cloud.
    #[default]
    Public,
    /// Azure US Government.
    UsGovernment,
    /// Azure China (21Vianet).
    China,
    /// Azure Germany.
    German,
}

impl AzureEnvironment {
    /// Parse an environment name as accepted in provider configuration.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "" | "public" | "azurepubliccloud" => Some(Self::Public),
            "usgovernment" | "azureusgovernmentcloud" => Some(Self::UsGovernment),
            "china" | "azurechinacloud" => Some(Self::China),
            "german" | "azuregermancloud" => Some(Self::German),
            _ => None,
        }
    }

    /// Azure Resource Manager endpoint.
    pub fn resource_manager_endpoint(self) -> &'static str {
        match self {
            Self::Public => "https://management.azure.com",
            Self::UsGovernment => "https://management.usgovcloudapi.net",
            Self::China => "https://management.chinacloudapi.cn",
            Self::German => "https://management.microsoftazure.de",
        }
    }

    /// Azure Active Directory authority.
    pub fn active_directory_endpoint(self) -> &'static str {
        match self {
            Self::Public => "https://login.microsoftonline.com",
            Self::UsGovernment => "https://login.microsoftonline.us",
            Self::China => "https://login.chinacloudapi.cn",
            Self::German => "https://login.microsoftonline.de",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    subscription_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    tenant_id: Option<String>,
    environment: Option<String>,
    resource_manager_endpoint: Option<String>,
    active_directory_endpoint: Option<String>,
}

/// Resolved provider configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Subscription all resources are created in.
    pub subscription_id: String,
    /// Service principal application id.
    pub client_id: String,
    /// Service principal secret.
    pub client_secret: String,
    /// Azure AD tenant of the service principal.
    pub tenant_id: String,
    /// Cloud the subscription lives in.
    pub environment: AzureEnvironment,
    /// Base URL for ARM requests, without trailing slash.
    pub resource_manager_endpoint: String,
    /// Base URL of the token authority, without trailing slash.
    pub active_directory_endpoint: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("subscription_id", &self.subscription_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .field("environment", &self.environment)
            .field("resource_manager_endpoint", &self.resource_manager_endpoint)
            .field("active_directory_endpoint", &self.active_directory_endpoint)
            .finish()
    }
}

impl ProviderConfig {
    /// Schema of the provider block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("Azure Resource Manager provider")
            .with_attribute(
                "subscription_id",
                Attribute::optional_string()
                    .with_description("Subscription ID. Falls back to ARM_SUBSCRIPTION_ID."),
            )
            .with_attribute(
                "client_id",
                Attribute::optional_string()
                    .with_description("Service principal client ID. Falls back to ARM_CLIENT_ID."),
            )
            .with_attribute(
                "client_secret",
                Attribute::optional_string()
                    .sensitive()
                    .with_description("Service principal secret. Falls back to ARM_CLIENT_SECRET."),
            )
            .with_attribute(
                "tenant_id",
                Attribute::optional_string()
                    .with_description("Azure AD tenant ID. Falls back to ARM_TENANT_ID."),
            )
            .with_attribute(
                "environment",
                Attribute::optional_string()
                    .with_default(Value::String("public".to_string()))
                    .with_description(
                        "Cloud environment: public, usgovernment, china or german. \
                         Falls back to ARM_ENVIRONMENT.",
                    ),
            )
            .with_attribute(
                "resource_manager_endpoint",
                Attribute::optional_string()
                    .with_description("Override the Resource Manager endpoint."),
            )
            .with_attribute(
                "active_directory_endpoint",
                Attribute::optional_string()
                    .with_description("Override the Active Directory authority."),
            )
    }

    /// Resolve configuration from the provider block and the process environment.
    pub fn from_value(value: &Value) -> Result<Self, Vec<Diagnostic>> {
        Self::from_value_with_env(value, |key| std::env::var(key).ok())
    }

    /// Resolve configuration with an explicit environment lookup.
    pub fn from_value_with_env<F>(value: &Value, env: F) -> Result<Self, Vec<Diagnostic>>
    where
        F: Fn(&str) -> Option<String>,
    {
        validation::validate_result(&Self::schema(), value)?;

        let raw: RawConfig = if value.is_null() {
            RawConfig::default()
        } else {
            serde_json::from_value(value.clone()).map_err(|e| {
                vec![Diagnostic::error("Invalid provider configuration").with_detail(e.to_string())]
            })?
        };

        let mut diagnostics = Vec::new();
        let mut resolve = |field: Option<String>, attribute: &str, var: &str| -> String {
            match field.filter(|s| !s.is_empty()).or_else(|| env(var)) {
                Some(v) if !v.is_empty() => v,
                _ => {
                    diagnostics.push(
                        Diagnostic::error(format!("Missing required attribute '{}'", attribute))
                            .with_detail(format!("Set '{}' or the {} environment variable", attribute, var))
                            .with_attribute(attribute),
                    );
                    String::new()
                },
            }
        };

        let subscription_id = resolve(raw.subscription_id, "subscription_id", "ARM_SUBSCRIPTION_ID");
        let client_id = resolve(raw.client_id, "client_id", "ARM_CLIENT_ID");
        let client_secret = resolve(raw.client_secret, "client_secret", "ARM_CLIENT_SECRET");
        let tenant_id = resolve(raw.tenant_id, "tenant_id", "ARM_TENANT_ID");

        let environment_name = raw
            .environment
            .filter(|s| !s.is_empty())
            .or_else(|| env("ARM_ENVIRONMENT"))
            .unwrap_or_default();
        let environment = match AzureEnvironment::parse(&environment_name) {
            Some(environment) => environment,
            None => {
                diagnostics.push(
                    Diagnostic::error(format!("Unknown Azure environment '{}'", environment_name))
                        .with_detail("Expected one of: public, usgovernment, china, german")
                        .with_attribute("environment"),
                );
                AzureEnvironment::Public
            },
        };

        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        let endpoint = |over: Option<String>, default: &str| {
            over.filter(|s| !s.is_empty())
                .unwrap_or_else(|| default.to_string())
                .trim_end_matches('/')
                .to_string()
        };

        Ok(Self {
            subscription_id,
            client_id,
            client_secret,
            tenant_id,
            environment,
            resource_manager_endpoint: endpoint(
                raw.resource_manager_endpoint,
                environment.resource_manager_endpoint(),
            ),
            active_directory_endpoint: endpoint(
                raw.active_directory_endpoint,
                environment.active_directory_endpoint(),
            ),
        })
    }

    /// OAuth2 token endpoint for the configured tenant.
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.active_directory_endpoint, self.tenant_id
        )
    }

    /// OAuth2 scope granting access to Resource Manager.
    pub fn token_scope(&self) -> String {
        format!("{}/.default", self.resource_manager_endpoint)
    }
}
