//! Azure Resource Manager HTTP client.
//!
//! A thin authenticated JSON client over `reqwest`: service principal token
//! acquisition with caching, the ARM error envelope, and polling of
//! long-running operations until they reach a terminal state.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::config::ProviderConfig;

/// Refresh tokens this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Errors returned by Azure Resource Manager or the token endpoint.
#[derive(Debug, Error)]
pub enum ArmError {
    /// The request never produced a response.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// ARM answered with an error status.
    #[error("{message} (status {status}, code {code})")]
    Api {
        /// HTTP status code.
        status: u16,
        /// ARM error code, e.g. `ResourceGroupNotFound`.
        code: String,
        /// Human readable message.
        message: String,
    },

    /// A long-running operation reached a failed terminal state.
    #[error("operation {status}: {message}")]
    OperationFailed {
        /// Terminal status, `Failed` or `Canceled`.
        status: String,
        /// Message from the operation's error document.
        message: String,
    },

    /// A long-running operation did not finish in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The service principal could not obtain a token.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// ARM returned a body that could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A resource ID could not be parsed.
    #[error("invalid resource ID {id:?}: {reason}")]
    InvalidResourceId {
        /// The ID as given.
        id: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl ArmError {
    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether ARM reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Timeouts and polling behaviour for [`ArmClient`].
#[derive(Debug, Clone)]
pub struct ArmClientOptions {
    /// Timeout for a single HTTP request.
    pub request_timeout: Duration,
    /// Delay between polls when ARM sends no `Retry-After`.
    pub poll_interval: Duration,
    /// Upper bound on waiting for a long-running operation.
    pub operation_timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for ArmClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(10),
            operation_timeout: Duration::from_secs(30 * 60),
            user_agent: format!("hemmer-provider-azurerm/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ArmClientOptions {
    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the default poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the long-running operation timeout.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

struct AccessToken {
    token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct TokenError {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
}

/// OAuth2 client credentials flow against Azure Active Directory.
pub struct ClientSecretCredential {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    cached: Mutex<Option<AccessToken>>,
}

impl ClientSecretCredential {
    /// Build a credential for the configured service principal.
    pub fn new(http: Client, config: &ProviderConfig) -> Self {
        Self {
            http,
            token_url: config.token_url(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: config.token_scope(),
            cached: Mutex::new(None),
        }
    }

    /// Return a bearer token, requesting a new one when the cached one is near expiry.
    pub async fn token(&self) -> Result<String, ArmError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_REFRESH_MARGIN < token.expires_at {
                return Ok(token.token.clone());
            }
        }

        debug!(url = %self.token_url, "Requesting access token");
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = match serde_json::from_str::<TokenError>(&body) {
                Ok(err) if !err.error_description.is_empty() => err.error_description,
                Ok(err) if !err.error.is_empty() => err.error,
                _ => format!("token endpoint returned {}", status),
            };
            return Err(ArmError::Authentication(message));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| ArmError::Authentication(format!("malformed token response: {}", e)))?;
        let lifetime = parsed
            .expires_in
            .as_ref()
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .unwrap_or(3600);

        let token = parsed.access_token;
        *cached = Some(AccessToken {
            token: token.clone(),
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        });
        Ok(token)
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct OperationStatus {
    status: String,
    #[serde(default)]
    error: Option<ErrorBody>,
}

/// Authenticated client for one subscription.
pub struct ArmClient {
    http: Client,
    endpoint: String,
    subscription_id: String,
    credential: ClientSecretCredential,
    options: ArmClientOptions,
}

impl ArmClient {
    /// Create a client from resolved provider configuration.
    pub fn new(config: &ProviderConfig, options: ArmClientOptions) -> Result<Self, ArmError> {
        let http = Client::builder()
            .timeout(options.request_timeout)
            .user_agent(&options.user_agent)
            .pool_max_idle_per_host(10)
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            credential: ClientSecretCredential::new(http.clone(), config),
            http,
            endpoint: config.resource_manager_endpoint.clone(),
            subscription_id: config.subscription_id.clone(),
            options,
        })
    }

    /// The subscription this client operates in.
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// GET a resource.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, api_version: &str) -> Result<T, ArmError> {
        let response = self.send(Method::GET, path, api_version, None::<&()>).await?;
        let response = check(response).await?;
        decode(response).await
    }

    /// PUT a resource and wait for provisioning to finish.
    pub async fn put<B: Serialize>(&self, path: &str, api_version: &str, body: &B) -> Result<(), ArmError> {
        let response = self.send(Method::PUT, path, api_version, Some(body)).await?;
        let response = check(response).await?;
        self.wait_for_completion(path, response).await
    }

    /// DELETE a resource and wait for the deletion to finish.
    pub async fn delete(&self, path: &str, api_version: &str) -> Result<(), ArmError> {
        let response = self.send(Method::DELETE, path, api_version, None::<&()>).await?;
        let response = check(response).await?;
        self.wait_for_completion(path, response).await
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        api_version: &str,
        body: Option<&B>,
    ) -> Result<Response, ArmError> {
        let url = format!("{}{}", self.endpoint, path);
        trace!(%method, %url, "ARM request");

        let mut request = self
            .http
            .request(method, &url)
            .query(&[("api-version", api_version)])
            .header(AUTHORIZATION, format!("Bearer {}", self.credential.token().await?));
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    async fn poll(&self, url: &str) -> Result<Response, ArmError> {
        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.credential.token().await?))
            .send()
            .await?;
        check(response).await
    }

    async fn wait_for_completion(&self, path: &str, response: Response) -> Result<(), ArmError> {
        let headers = response.headers();
        let async_operation = header(headers, "azure-asyncoperation");
        let location = header(headers, "location");
        if async_operation.is_none()
            && !(response.status() == StatusCode::ACCEPTED && location.is_some())
        {
            return Ok(());
        }

        debug!(%path, "Waiting for long-running operation");
        let deadline = self.options.operation_timeout;
        let first_delay = retry_after(headers).unwrap_or(self.options.poll_interval);
        let polling = self.poll_until_done(path, async_operation, location, first_delay);

        match tokio::time::timeout(deadline, polling).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%path, ?deadline, "Long-running operation timed out");
                Err(ArmError::Timeout(format!(
                    "operation on {} did not complete within {:?}",
                    path, deadline
                )))
            },
        }
    }

    /// Poll `Azure-AsyncOperation` until its status document is terminal, or
    /// `Location` until it stops answering 202.
    async fn poll_until_done(
        &self,
        path: &str,
        async_operation: Option<String>,
        location: Option<String>,
        mut delay: Duration,
    ) -> Result<(), ArmError> {
        let url = match async_operation.as_ref().or(location.as_ref()) {
            Some(url) => url,
            None => return Ok(()),
        };

        loop {
            tokio::time::sleep(delay).await;

            let response = self.poll(url).await?;
            delay = retry_after(response.headers()).unwrap_or(self.options.poll_interval);

            if async_operation.is_none() {
                if response.status() != StatusCode::ACCEPTED {
                    return Ok(());
                }
                continue;
            }

            let status: OperationStatus = decode(response).await?;
            match status.status.to_ascii_lowercase().as_str() {
                "succeeded" => return Ok(()),
                "failed" | "canceled" => {
                    return Err(ArmError::OperationFailed {
                        message: status.error.map(|e| e.message).unwrap_or_default(),
                        status: status.status,
                    });
                },
                other => trace!(%path, status = other, "Operation still running"),
            }
        }
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header(headers, "retry-after")
        .and_then(|v| v.trim().parse().ok())
        .map(Duration::from_secs)
}

async fn check(response: Response) -> Result<Response, ArmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => (envelope.error.code, envelope.error.message),
        Err(_) => (
            status.canonical_reason().unwrap_or("Unknown").to_string(),
            body,
        ),
    };
    Err(ArmError::Api {
        status: status.as_u16(),
        code,
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ArmError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ArmError::InvalidResponse(e.to_string()))
}

/// The parts of an ARM resource ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    /// Subscription segment.
    pub subscription_id: String,
    /// Resource group segment.
    pub resource_group: String,
    /// Resource provider namespace, e.g. `Microsoft.Network`.
    pub provider: Option<String>,
    /// Remaining type/name pairs, e.g. `loadBalancers -> lb1`.
    pub path: HashMap<String, String>,
}

impl ResourceId {
    /// Parse `/subscriptions/{sub}/resourceGroups/{rg}/providers/{ns}/{type}/{name}...`.
    pub fn parse(id: &str) -> Result<Self, ArmError> {
        let invalid = |reason: &str| ArmError::InvalidResourceId {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = id.trim().trim_matches('/');
        let segments: Vec<&str> = trimmed.split('/').collect();
        if trimmed.is_empty() || segments.len() % 2 != 0 {
            return Err(invalid("expected an even number of path segments"));
        }

        let mut path = HashMap::new();
        for pair in segments.chunks(2) {
            if pair[0].is_empty() || pair[1].is_empty() {
                return Err(invalid("keys and values cannot be empty"));
            }
            path.insert(pair[0].to_string(), pair[1].to_string());
        }

        let subscription_id = path
            .remove("subscriptions")
            .ok_or_else(|| invalid("no subscription ID found"))?;
        let resource_group = path
            .remove("resourceGroups")
            .or_else(|| path.remove("resourcegroups"))
            .ok_or_else(|| invalid("no resource group name found"))?;
        let provider = path.remove("providers");

        Ok(Self {
            subscription_id,
            resource_group,
            provider,
            path,
        })
    }
}
