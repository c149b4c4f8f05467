//! Hemmer provider for Azure Resource Manager.
//!
//! Manages Azure Load Balancers (`azurerm_lb`) over the Hemmer provider
//! protocol: the host spawns the binary, reads the handshake line from stdout
//! and drives the provider over gRPC.
//!
//! # Layout
//!
//! - [`server`]: the gRPC service, handshake and signal handling
//! - [`provider`]: [`AzureRmProvider`], dispatching requests to resources
//! - [`resources`]: one [`resources::Resource`] per managed type
//! - [`arm`]: authenticated Azure Resource Manager client with long-running
//!   operation polling
//! - [`network`]: `Microsoft.Network` request and response model
//! - [`schema`], [`validation`], [`plan`]: schema description, config
//!   validation and diffing
//! - [`hashcode`]: stable hashes identifying set elements
//!
//! # Handshake Protocol
//!
//! Once listening, the provider prints:
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `HEMMER_PROVIDER|<protocol_version>|<address>`
//!
//! # Provider Protocol
//!
//! - **GetMetadata**: resource type names and capabilities
//! - **GetSchema**: provider block and resource schemas
//! - **ValidateProviderConfig**: check credentials and environment settings
//! - **Configure**: authenticate against Azure Active Directory
//! - **Stop**: drop the ARM client
//! - **ValidateResourceConfig**: schema, enum and reference checks
//! - **Plan**: diff prior and proposed state
//! - **Create/Read/Update/Delete**: drive the resource through ARM

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arm;
pub mod config;
pub mod error;
pub mod hashcode;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
pub mod network;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{AzureEnvironment, ProviderConfig};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::AzureRmProvider;
pub use schema::ProviderSchema;
pub use server::{
    serve, serve_on, serve_on_with_options, serve_with_options, ProviderService, ServeOptions,
};
pub use types::{
    AttributeChange, PlanResult, ProviderMetadata, ServerCapabilities, HANDSHAKE_PREFIX,
    PROTOCOL_VERSION,
};
pub use validation::{validate, validate_result};

pub use async_trait::async_trait;
pub use serde_json;
pub use tonic;
pub use tracing;
