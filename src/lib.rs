//! XYZ Provider
//!
//! A Hemmer component provider exposing `xyz:index:RandomLogin`: a username
//! and password pair assembled from resources of the `random` provider.
//!
//! # Overview
//!
//! The crate provides:
//!
//! - **Protocol Buffers types**: Pre-compiled Rust types for the provider and resource monitor services
//! - **RandomLogin component**: The component and its typed `random` children
//! - **Host access**: A [`Context`] that registers resources with the host's resource monitor
//! - **ProviderService trait**: The high-level trait the provider implements
//! - **Server helpers**: Functions to start a gRPC server with the handshake protocol
//! - **Testing helpers**: An in-memory resource monitor and a provider test harness
//!
//! # RandomLogin
//!
//! | Input | Type | Description |
//! |-------|------|-------------|
//! | `petName` | bool | Username is a `RandomPet` name when `true`, a `RandomId` hex string otherwise |
//! | `passwordLength` | int64 | Length of the `RandomPassword`, 16 when unset |
//!
//! The component outputs `username` and `password`. Both children are
//! registered with the component as their parent.
//!
//! ```
//! use xyz_provider::testing::ProviderTester;
//! use xyz_provider::XyzProvider;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let tester = ProviderTester::new(XyzProvider::new());
//! let result = tester
//!     .construct("xyz:index:RandomLogin", "db", json!({"petName": false, "passwordLength": 24}))
//!     .await
//!     .unwrap();
//!
//! assert_eq!(result.state["password"].as_str().unwrap().len(), 24);
//! # });
//! ```
//!
//! # Handshake Protocol
//!
//! When the provider starts via [`serve`], it outputs a handshake string to stdout:
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `HEMMER_PROVIDER|<protocol_version>|<address>`
//!
//! # Provider Protocol
//!
//! - **GetMetadata**: Returns the provider name, version and component types
//! - **GetSchema**: Returns the component schemas
//! - **Configure**: Accepts provider configuration
//! - **Stop**: Gracefully shuts down the provider
//! - **ValidateResourceConfig**: Validates component inputs
//! - **Construct**: Registers a component and its children with the host

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod host;
pub mod logging;
pub mod login;
pub mod provider;
pub mod random;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

// Re-export main types at crate root
pub use error::ProviderError;
pub use host::{Context, GrpcResourceMonitor, ResourceMonitor, ResourceOptions};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use login::{RandomLogin, RandomLoginArgs, RandomLoginState};
pub use provider::{XyzProvider, PROVIDER_NAME, VERSION};
pub use schema::ProviderSchema;
pub use server::{
    serve, serve_on, serve_on_with_options, serve_with_options, ProviderService, ServeOptions,
};
pub use types::{
    ConstructResult, ProviderMetadata, ServerCapabilities, HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tonic;
pub use tracing;
