//! Convenience types shared by the server and provider implementations.

use serde::{Deserialize, Serialize};

/// The outcome of constructing a component resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructResult {
    /// URN the host assigned to the component.
    pub urn: String,
    /// The component's outputs.
    pub state: serde_json::Value,
}

impl ConstructResult {
    /// Create a new construct result.
    pub fn new(urn: impl Into<String>, state: serde_json::Value) -> Self {
        Self {
            urn: urn.into(),
            state,
        }
    }
}

/// Provider metadata returned by GetMetadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Provider token.
    pub name: String,
    /// Provider version.
    pub version: String,
    /// Resource type tokens served by the provider.
    pub resources: Vec<String>,
    /// Server capabilities.
    pub capabilities: ServerCapabilities,
}

/// Server capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// Whether the provider implements component construction.
    pub construct: bool,
}

/// The protocol version for the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// The handshake prefix output by providers.
pub const HANDSHAKE_PREFIX: &str = "HEMMER_PROVIDER";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construct_result() {
        let result = ConstructResult::new(
            "urn:hemmer:dev::app::xyz:index:RandomLogin::db",
            serde_json::json!({"username": "neat-gecko"}),
        );
        assert!(result.urn.ends_with("::db"));
        assert_eq!(result.state["username"], "neat-gecko");
    }

    #[test]
    fn test_protocol_constants() {
        assert_eq!(PROTOCOL_VERSION, 1);
        assert_eq!(HANDSHAKE_PREFIX, "HEMMER_PROVIDER");
    }
}
