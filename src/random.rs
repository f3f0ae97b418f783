//! Typed constructors for resources of the `random` provider.
//!
//! Values are generated by the random provider the host runs; these wrappers
//! only shape the inputs and pick the outputs apart.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::host::{Context, RegisteredResource, ResourceOptions};

/// Type token of `RandomPet`.
pub const RANDOM_PET: &str = "random:index/randomPet:RandomPet";
/// Type token of `RandomId`.
pub const RANDOM_ID: &str = "random:index/randomId:RandomId";
/// Type token of `RandomPassword`.
pub const RANDOM_PASSWORD: &str = "random:index/randomPassword:RandomPassword";

/// A random pet name such as `relaxed-lemur`.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomPet {
    /// URN of the resource.
    pub urn: String,
    /// The generated name; the random provider uses it as the resource ID.
    pub id: String,
}

impl RandomPet {
    /// Register a new `RandomPet` with the random provider's default shape.
    pub async fn new(
        ctx: &Context,
        name: &str,
        opts: &ResourceOptions,
    ) -> Result<Self, ProviderError> {
        let registered = ctx
            .register_resource(RANDOM_PET, name, Value::Object(Map::new()), opts)
            .await?;
        let id = require_id(&registered)?;
        Ok(Self {
            urn: registered.urn,
            id,
        })
    }
}

/// Inputs of a [`RandomId`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RandomIdArgs {
    /// Number of random bytes.
    pub byte_length: i64,
}

impl RandomIdArgs {
    /// Args for an identifier of `byte_length` random bytes.
    pub fn new(byte_length: i64) -> Self {
        Self { byte_length }
    }
}

/// A random identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomId {
    /// URN of the resource.
    pub urn: String,
    /// Resource ID (the URL-safe base64 form).
    pub id: String,
    /// Hex encoding of the random bytes.
    pub hex: String,
}

impl RandomId {
    /// Register a new `RandomId`.
    pub async fn new(
        ctx: &Context,
        name: &str,
        args: RandomIdArgs,
        opts: &ResourceOptions,
    ) -> Result<Self, ProviderError> {
        let registered = ctx
            .register_resource(RANDOM_ID, name, serde_json::to_value(args)?, opts)
            .await?;
        let id = require_id(&registered)?;
        let hex = registered.output_str("hex")?.to_string();
        Ok(Self {
            urn: registered.urn,
            id,
            hex,
        })
    }
}

/// Inputs of a [`RandomPassword`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RandomPasswordArgs {
    /// Number of characters.
    pub length: i64,
}

impl RandomPasswordArgs {
    /// Args for a password of `length` characters.
    pub fn new(length: i64) -> Self {
        Self { length }
    }
}

/// A random password. `result` is secret.
#[derive(Clone, PartialEq)]
pub struct RandomPassword {
    /// URN of the resource.
    pub urn: String,
    /// The generated password.
    pub result: String,
}

impl std::fmt::Debug for RandomPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomPassword")
            .field("urn", &self.urn)
            .field("result", &"[REDACTED]")
            .finish()
    }
}

impl RandomPassword {
    /// Register a new `RandomPassword`.
    pub async fn new(
        ctx: &Context,
        name: &str,
        args: RandomPasswordArgs,
        opts: &ResourceOptions,
    ) -> Result<Self, ProviderError> {
        let registered = ctx
            .register_resource(RANDOM_PASSWORD, name, serde_json::to_value(args)?, opts)
            .await?;
        let result = registered.output_str("result")?.to_string();
        Ok(Self {
            urn: registered.urn,
            result,
        })
    }
}

fn require_id(registered: &RegisteredResource) -> Result<String, ProviderError> {
    registered
        .id
        .clone()
        .ok_or_else(|| ProviderError::Output(format!("{} has no resource ID", registered.urn)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockMonitor;
    use serde_json::json;
    use std::sync::Arc;

    fn context() -> (Arc<MockMonitor>, Context) {
        let monitor = Arc::new(MockMonitor::new());
        (monitor.clone(), Context::new(monitor))
    }

    #[test]
    fn test_args_serialize_camel_case() {
        assert_eq!(
            serde_json::to_value(RandomIdArgs::new(8)).unwrap(),
            json!({"byteLength": 8})
        );
        assert_eq!(
            serde_json::to_value(RandomPasswordArgs::new(20)).unwrap(),
            json!({"length": 20})
        );
    }

    #[tokio::test]
    async fn test_random_pet_uses_id_as_name() {
        let (monitor, ctx) = context();
        let pet = RandomPet::new(&ctx, "db-pet", &ResourceOptions::new())
            .await
            .unwrap();

        assert!(!pet.id.is_empty());
        let registration = &monitor.registrations()[0];
        assert_eq!(registration.type_token, RANDOM_PET);
        assert_eq!(registration.name, "db-pet");
        assert_eq!(registration.inputs, json!({}));
    }

    #[tokio::test]
    async fn test_random_id_reads_hex_output() {
        let (monitor, ctx) = context();
        let id = RandomId::new(&ctx, "db-id", RandomIdArgs::new(8), &ResourceOptions::new())
            .await
            .unwrap();

        assert_eq!(id.hex.len(), 16);
        assert!(id.hex.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(monitor.registrations()[0].inputs, json!({"byteLength": 8}));
    }

    #[tokio::test]
    async fn test_random_password_reads_result() {
        let (_monitor, ctx) = context();
        let password = RandomPassword::new(
            &ctx,
            "db-password",
            RandomPasswordArgs::new(24),
            &ResourceOptions::new(),
        )
        .await
        .unwrap();

        assert_eq!(password.result.len(), 24);
        assert!(!format!("{:?}", password).contains(&password.result));
    }

    #[tokio::test]
    async fn test_missing_output_is_an_error() {
        let monitor = Arc::new(MockMonitor::new().with_outputs(RANDOM_ID, json!({})));
        let ctx = Context::new(monitor);

        let err = RandomId::new(&ctx, "db-id", RandomIdArgs::new(8), &ResourceOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Output(_)));
    }
}
