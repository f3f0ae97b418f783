//! The `xyz` provider.
//!
//! Exposes a single component, [`RANDOM_LOGIN`], built on top of the
//! `random` provider's resources.

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::ProviderError;
use crate::host::{Context, ResourceOptions};
use crate::login::{RandomLogin, RandomLoginArgs, DEFAULT_PASSWORD_LENGTH, RANDOM_LOGIN};
use crate::schema::{Attribute, Diagnostic, ProviderSchema, Schema};
use crate::server::ProviderService;
use crate::types::ConstructResult;

/// Name the provider registers under.
pub const PROVIDER_NAME: &str = "xyz";

/// Provider version. Release builds set `XYZ_PROVIDER_VERSION`.
pub const VERSION: &str = match option_env!("XYZ_PROVIDER_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};

/// Component provider for `xyz:index:RandomLogin`.
#[derive(Debug, Clone, Default)]
pub struct XyzProvider;

impl XyzProvider {
    /// Create the provider.
    pub fn new() -> Self {
        Self
    }

    fn random_login_schema() -> Schema {
        Schema::v0()
            .with_description("A username and password generated by the random provider")
            .with_attribute(
                "petName",
                Attribute::required_bool()
                    .with_description("Use a pet name as username instead of a hex identifier"),
            )
            .with_attribute(
                "passwordLength",
                Attribute::optional_int64()
                    .with_description("Number of characters in the password")
                    .with_default(json!(DEFAULT_PASSWORD_LENGTH)),
            )
            .with_attribute(
                "username",
                Attribute::computed_string().with_description("The generated username"),
            )
            .with_attribute(
                "password",
                Attribute::computed_string()
                    .sensitive()
                    .with_description("The generated password"),
            )
    }
}

#[async_trait::async_trait]
impl ProviderService for XyzProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new(PROVIDER_NAME, VERSION)
            .with_resource(RANDOM_LOGIN, Self::random_login_schema())
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut keys: Vec<String> = match config {
            Value::Object(map) => map.into_iter().map(|(k, _)| k).collect(),
            Value::Null => vec![],
            other => {
                return Err(ProviderError::Configuration(format!(
                    "expected an object, got {}",
                    other
                )))
            },
        };
        keys.sort();
        debug!(keys = keys.len(), "Configuring provider");

        Ok(keys
            .into_iter()
            .map(|key| {
                Diagnostic::warning(format!("Unknown provider setting '{}'", key))
                    .with_detail("The xyz provider takes no configuration")
                    .with_attribute(key)
            })
            .collect())
    }

    async fn construct(
        &self,
        ctx: &Context,
        resource_type: &str,
        name: &str,
        inputs: Value,
        options: ResourceOptions,
    ) -> Result<ConstructResult, ProviderError> {
        if resource_type != RANDOM_LOGIN {
            return Err(ProviderError::UnknownResource(resource_type.to_string()));
        }

        let args: RandomLoginArgs = match inputs {
            Value::Null => RandomLoginArgs::default(),
            inputs => serde_json::from_value(inputs)?,
        };
        debug!(
            name,
            pet_name = args.pet_name,
            password_length = args.effective_password_length(),
            "Constructing RandomLogin"
        );

        let login = RandomLogin::construct(ctx, name, &args, &options).await?;
        info!(name, urn = %login.urn(), username = %login.username(), "RandomLogin constructed");
        Ok(ConstructResult::new(
            login.urn(),
            serde_json::to_value(login.state())?,
        ))
    }
}
