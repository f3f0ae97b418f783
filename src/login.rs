//! The `RandomLogin` component.
//!
//! A login is a username plus a password. The username is either a random pet
//! name or the hex form of a random identifier, depending on `petName`; the
//! password is a random password of `passwordLength` characters. All three
//! children are parented to the component so the host orders and deletes them
//! together.

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::host::{ComponentResource, Context, ResourceOptions};
use crate::random::{RandomId, RandomIdArgs, RandomPassword, RandomPasswordArgs, RandomPet};

/// Type token of the component.
pub const RANDOM_LOGIN: &str = "xyz:index:RandomLogin";

/// Password length used when `passwordLength` is unset.
pub const DEFAULT_PASSWORD_LENGTH: i64 = 16;

/// Number of random bytes behind a hex username.
pub const ID_BYTE_LENGTH: i64 = 8;

/// Inputs of a [`RandomLogin`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RandomLoginArgs {
    /// Length of the generated password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_length: Option<i64>,
    /// Use a pet name instead of a hex identifier as username.
    #[serde(default)]
    pub pet_name: bool,
}

impl RandomLoginArgs {
    /// The password length to request, applying the default.
    pub fn effective_password_length(&self) -> i64 {
        self.password_length.unwrap_or(DEFAULT_PASSWORD_LENGTH)
    }
}

/// Outputs of a [`RandomLogin`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomLoginState {
    /// The generated username.
    pub username: String,
    /// The generated password.
    pub password: String,
}

impl std::fmt::Debug for RandomLoginState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomLoginState")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// The child resource a username came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    /// A random pet name.
    Pet(RandomPet),
    /// A random hex identifier.
    Id(RandomId),
}

impl Identity {
    /// The username this identity yields.
    pub fn username(&self) -> &str {
        match self {
            Identity::Pet(pet) => &pet.id,
            Identity::Id(id) => &id.hex,
        }
    }

    /// URN of the child resource.
    pub fn urn(&self) -> &str {
        match self {
            Identity::Pet(pet) => &pet.urn,
            Identity::Id(id) => &id.urn,
        }
    }
}

/// A constructed `RandomLogin` and its children.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomLogin {
    /// The component itself.
    pub component: ComponentResource,
    /// The username source.
    pub identity: Identity,
    /// The password source.
    pub password: RandomPassword,
}

impl RandomLogin {
    /// Register the component and its children with the host.
    ///
    /// Steps run in order and the first failure is returned as-is; nothing is
    /// registered after it.
    pub async fn construct(
        ctx: &Context,
        name: &str,
        args: &RandomLoginArgs,
        opts: &ResourceOptions,
    ) -> Result<Self, ProviderError> {
        let component = ctx.register_component_resource(RANDOM_LOGIN, name, opts).await?;
        let child_opts = ResourceOptions::parent(&component);

        let identity = if args.pet_name {
            let pet = RandomPet::new(ctx, &format!("{}-pet", name), &child_opts).await?;
            Identity::Pet(pet)
        } else {
            let id = RandomId::new(
                ctx,
                &format!("{}-id", name),
                RandomIdArgs::new(ID_BYTE_LENGTH),
                &child_opts,
            )
            .await?;
            Identity::Id(id)
        };

        let password = RandomPassword::new(
            ctx,
            &format!("{}-password", name),
            RandomPasswordArgs::new(args.effective_password_length()),
            &child_opts,
        )
        .await?;

        let login = Self {
            component,
            identity,
            password,
        };
        ctx.register_resource_outputs(&login.component, serde_json::to_value(login.state())?)
            .await?;
        Ok(login)
    }

    /// URN of the component.
    pub fn urn(&self) -> &str {
        &self.component.urn
    }

    /// The generated username.
    pub fn username(&self) -> &str {
        self.identity.username()
    }

    /// The generated password.
    pub fn password(&self) -> &str {
        &self.password.result
    }

    /// The component's outputs.
    pub fn state(&self) -> RandomLoginState {
        RandomLoginState {
            username: self.username().to_string(),
            password: self.password().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{RANDOM_ID, RANDOM_PASSWORD, RANDOM_PET};
    use crate::testing::MockMonitor;
    use serde_json::json;
    use std::sync::Arc;

    async fn construct(
        monitor: MockMonitor,
        args: RandomLoginArgs,
    ) -> (Arc<MockMonitor>, Result<RandomLogin, ProviderError>) {
        let monitor = Arc::new(monitor);
        let ctx = Context::new(monitor.clone());
        let result = RandomLogin::construct(&ctx, "db", &args, &ResourceOptions::new()).await;
        (monitor, result)
    }

    #[test]
    fn test_args_decode_camel_case() {
        let args: RandomLoginArgs =
            serde_json::from_value(json!({"passwordLength": 32, "petName": true})).unwrap();
        assert_eq!(args.password_length, Some(32));
        assert!(args.pet_name);

        let args: RandomLoginArgs = serde_json::from_value(json!({})).unwrap();
        assert_eq!(args, RandomLoginArgs::default());
    }

    #[test]
    fn test_effective_password_length_defaults_to_16() {
        assert_eq!(RandomLoginArgs::default().effective_password_length(), 16);
        let args = RandomLoginArgs {
            password_length: Some(40),
            pet_name: false,
        };
        assert_eq!(args.effective_password_length(), 40);
    }

    #[tokio::test]
    async fn test_pet_name_uses_random_pet_only() {
        let args = RandomLoginArgs {
            password_length: None,
            pet_name: true,
        };
        let (monitor, result) = construct(MockMonitor::new(), args).await;
        let login = result.unwrap();

        assert!(matches!(login.identity, Identity::Pet(_)));
        assert_eq!(monitor.registrations_of(RANDOM_PET).len(), 1);
        assert!(monitor.registrations_of(RANDOM_ID).is_empty());
        assert_eq!(monitor.registrations_of(RANDOM_PET)[0].name, "db-pet");
        assert_eq!(login.username(), login.identity.username());
    }

    #[tokio::test]
    async fn test_hex_id_uses_random_id_only() {
        let (monitor, result) = construct(MockMonitor::new(), RandomLoginArgs::default()).await;
        let login = result.unwrap();

        let Identity::Id(id) = &login.identity else {
            panic!("expected a RandomId identity, got {:?}", login.identity);
        };
        assert_eq!(login.username(), id.hex);
        assert!(monitor.registrations_of(RANDOM_PET).is_empty());

        let ids = monitor.registrations_of(RANDOM_ID);
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].name, "db-id");
        assert_eq!(ids[0].inputs, json!({"byteLength": 8}));
    }

    #[tokio::test]
    async fn test_unset_password_length_requests_16() {
        let (monitor, result) = construct(MockMonitor::new(), RandomLoginArgs::default()).await;
        let login = result.unwrap();

        let passwords = monitor.registrations_of(RANDOM_PASSWORD);
        assert_eq!(passwords.len(), 1);
        assert_eq!(passwords[0].name, "db-password");
        assert_eq!(passwords[0].inputs, json!({"length": 16}));
        assert_eq!(login.password().len(), 16);
    }

    #[tokio::test]
    async fn test_explicit_password_length_is_forwarded() {
        let args = RandomLoginArgs {
            password_length: Some(31),
            pet_name: true,
        };
        let (monitor, result) = construct(MockMonitor::new(), args).await;

        assert!(result.is_ok());
        assert_eq!(
            monitor.registrations_of(RANDOM_PASSWORD)[0].inputs,
            json!({"length": 31})
        );
    }

    #[tokio::test]
    async fn test_children_are_parented_to_component() {
        let (monitor, result) = construct(MockMonitor::new(), RandomLoginArgs::default()).await;
        let login = result.unwrap();

        let registrations = monitor.registrations();
        assert_eq!(registrations.len(), 3);
        assert_eq!(registrations[0].type_token, RANDOM_LOGIN);
        assert!(!registrations[0].custom);
        for child in &registrations[1..] {
            assert!(child.custom);
            assert_eq!(child.parent.as_deref(), Some(login.urn()));
        }
    }

    #[tokio::test]
    async fn test_outputs_are_registered_on_component() {
        let (monitor, result) = construct(MockMonitor::new(), RandomLoginArgs::default()).await;
        let login = result.unwrap();

        let outputs = monitor.registered_outputs(login.urn()).unwrap();
        assert_eq!(outputs["username"], login.username());
        assert_eq!(outputs["password"], login.password());
    }

    #[tokio::test]
    async fn test_component_failure_stops_construction() {
        let monitor = MockMonitor::new().fail_on(
            RANDOM_LOGIN,
            tonic::Status::permission_denied("stack is read-only"),
        );
        let (monitor, result) = construct(monitor, RandomLoginArgs::default()).await;

        let ProviderError::Monitor(status) = result.unwrap_err() else {
            panic!("expected the monitor status to pass through");
        };
        assert_eq!(status.code(), tonic::Code::PermissionDenied);
        assert_eq!(status.message(), "stack is read-only");
        assert_eq!(monitor.registrations().len(), 1);
    }

    #[tokio::test]
    async fn test_identity_failure_skips_password() {
        let monitor = MockMonitor::new()
            .fail_on(RANDOM_PET, tonic::Status::unavailable("random provider crashed"));
        let args = RandomLoginArgs {
            password_length: None,
            pet_name: true,
        };
        let (monitor, result) = construct(monitor, args).await;

        let err = result.unwrap_err();
        assert_eq!(err.message(), "random provider crashed");
        assert!(monitor.registrations_of(RANDOM_PASSWORD).is_empty());
        assert!(monitor.registered_outputs("urn:hemmer:test::xyz:index:RandomLogin::db").is_none());
    }

    #[tokio::test]
    async fn test_password_failure_is_surfaced_unchanged() {
        let monitor = MockMonitor::new().fail_on(
            RANDOM_PASSWORD,
            tonic::Status::invalid_argument("length must be at least 1"),
        );
        let args = RandomLoginArgs {
            password_length: Some(0),
            pet_name: false,
        };
        let (monitor, result) = construct(monitor, args).await;

        let err = result.unwrap_err();
        assert!(matches!(err, ProviderError::Monitor(_)));
        assert_eq!(err.message(), "length must be at least 1");
        assert_eq!(monitor.registrations().len(), 3);
    }

    #[test]
    fn test_state_debug_redacts_password() {
        let state = RandomLoginState {
            username: "fe11a5c0ffee0001".to_string(),
            password: "hunter2hunter2!!".to_string(),
        };
        let rendered = format!("{:?}", state);
        assert!(rendered.contains("fe11a5c0ffee0001"));
        assert!(!rendered.contains("hunter2"));
    }
}
