//! Testing utilities for provider implementations.
//!
//! [`ProviderTester`] drives a [`ProviderService`] without a gRPC server, and
//! [`MockMonitor`] stands in for the host's resource monitor, answering
//! registrations of the `random` resources with canned outputs.
//!
//! # Example
//!
//! ```
//! use xyz_provider::testing::ProviderTester;
//! use xyz_provider::XyzProvider;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let tester = ProviderTester::new(XyzProvider::new());
//! let result = tester
//!     .construct("xyz:index:RandomLogin", "db", json!({"petName": true}))
//!     .await
//!     .unwrap();
//!
//! assert_eq!(result.state["password"].as_str().unwrap().len(), 16);
//! assert_eq!(tester.monitor().registrations().len(), 3);
//! # });
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::host::{Context, RegisteredResource, ResourceMonitor, ResourceOptions, ResourceRegistration};
use crate::random::{RANDOM_ID, RANDOM_PASSWORD, RANDOM_PET};
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::server::ProviderService;
use crate::types::ConstructResult;

const PET_NAMES: &[&str] = &["relaxed-lemur", "brave-otter", "tidy-heron", "quick-gecko"];
const PASSWORD_ALPHABET: &str = "Xk9#mQ2$vL7!pR4&";

/// An in-memory [`ResourceMonitor`] that records every call.
///
/// URNs have the form `urn:hemmer:test::<type>::<name>`. Unknown custom
/// resource types echo their inputs as outputs.
#[derive(Debug, Default)]
pub struct MockMonitor {
    registrations: Mutex<Vec<ResourceRegistration>>,
    outputs: Mutex<HashMap<String, Value>>,
    overrides: HashMap<String, Value>,
    failures: HashMap<String, tonic::Status>,
}

impl MockMonitor {
    /// Create a monitor with the default canned outputs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer registrations of `type_token` with `outputs` instead of the canned ones.
    pub fn with_outputs(mut self, type_token: impl Into<String>, outputs: Value) -> Self {
        self.overrides.insert(type_token.into(), outputs);
        self
    }

    /// Reject registrations of `type_token` with `status`.
    ///
    /// The registration is still recorded before it fails.
    pub fn fail_on(mut self, type_token: impl Into<String>, status: tonic::Status) -> Self {
        self.failures.insert(type_token.into(), status);
        self
    }

    /// All registrations, in call order.
    pub fn registrations(&self) -> Vec<ResourceRegistration> {
        lock(&self.registrations).clone()
    }

    /// Registrations of one resource type, in call order.
    pub fn registrations_of(&self, type_token: &str) -> Vec<ResourceRegistration> {
        lock(&self.registrations)
            .iter()
            .filter(|r| r.type_token == type_token)
            .cloned()
            .collect()
    }

    /// Outputs registered for a component URN.
    pub fn registered_outputs(&self, urn: &str) -> Option<Value> {
        lock(&self.outputs).get(urn).cloned()
    }

    /// URN this monitor assigns to a resource.
    pub fn urn(type_token: &str, name: &str) -> String {
        format!("urn:hemmer:test::{}::{}", type_token, name)
    }

    fn canned(&self, registration: &ResourceRegistration, ordinal: usize) -> (Option<String>, Value) {
        if !registration.custom {
            return (None, json!({}));
        }
        if let Some(outputs) = self.overrides.get(&registration.type_token) {
            return (Some(format!("{}-id", registration.name)), outputs.clone());
        }

        let int_input = |key: &str, default: i64| {
            registration
                .inputs
                .get(key)
                .and_then(Value::as_i64)
                .unwrap_or(default)
                .max(0) as usize
        };

        match registration.type_token.as_str() {
            RANDOM_PET => {
                let pet = PET_NAMES[ordinal % PET_NAMES.len()].to_string();
                (Some(pet), json!({"length": 2, "separator": "-"}))
            },
            RANDOM_ID => {
                let bytes = int_input("byteLength", 8);
                let hex: String = (0..bytes).map(|i| format!("{:02x}", (0xa5 + i * 7) % 256)).collect();
                let id = format!("b64-{}", hex);
                (Some(id), json!({"hex": hex, "byteLength": bytes}))
            },
            RANDOM_PASSWORD => {
                let length = int_input("length", 16);
                let result: String = PASSWORD_ALPHABET.chars().cycle().take(length).collect();
                (
                    Some("none".to_string()),
                    json!({"result": result, "length": length}),
                )
            },
            _ => (Some(registration.name.clone()), registration.inputs.clone()),
        }
    }
}

#[async_trait::async_trait]
impl ResourceMonitor for MockMonitor {
    async fn register_resource(
        &self,
        registration: ResourceRegistration,
    ) -> Result<RegisteredResource, ProviderError> {
        let ordinal = {
            let mut registrations = lock(&self.registrations);
            registrations.push(registration.clone());
            registrations.len() - 1
        };

        if let Some(status) = self.failures.get(&registration.type_token) {
            return Err(ProviderError::Monitor(status.clone()));
        }

        let (id, outputs) = self.canned(&registration, ordinal);
        Ok(RegisteredResource {
            urn: Self::urn(&registration.type_token, &registration.name),
            id,
            outputs,
        })
    }

    async fn register_resource_outputs(
        &self,
        urn: &str,
        outputs: Value,
    ) -> Result<(), ProviderError> {
        lock(&self.outputs).insert(urn.to_string(), outputs);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A test harness for provider implementations.
///
/// Wraps a `ProviderService` and a [`MockMonitor`] so construct calls can be
/// made and inspected without a host.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
    monitor: Arc<MockMonitor>,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester with a default [`MockMonitor`].
    pub fn new(provider: P) -> Self {
        Self::with_monitor(provider, MockMonitor::new())
    }

    /// Create a new tester backed by the given monitor.
    pub fn with_monitor(provider: P, monitor: MockMonitor) -> Self {
        Self {
            provider,
            monitor: Arc::new(monitor),
        }
    }

    /// Get the monitor that records registrations.
    pub fn monitor(&self) -> &MockMonitor {
        &self.monitor
    }

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type tokens.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Configure the provider.
    ///
    /// Returns `Err` with the diagnostics if there are errors; warnings are dropped.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration.
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

    /// Construct a top-level component.
    pub async fn construct(
        &self,
        resource_type: &str,
        name: &str,
        inputs: Value,
    ) -> Result<ConstructResult, ProviderError> {
        self.construct_with_options(resource_type, name, inputs, ResourceOptions::new())
            .await
    }

    /// Construct a component with explicit options.
    pub async fn construct_with_options(
        &self,
        resource_type: &str,
        name: &str,
        inputs: Value,
        options: ResourceOptions,
    ) -> Result<ConstructResult, ProviderError> {
        let monitor: Arc<dyn ResourceMonitor> = self.monitor.clone();
        let ctx = Context::new(monitor);
        self.provider
            .construct(&ctx, resource_type, name, inputs, options)
            .await
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            }
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

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();

    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain at least one error.
///
/// # Panics
///
/// Panics if there are no error diagnostics.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    let has_errors = diagnostics
        .iter()
        .any(|d| matches!(d.severity, DiagnosticSeverity::Error));

    assert!(has_errors, "Expected at least one error, but got none");
}

/// Assert that diagnostics contain an error with the given summary substring.
///
/// # Panics
///
/// Panics if no error diagnostic contains the given substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let has_matching_error = diagnostics
        .iter()
        .any(|d| d.is_error() && d.summary.contains(substring));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}
