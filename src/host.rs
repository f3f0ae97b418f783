//! Access to the host's resource graph.
//!
//! A component provider does not create infrastructure itself: during
//! `Construct` it registers the component and its children with the host's
//! resource monitor, which schedules them against the owning providers and
//! answers with their URNs and outputs. [`ResourceMonitor`] is that seam;
//! [`GrpcResourceMonitor`] is the production implementation and
//! [`crate::testing::MockMonitor`] the one used in tests.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tonic::transport::Channel;
use tracing::debug;

use crate::error::ProviderError;
use crate::generated::resource_monitor_client::ResourceMonitorClient;

/// A request to add a resource to the host's graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRegistration {
    /// Type token, e.g. `random:index/randomPet:RandomPet`.
    pub type_token: String,
    /// Logical name, unique among siblings.
    pub name: String,
    /// `true` for resources managed by a provider, `false` for components.
    pub custom: bool,
    /// URN of the parent resource.
    pub parent: Option<String>,
    /// Resource inputs.
    pub inputs: Value,
}

/// What the host reports back for a registered resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredResource {
    /// URN the host assigned.
    pub urn: String,
    /// Provider-assigned ID; `None` for components.
    pub id: Option<String>,
    /// Resolved outputs.
    pub outputs: Value,
}

impl RegisteredResource {
    /// Read a string output, failing if it is missing or not a string.
    pub fn output_str(&self, key: &str) -> Result<&str, ProviderError> {
        self.outputs
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProviderError::Output(format!("{} has no string output '{}'", self.urn, key))
            })
    }
}

/// A component resource registered with the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentResource {
    /// URN the host assigned.
    pub urn: String,
}

/// Options applied when registering a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceOptions {
    /// URN of the parent resource.
    pub parent: Option<String>,
}

impl ResourceOptions {
    /// Options with no parent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options parenting a resource to the given component.
    pub fn parent(component: &ComponentResource) -> Self {
        Self {
            parent: Some(component.urn.clone()),
        }
    }

    /// Set the parent URN.
    pub fn with_parent(mut self, urn: impl Into<String>) -> Self {
        self.parent = Some(urn.into());
        self
    }
}

/// The host's resource monitor.
#[async_trait::async_trait]
pub trait ResourceMonitor: Send + Sync {
    /// Register a resource and wait for the host to resolve it.
    async fn register_resource(
        &self,
        registration: ResourceRegistration,
    ) -> Result<RegisteredResource, ProviderError>;

    /// Record the final outputs of a component.
    async fn register_resource_outputs(&self, urn: &str, outputs: Value)
        -> Result<(), ProviderError>;
}

/// [`ResourceMonitor`] backed by the host's gRPC `ResourceMonitor` service.
#[derive(Debug, Clone)]
pub struct GrpcResourceMonitor {
    client: ResourceMonitorClient<Channel>,
}

impl GrpcResourceMonitor {
    /// Connect to the monitor at `endpoint` (`host:port` or a full URI).
    pub async fn connect(endpoint: &str) -> Result<Self, ProviderError> {
        if endpoint.is_empty() {
            return Err(ProviderError::InvalidRequest(
                "No resource monitor endpoint provided".to_string(),
            ));
        }
        let uri = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("http://{}", endpoint)
        };
        debug!(endpoint = %uri, "Connecting to resource monitor");
        let client = ResourceMonitorClient::connect(uri).await?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl ResourceMonitor for GrpcResourceMonitor {
    async fn register_resource(
        &self,
        registration: ResourceRegistration,
    ) -> Result<RegisteredResource, ProviderError> {
        let request = crate::generated::RegisterResourceRequest {
            r#type: registration.type_token,
            name: registration.name,
            custom: registration.custom,
            parent: registration.parent.unwrap_or_default(),
            inputs: serde_json::to_vec(&registration.inputs)?,
        };

        let response = self.client.clone().register_resource(request).await?.into_inner();

        let outputs = if response.outputs.is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_slice(&response.outputs)?
        };
        Ok(RegisteredResource {
            urn: response.urn,
            id: (!response.id.is_empty()).then_some(response.id),
            outputs,
        })
    }

    async fn register_resource_outputs(
        &self,
        urn: &str,
        outputs: Value,
    ) -> Result<(), ProviderError> {
        let request = crate::generated::RegisterResourceOutputsRequest {
            urn: urn.to_string(),
            outputs: serde_json::to_vec(&outputs)?,
        };
        self.client.clone().register_resource_outputs(request).await?;
        Ok(())
    }
}

/// Per-construct handle on the host's resource graph.
#[derive(Clone)]
pub struct Context {
    monitor: Arc<dyn ResourceMonitor>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").finish_non_exhaustive()
    }
}

impl Context {
    /// Create a context that registers resources through `monitor`.
    pub fn new(monitor: Arc<dyn ResourceMonitor>) -> Self {
        Self { monitor }
    }

    /// Register a component resource.
    pub async fn register_component_resource(
        &self,
        type_token: &str,
        name: &str,
        opts: &ResourceOptions,
    ) -> Result<ComponentResource, ProviderError> {
        debug!(type_token, name, parent = ?opts.parent, "Registering component resource");
        let registered = self
            .monitor
            .register_resource(ResourceRegistration {
                type_token: type_token.to_string(),
                name: name.to_string(),
                custom: false,
                parent: opts.parent.clone(),
                inputs: Value::Object(serde_json::Map::new()),
            })
            .await?;
        Ok(ComponentResource {
            urn: registered.urn,
        })
    }

    /// Register a provider-managed resource and wait for its outputs.
    pub async fn register_resource(
        &self,
        type_token: &str,
        name: &str,
        inputs: Value,
        opts: &ResourceOptions,
    ) -> Result<RegisteredResource, ProviderError> {
        debug!(type_token, name, parent = ?opts.parent, "Registering resource");
        let registered = self
            .monitor
            .register_resource(ResourceRegistration {
                type_token: type_token.to_string(),
                name: name.to_string(),
                custom: true,
                parent: opts.parent.clone(),
                inputs,
            })
            .await?;
        debug!(type_token, name, urn = %registered.urn, "Resource registered");
        Ok(registered)
    }

    /// Publish a component's outputs.
    pub async fn register_resource_outputs(
        &self,
        component: &ComponentResource,
        outputs: Value,
    ) -> Result<(), ProviderError> {
        debug!(urn = %component.urn, "Registering component outputs");
        self.monitor
            .register_resource_outputs(&component.urn, outputs)
            .await
    }
}
