//! Server helpers for running the provider.
//!
//! This module provides the [`ProviderService`] trait and the `serve` family
//! of functions that start the gRPC server and print the handshake line.
//!
//! # Signal Handling
//!
//! The server handles SIGTERM and SIGINT (CTRL+C on Windows). On a signal it
//! stops accepting connections, waits up to [`ServeOptions::shutdown_timeout`]
//! for in-flight requests, then calls [`ProviderService::stop`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tonic::transport::Server;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::host::{Context, GrpcResourceMonitor, ResourceOptions};
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::types::{
    ConstructResult, ProviderMetadata, ServerCapabilities, HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
use crate::validation;

/// Trait that provider implementations must implement.
///
/// This is a higher-level API than the generated gRPC trait: it takes and
/// returns `serde_json` values and crate types instead of protobuf messages.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Return the provider's schema.
    fn schema(&self) -> ProviderSchema;

    /// Return provider metadata. By default, this is derived from the schema.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        let mut resources: Vec<String> = schema.resources.keys().cloned().collect();
        resources.sort();
        ProviderMetadata {
            name: schema.name,
            version: schema.version,
            resources,
            capabilities: ServerCapabilities { construct: true },
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Configure the provider. Returns diagnostics (errors and warnings).
    async fn configure(&self, config: serde_json::Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Stop the provider gracefully.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource's inputs.
    ///
    /// The default checks the inputs against the resource's schema.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: serde_json::Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = self.schema();
        let resource = schema
            .resources
            .get(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))?;
        Ok(validation::validate(resource, &config))
    }

    /// Construct a component resource, registering its children through `ctx`.
    async fn construct(
        &self,
        ctx: &Context,
        resource_type: &str,
        name: &str,
        inputs: serde_json::Value,
        options: ResourceOptions,
    ) -> Result<ConstructResult, ProviderError>;
}

/// Wrapper that implements the generated gRPC trait.
struct ProviderGrpcService<P: ProviderService> {
    provider: Arc<P>,
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<crate::generated::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|d| crate::generated::Diagnostic {
            severity: match d.severity {
                DiagnosticSeverity::Error => crate::generated::diagnostic::Severity::Error as i32,
                DiagnosticSeverity::Warning => {
                    crate::generated::diagnostic::Severity::Warning as i32
                },
            },
            summary: d.summary,
            detail: d.detail.unwrap_or_default(),
            attribute: d.attribute.unwrap_or_default(),
        })
        .collect()
}

fn error_to_diagnostics(err: ProviderError) -> Vec<crate::generated::Diagnostic> {
    let diagnostic = match err {
        // The host's message is forwarded verbatim.
        ProviderError::Monitor(status) => Diagnostic::error(status.message())
            .with_detail(format!("Resource monitor returned {:?}", status.code())),
        err => Diagnostic::error(err.to_string()),
    };
    diagnostics_to_proto(vec![diagnostic])
}

fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

fn schema_to_proto(schema: &crate::schema::Schema) -> crate::generated::Schema {
    let mut names: Vec<&String> = schema.block.attributes.keys().collect();
    names.sort();
    crate::generated::Schema {
        version: schema.version as i64,
        block: Some(crate::generated::Block {
            attributes: names
                .into_iter()
                .map(|name| {
                    let attr = &schema.block.attributes[name];
                    crate::generated::Attribute {
                        name: name.clone(),
                        r#type: serde_json::to_vec(&attr.attr_type).unwrap_or_default(),
                        required: attr.flags.required,
                        optional: attr.flags.optional,
                        computed: attr.flags.computed,
                        sensitive: attr.flags.sensitive,
                        description: attr.description.clone().unwrap_or_default(),
                        default_value: attr
                            .default
                            .as_ref()
                            .map(|v| serde_json::to_vec(v).unwrap_or_default())
                            .unwrap_or_default(),
                    }
                })
                .collect(),
            description: schema.block.description.clone().unwrap_or_default(),
        }),
    }
}

fn decode_json(bytes: &[u8]) -> Result<serde_json::Value, ProviderError> {
    if bytes.is_empty() {
        Ok(serde_json::Value::Object(serde_json::Map::new()))
    } else {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl<P: ProviderService> ProviderGrpcService<P> {
    async fn run_construct(
        &self,
        req: crate::generated::ConstructRequest,
    ) -> Result<ConstructResult, ProviderError> {
        let inputs = decode_json(&req.inputs)?;
        let monitor = GrpcResourceMonitor::connect(&req.monitor_endpoint).await?;
        let ctx = Context::new(Arc::new(monitor));
        let options = ResourceOptions {
            parent: (!req.parent.is_empty()).then_some(req.parent),
        };
        self.provider
            .construct(&ctx, &req.resource_type, &req.name, inputs, options)
            .await
    }
}

#[tonic::async_trait]
impl<P: ProviderService> crate::generated::provider_server::Provider for ProviderGrpcService<P> {
    #[instrument(skip(self, _request), name = "grpc.get_metadata")]
    async fn get_metadata(
        &self,
        _request: tonic::Request<crate::generated::GetMetadataRequest>,
    ) -> Result<tonic::Response<crate::generated::GetMetadataResponse>, tonic::Status> {
        debug!("GetMetadata called");
        let metadata = self.provider.metadata();
        info!(
            name = %metadata.name,
            version = %metadata.version,
            resources = metadata.resources.len(),
            "GetMetadata completed"
        );
        Ok(tonic::Response::new(
            crate::generated::GetMetadataResponse {
                server_capabilities: Some(crate::generated::ServerCapabilities {
                    construct: metadata.capabilities.construct,
                }),
                resources: metadata.resources,
                diagnostics: vec![],
                name: metadata.name,
                version: metadata.version,
            },
        ))
    }

    #[instrument(skip(self, _request), name = "grpc.get_schema")]
    async fn get_schema(
        &self,
        _request: tonic::Request<crate::generated::GetSchemaRequest>,
    ) -> Result<tonic::Response<crate::generated::GetSchemaResponse>, tonic::Status> {
        debug!("GetSchema called");
        let schema = self.provider.schema();
        info!(resources = schema.resources.len(), "GetSchema completed");
        Ok(tonic::Response::new(crate::generated::GetSchemaResponse {
            provider: Some(schema_to_proto(&schema.provider)),
            resources: schema
                .resources
                .iter()
                .map(|(k, v)| (k.clone(), schema_to_proto(v)))
                .collect(),
            diagnostics: vec![],
            name: schema.name,
            version: schema.version,
        }))
    }

    #[instrument(skip(self, request), name = "grpc.configure")]
    async fn configure(
        &self,
        request: tonic::Request<crate::generated::ConfigureRequest>,
    ) -> Result<tonic::Response<crate::generated::ConfigureResponse>, tonic::Status> {
        debug!("Configure called");
        let req = request.into_inner();
        let result = match decode_json(&req.config) {
            Ok(config) => self.provider.configure(config).await,
            Err(e) => Err(e),
        };

        let diagnostics = match result {
            Ok(diagnostics) => {
                if has_errors(&diagnostics) {
                    warn!(
                        diagnostics = diagnostics.len(),
                        "Configure completed with errors"
                    );
                } else {
                    info!("Configure completed successfully");
                }
                diagnostics_to_proto(diagnostics)
            },
            Err(e) => {
                error!(error = %e, "Configure failed");
                error_to_diagnostics(e)
            },
        };
        Ok(tonic::Response::new(crate::generated::ConfigureResponse {
            diagnostics,
        }))
    }

    #[instrument(skip(self, _request), name = "grpc.stop")]
    async fn stop(
        &self,
        _request: tonic::Request<crate::generated::StopRequest>,
    ) -> Result<tonic::Response<crate::generated::StopResponse>, tonic::Status> {
        info!("Stop called");
        let error = match self.provider.stop().await {
            Ok(()) => {
                info!("Stop completed successfully");
                String::new()
            },
            Err(e) => {
                error!(error = %e, "Stop failed");
                e.to_string()
            },
        };
        Ok(tonic::Response::new(crate::generated::StopResponse { error }))
    }

    #[instrument(skip(self, request), name = "grpc.validate_resource_config")]
    async fn validate_resource_config(
        &self,
        request: tonic::Request<crate::generated::ValidateResourceConfigRequest>,
    ) -> Result<tonic::Response<crate::generated::ValidateResourceConfigResponse>, tonic::Status>
    {
        let req = request.into_inner();
        debug!(resource_type = %req.resource_type, "ValidateResourceConfig called");
        let result = match decode_json(&req.config) {
            Ok(config) => {
                self.provider
                    .validate_resource_config(&req.resource_type, config)
                    .await
            },
            Err(e) => Err(e),
        };

        let diagnostics = match result {
            Ok(diagnostics) => {
                if has_errors(&diagnostics) {
                    warn!(resource_type = %req.resource_type, diagnostics = diagnostics.len(), "ValidateResourceConfig completed with errors");
                } else {
                    info!(resource_type = %req.resource_type, "ValidateResourceConfig completed successfully");
                }
                diagnostics_to_proto(diagnostics)
            },
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "ValidateResourceConfig failed");
                error_to_diagnostics(e)
            },
        };
        Ok(tonic::Response::new(
            crate::generated::ValidateResourceConfigResponse { diagnostics },
        ))
    }

    #[instrument(skip(self, request), name = "grpc.construct")]
    async fn construct(
        &self,
        request: tonic::Request<crate::generated::ConstructRequest>,
    ) -> Result<tonic::Response<crate::generated::ConstructResponse>, tonic::Status> {
        let req = request.into_inner();
        let resource_type = req.resource_type.clone();
        let name = req.name.clone();
        info!(resource_type = %resource_type, name = %name, "Construct called");

        match self.run_construct(req).await {
            Ok(result) => {
                info!(resource_type = %resource_type, name = %name, urn = %result.urn, "Construct completed successfully");
                Ok(tonic::Response::new(crate::generated::ConstructResponse {
                    urn: result.urn,
                    state: serde_json::to_vec(&result.state).unwrap_or_default(),
                    diagnostics: vec![],
                }))
            },
            Err(e) => {
                error!(resource_type = %resource_type, name = %name, error = %e, "Construct failed");
                Ok(tonic::Response::new(crate::generated::ConstructResponse {
                    urn: String::new(),
                    state: vec![],
                    diagnostics: error_to_diagnostics(e),
                }))
            },
        }
    }
}

/// Options for configuring the provider server.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// How long to wait for in-flight requests after a shutdown signal.
    /// Default: 30 seconds.
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServeOptions {
    /// Create new serve options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT; CTRL+C on Windows).
///
/// If the handlers cannot be installed the future never resolves and the
/// host is expected to kill the process.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    error!(error = %e, "Failed to install signal handlers");
                    std::future::pending::<()>().await;
                    return;
                },
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, initiating graceful shutdown");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, initiating graceful shutdown");
            }
        }
    }

    #[cfg(windows)]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received CTRL+C, initiating graceful shutdown"),
            Err(e) => {
                error!(error = %e, "Failed to install CTRL+C handler");
                std::future::pending::<()>().await;
            },
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        std::future::pending::<()>().await;
    }
}

/// Serve a provider implementation as a gRPC server.
///
/// Binds an ephemeral port on localhost, prints the handshake
/// `HEMMER_PROVIDER|<version>|<address>` to stdout and serves until a
/// shutdown signal arrives.
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), Box<dyn std::error::Error>> {
    serve_with_options(provider, ServeOptions::default()).await
}

/// Serve a provider with custom options.
pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    serve_on_listener(provider, listener, addr, options).await
}

/// Serve a provider on a specific address.
pub async fn serve_on<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    serve_on_with_options(provider, addr, ServeOptions::default()).await
}

/// Serve a provider on a specific address with custom options.
pub async fn serve_on_with_options<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    serve_on_listener(provider, listener, actual_addr, options).await
}

/// The line the host reads from stdout to find the provider.
pub fn handshake_line(addr: SocketAddr) -> String {
    format!("{}|{}|{}", HANDSHAKE_PREFIX, PROTOCOL_VERSION, addr)
}

async fn serve_on_listener<P: ProviderService>(
    provider: P,
    listener: TcpListener,
    addr: SocketAddr,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", handshake_line(addr));

    info!(address = %addr, "Provider server starting");

    let provider = Arc::new(provider);
    let provider_for_shutdown = Arc::clone(&provider);

    let grpc_service = ProviderGrpcService { provider };
    let server = crate::generated::provider_server::ProviderServer::new(grpc_service);

    // The grace period starts when the signal arrives, not when serving starts.
    let shutdown_timeout = options.shutdown_timeout;
    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let shutdown = async move {
        wait_for_shutdown_signal().await;
        let _ = signalled_tx.send(());
    };
    let grace_period = async move {
        match signalled_rx.await {
            Ok(()) => tokio::time::sleep(shutdown_timeout).await,
            Err(_) => std::future::pending::<()>().await,
        }
    };

    let server_future = Server::builder()
        .add_service(server)
        .serve_with_incoming_shutdown(
            tokio_stream::wrappers::TcpListenerStream::new(listener),
            shutdown,
        );

    let outcome = tokio::select! {
        result = server_future => Some(result),
        _ = grace_period => None,
    };

    match outcome {
        Some(Ok(())) => {
            info!("Server shutdown complete");
        },
        Some(Err(e)) => {
            error!(error = %e, "Server error during shutdown");
            return Err(e.into());
        },
        None => {
            warn!(
                timeout = ?shutdown_timeout,
                "Shutdown timeout exceeded, forcing shutdown"
            );
        },
    }

    debug!("Calling provider stop()");
    if let Err(e) = provider_for_shutdown.stop().await {
        warn!(error = %e, "Provider stop() returned error");
    }

    info!("Provider shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generated::provider_server::Provider;
    use crate::login::RANDOM_LOGIN;
    use crate::provider::XyzProvider;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn service() -> ProviderGrpcService<XyzProvider> {
        ProviderGrpcService {
            provider: Arc::new(XyzProvider::new()),
        }
    }

    #[test]
    fn test_handshake_line() {
        let addr: SocketAddr = "127.0.0.1:50051".parse().unwrap();
        assert_eq!(handshake_line(addr), "HEMMER_PROVIDER|1|127.0.0.1:50051");
    }

    #[test]
    fn test_serve_options() {
        assert_eq!(ServeOptions::new().shutdown_timeout, Duration::from_secs(30));
        let options = ServeOptions::new().with_shutdown_timeout(Duration::from_secs(5));
        assert_eq!(options.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_diagnostics_to_proto() {
        let proto = diagnostics_to_proto(vec![
            Diagnostic::error("bad").with_attribute("petName"),
            Diagnostic::warning("odd"),
        ]);
        assert_eq!(
            proto[0].severity,
            crate::generated::diagnostic::Severity::Error as i32
        );
        assert_eq!(proto[0].attribute, "petName");
        assert_eq!(
            proto[1].severity,
            crate::generated::diagnostic::Severity::Warning as i32
        );
        assert!(proto[1].detail.is_empty());
    }

    #[test]
    fn test_decode_json_treats_empty_as_object() {
        assert_eq!(decode_json(b"").unwrap(), json!({}));
        assert_eq!(decode_json(br#"{"petName":true}"#).unwrap(), json!({"petName": true}));
        assert!(matches!(
            decode_json(b"{not json").unwrap_err(),
            ProviderError::Serialization(_)
        ));
    }

    #[tokio::test]
    async fn test_get_metadata() {
        let response = service()
            .get_metadata(tonic::Request::new(crate::generated::GetMetadataRequest {}))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.name, "xyz");
        assert_eq!(response.version, crate::provider::VERSION);
        assert_eq!(response.resources, vec![RANDOM_LOGIN.to_string()]);
        assert!(response.server_capabilities.unwrap().construct);
    }

    #[tokio::test]
    async fn test_get_schema_encodes_attributes() {
        let response = service()
            .get_schema(tonic::Request::new(crate::generated::GetSchemaRequest {}))
            .await
            .unwrap()
            .into_inner();

        let block = response.resources[RANDOM_LOGIN].block.clone().unwrap();
        let names: Vec<&str> = block.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["password", "passwordLength", "petName", "username"]);

        let password = &block.attributes[0];
        assert!(password.computed);
        assert!(password.sensitive);

        let length = &block.attributes[1];
        assert_eq!(length.r#type, br#""int64""#.to_vec());
        assert_eq!(length.default_value, b"16".to_vec());
    }

    #[tokio::test]
    async fn test_validate_resource_config_reports_diagnostics() {
        let response = service()
            .validate_resource_config(tonic::Request::new(
                crate::generated::ValidateResourceConfigRequest {
                    resource_type: RANDOM_LOGIN.to_string(),
                    config: serde_json::to_vec(&json!({"passwordLength": "long"})).unwrap(),
                },
            ))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.diagnostics.len(), 2);
        assert!(response
            .diagnostics
            .iter()
            .all(|d| d.severity == crate::generated::diagnostic::Severity::Error as i32));
    }

    #[tokio::test]
    async fn test_validate_unknown_resource_type() {
        let response = service()
            .validate_resource_config(tonic::Request::new(
                crate::generated::ValidateResourceConfigRequest {
                    resource_type: "xyz:index:Nope".to_string(),
                    config: vec![],
                },
            ))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].summary.contains("xyz:index:Nope"));
    }

    #[tokio::test]
    async fn test_construct_without_monitor_reports_error() {
        let response = service()
            .construct(tonic::Request::new(crate::generated::ConstructRequest {
                resource_type: RANDOM_LOGIN.to_string(),
                name: "db".to_string(),
                inputs: serde_json::to_vec(&json!({"petName": true})).unwrap(),
                parent: String::new(),
                monitor_endpoint: String::new(),
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(response.urn.is_empty());
        assert!(response.state.is_empty());
        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0]
            .summary
            .contains("No resource monitor endpoint"));
    }

    #[test]
    fn test_monitor_error_keeps_host_message() {
        let diagnostics = error_to_diagnostics(ProviderError::Monitor(
            tonic::Status::invalid_argument("length must be at least 1"),
        ));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "length must be at least 1");
        assert!(diagnostics[0].detail.contains("InvalidArgument"));

        let diagnostics = error_to_diagnostics(ProviderError::UnknownResource("x".to_string()));
        assert_eq!(diagnostics[0].summary, "Unknown resource type: x");
    }

    /// A host resource monitor served in-process over gRPC.
    #[derive(Default)]
    struct Host {
        registrations: Mutex<Vec<crate::generated::RegisterResourceRequest>>,
        outputs: Mutex<Vec<crate::generated::RegisterResourceOutputsRequest>>,
        rejections: HashMap<String, tonic::Status>,
        omit_ids: bool,
    }

    impl Host {
        fn rejecting(mut self, type_token: &str, status: tonic::Status) -> Self {
            self.rejections.insert(type_token.to_string(), status);
            self
        }

        fn without_ids(mut self) -> Self {
            self.omit_ids = true;
            self
        }

        fn registrations(&self) -> Vec<crate::generated::RegisterResourceRequest> {
            self.registrations.lock().unwrap().clone()
        }

        fn outputs(&self) -> Vec<crate::generated::RegisterResourceOutputsRequest> {
            self.outputs.lock().unwrap().clone()
        }
    }

    #[tonic::async_trait]
    impl crate::generated::resource_monitor_server::ResourceMonitor for Host {
        async fn register_resource(
            &self,
            request: tonic::Request<crate::generated::RegisterResourceRequest>,
        ) -> Result<tonic::Response<crate::generated::RegisterResourceResponse>, tonic::Status>
        {
            let req = request.into_inner();
            self.registrations.lock().unwrap().push(req.clone());
            if let Some(status) = self.rejections.get(&req.r#type) {
                return Err(status.clone());
            }

            let inputs: serde_json::Value = serde_json::from_slice(&req.inputs).unwrap();
            let (id, outputs) = match req.r#type.as_str() {
                crate::random::RANDOM_PET => ("clever-fox".to_string(), vec![]),
                crate::random::RANDOM_ID => (
                    "obLD1OX4".to_string(),
                    serde_json::to_vec(&json!({"hex": "a1b2c3d4e5f60718"})).unwrap(),
                ),
                crate::random::RANDOM_PASSWORD => {
                    let length = inputs["length"].as_u64().unwrap() as usize;
                    let result: String = "Zq8!".chars().cycle().take(length).collect();
                    (
                        String::new(),
                        serde_json::to_vec(&json!({"result": result})).unwrap(),
                    )
                },
                _ => (String::new(), vec![]),
            };

            Ok(tonic::Response::new(
                crate::generated::RegisterResourceResponse {
                    urn: format!("urn:hemmer:dev::{}::{}", req.r#type, req.name),
                    id: if self.omit_ids { String::new() } else { id },
                    outputs,
                },
            ))
        }

        async fn register_resource_outputs(
            &self,
            request: tonic::Request<crate::generated::RegisterResourceOutputsRequest>,
        ) -> Result<
            tonic::Response<crate::generated::RegisterResourceOutputsResponse>,
            tonic::Status,
        > {
            self.outputs.lock().unwrap().push(request.into_inner());
            Ok(tonic::Response::new(
                crate::generated::RegisterResourceOutputsResponse {},
            ))
        }
    }

    async fn start_host(host: Arc<Host>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(
            Server::builder()
                .add_service(
                    crate::generated::resource_monitor_server::ResourceMonitorServer::from_arc(
                        host,
                    ),
                )
                .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener)),
        );
        addr
    }

    fn construct_request(
        inputs: serde_json::Value,
        monitor: SocketAddr,
    ) -> tonic::Request<crate::generated::ConstructRequest> {
        tonic::Request::new(crate::generated::ConstructRequest {
            resource_type: RANDOM_LOGIN.to_string(),
            name: "db".to_string(),
            inputs: serde_json::to_vec(&inputs).unwrap(),
            parent: "urn:hemmer:dev::stack".to_string(),
            monitor_endpoint: monitor.to_string(),
        })
    }

    #[tokio::test]
    async fn test_construct_registers_with_host_monitor() {
        let host = Arc::new(Host::default());
        let addr = start_host(host.clone()).await;

        let response = service()
            .construct(construct_request(json!({"petName": true}), addr))
            .await
            .unwrap()
            .into_inner();

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let component_urn = "urn:hemmer:dev::xyz:index:RandomLogin::db";
        assert_eq!(response.urn, component_urn);
        let state: serde_json::Value = serde_json::from_slice(&response.state).unwrap();
        assert_eq!(state["username"], "clever-fox");
        assert_eq!(state["password"], "Zq8!Zq8!Zq8!Zq8!");

        let registrations = host.registrations();
        assert_eq!(registrations.len(), 3);
        assert_eq!(registrations[0].r#type, RANDOM_LOGIN);
        assert!(!registrations[0].custom);
        assert_eq!(registrations[0].parent, "urn:hemmer:dev::stack");
        assert_eq!(registrations[1].r#type, crate::random::RANDOM_PET);
        assert_eq!(registrations[2].r#type, crate::random::RANDOM_PASSWORD);
        for child in &registrations[1..] {
            assert!(child.custom);
            assert_eq!(child.parent, component_urn);
        }
        let password_inputs: serde_json::Value =
            serde_json::from_slice(&registrations[2].inputs).unwrap();
        assert_eq!(password_inputs, json!({"length": 16}));

        let outputs = host.outputs();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].urn, component_urn);
        let published: serde_json::Value = serde_json::from_slice(&outputs[0].outputs).unwrap();
        assert_eq!(published, state);
    }

    #[tokio::test]
    async fn test_construct_reads_hex_from_host_monitor() {
        let host = Arc::new(Host::default());
        let addr = start_host(host.clone()).await;

        let response = service()
            .construct(construct_request(
                json!({"petName": false, "passwordLength": 6}),
                addr,
            ))
            .await
            .unwrap()
            .into_inner();

        let state: serde_json::Value = serde_json::from_slice(&response.state).unwrap();
        assert_eq!(state["username"], "a1b2c3d4e5f60718");
        assert_eq!(state["password"], "Zq8!Zq");
        let id_inputs: serde_json::Value =
            serde_json::from_slice(&host.registrations()[1].inputs).unwrap();
        assert_eq!(id_inputs, json!({"byteLength": 8}));
    }

    #[tokio::test]
    async fn test_construct_forwards_host_rejection_unchanged() {
        let host = Arc::new(Host::default().rejecting(
            crate::random::RANDOM_PASSWORD,
            tonic::Status::invalid_argument("length must be at least 1"),
        ));
        let addr = start_host(host.clone()).await;

        let response = service()
            .construct(construct_request(
                json!({"petName": true, "passwordLength": 0}),
                addr,
            ))
            .await
            .unwrap()
            .into_inner();

        assert!(response.urn.is_empty());
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "length must be at least 1");
        assert_eq!(host.registrations().len(), 3);
        assert!(host.outputs().is_empty());
    }

    #[tokio::test]
    async fn test_construct_requires_ids_from_host() {
        let host = Arc::new(Host::default().without_ids());
        let addr = start_host(host.clone()).await;

        let response = service()
            .construct(construct_request(json!({"petName": true}), addr))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].summary.contains("has no resource ID"));
        assert!(host
            .registrations()
            .iter()
            .all(|r| r.r#type != crate::random::RANDOM_PASSWORD));
    }

    #[tokio::test]
    async fn test_provider_served_over_grpc() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(
            Server::builder()
                .add_service(crate::generated::provider_server::ProviderServer::new(
                    service(),
                ))
                .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener)),
        );

        let mut client =
            crate::generated::provider_client::ProviderClient::connect(format!("http://{}", addr))
                .await
                .unwrap();
        let metadata = client
            .get_metadata(crate::generated::GetMetadataRequest {})
            .await
            .unwrap()
            .into_inner();
        assert_eq!(metadata.name, "xyz");
        assert_eq!(metadata.resources, vec![RANDOM_LOGIN.to_string()]);
    }

    #[tokio::test]
    async fn test_stop_reports_no_error() {
        let response = service()
            .stop(tonic::Request::new(crate::generated::StopRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert!(response.error.is_empty());
    }
}
