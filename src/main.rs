use tracing::info;
use xyz_provider::{init_logging, serve, XyzProvider, PROVIDER_NAME, VERSION};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    info!(provider = PROVIDER_NAME, version = VERSION, "Starting provider");
    serve(XyzProvider::new()).await
}
