use hemmer_provider_azurerm::{init_logging, serve, AzureRmProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting AzureRM provider");
    serve(AzureRmProvider::new()).await
}
