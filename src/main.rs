use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use klaim_core::{ClaimService, CoreConfig, FileStore};
use klaim_genai::{GenAiConfig, HttpGenerativeLookup};

/// Main entry point for the Klaim server
///
/// Serves the REST API (with Swagger UI at `/swagger-ui`) over a YAML file store.
///
/// # Environment Variables
/// - `KLAIM_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `KLAIM_DATA_DIR`: Directory for record storage (default: "klaim_data")
/// - `KLAIM_HOSPITAL_NAME`: Hospital name shown in reports
/// - `KLAIM_LOOKUP_TIMEOUT_SECS`: Upper bound on one generative lookup (default: 30)
/// - `KLAIM_GENAI_ENDPOINT`, `KLAIM_GENAI_MODEL`, `KLAIM_GENAI_API_KEY`: generative service
///
/// Without an API key the server still runs; codes missing from the catalog then fail to
/// resolve.
///
/// # Errors
/// Returns an error if configuration is invalid, the store cannot be seeded, the address
/// cannot be bound, or the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("klaim=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = CoreConfig::from_env_values(
        std::env::var("KLAIM_DATA_DIR").ok(),
        std::env::var("KLAIM_LOOKUP_TIMEOUT_SECS").ok(),
        std::env::var("KLAIM_HOSPITAL_NAME").ok(),
    )?;

    let genai = GenAiConfig::from_values(
        std::env::var("KLAIM_GENAI_ENDPOINT").ok(),
        std::env::var("KLAIM_GENAI_MODEL").ok(),
        std::env::var("KLAIM_GENAI_API_KEY").ok(),
        cfg.lookup_timeout(),
    );
    if !genai.is_configured() {
        tracing::warn!("KLAIM_GENAI_API_KEY is not set; only catalog codes will resolve");
    }
    let lookup = HttpGenerativeLookup::new(genai)?;

    let rest_addr = std::env::var("KLAIM_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!(
        "++ Starting Klaim REST for {} on {} (data in {})",
        cfg.hospital_name(),
        rest_addr,
        cfg.data_dir().display()
    );

    let store = FileStore::new(cfg.data_dir());
    let service = ClaimService::new(Arc::new(cfg), store, lookup);
    service.seed_catalog_if_empty()?;

    let app = api_rest::router(AppState::new(service));

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
