//! Standalone REST API server binary for the review backend.
//!
//! Serves the case API with OpenAPI/Swagger UI at `/swagger-ui`.

use api_rest::{router, AppState};
use swasth_core::{ReviewRepository, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the Swasth REST API server
///
/// # Environment Variables
/// - `SWASTH_REST_ADDR`: Server address (default: "0.0.0.0:8000")
/// - `SWASTH_DATA_DIR`: Case storage directory (default: "swasth_data")
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the case storage directory cannot be created,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("swasth_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("SWASTH_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".into());
    let config = ServerConfig::from_env();
    let repo = ReviewRepository::open(&config)?;

    tracing::info!(
        "-- Starting Swasth REST API on {} (cases in {})",
        addr,
        repo.cases_dir().display()
    );

    let app = router(AppState::new(repo));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
