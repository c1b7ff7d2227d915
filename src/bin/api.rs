use banking_concierge::api::start_server;
use banking_concierge::auth::DevAuthenticator;
use banking_concierge::config::Settings;
use banking_concierge::orchestrator::Orchestrator;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "banking_concierge=info,tower_http=info".into()),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let settings = Settings::from_env();

    if settings.mistral_api_key.is_none() {
        eprintln!("MISTRAL_API_KEY not set - running with keyword classification only");
    }

    info!("Banking Concierge - API Server");
    info!(host = %settings.api_host, port = settings.api_port, "Starting");

    let orchestrator = Arc::new(Orchestrator::from_settings(&settings));
    let authenticator = Arc::new(DevAuthenticator::new(settings.auth_token_expiry_minutes));

    start_server(
        orchestrator,
        authenticator,
        &settings.api_host,
        settings.api_port,
    )
    .await?;

    Ok(())
}
