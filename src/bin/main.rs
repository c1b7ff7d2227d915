use banking_concierge::auth::{Authenticator, DevAuthenticator};
use banking_concierge::config::Settings;
use banking_concierge::orchestrator::Orchestrator;
use tracing::info;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "banking_concierge=info".into()),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let settings = Settings::from_env();
    let orchestrator = Orchestrator::from_settings(&settings);
    let authenticator = DevAuthenticator::new(settings.auth_token_expiry_minutes);

    info!("Banking Concierge demo starting");

    // 1. Informational query, no authentication needed
    let faq = orchestrator
        .handle("What are your opening hours?", None, None)
        .await;
    println!("> What are your opening hours?\n{}\n", faq.message);
    let session_id = faq.session_id;

    // 2. Account query without authentication is gated
    let gated = orchestrator
        .handle("What's my balance?", Some(&session_id), None)
        .await;
    println!("> What's my balance?\n{}\n", gated.message);

    // 3. Authenticate as the single-card demo user
    let otp = authenticator.generate_otp("user_002").await;
    let token = authenticator
        .login("user_002", &otp)
        .await
        .expect("demo login succeeds");
    let auth = authenticator.verify(&token).await;
    println!("(authenticated as user_002)\n");

    // 4. Same question, now answered
    let balance = orchestrator
        .handle("What's my balance?", Some(&session_id), auth.clone())
        .await;
    println!("> What's my balance?\n{}\n", balance.message);

    // 5. Start a card lock; the workflow asks for confirmation
    let lock = orchestrator
        .handle("lock my card", Some(&session_id), auth.clone())
        .await;
    println!("> lock my card\n{}\n", lock.message);

    // 6. Confirm and execute
    if lock.requires_confirmation {
        let transaction_id: Uuid =
            serde_json::from_value(lock.metadata["transaction_id"].clone())?;

        let confirmed = orchestrator
            .confirm(&lock.session_id, transaction_id, auth)
            .await;
        println!("> yes, proceed\n{}", confirmed.message);
    }

    Ok(())
}
