//! w3tasq application entry point.
//!
//! Bootstraps the server:
//! 1. Load configuration from environment
//! 2. Open the SQLite task database
//! 3. Connect to Redis, or fall back to in-memory stores with a sweep loop
//! 4. Build router with API routes, tracing, CORS and response headers
//! 5. Start Axum server
//!
//! Also supports a `sign` subcommand that signs a message the way a wallet's
//! `personal_sign` does, for testing the login flow from the command line.

use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use w3tasq::{
    auth::{verify::sign_message, AppState, AuthProtocol, PersonalSignVerifier},
    cleanup,
    config::Config,
    middleware::api_headers,
    routes,
    storage::{db::Database, ChallengeStore, MemoryStore, RedisStore, SessionStore},
};

fn print_sign_usage() {
    eprintln!("Usage: w3tasq sign <private-key-hex> <message>");
    eprintln!();
    eprintln!("Sign a challenge message with a secp256k1 private key (EIP-191 personal_sign).");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  w3tasq sign 0x4c08...2318 \"Sign this message to authenticate: ...\"");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Check for sign subcommand
    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && args[1] == "sign" {
        if args.len() != 4 {
            print_sign_usage();
            std::process::exit(1);
        }

        match sign_message(&args[2], &args[3]) {
            Ok(signature) => println!("{}", signature),
            Err(e) => {
                eprintln!("Error signing message: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // Initialize tracing with env filter support (RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config from environment
    let config = Config::from_env()?;
    tracing::info!("Starting w3tasq on {}", config.bind_addr);

    let db = Arc::new(Database::open(&config.database_path)?);

    let (challenges, sessions): (Arc<dyn ChallengeStore>, Arc<dyn SessionStore>) =
        match &config.redis_url {
            Some(url) => {
                let store = Arc::new(RedisStore::open(url)?);
                store.ping().await?;
                tracing::info!("Challenges and sessions stored in Redis");
                let challenges: Arc<dyn ChallengeStore> = store.clone();
                let sessions: Arc<dyn SessionStore> = store;
                (challenges, sessions)
            }
            None => {
                let store = Arc::new(MemoryStore::new());
                tokio::spawn(cleanup::run_sweep_loop(
                    store.clone(),
                    config.sweep_interval(),
                ));
                tracing::warn!("REDIS_URL not set, challenges and sessions are kept in memory");
                let challenges: Arc<dyn ChallengeStore> = store.clone();
                let sessions: Arc<dyn SessionStore> = store;
                (challenges, sessions)
            }
        };

    let auth = AuthProtocol::new(
        challenges,
        Arc::new(PersonalSignVerifier),
        config.challenge_ttl(),
        config.store_timeout(),
    );

    // Build shared state
    let state = AppState {
        auth: Arc::new(auth),
        sessions,
        db,
        config: Arc::new(config.clone()),
    };

    // Explicit CORS: deny all cross-origin requests (single-origin deployment).
    let cors = CorsLayer::new();

    let app = routes::api_router()
        .layer(cors)
        .layer(axum::middleware::from_fn(api_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Bind to configured address
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
