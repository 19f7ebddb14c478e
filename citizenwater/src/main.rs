use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use citizenwater::{
    config::{Args, LogFormat, Role},
    db::MongoClient,
    server, AppState,
};

fn init_tracing(args: &Args) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("citizenwater={},info", args.log_level).into());

    match args.log_format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

fn upstream(url: &Option<String>) -> &str {
    url.as_deref().unwrap_or("(not set)")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(&args);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Citizenwater - Citizen Science Water");
    info!("======================================");
    info!("Version: {} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_COMMIT_SHORT"));
    info!("Built: {}", env!("BUILD_TIMESTAMP"));
    info!("Role: {}", args.role);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Store: {}", args.backend_name());
    if args.role != Role::All {
        info!("Auth service: {}", upstream(&args.auth_url));
        info!("Observation service: {}", upstream(&args.observations_url));
        info!("Rewards service: {}", upstream(&args.rewards_url));
    }
    info!("======================================");

    // The gateway keeps no state of its own
    let mongo_uri = match args.role {
        Role::Gateway => None,
        _ => args.mongodb_uri.clone(),
    };

    let mongo = match mongo_uri {
        Some(uri) => match MongoClient::new(&uri, &args.mongodb_db).await {
            Ok(client) => {
                info!("MongoDB connected (database '{}')", client.db_name());
                Some(client)
            }
            Err(e) => {
                if args.dev_mode {
                    warn!("MongoDB connection failed (dev mode, using in-memory stores): {}", e);
                    None
                } else {
                    error!("MongoDB connection failed: {}", e);
                    std::process::exit(1);
                }
            }
        },
        None => None,
    };

    let state = match &mongo {
        Some(client) => AppState::with_mongo(args, client).await,
        None => AppState::new(args),
    };

    let state = match state {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server::run(state).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
