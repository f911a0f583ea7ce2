use axum::http::{HeaderValue, Method};
use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};
use clap::Parser;
use skillswap::handlers::{self, AppState};
use skillswap::services::events::EventHub;
use skillswap::{Config, SqlitePool, get_db_pool, utils};
use tower_http::cors::{Any, CorsLayer};

/// Skill-bartering marketplace server.
#[derive(Parser, Debug)]
#[command(name = "server")]
struct Args {
    /// Port to listen on (overrides PORT from the environment)
    #[arg(long)]
    port: Option<u16>,

    /// Database URL (overrides DATABASE_URL from the environment)
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    utils::init_logging();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database_url) = args.database_url {
        config.database_url = database_url;
    }

    let mut db_config = skillswap::db::DatabaseConfig::from_env()?;
    db_config.database_url = config.database_url.clone();
    let pool = get_db_pool(&db_config).await?;

    // Run migrations
    skillswap::db::migrations::run_migrations(&pool).await?;

    let port = config.port;
    let app = create_router(pool, config);

    let listener = tokio::net::TcpListener::bind(&format!("0.0.0.0:{}", port)).await?;
    tracing::info!("Server running on port {}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(pool: SqlitePool, config: Config) -> Router {
    let cors_layer = create_cors_layer(&config);
    let state = AppState {
        pool,
        config,
        events: EventHub::new(),
    };

    Router::new()
        .route("/health", get(health_check))
        // Users & skills
        .route("/api/users/register", post(handlers::register))
        .route("/api/users/me", get(handlers::me))
        .route(
            "/api/users/skills",
            get(handlers::list_my_skills).post(handlers::add_skill),
        )
        .route(
            "/api/users/skills/{kind}/{skill_id}",
            delete(handlers::remove_skill),
        )
        .route("/api/skills", get(handlers::browse_skills))
        // Messages & negotiation
        .route("/api/messages", post(handlers::create_proposal))
        .route("/api/messages/chat", post(handlers::send_chat_message))
        .route("/api/messages/chats", get(handlers::get_chat_list))
        .route("/api/messages/chat/{partner_id}", get(handlers::get_chat))
        .route(
            "/api/messages/{id}/status",
            put(handlers::respond_to_proposal),
        )
        .route("/api/messages/{id}/read", patch(handlers::mark_message_read))
        .layer(cors_layer)
        .with_state(state)
}

fn create_cors_layer(_config: &Config) -> CorsLayer {
    let mut cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_credentials(false);

    // Check if ALLOWED_ORIGINS environment variable is set for multiple domains
    if let Ok(cors_origins) = std::env::var("ALLOWED_ORIGINS") {
        let origins: Vec<HeaderValue> = cors_origins
            .split(',')
            .filter_map(|origin| {
                let trimmed = origin.trim();
                if !trimmed.is_empty() {
                    trimmed.parse().ok()
                } else {
                    None
                }
            })
            .collect();

        if !origins.is_empty() {
            cors = cors.allow_origin(origins);
        } else {
            // Fallback to permissive if parsing fails
            cors = cors.allow_origin(Any);
        }
    } else {
        // Default to permissive for development
        cors = cors.allow_origin(Any);
    }

    cors
}

async fn health_check() -> &'static str {
    "OK"
}
