//! Skiff - A lightweight federated micro-blogging server
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Signup/signin magic links                                │
//! │  - Posts and timeline                                       │
//! │  - ActivityPub endpoints, WebFinger                         │
//! │  - Admin signup moderation                                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Token lifecycle (issue/verify/consume)                   │
//! │  - Signup flow, timeline                                    │
//! │  - Follow relationship engine                               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Business logic layer
//! - `federation`: ActivityPub actors, follow relationships, delivery
//! - `data`: Database layer
//! - `auth`: Session cookies
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod federation;
pub mod metrics;
pub mod service;

use std::sync::Arc;

#[cfg(test)]
const INSTANCE_KEY_BITS: usize = 2048;
#[cfg(not(test))]
const INSTANCE_KEY_BITS: usize = 4096;

/// Application state shared across all handlers
///
/// This struct is cloned for each request and contains
/// shared resources like the database pool and services.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// HTTP client for federation
    pub http_client: Arc<reqwest::Client>,

    /// Federation context (URI derivation + delivery client)
    pub federation: federation::FederationContext,

    /// Magic link token service
    pub tokens: Arc<service::TokenService>,

    /// Signup flow service
    pub signup: Arc<service::SignupService>,

    /// Timeline service
    pub timeline: Arc<service::TimelineService>,

    /// Follow relationship engine
    pub engine: Arc<federation::RelationshipEngine>,

    /// Inbound activity processor
    pub processor: Arc<federation::ActivityProcessor>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database
    /// 2. Ensure the instance signing key exists
    /// 3. Build the federation context
    /// 4. Wire up services
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Connect to SQLite database
        let db = Arc::new(data::Database::connect(&config.database.path).await?);
        tracing::info!("Database connected");

        // 2. Ensure the instance signing key exists
        let private_key_pem = Self::ensure_instance_key(&db).await?;

        // 3. Initialize HTTP client
        let http_client = Arc::new(
            reqwest::Client::builder()
                .user_agent(format!("Skiff/{}", federation::SOFTWARE_VERSION))
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .map_err(|e| error::AppError::Internal(e.into()))?,
        );

        // 4. Build the federation context
        let base_url = config.server.base_url();
        let key_id = format!("{}/ap/actors/{}#main-key", base_url, config.server.domain);
        let delivery = Arc::new(federation::ActivityDelivery::new(
            http_client.clone(),
            key_id,
            private_key_pem,
        ));
        let federation_ctx = federation::FederationContext::new(
            base_url,
            config.server.domain.clone(),
            delivery,
        );

        // 5. Wire up services
        let tokens = Arc::new(service::TokenService::new(db.clone()));
        let engine = Arc::new(federation::RelationshipEngine::new(db.clone()));
        let signup = Arc::new(service::SignupService::new(
            db.clone(),
            tokens.clone(),
            engine.clone(),
            config.tokens.signup_ttl_minutes,
            config.tokens.signin_ttl_minutes,
        ));
        let timeline = Arc::new(service::TimelineService::new(db.clone(), engine.clone()));
        let processor = Arc::new(federation::ActivityProcessor::new(
            db.clone(),
            engine.clone(),
        ));

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db,
            http_client,
            federation: federation_ctx,
            tokens,
            signup,
            timeline,
            engine,
            processor,
        })
    }

    /// Load the instance signing key, generating it on first startup.
    async fn ensure_instance_key(db: &data::Database) -> Result<String, error::AppError> {
        if let Some(pem) = db.get_instance_key().await? {
            return Ok(pem);
        }

        tracing::info!("Generating instance signing key...");
        let pem = federation::generate_private_key_pem(INSTANCE_KEY_BITS)?;

        if db.insert_instance_key(&pem, chrono::Utc::now()).await? {
            tracing::info!("Instance signing key generated");
            return Ok(pem);
        }

        // Another starter won the insert; use the stored key
        db.get_instance_key()
            .await?
            .ok_or_else(|| error::AppError::Config("instance key vanished".to_string()))
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::auth_router())
        .merge(api::posts_router())
        .merge(api::wellknown_router())
        .merge(api::activitypub_router())
        .nest("/admin", api::admin_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if !server.protocol.eq_ignore_ascii_case("https") {
        return CorsLayer::permissive();
    }

    let allowed_origin = server.base_url();
    match HeaderValue::from_str(&allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from server base URL; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
