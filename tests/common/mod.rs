//! Common test utilities for E2E tests

use std::sync::{Arc, Mutex};

use axum::{Router, extract::State, routing::post};
use skiff::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const ADMIN_SECRET: &str = "e2e-admin-secret";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Pre-seed a small instance key so startup does not spend time
        // generating a production-sized one
        {
            let db = skiff::data::Database::connect(&db_path).await.unwrap();
            let pem = skiff::federation::generate_private_key_pem(2048).unwrap();
            db.insert_instance_key(&pem, chrono::Utc::now())
                .await
                .unwrap();
        }

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                domain: "test.example.com".to_string(),
                protocol: "http".to_string(),
            },
            database: config::DatabaseConfig {
                path: db_path.clone(),
            },
            instance: config::InstanceConfig {
                title: "Test Instance".to_string(),
                description: "Test Skiff Instance".to_string(),
                contact_email: "test@example.com".to_string(),
            },
            auth: config::AuthConfig {
                session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
                session_max_age: 604800,
            },
            admin: config::AdminConfig {
                secret: ADMIN_SECRET.to_string(),
            },
            tokens: config::TokenConfig {
                signin_ttl_minutes: 30,
                signup_ttl_minutes: 1440,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        let state = AppState::new(config).await.unwrap();
        let app = skiff::build_router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Redirects and cookies are inspected by hand in the tests
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        Self {
            addr,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Absolute URL for a path on this server
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }
}

/// Activities captured by a stand-in remote inbox
pub type CapturedActivities = Arc<Mutex<Vec<serde_json::Value>>>;

/// Spawn a stand-in remote inbox that records every posted activity.
///
/// Returns the server's base URL and the capture buffer.
pub async fn spawn_remote_inbox() -> (String, CapturedActivities) {
    let captured: CapturedActivities = Arc::new(Mutex::new(Vec::new()));

    async fn record(
        State(captured): State<CapturedActivities>,
        body: String,
    ) -> axum::http::StatusCode {
        if let Ok(activity) = serde_json::from_str(&body) {
            captured.lock().unwrap().push(activity);
        }
        axum::http::StatusCode::ACCEPTED
    }

    let app = Router::new()
        .route("/inbox", post(record))
        .with_state(captured.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), captured)
}
