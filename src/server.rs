use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

use crate::api;
use crate::api::routes::state::AppState;
use crate::api::routes::api_error;
use crate::config::ServerConfig;
use crate::db::Database;
use crate::error::SubtrackError;

pub struct WebServer {
    host: String,
    port: u16,
    static_dir: PathBuf,
    max_upload_bytes: usize,
}

impl WebServer {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            static_dir: PathBuf::from(&config.static_dir),
            max_upload_bytes: config.max_upload_bytes(),
        }
    }

    pub async fn start(&self, db: Database) -> Result<(), SubtrackError> {
        let state = AppState::new(db, self.static_dir.clone());
        let app = create_router(state, self.max_upload_bytes);

        let addr: SocketAddr = format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| SubtrackError::Error(format!("Invalid address: {}", e)))?;

        println!("🚀 subtrack server starting on http://{}", addr);
        println!("   Serving UI assets from {}", self.static_dir.display());

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| SubtrackError::Error(format!("Failed to bind to {}: {}", addr, e)))?;

        log::info!("Server ready to handle requests on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_signal().await;
                log::info!("Shutdown signal received, stopping server");
                println!("\n🛑 Shutdown signal received - stopping server gracefully...");
            })
            .await
            .map_err(|e| SubtrackError::Error(format!("Server error: {}", e)))?;

        log::info!("Server shutdown complete");
        println!("   Server stopped");

        Ok(())
    }
}

pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))

        // App info
        .route("/api/app-info", get(api::app::get_app_info))

        // Import
        .route("/api/upload", post(api::upload::upload_csv))

        // Transactions
        .route("/api/transactions", get(api::transactions::list_transactions))

        // Subscriptions
        .route("/api/subscriptions", get(api::subscriptions::list_subscriptions))
        .route(
            "/api/subscriptions/{id}/false-positive",
            post(api::subscriptions::mark_false_positive),
        )
        .route(
            "/api/subscriptions/{id}/inactive",
            post(api::subscriptions::mark_inactive),
        )

        // Everything else is the single-page UI
        .fallback(static_handler)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn health_check() -> (StatusCode, Html<&'static str>) {
    (
        StatusCode::OK,
        Html("<h1>subtrack Server</h1><p>✅ Server is running</p>"),
    )
}

/// Serves files from the UI directory. Unknown paths get `index.html` so the
/// client-side router can handle them; unknown `/api` paths get a JSON 404.
async fn static_handler(State(state): State<AppState>, uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    if path == "api" || path.starts_with("api/") {
        return api_error(StatusCode::NOT_FOUND, "Not found").into_response();
    }

    if !path.split('/').any(|segment| segment == "..") {
        let file_path = if path.is_empty() {
            state.static_dir.join("index.html")
        } else {
            state.static_dir.join(path)
        };

        if let Ok(content) = tokio::fs::read(&file_path).await {
            let mime = mime_guess::from_path(&file_path).first_or_octet_stream();
            return (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.as_ref().to_owned())],
                content,
            )
                .into_response();
        }
    }

    if let Ok(content) = tokio::fs::read(state.static_dir.join("index.html")).await {
        return Html(content).into_response();
    }

    (StatusCode::NOT_FOUND, "404 Not Found").into_response()
}

/// Waits for a shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received SIGINT (Ctrl+C)");
        },
        _ = terminate => {
            log::info!("Received SIGTERM");
        },
    }
}
