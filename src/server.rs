//! HTTP Front Door
//!
//! Axum server exposing the coordinator to a web frontend:
//! - `GET /`          liveness
//! - `POST /chat`     one request through the coordinator
//! - `GET /dashboard` recent files and upcoming events, straight from the
//!   services without the language model
//!
//! Requests are serialized through the coordinator mutex, so the history
//! sees one turn at a time.

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::coordinator::Coordinator;
use crate::reply::{ErrorKind, Route};
use crate::services::{CalendarEvent, CalendarService, DriveFile, DriveService, FileQuery};

const DASHBOARD_ITEMS: u32 = 5;

/// Application state shared across handlers
pub struct AppState {
    coordinator: Mutex<Coordinator>,
    drive: Arc<dyn DriveService>,
    calendar: Arc<dyn CalendarService>,
    assistant_name: String,
}

impl AppState {
    pub fn new(
        coordinator: Coordinator,
        drive: Arc<dyn DriveService>,
        calendar: Arc<dyn CalendarService>,
    ) -> Self {
        let assistant_name = coordinator.assistant_name().to_string();
        Self {
            coordinator: Mutex::new(coordinator),
            drive,
            calendar,
            assistant_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Rich card the frontend can render for a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    CalendarEvent,
    DriveFile,
    EmailList,
}

impl CardType {
    /// Guess the card from the reply's markers
    pub fn infer(text: &str) -> Option<Self> {
        if text.contains("[EVENT]") || (text.contains("created successfully") && text.contains("Event")) {
            Some(CardType::CalendarEvent)
        } else if text.contains("[FILE]") || (text.contains("File") && text.contains("created")) {
            Some(CardType::DriveFile)
        } else if text.contains("[EMAIL]") {
            Some(CardType::EmailList)
        } else {
            None
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub card_type: Option<CardType>,
    pub card_data: serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<Route>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub recent_files: Vec<DriveFile>,
    pub upcoming_events: Vec<CalendarEvent>,
}

/// Build the router with all routes and middleware
pub fn router(state: Arc<AppState>, log_requests: bool) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/", get(root))
        .route("/chat", post(chat))
        .route("/dashboard", get(dashboard))
        .layer(cors)
        .with_state(state);

    if log_requests {
        router = router.layer(TraceLayer::new_for_http());
    }

    router
}

async fn root(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "online",
        message: format!("{} API is running", state.assistant_name),
    })
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let reply = state.coordinator.lock().await.respond(&request.message).await;
    let card_type = CardType::infer(&reply.text);
    debug!("Chat reply card: {:?}", card_type);

    Json(ChatResponse {
        card_type,
        card_data: serde_json::Map::new(),
        route: reply.route,
        error: reply.error,
        response: reply.text,
    })
}

async fn dashboard(State(state): State<Arc<AppState>>) -> Json<DashboardResponse> {
    let query = FileQuery {
        page_size: DASHBOARD_ITEMS,
        name_contains: None,
        newest_first: true,
    };

    let (files, events) = tokio::join!(
        state.drive.list_files(&query),
        state.calendar.list_events(Utc::now(), DASHBOARD_ITEMS),
    );

    let recent_files = files.unwrap_or_else(|e| {
        warn!("Fetching dashboard files failed: {}", e);
        Vec::new()
    });
    let upcoming_events = events.unwrap_or_else(|e| {
        warn!("Fetching dashboard events failed: {}", e);
        Vec::new()
    });

    Json(DashboardResponse {
        recent_files,
        upcoming_events,
    })
}

/// Bind and serve until Ctrl+C / SIGTERM
pub async fn serve(state: Arc<AppState>, config: &ServerConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr();
    let app = router(state, config.log_requests);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
