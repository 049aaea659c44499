//! OfficeBot
//!
//! Conversational router for Gmail, Google Drive and Google Calendar backed
//! by Gemini.
//!
//! # Features
//!
//! - **Two-stage routing**: a top-level classifier picks the service, a
//!   per-service sub-classifier extracts a typed intent
//! - **Reference resolution**: the last three turns go into every prompt so
//!   "delete that one" can be resolved
//! - **Typed failures**: every reply carries an optional `ErrorKind`
//! - **Front doors**: interactive console loop and an HTTP API
//!
//! # Architecture
//!
//! ```text
//! CLI / HTTP ──► Coordinator ──► Gemini (route) ──┬── MailAgent     ──► Gmail
//!                    │                            ├── DriveAgent    ──► Drive
//!                 history                         ├── CalendarAgent ──► Calendar
//!                                                 └── chat fallback ──► Gemini
//! ```

pub mod agents;
pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod gemini;
pub mod history;
pub mod intent;
pub mod parser;
pub mod reply;
pub mod server;
pub mod services;

pub use agents::{
    AgentError, CalendarAgent, CalendarIntent, DomainAgent, DriveAgent, DriveIntent, MailAgent,
    MailIntent,
};
pub use app::App;
pub use auth::{AccessTokenProvider, AuthError, GoogleAuth, TokenStore};
pub use config::{Config, ServerConfig};
pub use coordinator::{Agents, Coordinator};
pub use gemini::{GatewayError, GeminiClient, LanguageModel, RetryPolicy};
pub use history::{ConversationHistory, ConversationTurn};
pub use intent::{Domain, IntentError, NEED_ID};
pub use parser::ParsedReply;
pub use reply::{ErrorKind, Reply, Route};
pub use services::{CalendarService, DriveService, MailService, ServiceError};
