//! Workspace Service Interfaces
//!
//! Capability traits for the three external services plus the REST clients
//! that implement them against the Google APIs.
//!
//! ```text
//! MailService      list / get / send / delete / modify   (gmail.rs)
//! DriveService     list / create / delete / share / get  (drive.rs)
//! CalendarService  list / insert / update / delete / get (calendar.rs)
//! ```

pub mod calendar;
pub mod drive;
pub mod gmail;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{AccessTokenProvider, AuthError};

pub use calendar::GoogleCalendar;
pub use drive::GoogleDrive;
pub use gmail::GmailClient;

/// Failure of one external service call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Peer reset or aborted the connection; safe to retry idempotent sends
    #[error("connection dropped: {0}")]
    ConnectionDropped(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("authorization failed: {0}")]
    Auth(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        ServiceError::Auth(err.to_string())
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        classify_transport_error(err)
    }
}

/// Windows socket codes for an aborted / reset connection
const WSAECONNABORTED: i32 = 10053;
const WSAECONNRESET: i32 = 10054;

/// Map a reqwest failure, singling out dropped connections
fn classify_transport_error(err: reqwest::Error) -> ServiceError {
    if err.is_decode() {
        return ServiceError::Decode(err.to_string());
    }

    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if is_connection_drop(io) {
                return ServiceError::ConnectionDropped(err.without_url().to_string());
            }
        }
        source = cause.source();
    }

    ServiceError::Request(err.without_url().to_string())
}

pub(crate) fn is_connection_drop(err: &std::io::Error) -> bool {
    use std::io::ErrorKind;

    matches!(err.kind(), ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted)
        || matches!(err.raw_os_error(), Some(WSAECONNABORTED) | Some(WSAECONNRESET))
}

pub type ServiceResult<T> = Result<T, ServiceError>;

// ============ Mail ============

/// Message header set and optional decoded body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    pub id: String,
    pub thread_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub date: Option<String>,
    /// Decoded text/plain body (full format only)
    pub body: Option<String>,
}

/// How much of a message to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    /// From / Subject / Date headers only
    Metadata,
    /// All headers and the text body
    Full,
}

/// Outgoing plain-text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Thread to attach to when replying
    pub thread_id: Option<String>,
}

/// Label change applied by `modify_labels`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelChange {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl LabelChange {
    pub fn mark_read() -> Self {
        Self {
            add: Vec::new(),
            remove: vec!["UNREAD".to_string()],
        }
    }

    pub fn mark_unread() -> Self {
        Self {
            add: vec!["UNREAD".to_string()],
            remove: Vec::new(),
        }
    }
}

#[async_trait]
pub trait MailService: Send + Sync {
    /// IDs of the most recent messages
    async fn list_messages(&self, max_results: u32) -> ServiceResult<Vec<String>>;
    async fn get_message(&self, id: &str, format: MessageFormat) -> ServiceResult<MailMessage>;
    /// Send a message, returning the new message ID
    async fn send_message(&self, mail: &OutgoingMail) -> ServiceResult<String>;
    async fn delete_message(&self, id: &str) -> ServiceResult<()>;
    async fn modify_labels(&self, id: &str, change: &LabelChange) -> ServiceResult<()>;
}

// ============ Drive ============

/// File record as returned by the storage service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_link: Option<String>,
}

/// Listing parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileQuery {
    pub page_size: u32,
    /// Substring the file name must contain
    pub name_contains: Option<String>,
    /// Newest files first
    pub newest_first: bool,
}

#[async_trait]
pub trait DriveService: Send + Sync {
    async fn list_files(&self, query: &FileQuery) -> ServiceResult<Vec<DriveFile>>;
    /// Create a text/plain file
    async fn create_file(&self, name: &str, content: &str) -> ServiceResult<DriveFile>;
    async fn delete_file(&self, id: &str) -> ServiceResult<()>;
    /// Grant anyone-with-link read access
    async fn share_file(&self, id: &str) -> ServiceResult<()>;
    async fn get_file(&self, id: &str) -> ServiceResult<DriveFile>;
}

// ============ Calendar ============

/// Start or end of an event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    /// All-day events carry a date instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventTime {
    pub fn utc(date_time: impl Into<String>) -> Self {
        Self {
            date_time: Some(date_time.into()),
            date: None,
            time_zone: Some("UTC".to_string()),
        }
    }

    /// Timed start, or the all-day date
    pub fn display(&self) -> &str {
        self.date_time
            .as_deref()
            .or(self.date.as_deref())
            .unwrap_or("Unknown")
    }
}

/// Calendar event; fields this crate does not model are carried in `extra`
/// so a fetch-modify-update cycle does not drop them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub start: EventTime,
    #[serde(default)]
    pub end: EventTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[async_trait]
pub trait CalendarService: Send + Sync {
    /// Upcoming single events ordered by start time
    async fn list_events(&self, time_min: DateTime<Utc>, max_results: u32)
        -> ServiceResult<Vec<CalendarEvent>>;
    async fn insert_event(&self, event: &CalendarEvent) -> ServiceResult<CalendarEvent>;
    async fn get_event(&self, id: &str) -> ServiceResult<CalendarEvent>;
    async fn update_event(&self, id: &str, event: &CalendarEvent) -> ServiceResult<CalendarEvent>;
    async fn delete_event(&self, id: &str) -> ServiceResult<()>;
}

// ============ Shared REST plumbing ============

/// Append path segments to `base`, percent-encoding each one
///
/// `/`, `?` and `#` inside a segment are escaped, so an identifier always
/// addresses a single resource. Empty and dot segments are rejected.
pub(crate) fn resource_url(base: &str, segments: &[&str]) -> ServiceResult<String> {
    let mut url = reqwest::Url::parse(base).map_err(|e| ServiceError::Request(e.to_string()))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| ServiceError::Request(format!("not a base URL: {}", base)))?;
        for segment in segments {
            if matches!(*segment, "" | "." | "..") {
                return Err(ServiceError::Request(format!(
                    "invalid resource id '{}'",
                    segment
                )));
            }
            path.push(segment);
        }
    }
    Ok(url.to_string())
}

/// Authenticated JSON client shared by the Google service clients
#[derive(Clone)]
pub struct GoogleApi {
    http: reqwest::Client,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl GoogleApi {
    pub fn new(tokens: Arc<dyn AccessTokenProvider>) -> Self {
        Self {
            http: reqwest::Client::new(),
            tokens,
        }
    }

    /// Start a request carrying the current bearer token
    pub(crate) async fn request(
        &self,
        method: reqwest::Method,
        url: &str,
    ) -> ServiceResult<reqwest::RequestBuilder> {
        let token = self.tokens.access_token().await?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    /// Send and decode a JSON body
    pub(crate) async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> ServiceResult<T> {
        let response = Self::check(request.send().await?).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ServiceError::Decode(e.to_string()))
    }

    /// Send and discard the body
    pub(crate) async fn send_empty(&self, request: reqwest::RequestBuilder) -> ServiceResult<()> {
        Self::check(request.send().await?).await?;
        Ok(())
    }

    async fn check(response: reqwest::Response) -> ServiceResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ServiceError::Http {
            status: status.as_u16(),
            body,
        })
    }
}
