//! Google OAuth Credentials
//!
//! Loads the persisted token at startup, refreshes it when expired and falls
//! back to the installed-app authorization flow (loopback redirect + PKCE)
//! when no usable token exists.

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    response::Html,
    routing::get,
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::config::Config;

/// OAuth scopes requested for mail, storage and calendar access
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/calendar",
];

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens closer than this to expiry are treated as expired
const EXPIRY_MARGIN_SECS: i64 = 60;

/// How long the interactive flow waits for the browser redirect
const CONSENT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(300);

/// Credential errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Client secrets not usable ({path}): {reason}")]
    ClientSecrets { path: PathBuf, reason: String },

    #[error("Token endpoint rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Token request failed: {0}")]
    Request(String),

    #[error("Authorization flow failed: {0}")]
    Flow(String),
}

/// Bearer-token source for the service clients
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}

// ============ Persisted token ============

/// Token bundle persisted between runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl StoredToken {
    /// Usable without a refresh at `now`
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - ChronoDuration::seconds(EXPIRY_MARGIN_SECS) > now,
            None => !self.access_token.is_empty(),
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// JSON file holding one `StoredToken`
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the token; a missing or unreadable file yields `None`
    pub fn load(&self) -> Option<StoredToken> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(_) => return None,
        };

        match serde_json::from_str(&data) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("Ignoring unreadable token file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Persist the token, creating parent directories
    pub fn save(&self, token: &StoredToken) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let data = serde_json::to_string_pretty(token)?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;

        // mode() only applies on creation; tighten files left by older runs
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }

        file.write_all(data.as_bytes())?;

        debug!("Saved token to {}", self.path.display());
        Ok(())
    }
}

// ============ Client secrets ============

/// OAuth client registration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Read a downloaded client secrets file (`installed` or `web` section)
    pub fn from_json(data: &str) -> Result<Self, String> {
        let file: ClientSecretsFile = serde_json::from_str(data).map_err(|e| e.to_string())?;
        file.installed
            .or(file.web)
            .ok_or_else(|| "expected an \"installed\" or \"web\" section".to_string())
    }

    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let data = std::fs::read_to_string(path).map_err(|e| AuthError::ClientSecrets {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_json(&data).map_err(|reason| AuthError::ClientSecrets {
            path: path.to_path_buf(),
            reason,
        })
    }
}

// ============ Token endpoint ============

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    fn into_stored(self, previous_refresh: Option<String>, now: DateTime<Utc>) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: self.expires_in.map(|secs| now + ChronoDuration::seconds(secs)),
            scopes: self
                .scope
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_else(|| SCOPES.iter().map(|s| s.to_string()).collect()),
        }
    }
}

/// PKCE verifier/challenge pair
struct Pkce {
    verifier: String,
    challenge: String,
}

impl Pkce {
    fn generate() -> Self {
        let verifier: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(64)
            .map(char::from)
            .collect();
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self { verifier, challenge }
    }
}

/// Redirect parameters delivered to the loopback listener
#[derive(Debug, Clone, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

fn authorization_url(
    secrets: &ClientSecrets,
    redirect_uri: &str,
    challenge: &str,
    state: &str,
) -> Result<Url, AuthError> {
    let scope = SCOPES.join(" ");
    Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("code_challenge", challenge),
            ("code_challenge_method", "S256"),
            ("state", state),
        ],
    )
    .map_err(|e| AuthError::Flow(format!("invalid auth_uri: {}", e)))
}

impl CallbackParams {
    /// Carries an authorization outcome rather than being a stray hit
    fn is_redirect(&self) -> bool {
        self.code.is_some() || self.error.is_some()
    }
}

async fn oauth_callback(
    State(tx): State<mpsc::Sender<CallbackParams>>,
    Query(params): Query<CallbackParams>,
) -> Html<&'static str> {
    if !params.is_redirect() {
        debug!("Ignoring callback request without code or error");
        return Html("<html><body>Waiting for authorization...</body></html>");
    }
    let _ = tx.send(params).await;
    Html("<html><body><h3>Authentication complete.</h3>You can close this window.</body></html>")
}

/// Wait for the first real redirect, bounded by `timeout`
async fn await_redirect(
    rx: &mut mpsc::Receiver<CallbackParams>,
    timeout: std::time::Duration,
) -> Result<CallbackParams, AuthError> {
    match tokio::time::timeout(timeout, rx.recv()).await {
        Ok(Some(params)) => Ok(params),
        Ok(None) => Err(AuthError::Flow("callback listener closed".to_string())),
        Err(_) => Err(AuthError::Flow(format!(
            "no authorization redirect within {}s",
            timeout.as_secs()
        ))),
    }
}

// ============ Google credentials ============

/// Google OAuth credentials with lazy refresh
pub struct GoogleAuth {
    http: Client,
    store: TokenStore,
    secrets_path: PathBuf,
    token: Mutex<Option<StoredToken>>,
}

impl GoogleAuth {
    pub fn new(secrets_path: PathBuf, store: TokenStore) -> Self {
        Self {
            http: Client::new(),
            store,
            secrets_path,
            token: Mutex::new(None),
        }
    }

    /// Create from config
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.client_secrets_path.clone(),
            TokenStore::new(config.token_path.clone()),
        )
    }

    /// Make sure a usable token exists before the first request
    pub async fn ensure_ready(&self) -> Result<(), AuthError> {
        self.access_token().await.map(|_| ())
    }

    async fn refresh(
        &self,
        secrets: &ClientSecrets,
        current: &StoredToken,
    ) -> Result<StoredToken, AuthError> {
        let refresh_token = current.refresh_token.clone().unwrap_or_default();

        let response = self
            .http
            .post(&secrets.token_uri)
            .form(&[
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let token = Self::read_token_response(response).await?;
        Ok(token.into_stored(Some(refresh_token), Utc::now()))
    }

    async fn authorize_interactive(&self, secrets: &ClientSecrets) -> Result<StoredToken, AuthError> {
        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let redirect_uri = format!("http://127.0.0.1:{}/", listener.local_addr()?.port());

        let pkce = Pkce::generate();
        let state = uuid::Uuid::new_v4().to_string();
        let url = authorization_url(secrets, &redirect_uri, &pkce.challenge, &state)?;

        info!("Starting OAuth authentication, waiting for redirect on {}", redirect_uri);
        println!("Open this URL in your browser to authorize access:\n\n{}\n", url);

        let (tx, mut rx) = mpsc::channel::<CallbackParams>(1);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = Router::new().route("/", get(oauth_callback)).with_state(tx);

        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let params = await_redirect(&mut rx, CONSENT_TIMEOUT).await;
        let _ = shutdown_tx.send(());
        let _ = server.await;

        let params = params?;
        if let Some(error) = params.error {
            return Err(AuthError::Flow(format!("consent denied: {}", error)));
        }
        if params.state.as_deref() != Some(state.as_str()) {
            return Err(AuthError::Flow("state mismatch in redirect".to_string()));
        }
        let code = params
            .code
            .ok_or_else(|| AuthError::Flow("redirect carried no code".to_string()))?;

        let response = self
            .http
            .post(&secrets.token_uri)
            .form(&[
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
                ("code", code.as_str()),
                ("code_verifier", pkce.verifier.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let token = Self::read_token_response(response).await?;
        info!("Authentication successful");
        Ok(token.into_stored(None, Utc::now()))
    }

    async fn read_token_response(response: reqwest::Response) -> Result<TokenResponse, AuthError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl AccessTokenProvider for GoogleAuth {
    async fn access_token(&self) -> Result<String, AuthError> {
        let mut guard = self.token.lock().await;

        if guard.is_none() {
            *guard = self.store.load();
        }

        if let Some(token) = guard.as_ref() {
            if token.is_valid(Utc::now()) {
                return Ok(token.access_token.clone());
            }
        }

        let secrets = ClientSecrets::load(&self.secrets_path)?;

        let fresh = match guard.take() {
            Some(current) if current.can_refresh() => {
                info!("Refreshing expired credentials");
                match self.refresh(&secrets, &current).await {
                    Ok(token) => token,
                    Err(AuthError::Rejected { status, body }) => {
                        warn!("Refresh rejected ({}): {}, re-authorizing", status, body);
                        self.authorize_interactive(&secrets).await?
                    }
                    Err(e) => {
                        *guard = Some(current);
                        return Err(e);
                    }
                }
            }
            _ => self.authorize_interactive(&secrets).await?,
        };

        self.store.save(&fresh)?;
        let access_token = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(access_token)
    }
}
