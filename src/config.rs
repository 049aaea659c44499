//! Configuration management

use anyhow::{bail, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Default Gemini model used in the endpoint URL template
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-flash-latest";

/// Default Gemini REST base URL
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default persona name
pub const DEFAULT_ASSISTANT_NAME: &str = "Friday";

/// Default number of turns kept in the in-memory history
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Gemini API keys, rotated when one hits its quota
    pub gemini_api_keys: Vec<String>,

    /// Gemini model name
    pub gemini_model: String,

    /// Gemini REST base URL
    pub gemini_base_url: String,

    /// Wall-clock timeout for one generation call
    pub gemini_timeout: Duration,

    /// OAuth client secrets file (installed-app JSON)
    pub client_secrets_path: PathBuf,

    /// Persisted OAuth token
    pub token_path: PathBuf,

    /// Persona name used in prompts and the liveness message
    pub assistant_name: String,

    /// Maximum turns retained in the conversation history
    pub history_limit: usize,

    /// HTTP front door settings
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let gemini_api_keys = std::env::var("GEMINI_API_KEYS")
            .ok()
            .map(|v| split_keys(&v))
            .filter(|keys| !keys.is_empty())
            .or_else(|| {
                std::env::var("GEMINI_API_KEY")
                    .ok()
                    .map(|v| split_keys(&v))
                    .filter(|keys| !keys.is_empty())
            })
            .unwrap_or_default();

        if gemini_api_keys.is_empty() {
            bail!("GEMINI_API_KEY (or GEMINI_API_KEYS) not set");
        }

        let gemini_model = std::env::var("GEMINI_MODEL")
            .unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string());

        let gemini_base_url = std::env::var("GEMINI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_GEMINI_BASE_URL.to_string());

        let gemini_timeout = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        let client_secrets_path = std::env::var("GOOGLE_CLIENT_SECRETS")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("credentials.json"));

        let token_path = std::env::var("GOOGLE_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_token_path());

        let assistant_name = std::env::var("ASSISTANT_NAME")
            .unwrap_or_else(|_| DEFAULT_ASSISTANT_NAME.to_string());

        let history_limit = std::env::var("HISTORY_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|limit: &usize| *limit > 0)
            .unwrap_or(DEFAULT_HISTORY_LIMIT);

        Ok(Self {
            gemini_api_keys,
            gemini_model,
            gemini_base_url,
            gemini_timeout,
            client_secrets_path,
            token_path,
            assistant_name,
            history_limit,
            server: ServerConfig::from_env(),
        })
    }
}

/// HTTP front door configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: 0.0.0.0, the web frontend runs elsewhere)
    pub bind_addr: IpAddr,
    /// Port number (default: 8000)
    pub port: u16,
    /// Enable request logging
    pub log_requests: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            log_requests: true,
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("SERVER_BIND_ADDR") {
            if let Ok(parsed) = addr.parse() {
                config.bind_addr = parsed;
            }
        }

        if let Ok(port) = std::env::var("SERVER_PORT") {
            if let Ok(parsed) = port.parse() {
                config.port = parsed;
            }
        }

        if let Ok(val) = std::env::var("SERVER_LOG_REQUESTS") {
            config.log_requests = val == "true" || val == "1";
        }

        config
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

fn split_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_token_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("officebot")
        .join("token.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keys_trims_and_skips_empty() {
        let keys = split_keys(" k1, ,k2 ,");
        assert_eq!(keys, vec!["k1".to_string(), "k2".to_string()]);
    }

    #[test]
    fn test_server_socket_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.socket_addr().port(), 8000);
        assert!(config.socket_addr().ip().is_unspecified());
    }

    #[test]
    fn test_default_token_path_file_name() {
        let path = default_token_path();
        assert!(path.ends_with("officebot/token.json"));
    }
}
