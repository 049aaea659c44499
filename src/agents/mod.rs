//! Domain Agents
//!
//! One agent per workspace service. Each agent asks the model to extract a
//! structured intent from the request, parses it into a typed enum and runs
//! the matching service call(s).
//!
//! ```text
//! request ──► sub-classifier prompt ──► ParsedReply ──► *Intent ──► handler ──► service
//! ```

pub mod calendar;
pub mod drive;
pub mod mail;

use async_trait::async_trait;
use tracing::debug;

use crate::gemini::{GatewayError, LanguageModel};
use crate::history::ConversationHistory;
use crate::intent::{Domain, IntentError};
use crate::parser::ParsedReply;
use crate::reply::ErrorKind;
use crate::services::ServiceError;

pub use calendar::{CalendarAgent, CalendarIntent};
pub use drive::{DriveAgent, DriveIntent};
pub use mail::{MailAgent, MailIntent};

/// Width of the separator line between listed items
const SEPARATOR_WIDTH: usize = 50;

pub(crate) fn separator() -> String {
    "-".repeat(SEPARATOR_WIDTH)
}

/// Agent failure. `Display` is the line shown to the user.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AgentError {
    #[error("[ERROR] Error processing {} request: {}", .domain.noun(), .source)]
    Gateway {
        domain: Domain,
        #[source]
        source: GatewayError,
    },

    #[error("{0}")]
    Intent(#[from] IntentError),

    #[error("[ERROR] Error {operation}: {source}")]
    Service {
        operation: &'static str,
        #[source]
        source: ServiceError,
    },

    /// Every item of a multi-ID request failed
    #[error("{report}")]
    Batch { report: String, failures: usize },
}

impl AgentError {
    pub(crate) fn service(operation: &'static str) -> impl FnOnce(ServiceError) -> Self {
        move |source| AgentError::Service { operation, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::Gateway { source, .. } => source.kind(),
            AgentError::Intent(e) => e.kind(),
            AgentError::Service { .. } | AgentError::Batch { .. } => ErrorKind::ExternalService,
        }
    }
}

/// A service-specific agent the coordinator can delegate to
#[async_trait]
pub trait DomainAgent: Send + Sync {
    fn domain(&self) -> Domain;

    async fn process(
        &self,
        request: &str,
        history: &ConversationHistory,
    ) -> Result<String, AgentError>;
}

/// Run the sub-classifier and parse its `key: value` reply
pub(crate) async fn classify(
    model: &dyn LanguageModel,
    domain: Domain,
    prompt: &str,
) -> Result<ParsedReply, AgentError> {
    let text = model
        .generate(prompt)
        .await
        .map_err(|source| AgentError::Gateway { domain, source })?;

    let parsed = ParsedReply::parse(&text);
    debug!("{} sub-classifier: {} field(s), action={:?}", domain, parsed.len(), parsed.action());
    Ok(parsed)
}

/// Per-ID result lines for bulk actions; one failure never stops the rest
#[derive(Debug, Default)]
pub(crate) struct BatchReport {
    lines: Vec<String>,
    failures: usize,
}

impl BatchReport {
    pub(crate) fn ok(&mut self, line: String) {
        self.lines.push(line);
    }

    pub(crate) fn fail(&mut self, line: String) {
        self.failures += 1;
        self.lines.push(line);
    }

    /// Joined report; an error only when every item failed
    pub(crate) fn finish(self) -> Result<String, AgentError> {
        let report = self.lines.join("\n");
        if self.failures > 0 && self.failures == self.lines.len() {
            return Err(AgentError::Batch {
                report,
                failures: self.failures,
            });
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_partial_failure_is_ok() {
        let mut report = BatchReport::default();
        report.fail("[ERROR] a".to_string());
        report.ok("[OK] b".to_string());
        assert_eq!(report.finish().unwrap(), "[ERROR] a\n[OK] b");
    }

    #[test]
    fn test_batch_total_failure_is_error() {
        let mut report = BatchReport::default();
        report.fail("[ERROR] a".to_string());
        let err = report.finish().unwrap_err();
        assert_eq!(err.to_string(), "[ERROR] a");
        assert_eq!(err.kind(), ErrorKind::ExternalService);
    }

    #[test]
    fn test_gateway_error_rendering() {
        let err = AgentError::Gateway {
            domain: Domain::Drive,
            source: GatewayError::Network("timed out".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "[ERROR] Error processing drive request: Network error: timed out"
        );
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[test]
    fn test_service_error_rendering() {
        let err = AgentError::service("deleting file")(ServiceError::Http {
            status: 404,
            body: "File not found".to_string(),
        });
        assert_eq!(err.to_string(), "[ERROR] Error deleting file: HTTP 404: File not found");
    }

    #[test]
    fn test_separator_width() {
        assert_eq!(separator().len(), 50);
    }
}
