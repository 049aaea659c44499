//! Typed Replies
//!
//! What the coordinator hands back for one request: the text shown to the
//! user plus the route taken and, on failure, a machine-readable error kind.

use serde::Serialize;

use crate::intent::Domain;

/// Failure classes a caller can branch on without parsing reply text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Language model unreachable after retries
    Network,
    /// Language model quota exhausted after retries
    RateLimitExceeded,
    /// Language model answered with a non-2xx status
    Api,
    /// Language model reply had an unexpected shape
    MalformedResponse,
    /// No language model credentials configured
    NotConfigured,
    /// Mail, storage or calendar call failed
    ExternalService,
    /// The request referred to an item the history could not resolve
    AmbiguousReference,
    /// A required parameter was not extracted
    MissingParameter,
    /// The sub-classifier produced no usable action
    UnrecognizedRequest,
}

/// Where a request was dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Agent(Domain),
    Chat,
}

impl Route {
    /// Pick a route from the top-level classifier reply.
    ///
    /// Matching is by substring after uppercasing, checked in the order
    /// EMAIL, DRIVE, CALENDAR; anything else is chat. "EMAILS" and
    /// "email-agent" both route to mail.
    pub fn from_classifier_reply(reply: &str) -> Self {
        let label = reply.trim().to_uppercase();

        [Domain::Mail, Domain::Drive, Domain::Calendar]
            .into_iter()
            .find(|domain| label.contains(domain.label()))
            .map(Route::Agent)
            .unwrap_or(Route::Chat)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Route::Agent(domain) => domain.label(),
            Route::Chat => "CHAT",
        }
    }
}

/// Outcome of one coordinator request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// `None` when routing itself failed
    pub route: Option<Route>,
    pub text: String,
    pub error: Option<ErrorKind>,
}

impl Reply {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
