//! Intent Parsing
//!
//! Shared pieces of the per-domain intent parse step: the domain tag, the
//! structured parse failure and the `NEED_ID` sentinel handling.

use crate::parser::ParsedReply;
use crate::reply::ErrorKind;
use serde::Serialize;
use std::fmt;

/// Value the sub-classifier emits when history cannot resolve an identifier
pub const NEED_ID: &str = "NEED_ID";

/// Service domains handled by a dedicated agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Mail,
    Drive,
    Calendar,
}

impl Domain {
    /// Label emitted by the top-level classifier
    pub fn label(&self) -> &'static str {
        match self {
            Domain::Mail => "EMAIL",
            Domain::Drive => "DRIVE",
            Domain::Calendar => "CALENDAR",
        }
    }

    /// Noun used in user-facing messages
    pub fn noun(&self) -> &'static str {
        match self {
            Domain::Mail => "email",
            Domain::Drive => "drive",
            Domain::Calendar => "calendar",
        }
    }

    /// Example requests shown when an intent is not understood
    fn usage_hint(&self) -> &'static str {
        match self {
            Domain::Mail => "'send email', 'list emails', etc.",
            Domain::Drive => "'create file', 'search files', etc.",
            Domain::Calendar => "'create event', 'list events', etc.",
        }
    }

    /// How the user can surface identifiers for this domain
    fn listing_hint(&self) -> &'static str {
        match self {
            Domain::Mail => "Please provide the message ID or use 'list emails' first.",
            Domain::Drive => "Please provide the file ID or use 'list files' first.",
            Domain::Calendar => "Please provide the event ID or use 'list events' first.",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a classifier reply could not become a typed intent
///
/// `Display` is the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntentError {
    #[error("I couldn't understand that {} request. Try: {}", .domain.noun(), .domain.usage_hint())]
    MissingAction { domain: Domain },

    #[error("I couldn't understand that {} request. Try: {}", .domain.noun(), .domain.usage_hint())]
    UnknownAction { domain: Domain, action: String },

    #[error("{}", .domain.listing_hint())]
    AmbiguousReference { domain: Domain, field: &'static str },

    #[error("{}", missing_field_message(.domain, .field))]
    MissingField { domain: Domain, field: &'static str },
}

impl IntentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingAction { .. } | Self::UnknownAction { .. } => ErrorKind::UnrecognizedRequest,
            Self::AmbiguousReference { .. } => ErrorKind::AmbiguousReference,
            Self::MissingField { .. } => ErrorKind::MissingParameter,
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            Self::MissingAction { domain }
            | Self::UnknownAction { domain, .. }
            | Self::AmbiguousReference { domain, .. }
            | Self::MissingField { domain, .. } => *domain,
        }
    }
}

fn missing_field_message(domain: &Domain, field: &str) -> String {
    let message = format!("Missing '{}' in the {} request.", field, domain.noun());
    if field.ends_with("_id") {
        format!("{} {}", message, domain.listing_hint())
    } else {
        message
    }
}

/// Read the `ACTION` key, uppercased
pub fn require_action(reply: &ParsedReply, domain: Domain) -> Result<String, IntentError> {
    reply.action().ok_or(IntentError::MissingAction { domain })
}

/// Read an identifier field, rejecting the `NEED_ID` sentinel and empty values
pub fn require_id(
    reply: &ParsedReply,
    domain: Domain,
    field: &'static str,
) -> Result<String, IntentError> {
    let value = reply.get(field).unwrap_or_default();

    if value.contains(NEED_ID) {
        return Err(IntentError::AmbiguousReference { domain, field });
    }
    if value.is_empty() {
        return Err(IntentError::MissingField { domain, field });
    }

    Ok(value.to_string())
}

/// Read a comma-separated identifier list
pub fn require_ids(
    reply: &ParsedReply,
    domain: Domain,
    field: &'static str,
) -> Result<Vec<String>, IntentError> {
    let raw = require_id(reply, domain, field)?;

    let ids: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    if ids.is_empty() {
        return Err(IntentError::MissingField { domain, field });
    }

    Ok(ids)
}
