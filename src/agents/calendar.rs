//! Calendar Agent
//!
//! Timestamps from the classifier are passed through as UTC after suffixing
//! `Z`; no timezone validation is done beyond that.

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use super::{classify, AgentError, DomainAgent};
use crate::gemini::LanguageModel;
use crate::history::ConversationHistory;
use crate::intent::{require_action, require_id, Domain, IntentError, NEED_ID};
use crate::parser::ParsedReply;
use crate::services::{CalendarEvent, CalendarService, EventTime};

const LIST_LIMIT: u32 = 10;
const ID_FIELD: &str = "event_id";

/// Parsed calendar request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarIntent {
    Create {
        summary: String,
        start: Option<String>,
        end: Option<String>,
    },
    Update {
        event_id: String,
        summary: Option<String>,
        start: Option<String>,
        end: Option<String>,
    },
    Delete { event_id: String },
    List,
}

impl CalendarIntent {
    pub fn from_reply(reply: &ParsedReply) -> Result<Self, IntentError> {
        let domain = Domain::Calendar;
        let action = require_action(reply, domain)?;
        let field = |key: &str| reply.non_empty(key).map(str::to_string);

        let intent = match action.as_str() {
            "CREATE" => CalendarIntent::Create {
                summary: reply.non_empty("summary").unwrap_or("New Event").to_string(),
                start: field("start"),
                end: field("end"),
            },
            "UPDATE" => CalendarIntent::Update {
                event_id: require_id(reply, domain, ID_FIELD)?,
                summary: field("summary"),
                start: field("start"),
                end: field("end"),
            },
            "DELETE" => CalendarIntent::Delete {
                event_id: require_id(reply, domain, ID_FIELD)?,
            },
            "GET" | "LIST" => CalendarIntent::List,
            _ => return Err(IntentError::UnknownAction { domain, action }),
        };

        Ok(intent)
    }
}

/// Append the UTC marker unless already present
pub fn utc_suffixed(timestamp: &str) -> String {
    if timestamp.ends_with('Z') {
        timestamp.to_string()
    } else {
        format!("{}Z", timestamp)
    }
}

/// One-hour window starting at `now`
pub fn default_window(now: DateTime<Utc>) -> (String, String) {
    let end = now + Duration::hours(1);
    (
        now.to_rfc3339_opts(SecondsFormat::Secs, true),
        end.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}

/// Start and end for a new event; both must be given or the default window is used
fn event_window(start: Option<&str>, end: Option<&str>, now: DateTime<Utc>) -> (String, String) {
    match (start, end) {
        (Some(start), Some(end)) => (utc_suffixed(start), utc_suffixed(end)),
        _ => default_window(now),
    }
}

pub struct CalendarAgent {
    model: Arc<dyn LanguageModel>,
    calendar: Arc<dyn CalendarService>,
}

impl CalendarAgent {
    pub fn new(model: Arc<dyn LanguageModel>, calendar: Arc<dyn CalendarService>) -> Self {
        Self { model, calendar }
    }

    fn prompt(request: &str, history: &ConversationHistory, now: DateTime<Utc>) -> String {
        format!(
            r#"You are a Google Calendar Agent specialized in calendar management.
The current time (UTC) is: {now}

Recent Conversation:
{context}
Analyze this request: "{request}"

Determine the action and extract parameters:
- Actions: CREATE, DELETE, UPDATE, GET, LIST
- For CREATE: extract 'summary', 'start' (ISO format), 'end' (ISO format)
- For UPDATE: extract 'event_id', and optional 'summary', 'start', 'end'
- For DELETE: extract 'event_id'
- For UPDATE/DELETE: if the event ID is not in the request or the conversation, use {need_id}
- For LIST/GET: no parameters or time range

Respond in this exact format:
ACTION: <action>
summary: <event name>
start: <ISO datetime>
end: <ISO datetime>
event_id: <id>

For dates, use ISO format like: 2024-12-08T10:00:00
Only include relevant parameters."#,
            now = now.format("%Y-%m-%dT%H:%M:%S"),
            context = history.context_block(),
            request = request,
            need_id = NEED_ID,
        )
    }

    pub async fn execute(&self, intent: CalendarIntent) -> Result<String, AgentError> {
        match intent {
            CalendarIntent::Create { summary, start, end } => {
                self.create(&summary, start.as_deref(), end.as_deref()).await
            }
            CalendarIntent::Update {
                event_id,
                summary,
                start,
                end,
            } => self.update(&event_id, summary, start, end).await,
            CalendarIntent::Delete { event_id } => self.delete(&event_id).await,
            CalendarIntent::List => self.list().await,
        }
    }

    async fn create(
        &self,
        summary: &str,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<String, AgentError> {
        let (start, end) = event_window(start, end, Utc::now());
        let event = CalendarEvent {
            summary: Some(summary.to_string()),
            start: EventTime::utc(start),
            end: EventTime::utc(end),
            ..Default::default()
        };

        let created = self
            .calendar
            .insert_event(&event)
            .await
            .map_err(AgentError::service("creating event"))?;

        info!("Created event '{}' ({:?})", summary, created.id);
        Ok(format!(
            "[OK] Event '{}' created successfully!\n[LINK] Link: {}\n[ID] Event ID: {}",
            summary,
            created.html_link.as_deref().unwrap_or("No link"),
            created.id.as_deref().unwrap_or("Unknown"),
        ))
    }

    /// Fetch, overwrite the given fields, write back
    async fn update(
        &self,
        event_id: &str,
        summary: Option<String>,
        start: Option<String>,
        end: Option<String>,
    ) -> Result<String, AgentError> {
        let mut event = self
            .calendar
            .get_event(event_id)
            .await
            .map_err(AgentError::service("updating event"))?;

        if let Some(summary) = summary {
            event.summary = Some(summary);
        }
        if let Some(start) = start {
            event.start = EventTime::utc(utc_suffixed(&start));
        }
        if let Some(end) = end {
            event.end = EventTime::utc(utc_suffixed(&end));
        }

        let updated = self
            .calendar
            .update_event(event_id, &event)
            .await
            .map_err(AgentError::service("updating event"))?;

        Ok(format!(
            "[OK] Event updated successfully!\n[LINK] Link: {}",
            updated.html_link.as_deref().unwrap_or("No link")
        ))
    }

    async fn delete(&self, event_id: &str) -> Result<String, AgentError> {
        self.calendar
            .delete_event(event_id)
            .await
            .map_err(AgentError::service("deleting event"))?;

        Ok(format!("[OK] Event {} deleted successfully", event_id))
    }

    async fn list(&self) -> Result<String, AgentError> {
        let events = self
            .calendar
            .list_events(Utc::now(), LIST_LIMIT)
            .await
            .map_err(AgentError::service("getting events"))?;

        if events.is_empty() {
            return Ok("[EMPTY] No upcoming events found.".to_string());
        }

        let mut out = format!("[CALENDAR] Found {} upcoming event(s):\n\n", events.len());
        for event in &events {
            out.push_str(&format!(
                "[EVENT] {}\n   Time: {}\n   ID: {}\n   Link: {}\n\n",
                event.summary.as_deref().unwrap_or("(no title)"),
                event.start.display(),
                event.id.as_deref().unwrap_or("Unknown"),
                event.html_link.as_deref().unwrap_or("No link"),
            ));
        }
        Ok(out)
    }
}

#[async_trait]
impl DomainAgent for CalendarAgent {
    fn domain(&self) -> Domain {
        Domain::Calendar
    }

    async fn process(
        &self,
        request: &str,
        history: &ConversationHistory,
    ) -> Result<String, AgentError> {
        let prompt = Self::prompt(request, history, Utc::now());
        let reply = classify(self.model.as_ref(), Domain::Calendar, &prompt).await?;
        let intent = CalendarIntent::from_reply(&reply)?;

        debug!("Calendar intent: {:?}", intent);
        self.execute(intent).await
    }
}
