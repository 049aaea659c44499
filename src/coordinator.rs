//! Request Coordinator
//!
//! Two-stage routing:
//! 1. The top-level classifier picks EMAIL, DRIVE, CALENDAR or CHAT
//! 2. The chosen domain agent runs its own sub-classifier, or the chat
//!    fallback answers free-form
//!
//! The coordinator owns one conversation's history and handles requests one
//! at a time through `&mut self`. No failure escapes `respond`: every error
//! becomes reply text plus an `ErrorKind`.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::agents::DomainAgent;
use crate::config::{DEFAULT_ASSISTANT_NAME, DEFAULT_HISTORY_LIMIT};
use crate::gemini::{GatewayError, LanguageModel};
use crate::history::{ConversationHistory, ConversationTurn};
use crate::intent::Domain;
use crate::reply::{Reply, Route};

/// The three domain agents, one per service
#[derive(Clone)]
pub struct Agents {
    pub mail: Arc<dyn DomainAgent>,
    pub drive: Arc<dyn DomainAgent>,
    pub calendar: Arc<dyn DomainAgent>,
}

impl Agents {
    pub fn get(&self, domain: Domain) -> &dyn DomainAgent {
        match domain {
            Domain::Mail => self.mail.as_ref(),
            Domain::Drive => self.drive.as_ref(),
            Domain::Calendar => self.calendar.as_ref(),
        }
    }
}

/// Top-level classification prompt
pub fn route_prompt(assistant_name: &str, context: &str, request: &str) -> String {
    format!(
        r#"You are a helpful AI assistant named {name}.
You coordinate specialized agents for Gmail, Google Drive, and Google Calendar, but you can also chat normally.

Recent Conversation:
{context}
Analyze this request: "{request}"

Determine the best way to handle it:
- EMAIL: If the user wants to send, read, or manage emails.
- DRIVE: If the user wants to create, search, or manage files.
- CALENDAR: If the user wants to schedule or check events.
- CHAT: If the user is asking a general question, saying hello, or asking about your capabilities.

Respond with ONLY ONE WORD: EMAIL, DRIVE, CALENDAR, or CHAT"#,
        name = assistant_name,
        context = context,
        request = request,
    )
}

/// Free-form fallback prompt
pub fn chat_prompt(assistant_name: &str, context: &str, request: &str) -> String {
    format!(
        r#"You are {name}, a helpful AI assistant.

Recent Conversation:
{context}
The user said: "{request}"

Respond naturally and helpfully. If they asked how to do something, explain it to them.
Do not try to execute commands, just chat."#,
        name = assistant_name,
        context = context,
        request = request,
    )
}

pub struct Coordinator {
    model: Arc<dyn LanguageModel>,
    agents: Agents,
    history: ConversationHistory,
    assistant_name: String,
}

impl Coordinator {
    pub fn new(model: Arc<dyn LanguageModel>, agents: Agents) -> Self {
        Self {
            model,
            agents,
            history: ConversationHistory::with_capacity(DEFAULT_HISTORY_LIMIT),
            assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
        }
    }

    /// Replace the history buffer with an empty one of the given capacity
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history = ConversationHistory::with_capacity(limit);
        self
    }

    pub fn with_assistant_name(mut self, name: &str) -> Self {
        self.assistant_name = name.to_string();
        self
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn assistant_name(&self) -> &str {
        &self.assistant_name
    }

    /// Handle one request, returning only the text
    pub async fn handle(&mut self, request: &str) -> String {
        self.respond(request).await.text
    }

    /// Handle one request.
    ///
    /// Agent failures are rendered inline and recorded in history like any
    /// other answer. Classifier and chat failures are not recorded.
    pub async fn respond(&mut self, request: &str) -> Reply {
        debug!("Routing request: {}", request);
        let context = self.history.context_block();

        let prompt = route_prompt(&self.assistant_name, &context, request);
        let route = match self.model.generate(&prompt).await {
            Ok(label) => Route::from_classifier_reply(&label),
            Err(e) => return Self::failure(None, e),
        };
        info!("Routing to: {} agent", route.label());

        let (text, kind) = match route {
            Route::Agent(domain) => {
                match self.agents.get(domain).process(request, &self.history).await {
                    Ok(text) => (text, None),
                    Err(e) => {
                        warn!("{} agent failed: {:?}", domain, e);
                        (e.to_string(), Some(e.kind()))
                    }
                }
            }
            Route::Chat => {
                let prompt = chat_prompt(&self.assistant_name, &context, request);
                match self.model.generate(&prompt).await {
                    Ok(text) => (text, None),
                    Err(e) => return Self::failure(Some(route), e),
                }
            }
        };

        self.history.push(ConversationTurn::new(request, text.clone()));

        Reply {
            route: Some(route),
            text,
            error: kind,
        }
    }

    fn failure(route: Option<Route>, err: GatewayError) -> Reply {
        error!("Request failed: {}", err);
        Reply {
            route,
            text: format!("[ERROR] Error processing request: {}", err),
            error: Some(err.kind()),
        }
    }
}
