//! Mail Agent
//!
//! Send, list, read, delete, mark and reply. Identifier actions take a
//! comma-separated list and report one line per message.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{classify, separator, AgentError, BatchReport, DomainAgent};
use crate::gemini::LanguageModel;
use crate::history::ConversationHistory;
use crate::intent::{require_action, require_ids, Domain, IntentError, NEED_ID};
use crate::parser::ParsedReply;
use crate::services::{
    LabelChange, MailMessage, MailService, MessageFormat, OutgoingMail, ServiceError,
};

const LIST_LIMIT: u32 = 10;
const BODY_PREVIEW_CHARS: usize = 500;
const ID_FIELD: &str = "message_id";

/// Parsed mail request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailIntent {
    Send {
        to: String,
        subject: String,
        body: String,
    },
    List,
    Read { ids: Vec<String> },
    Delete { ids: Vec<String> },
    MarkRead { ids: Vec<String> },
    MarkUnread { ids: Vec<String> },
    Reply { ids: Vec<String>, body: String },
}

impl MailIntent {
    pub fn from_reply(reply: &ParsedReply) -> Result<Self, IntentError> {
        let domain = Domain::Mail;
        let action = require_action(reply, domain)?;

        let intent = match action.as_str() {
            "SEND" => MailIntent::Send {
                to: reply
                    .non_empty("to")
                    .ok_or(IntentError::MissingField { domain, field: "to" })?
                    .to_string(),
                subject: reply.get_or("subject", "No Subject"),
                body: reply.get_or("message", ""),
            },
            "LIST" => MailIntent::List,
            "READ" => MailIntent::Read {
                ids: require_ids(reply, domain, ID_FIELD)?,
            },
            "DELETE" => MailIntent::Delete {
                ids: require_ids(reply, domain, ID_FIELD)?,
            },
            "MARK_READ" => MailIntent::MarkRead {
                ids: require_ids(reply, domain, ID_FIELD)?,
            },
            "MARK_UNREAD" => MailIntent::MarkUnread {
                ids: require_ids(reply, domain, ID_FIELD)?,
            },
            "REPLY" => MailIntent::Reply {
                ids: require_ids(reply, domain, ID_FIELD)?,
                body: reply.get_or("message", ""),
            },
            _ => return Err(IntentError::UnknownAction { domain, action }),
        };

        Ok(intent)
    }
}

/// Retry schedule for sends interrupted by a dropped connection
#[derive(Debug, Clone)]
pub struct SendRetry {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for SendRetry {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

pub struct MailAgent {
    model: Arc<dyn LanguageModel>,
    mail: Arc<dyn MailService>,
    send_retry: SendRetry,
}

impl MailAgent {
    pub fn new(model: Arc<dyn LanguageModel>, mail: Arc<dyn MailService>) -> Self {
        Self {
            model,
            mail,
            send_retry: SendRetry::default(),
        }
    }

    pub fn with_send_retry(mut self, send_retry: SendRetry) -> Self {
        self.send_retry = send_retry;
        self
    }

    fn prompt(request: &str, history: &ConversationHistory) -> String {
        format!(
            r#"You are an Email Agent specialized in Gmail operations.

Recent Conversation (use it to resolve references like "those emails" or "the last one"):
{context}
Analyze this request: "{request}"

Determine the action and extract parameters:
- Actions: SEND, READ, DELETE, MARK_READ, MARK_UNREAD, REPLY, LIST
- For SEND: extract 'to' (email), 'subject', 'message'
- For READ/DELETE/MARK_READ/MARK_UNREAD: extract 'message_id'. If multiple, separate with commas. If referring to previously listed emails, take their IDs from the conversation.
- For REPLY: extract 'message_id' and 'message'
- For LIST: no parameters needed
If an ID is required but the conversation does not contain it, use {need_id} as the message_id.

Respond in this exact format:
ACTION: <action>
to: <email>
subject: <subject>
message: <message>
message_id: <id or comma-separated ids>

Only include relevant parameters."#,
            context = history.context_block(),
            request = request,
            need_id = NEED_ID,
        )
    }

    pub async fn execute(&self, intent: MailIntent) -> Result<String, AgentError> {
        match intent {
            MailIntent::Send { to, subject, body } => {
                self.send(OutgoingMail {
                    to,
                    subject,
                    body,
                    thread_id: None,
                })
                .await
            }
            MailIntent::List => self.list().await,
            MailIntent::Read { ids } => self.read(&ids).await,
            MailIntent::Delete { ids } => self.delete(&ids).await,
            MailIntent::MarkRead { ids } => self.relabel(&ids, LabelChange::mark_read(), "read").await,
            MailIntent::MarkUnread { ids } => {
                self.relabel(&ids, LabelChange::mark_unread(), "unread").await
            }
            MailIntent::Reply { ids, body } => self.reply(&ids, &body).await,
        }
    }

    async fn send(&self, mail: OutgoingMail) -> Result<String, AgentError> {
        let mut attempt = 1;

        loop {
            match self.mail.send_message(&mail).await {
                Ok(id) => {
                    info!("Sent message {} to {}", id, mail.to);
                    return Ok(format!(
                        "[OK] Email sent successfully to {}\nSubject: {}",
                        mail.to, mail.subject
                    ));
                }
                Err(ServiceError::ConnectionDropped(reason))
                    if attempt < self.send_retry.max_attempts =>
                {
                    warn!(
                        "Connection dropped sending email (attempt {}/{}): {}",
                        attempt, self.send_retry.max_attempts, reason
                    );
                    tokio::time::sleep(self.send_retry.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(AgentError::service("sending email")(e)),
            }
        }
    }

    async fn list(&self) -> Result<String, AgentError> {
        let fetch = async {
            let ids = self.mail.list_messages(LIST_LIMIT).await?;
            let mut messages = Vec::with_capacity(ids.len());
            for id in &ids {
                messages.push(self.mail.get_message(id, MessageFormat::Metadata).await?);
            }
            Ok::<_, ServiceError>(messages)
        };
        let messages = fetch.await.map_err(AgentError::service("listing emails"))?;

        if messages.is_empty() {
            return Ok("[EMPTY] No emails found.".to_string());
        }

        let mut out = format!("[EMAIL] Found {} recent emails:\n\n", messages.len());
        for message in &messages {
            out.push_str(&format!(
                "ID: {}\nFrom: {}\nSubject: {}\nDate: {}\n{}\n",
                message.id,
                message.from.as_deref().unwrap_or("Unknown"),
                message.subject.as_deref().unwrap_or("No Subject"),
                message.date.as_deref().unwrap_or("Unknown"),
                separator(),
            ));
        }
        Ok(out)
    }

    async fn read(&self, ids: &[String]) -> Result<String, AgentError> {
        let mut report = BatchReport::default();

        for id in ids {
            match self.mail.get_message(id, MessageFormat::Full).await {
                Ok(message) => report.ok(render_details(&message)),
                Err(e) => report.fail(format!("[ERROR] Error getting email {}: {}", id, e)),
            }
        }

        report.finish()
    }

    async fn delete(&self, ids: &[String]) -> Result<String, AgentError> {
        let mut report = BatchReport::default();

        for id in ids {
            match self.mail.delete_message(id).await {
                Ok(()) => report.ok(format!("[OK] Email {} deleted", id)),
                Err(e) => report.fail(format!("[ERROR] Failed to delete {}: {}", id, e)),
            }
        }

        report.finish()
    }

    async fn relabel(
        &self,
        ids: &[String],
        change: LabelChange,
        state: &str,
    ) -> Result<String, AgentError> {
        let mut report = BatchReport::default();

        for id in ids {
            match self.mail.modify_labels(id, &change).await {
                Ok(()) => report.ok(format!("[OK] Email {} marked as {}", id, state)),
                Err(e) => report.fail(format!("[ERROR] Failed to mark {}: {}", id, e)),
            }
        }

        report.finish()
    }

    async fn reply(&self, ids: &[String], body: &str) -> Result<String, AgentError> {
        let mut report = BatchReport::default();

        for id in ids {
            match self.reply_one(id, body).await {
                Ok(recipient) => {
                    report.ok(format!("[OK] Reply sent successfully to {}", recipient))
                }
                Err(e) => report.fail(format!("[ERROR] Error replying to {}: {}", id, e)),
            }
        }

        report.finish()
    }

    async fn reply_one(&self, id: &str, body: &str) -> Result<String, ServiceError> {
        let original = self.mail.get_message(id, MessageFormat::Metadata).await?;
        let to = original.from.clone().unwrap_or_default();

        let mail = OutgoingMail {
            to: to.clone(),
            subject: format!("Re: {}", original.subject.as_deref().unwrap_or_default()),
            body: body.to_string(),
            thread_id: original.thread_id,
        };
        self.mail.send_message(&mail).await?;

        Ok(if to.is_empty() { "recipient".to_string() } else { to })
    }
}

/// Header block plus the first part of the body
fn render_details(message: &MailMessage) -> String {
    let body = message.body.as_deref().unwrap_or_default();
    let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();

    format!(
        "[EMAIL] Email Details:\n\nFrom: {}\nTo: {}\nSubject: {}\nDate: {}\n\nBody:\n{}...",
        message.from.as_deref().unwrap_or("Unknown"),
        message.to.as_deref().unwrap_or("Unknown"),
        message.subject.as_deref().unwrap_or("No Subject"),
        message.date.as_deref().unwrap_or("Unknown"),
        preview,
    )
}

#[async_trait]
impl DomainAgent for MailAgent {
    fn domain(&self) -> Domain {
        Domain::Mail
    }

    async fn process(
        &self,
        request: &str,
        history: &ConversationHistory,
    ) -> Result<String, AgentError> {
        let prompt = Self::prompt(request, history);
        let reply = classify(self.model.as_ref(), Domain::Mail, &prompt).await?;
        let intent = MailIntent::from_reply(&reply)?;

        debug!("Mail intent: {:?}", intent);
        self.execute(intent).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(text: &str) -> Result<MailIntent, IntentError> {
        MailIntent::from_reply(&ParsedReply::parse(text))
    }

    #[test]
    fn test_send_defaults() {
        let parsed = intent("ACTION: send\nto: bob@example.com").unwrap();
        assert_eq!(
            parsed,
            MailIntent::Send {
                to: "bob@example.com".to_string(),
                subject: "No Subject".to_string(),
                body: String::new(),
            }
        );
    }

    #[test]
    fn test_send_without_recipient() {
        let err = intent("ACTION: SEND\nsubject: hi").unwrap_err();
        assert_eq!(err, IntentError::MissingField { domain: Domain::Mail, field: "to" });
    }

    #[test]
    fn test_bulk_ids() {
        let parsed = intent("ACTION: MARK_UNREAD\nmessage_id: a, b").unwrap();
        assert_eq!(
            parsed,
            MailIntent::MarkUnread { ids: vec!["a".to_string(), "b".to_string()] }
        );
    }

    #[test]
    fn test_reply_with_sentinel() {
        let err = intent("ACTION: REPLY\nmessage_id: NEED_ID\nmessage: thanks").unwrap_err();
        assert!(matches!(err, IntentError::AmbiguousReference { .. }));
    }

    #[test]
    fn test_unknown_action() {
        let err = intent("ACTION: FORWARD").unwrap_err();
        assert!(matches!(err, IntentError::UnknownAction { ref action, .. } if action == "FORWARD"));
        assert!(matches!(intent("nothing useful"), Err(IntentError::MissingAction { .. })));
    }

    #[test]
    fn test_details_truncate_body() {
        let message = MailMessage {
            id: "m1".to_string(),
            from: Some("alice@example.com".to_string()),
            body: Some("x".repeat(600)),
            ..Default::default()
        };

        let rendered = render_details(&message);
        assert!(rendered.starts_with("[EMAIL] Email Details:"));
        assert!(rendered.contains("To: Unknown"));
        assert!(rendered.ends_with(&format!("{}...", "x".repeat(500))));
        assert!(!rendered.contains(&"x".repeat(501)));
    }

    #[test]
    fn test_prompt_mentions_sentinel_and_context() {
        let mut history = ConversationHistory::new();
        history.push(crate::history::ConversationTurn::new("list emails", "ID: m1"));

        let prompt = MailAgent::prompt("delete it", &history);
        assert!(prompt.contains("User: list emails\nAssistant: ID: m1\n"));
        assert!(prompt.contains("\"delete it\""));
        assert!(prompt.contains(NEED_ID));
    }
}
