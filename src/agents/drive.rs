//! Drive Agent

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::{classify, separator, AgentError, DomainAgent};
use crate::gemini::LanguageModel;
use crate::history::ConversationHistory;
use crate::intent::{require_action, require_id, Domain, IntentError, NEED_ID};
use crate::parser::ParsedReply;
use crate::services::{DriveFile, DriveService, FileQuery};

const LIST_LIMIT: u32 = 10;
const ID_FIELD: &str = "file_id";

/// Parsed storage request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveIntent {
    Create { filename: String, content: String },
    Search { query: String },
    Delete { file_id: String },
    Share { file_id: String },
    List,
}

impl DriveIntent {
    pub fn from_reply(reply: &ParsedReply) -> Result<Self, IntentError> {
        let domain = Domain::Drive;
        let action = require_action(reply, domain)?;

        let intent = match action.as_str() {
            "CREATE" => DriveIntent::Create {
                filename: reply.non_empty("filename").unwrap_or("untitled.txt").to_string(),
                content: reply.get_or("content", ""),
            },
            "SEARCH" => DriveIntent::Search {
                query: reply.get_or("query", ""),
            },
            "DELETE" => DriveIntent::Delete {
                file_id: require_id(reply, domain, ID_FIELD)?,
            },
            "SHARE" => DriveIntent::Share {
                file_id: require_id(reply, domain, ID_FIELD)?,
            },
            "LIST" => DriveIntent::List,
            _ => return Err(IntentError::UnknownAction { domain, action }),
        };

        Ok(intent)
    }
}

pub struct DriveAgent {
    model: Arc<dyn LanguageModel>,
    drive: Arc<dyn DriveService>,
}

impl DriveAgent {
    pub fn new(model: Arc<dyn LanguageModel>, drive: Arc<dyn DriveService>) -> Self {
        Self { model, drive }
    }

    fn prompt(request: &str, history: &ConversationHistory) -> String {
        format!(
            r#"You are a Google Drive Agent specialized in file management.

Recent Conversation:
{context}
Analyze this request: "{request}"

Determine the action and extract parameters:
- Actions: CREATE, SEARCH, DELETE, SHARE, LIST
- For CREATE: extract 'filename' and 'content'
- For SEARCH: extract 'query'
- For DELETE/SHARE: extract 'file_id'. If it is not in the request or the conversation, use {need_id}.
- For LIST: no parameters needed

Respond in this exact format:
ACTION: <action>
filename: <name>
content: <text content>
query: <search term>
file_id: <id>

Only include relevant parameters."#,
            context = history.context_block(),
            request = request,
            need_id = NEED_ID,
        )
    }

    pub async fn execute(&self, intent: DriveIntent) -> Result<String, AgentError> {
        match intent {
            DriveIntent::Create { filename, content } => self.create(&filename, &content).await,
            DriveIntent::Search { query } => self.search(&query).await,
            DriveIntent::Delete { file_id } => self.delete(&file_id).await,
            DriveIntent::Share { file_id } => self.share(&file_id).await,
            DriveIntent::List => self.list().await,
        }
    }

    async fn list(&self) -> Result<String, AgentError> {
        let query = FileQuery {
            page_size: LIST_LIMIT,
            ..Default::default()
        };
        let files = self
            .drive
            .list_files(&query)
            .await
            .map_err(AgentError::service("listing files"))?;

        if files.is_empty() {
            return Ok("[EMPTY] No files found.".to_string());
        }

        let mut out = format!("[FILE] Found {} files:\n\n", files.len());
        for file in &files {
            out.push_str(&format!(
                "ID: {}\nName: {}\nType: {}\nLink: {}\nCreated: {}\n{}\n",
                file.id,
                file.name,
                file.mime_type.as_deref().unwrap_or("Unknown"),
                link(file),
                file.created_time.as_deref().unwrap_or("Unknown"),
                separator(),
            ));
        }
        Ok(out)
    }

    async fn create(&self, filename: &str, content: &str) -> Result<String, AgentError> {
        let file = self
            .drive
            .create_file(filename, content)
            .await
            .map_err(AgentError::service("creating file"))?;

        info!("Created file {} ({})", filename, file.id);
        Ok(format!(
            "[OK] File '{}' created successfully!\n[LINK] Link: {}\n[ID] File ID: {}",
            filename,
            link(&file),
            file.id
        ))
    }

    async fn search(&self, term: &str) -> Result<String, AgentError> {
        let query = FileQuery {
            page_size: LIST_LIMIT,
            name_contains: Some(term.to_string()),
            newest_first: false,
        };
        let files = self
            .drive
            .list_files(&query)
            .await
            .map_err(AgentError::service("searching"))?;

        if files.is_empty() {
            return Ok(format!("[EMPTY] No files found matching '{}'.", term));
        }

        let mut out = format!("[SEARCH] Found {} file(s) matching '{}':\n\n", files.len(), term);
        for file in &files {
            out.push_str(&format!(
                "[FILE] {}\n   ID: {}\n   Type: {}\n   Link: {}\n\n",
                file.name,
                file.id,
                file.mime_type.as_deref().unwrap_or("Unknown"),
                link(file),
            ));
        }
        Ok(out)
    }

    async fn delete(&self, file_id: &str) -> Result<String, AgentError> {
        self.drive
            .delete_file(file_id)
            .await
            .map_err(AgentError::service("deleting file"))?;

        Ok(format!("[OK] File {} deleted successfully", file_id))
    }

    async fn share(&self, file_id: &str) -> Result<String, AgentError> {
        self.drive
            .share_file(file_id)
            .await
            .map_err(AgentError::service("sharing file"))?;

        let file = self
            .drive
            .get_file(file_id)
            .await
            .map_err(AgentError::service("sharing file"))?;

        Ok(format!("[OK] File shared successfully!\n[LINK] Link: {}", link(&file)))
    }
}

fn link(file: &DriveFile) -> &str {
    file.web_view_link.as_deref().unwrap_or("No link")
}

#[async_trait]
impl DomainAgent for DriveAgent {
    fn domain(&self) -> Domain {
        Domain::Drive
    }

    async fn process(
        &self,
        request: &str,
        history: &ConversationHistory,
    ) -> Result<String, AgentError> {
        let prompt = Self::prompt(request, history);
        let reply = classify(self.model.as_ref(), Domain::Drive, &prompt).await?;
        let intent = DriveIntent::from_reply(&reply)?;

        debug!("Drive intent: {:?}", intent);
        self.execute(intent).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(text: &str) -> Result<DriveIntent, IntentError> {
        DriveIntent::from_reply(&ParsedReply::parse(text))
    }

    #[test]
    fn test_create_defaults() {
        assert_eq!(
            intent("ACTION: CREATE").unwrap(),
            DriveIntent::Create {
                filename: "untitled.txt".to_string(),
                content: String::new(),
            }
        );
        assert_eq!(
            intent("ACTION: create\nfilename: notes.txt\ncontent: buy milk: 2L").unwrap(),
            DriveIntent::Create {
                filename: "notes.txt".to_string(),
                content: "buy milk: 2L".to_string(),
            }
        );
    }

    #[test]
    fn test_share_needs_id() {
        assert!(matches!(
            intent("ACTION: SHARE\nfile_id: NEED_ID"),
            Err(IntentError::AmbiguousReference { field: "file_id", .. })
        ));
        assert!(matches!(
            intent("ACTION: DELETE"),
            Err(IntentError::MissingField { field: "file_id", .. })
        ));
    }

    #[test]
    fn test_unhandled_actions_rejected() {
        assert!(matches!(intent("ACTION: MOVE"), Err(IntentError::UnknownAction { .. })));
    }

    #[test]
    fn test_link_fallback() {
        let file = DriveFile {
            id: "f1".to_string(),
            ..Default::default()
        };
        assert_eq!(link(&file), "No link");
    }
}
