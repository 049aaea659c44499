//! Shared fakes for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use officebot::agents::{CalendarAgent, DriveAgent, MailAgent};
use officebot::services::{
    CalendarEvent, CalendarService, DriveFile, DriveService, FileQuery, LabelChange, MailMessage,
    MailService, MessageFormat, OutgoingMail, ServiceError, ServiceResult,
};
use officebot::{Agents, Coordinator, GatewayError, LanguageModel};

// ============ Language model ============

/// Replays canned replies in order and records every prompt
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, GatewayError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, text: &str) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(&self, err: GatewayError) -> &Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::MalformedResponse("no scripted reply".to_string())))
    }
}

// ============ Mail ============

#[derive(Default)]
pub struct FakeMail {
    pub messages: Mutex<HashMap<String, MailMessage>>,
    /// IDs whose delete / modify / get calls fail
    pub broken: Mutex<HashSet<String>>,
    /// Results for upcoming sends; empty means success
    pub send_results: Mutex<VecDeque<ServiceResult<String>>>,
    pub sent: Mutex<Vec<OutgoingMail>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeMail {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_message(&self, id: &str, from: &str, subject: &str) {
        self.messages.lock().unwrap().insert(
            id.to_string(),
            MailMessage {
                id: id.to_string(),
                thread_id: Some(format!("thread-{}", id)),
                from: Some(from.to_string()),
                to: Some("me@example.com".to_string()),
                subject: Some(subject.to_string()),
                date: Some("Mon, 9 Dec 2024 10:00:00 +0000".to_string()),
                body: Some(format!("Body of {}", id)),
            },
        );
    }

    pub fn break_id(&self, id: &str) {
        self.broken.lock().unwrap().insert(id.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, id: &str) -> ServiceResult<()> {
        if self.broken.lock().unwrap().contains(id) {
            return Err(ServiceError::Http {
                status: 404,
                body: "Not Found".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MailService for FakeMail {
    async fn list_messages(&self, max_results: u32) -> ServiceResult<Vec<String>> {
        self.record(format!("list:{}", max_results));
        let mut ids: Vec<String> = self.messages.lock().unwrap().keys().cloned().collect();
        ids.sort();
        ids.truncate(max_results as usize);
        Ok(ids)
    }

    async fn get_message(&self, id: &str, _format: MessageFormat) -> ServiceResult<MailMessage> {
        self.record(format!("get:{}", id));
        self.check(id)?;
        self.messages
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::Http {
                status: 404,
                body: "Not Found".to_string(),
            })
    }

    async fn send_message(&self, mail: &OutgoingMail) -> ServiceResult<String> {
        self.record(format!("send:{}", mail.to));
        let result = self
            .send_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("sent-1".to_string()));
        if result.is_ok() {
            self.sent.lock().unwrap().push(mail.clone());
        }
        result
    }

    async fn delete_message(&self, id: &str) -> ServiceResult<()> {
        self.record(format!("delete:{}", id));
        self.check(id)
    }

    async fn modify_labels(&self, id: &str, _change: &LabelChange) -> ServiceResult<()> {
        self.record(format!("modify:{}", id));
        self.check(id)
    }
}

// ============ Drive ============

#[derive(Default)]
pub struct FakeDrive {
    pub files: Mutex<Vec<DriveFile>>,
    pub fail_listing: Mutex<bool>,
    pub queries: Mutex<Vec<FileQuery>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeDrive {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_file(&self, id: &str, name: &str) {
        self.files.lock().unwrap().push(DriveFile {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: Some("text/plain".to_string()),
            web_view_link: Some(format!("https://drive.example/{}", id)),
            created_time: Some("2024-12-08T10:00:00Z".to_string()),
            icon_link: None,
        });
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DriveService for FakeDrive {
    async fn list_files(&self, query: &FileQuery) -> ServiceResult<Vec<DriveFile>> {
        self.queries.lock().unwrap().push(query.clone());
        if *self.fail_listing.lock().unwrap() {
            return Err(ServiceError::Request("drive unavailable".to_string()));
        }

        let files = self.files.lock().unwrap();
        Ok(files
            .iter()
            .filter(|f| match &query.name_contains {
                Some(term) => f.name.contains(term.as_str()),
                None => true,
            })
            .take(query.page_size as usize)
            .cloned()
            .collect())
    }

    async fn create_file(&self, name: &str, content: &str) -> ServiceResult<DriveFile> {
        self.calls.lock().unwrap().push(format!("create:{}:{}", name, content));
        Ok(DriveFile {
            id: "new-file".to_string(),
            name: name.to_string(),
            web_view_link: Some("https://drive.example/new-file".to_string()),
            ..Default::default()
        })
    }

    async fn delete_file(&self, id: &str) -> ServiceResult<()> {
        self.calls.lock().unwrap().push(format!("delete:{}", id));
        Ok(())
    }

    async fn share_file(&self, id: &str) -> ServiceResult<()> {
        self.calls.lock().unwrap().push(format!("share:{}", id));
        Ok(())
    }

    async fn get_file(&self, id: &str) -> ServiceResult<DriveFile> {
        self.calls.lock().unwrap().push(format!("get:{}", id));
        Ok(DriveFile {
            id: id.to_string(),
            web_view_link: Some(format!("https://drive.example/{}", id)),
            ..Default::default()
        })
    }
}

// ============ Calendar ============

#[derive(Default)]
pub struct FakeCalendar {
    pub events: Mutex<Vec<CalendarEvent>>,
    pub inserted: Mutex<Vec<CalendarEvent>>,
    pub updated: Mutex<Vec<(String, CalendarEvent)>>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_listing: Mutex<bool>,
}

impl FakeCalendar {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_event(&self, event: CalendarEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl CalendarService for FakeCalendar {
    async fn list_events(
        &self,
        _time_min: DateTime<Utc>,
        max_results: u32,
    ) -> ServiceResult<Vec<CalendarEvent>> {
        if *self.fail_listing.lock().unwrap() {
            return Err(ServiceError::Http {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .take(max_results as usize)
            .cloned()
            .collect())
    }

    async fn insert_event(&self, event: &CalendarEvent) -> ServiceResult<CalendarEvent> {
        self.inserted.lock().unwrap().push(event.clone());
        let mut created = event.clone();
        created.id = Some("evt-new".to_string());
        created.html_link = Some("https://calendar.example/evt-new".to_string());
        Ok(created)
    }

    async fn get_event(&self, id: &str) -> ServiceResult<CalendarEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id.as_deref() == Some(id))
            .cloned()
            .ok_or_else(|| ServiceError::Http {
                status: 404,
                body: "Not Found".to_string(),
            })
    }

    async fn update_event(&self, id: &str, event: &CalendarEvent) -> ServiceResult<CalendarEvent> {
        self.updated.lock().unwrap().push((id.to_string(), event.clone()));
        Ok(event.clone())
    }

    async fn delete_event(&self, id: &str) -> ServiceResult<()> {
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

// ============ Wiring ============

pub struct Harness {
    pub model: Arc<ScriptedModel>,
    pub mail: Arc<FakeMail>,
    pub drive: Arc<FakeDrive>,
    pub calendar: Arc<FakeCalendar>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            model: ScriptedModel::new(),
            mail: FakeMail::new(),
            drive: FakeDrive::new(),
            calendar: FakeCalendar::new(),
        }
    }

    pub fn mail_agent(&self) -> MailAgent {
        MailAgent::new(self.model.clone(), self.mail.clone())
    }

    pub fn drive_agent(&self) -> DriveAgent {
        DriveAgent::new(self.model.clone(), self.drive.clone())
    }

    pub fn calendar_agent(&self) -> CalendarAgent {
        CalendarAgent::new(self.model.clone(), self.calendar.clone())
    }

    pub fn coordinator(&self) -> Coordinator {
        let agents = Agents {
            mail: Arc::new(self.mail_agent()),
            drive: Arc::new(self.drive_agent()),
            calendar: Arc::new(self.calendar_agent()),
        };
        Coordinator::new(self.model.clone(), agents)
    }
}
