//! Gmail REST client

use async_trait::async_trait;
use base64::{
    alphabet,
    engine::{
        general_purpose::{STANDARD, URL_SAFE},
        DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig,
    },
    Engine,
};
use reqwest::Method;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::{
    resource_url, GoogleApi, LabelChange, MailMessage, MailService, MessageFormat, OutgoingMail,
    ServiceError, ServiceResult,
};

const GMAIL_API_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Gmail bodies are URL-safe base64, padded or not
const BODY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    id: String,
    thread_id: Option<String>,
    payload: Option<Payload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Payload {
    mime_type: Option<String>,
    #[serde(default)]
    headers: Vec<Header>,
    body: Option<Body>,
    #[serde(default)]
    parts: Vec<Payload>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct Body {
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

impl RawMessage {
    fn into_message(self, format: MessageFormat) -> MailMessage {
        let payload = self.payload.unwrap_or_default();
        let mut headers: HashMap<String, String> = payload
            .headers
            .iter()
            .map(|h| (h.name.clone(), h.value.clone()))
            .collect();

        let body = match format {
            MessageFormat::Full => Some(plain_text_body(&payload)),
            MessageFormat::Metadata => None,
        };

        MailMessage {
            id: self.id,
            thread_id: self.thread_id,
            from: headers.remove("From"),
            to: headers.remove("To"),
            subject: headers.remove("Subject"),
            date: headers.remove("Date"),
            body,
        }
    }
}

/// Body of the first text/plain part, else the top-level body
fn plain_text_body(payload: &Payload) -> String {
    let data = payload
        .parts
        .iter()
        .find(|p| p.mime_type.as_deref() == Some("text/plain"))
        .and_then(|p| p.body.as_ref())
        .and_then(|b| b.data.as_deref())
        .or_else(|| payload.body.as_ref().and_then(|b| b.data.as_deref()))
        .unwrap_or_default();

    if data.is_empty() {
        return String::new();
    }

    match BODY_ENGINE.decode(data) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            debug!("Undecodable message body: {}", e);
            String::new()
        }
    }
}

/// Header value as-is when ASCII, else an RFC 2047 base64 encoded-word
pub fn encode_header_value(value: &str) -> String {
    if value.is_ascii() {
        return value.to_string();
    }
    format!("=?utf-8?B?{}?=", STANDARD.encode(value.as_bytes()))
}

/// RFC 822 plain-text message, URL-safe base64 encoded for the `raw` field
pub fn encode_raw_message(mail: &OutgoingMail) -> String {
    let message = format!(
        "Content-Type: text/plain; charset=\"utf-8\"\r\nMIME-Version: 1.0\r\nContent-Transfer-Encoding: 8bit\r\nto: {}\r\nsubject: {}\r\n\r\n{}",
        mail.to,
        encode_header_value(&mail.subject),
        mail.body
    );
    URL_SAFE.encode(message.as_bytes())
}

/// Gmail API client
pub struct GmailClient {
    api: GoogleApi,
    base_url: String,
}

impl GmailClient {
    pub fn new(api: GoogleApi) -> Self {
        Self {
            api,
            base_url: GMAIL_API_URL.to_string(),
        }
    }

    fn url(&self, segments: &[&str]) -> ServiceResult<String> {
        resource_url(&self.base_url, segments)
    }
}

#[async_trait]
impl MailService for GmailClient {
    async fn list_messages(&self, max_results: u32) -> ServiceResult<Vec<String>> {
        let request = self
            .api
            .request(Method::GET, &self.url(&["messages"])?)
            .await?
            .query(&[("maxResults", max_results.to_string())]);

        let list: ListResponse = self.api.send_json(request).await?;
        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    async fn get_message(&self, id: &str, format: MessageFormat) -> ServiceResult<MailMessage> {
        let mut request = self
            .api
            .request(Method::GET, &self.url(&["messages", id])?)
            .await?;

        request = match format {
            MessageFormat::Metadata => request.query(&[
                ("format", "metadata"),
                ("metadataHeaders", "From"),
                ("metadataHeaders", "Subject"),
                ("metadataHeaders", "Date"),
            ]),
            MessageFormat::Full => request.query(&[("format", "full")]),
        };

        let raw: RawMessage = self.api.send_json(request).await?;
        Ok(raw.into_message(format))
    }

    async fn send_message(&self, mail: &OutgoingMail) -> ServiceResult<String> {
        let mut body = serde_json::json!({ "raw": encode_raw_message(mail) });
        if let Some(thread_id) = &mail.thread_id {
            body["threadId"] = serde_json::Value::String(thread_id.clone());
        }

        let request = self
            .api
            .request(Method::POST, &self.url(&["messages", "send"])?)
            .await?
            .json(&body);

        let sent: SendResponse = self.api.send_json(request).await?;
        Ok(sent.id)
    }

    async fn delete_message(&self, id: &str) -> ServiceResult<()> {
        let request = self
            .api
            .request(Method::DELETE, &self.url(&["messages", id])?)
            .await?;
        self.api.send_empty(request).await
    }

    async fn modify_labels(&self, id: &str, change: &LabelChange) -> ServiceResult<()> {
        if change.add.is_empty() && change.remove.is_empty() {
            return Err(ServiceError::Request("empty label change".to_string()));
        }

        let request = self
            .api
            .request(Method::POST, &self.url(&["messages", id, "modify"])?)
            .await?
            .json(&serde_json::json!({
                "addLabelIds": change.add,
                "removeLabelIds": change.remove,
            }));
        self.api.send_empty(request).await
    }
}
