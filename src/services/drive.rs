//! Google Drive REST client

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;

use super::{resource_url, DriveFile, DriveService, FileQuery, GoogleApi, ServiceResult};

const DRIVE_API_URL: &str = "https://www.googleapis.com/drive/v3";
const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3";

const LIST_FIELDS: &str = "files(id, name, mimeType, webViewLink, createdTime, iconLink)";
const MULTIPART_BOUNDARY: &str = "officebot_upload_boundary";

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Drive query expression for a name substring
pub fn name_contains_query(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('\'', "\\'");
    format!("name contains '{}'", escaped)
}

/// `multipart/related` body: JSON metadata part followed by the text content
fn multipart_body(name: &str, content: &str) -> String {
    let metadata = serde_json::json!({ "name": name });
    format!(
        "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n--{b}\r\nContent-Type: text/plain\r\n\r\n{content}\r\n--{b}--",
        b = MULTIPART_BOUNDARY,
        meta = metadata,
        content = content
    )
}

/// Drive API client
pub struct GoogleDrive {
    api: GoogleApi,
}

impl GoogleDrive {
    pub fn new(api: GoogleApi) -> Self {
        Self { api }
    }

    fn file_url(id: &str, suffix: &[&str]) -> ServiceResult<String> {
        let mut segments = vec!["files", id];
        segments.extend_from_slice(suffix);
        resource_url(DRIVE_API_URL, &segments)
    }
}

#[async_trait]
impl DriveService for GoogleDrive {
    async fn list_files(&self, query: &FileQuery) -> ServiceResult<Vec<DriveFile>> {
        let mut params = vec![
            ("pageSize", query.page_size.to_string()),
            ("fields", LIST_FIELDS.to_string()),
        ];
        if let Some(term) = &query.name_contains {
            params.push(("q", name_contains_query(term)));
        }
        if query.newest_first {
            params.push(("orderBy", "createdTime desc".to_string()));
        }

        let request = self
            .api
            .request(Method::GET, &format!("{}/files", DRIVE_API_URL))
            .await?
            .query(&params);

        let list: FileList = self.api.send_json(request).await?;
        Ok(list.files)
    }

    async fn create_file(&self, name: &str, content: &str) -> ServiceResult<DriveFile> {
        let request = self
            .api
            .request(Method::POST, &format!("{}/files", DRIVE_UPLOAD_URL))
            .await?
            .query(&[("uploadType", "multipart"), ("fields", "id, name, webViewLink")])
            .header(
                "content-type",
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(multipart_body(name, content));

        self.api.send_json(request).await
    }

    async fn delete_file(&self, id: &str) -> ServiceResult<()> {
        let request = self
            .api
            .request(Method::DELETE, &Self::file_url(id, &[])?)
            .await?;
        self.api.send_empty(request).await
    }

    async fn share_file(&self, id: &str) -> ServiceResult<()> {
        let request = self
            .api
            .request(Method::POST, &Self::file_url(id, &["permissions"])?)
            .await?
            .json(&serde_json::json!({ "type": "anyone", "role": "reader" }));
        self.api.send_empty(request).await
    }

    async fn get_file(&self, id: &str) -> ServiceResult<DriveFile> {
        let request = self
            .api
            .request(Method::GET, &Self::file_url(id, &[])?)
            .await?
            .query(&[("fields", "id, name, mimeType, webViewLink")]);
        self.api.send_json(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_query_escapes_quotes() {
        assert_eq!(name_contains_query("report"), "name contains 'report'");
        assert_eq!(name_contains_query("bob's"), "name contains 'bob\\'s'");
    }

    #[test]
    fn test_multipart_body_layout() {
        let body = multipart_body("notes.txt", "hello");
        assert!(body.starts_with(&format!("--{}\r\n", MULTIPART_BOUNDARY)));
        assert!(body.contains(r#"{"name":"notes.txt"}"#));
        assert!(body.contains("Content-Type: text/plain\r\n\r\nhello\r\n"));
        assert!(body.ends_with(&format!("--{}--", MULTIPART_BOUNDARY)));
    }

    #[test]
    fn test_file_url_escapes_id() {
        assert_eq!(
            GoogleDrive::file_url("f1", &["permissions"]).unwrap(),
            format!("{}/files/f1/permissions", DRIVE_API_URL)
        );
        assert_eq!(
            GoogleDrive::file_url("../about?fields=user", &[]).unwrap(),
            format!("{}/files/..%2Fabout%3Ffields=user", DRIVE_API_URL)
        );
        assert!(GoogleDrive::file_url("..", &[]).is_err());
    }
}
