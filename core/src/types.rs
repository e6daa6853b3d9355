/// Shared types for the chat core
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Titles derived from message content are cut at this many characters
pub const TITLE_MAX_LEN: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A file the user attached to an outgoing message. Client-side only:
/// the bytes live exactly as long as the request that uploads them.
#[derive(Debug, Clone)]
pub struct FileAttachment {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// One file entry in a semantic-search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultFile {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, rename = "webViewLink", skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

impl SearchResultFile {
    /// First usable link, in the order the backend tends to populate them
    pub fn best_link(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or(self.link.as_deref())
            .or(self.web_view_link.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchData {
    pub found: bool,
    pub count: u64,
    pub avg_similarity: f64,
    pub files: Vec<SearchResultFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_criteria: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedDocument {
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentData {
    pub document: GeneratedDocument,
}

/// A previously ingested file reported back for duplicate uploads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistingFile {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub original_file_name: String,
    #[serde(default)]
    pub google_drive_web_view_link: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadData {
    pub already_processed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_file: Option<ExistingFile>,
}

/// Classified payload attached to an assistant message. `None` on the
/// message means a plain conversational reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageData {
    Search(SearchData),
    DocumentGeneration(DocumentData),
    Upload(UploadData),
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// User messages only; empty for assistant messages
    pub files: Vec<FileAttachment>,
    pub data: Option<MessageData>,
}

impl Message {
    pub fn user(id: String, content: String, files: Vec<FileAttachment>) -> Self {
        Self {
            id,
            role: Role::User,
            content,
            timestamp: Utc::now(),
            files,
            data: None,
        }
    }

    pub fn assistant(id: String, content: String, data: Option<MessageData>) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content,
            timestamp: Utc::now(),
            files: Vec::new(),
            data,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Conversation {
    /// Provisional (local, time-based) until the backend reveals the real id
    pub id: String,
    /// Stable correlation key across the provisional-id → backend-id swap
    pub session_id: Option<String>,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derive a display title from message content: cut at TITLE_MAX_LEN
/// characters, with an ellipsis when something was cut
pub fn derive_title(content: &str) -> String {
    let mut title: String = content.chars().take(TITLE_MAX_LEN).collect();
    if content.chars().count() > TITLE_MAX_LEN {
        title.push_str("...");
    }
    if title.is_empty() {
        title = "New Chat".to_string();
    }
    title
}
