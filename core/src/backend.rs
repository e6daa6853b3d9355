/// Webhook backend client
///
/// Five best-effort JSON-over-HTTP calls. The backend is trusted as the
/// source of truth once reachable, but its bodies are loose: empty and
/// malformed payloads are tolerated as "no data" rather than treated as
/// fatal. No retries, attempt-once.
use crate::config::Config;
use crate::error::Result;
use crate::types::FileAttachment;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// One conversation row from the listing endpoint. Message bodies are
/// never included here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConversation {
    /// Numeric on the wire, but tolerated as a string too
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub last_activity: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl RemoteConversation {
    pub fn id_string(&self) -> String {
        match &self.id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub conversations: Option<Vec<RemoteConversation>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub file_type: String,
}

/// One message from the conversation-detail endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct BackendMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub files: Option<Vec<Value>>,
    #[serde(default)]
    pub results_count: Option<u64>,
    #[serde(default)]
    pub avg_similarity: Option<f64>,
    #[serde(default)]
    pub search_criteria: Option<Value>,
    #[serde(default)]
    pub document_content: Option<String>,
    #[serde(default)]
    pub file_info: Option<FileInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub messages: Option<Vec<BackendMessage>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MutationResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The backend surface the coordinator depends on. Split out as a trait
/// so turn orchestration is testable against a scripted double.
#[allow(async_fn_in_trait)]
pub trait Backend {
    async fn list_conversations(&self) -> Result<Option<Vec<RemoteConversation>>>;

    async fn conversation_history(
        &self,
        session_id: &str,
    ) -> Result<Option<Vec<BackendMessage>>>;

    async fn send_turn(
        &self,
        query: &str,
        files: &[FileAttachment],
        session_id: Option<&str>,
        user_id: &str,
    ) -> Result<Value>;

    async fn rename_conversation(&self, session_id: &str, title: &str)
        -> Result<MutationResponse>;

    async fn delete_conversation(&self, session_id: &str) -> Result<MutationResponse>;
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    config: Config,
}

impl BackendClient {
    pub fn new(config: Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn listing_url(&self) -> String {
        format!("{}/webhook/get-conversations", self.config.base_url)
    }

    fn history_url(&self, session_id: &str) -> String {
        format!(
            "{}/webhook/{}/get-conversation/{}",
            self.config.base_url, self.config.route_id, session_id
        )
    }

    fn send_url(&self) -> String {
        format!("{}/webhook/auto-save-files", self.config.base_url)
    }

    fn rename_url(&self, session_id: &str) -> String {
        format!(
            "{}/webhook/{}/rename-conversation/{}",
            self.config.base_url, self.config.route_id, session_id
        )
    }

    fn delete_url(&self, session_id: &str) -> String {
        format!(
            "{}/webhook/{}/delete-conversation/{}",
            self.config.base_url, self.config.route_id, session_id
        )
    }
}

/// Parse a loose JSON body: empty or malformed text counts as no data
fn parse_loose<T: serde::de::DeserializeOwned>(endpoint: &str, text: &str) -> Option<T> {
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str(text) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Invalid JSON from {}: {}", endpoint, e);
            None
        }
    }
}

impl Backend for BackendClient {
    async fn list_conversations(&self) -> Result<Option<Vec<RemoteConversation>>> {
        let response = self.http.get(self.listing_url()).send().await?;
        if !response.status().is_success() {
            warn!("get-conversations returned {}", response.status());
            return Ok(None);
        }
        let text = response.text().await?;
        let parsed: Option<ListingResponse> = parse_loose("get-conversations", &text);
        Ok(parsed
            .filter(|r| r.success)
            .and_then(|r| r.conversations))
    }

    async fn conversation_history(
        &self,
        session_id: &str,
    ) -> Result<Option<Vec<BackendMessage>>> {
        let response = self.http.get(self.history_url(session_id)).send().await?;
        if !response.status().is_success() {
            warn!("get-conversation returned {}", response.status());
            return Ok(None);
        }
        let text = response.text().await?;
        let parsed: Option<HistoryResponse> = parse_loose("get-conversation", &text);
        Ok(parsed.filter(|r| r.success).and_then(|r| r.messages))
    }

    /// One multipart request per turn: message text, any attachments, and
    /// the session id when known. The reply shape is not fixed; callers
    /// classify it. An empty or unparseable body degrades to `Null`.
    async fn send_turn(
        &self,
        query: &str,
        files: &[FileAttachment],
        session_id: Option<&str>,
        user_id: &str,
    ) -> Result<Value> {
        let mut form = reqwest::multipart::Form::new();
        for file in files {
            let mut part = reqwest::multipart::Part::bytes(file.bytes.clone())
                .file_name(file.name.clone());
            if !file.mime_type.is_empty() {
                part = part.mime_str(&file.mime_type)?;
            }
            form = form.part("files", part);
        }
        form = form.text("query", query.to_string());
        if let Some(sid) = session_id {
            form = form.text("session_id", sid.to_string());
            form = form.text("user_id", user_id.to_string());
        }

        let response = self
            .http
            .post(self.send_url())
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        let text = response.text().await?;
        Ok(parse_loose("auto-save-files", &text).unwrap_or(Value::Null))
    }

    async fn rename_conversation(
        &self,
        session_id: &str,
        title: &str,
    ) -> Result<MutationResponse> {
        let response = self
            .http
            .patch(self.rename_url(session_id))
            .json(&serde_json::json!({ "title": title }))
            .send()
            .await?;
        Ok(response.json::<MutationResponse>().await?)
    }

    async fn delete_conversation(&self, session_id: &str) -> Result<MutationResponse> {
        let response = self.http.delete(self.delete_url(session_id)).send().await?;
        Ok(response.json::<MutationResponse>().await?)
    }
}
