/// Backend reply classification
///
/// The webhook backend does not commit to a fixed reply shape: the same
/// endpoint answers with search results, generated documents, upload
/// acknowledgments or plain text, and the shapes overlap. Classification
/// is therefore ordered, first match wins:
///
///   1. search        — explicit vector marker, or a non-empty `files` list
///   2. document      — explicit action marker, or a `document` field
///   3. upload        — already-processed variant
///   4. upload        — single-file success
///   5. plain         — any free-text `message`
///   6. plain         — fixed empty-reply fallback
///
/// Search and document replies are richer than uploads and must not be
/// swallowed by the generic branches when fields overlap.
use crate::backend::BackendMessage;
use crate::types::{
    DocumentData, ExistingFile, GeneratedDocument, MessageData, SearchData, SearchResultFile,
    UploadData,
};
use serde_json::Value;
use tracing::warn;

pub const MSG_SEARCH_DEFAULT: &str = "Here are the files I found matching your request.";
pub const MSG_DOCUMENT_DEFAULT: &str = "I have generated the document for you.";
pub const MSG_ALREADY_PROCESSED: &str = "This file has already been processed.";
pub const MSG_UPLOAD_DEFAULT: &str = "File uploaded successfully.";
pub const MSG_PROCESSED_DEFAULT: &str = "Processed successfully.";
pub const MSG_EMPTY_REPLY: &str = "Request received, but no response content was returned.";

/// A normalized backend reply: display text plus an optional structured
/// payload for the rendering layer
#[derive(Debug, Clone)]
pub struct Classified {
    pub content: String,
    pub data: Option<MessageData>,
}

impl Classified {
    fn plain(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            data: None,
        }
    }
}

/// Authoritative identifiers revealed by a send-turn reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotedIdentity {
    pub session_id: String,
    /// Backend conversation id, when the reply carries one
    pub id: Option<String>,
}

fn is_true(v: &Value) -> bool {
    v.as_bool() == Some(true)
}

fn non_empty_array<'a>(v: &'a Value) -> Option<&'a Vec<Value>> {
    v.as_array().filter(|a| !a.is_empty())
}

fn text_or<'a>(v: &'a Value, key: &str, fallback: &'a str) -> String {
    v.get(key)
        .and_then(Value::as_str)
        .unwrap_or(fallback)
        .to_string()
}

fn parse_files(raw: &Value) -> Vec<SearchResultFile> {
    match raw.as_array() {
        Some(items) => items
            .iter()
            .filter_map(|item| match serde_json::from_value(item.clone()) {
                Ok(f) => Some(f),
                Err(e) => {
                    warn!("Skipping unparseable search-result file: {}", e);
                    None
                }
            })
            .collect(),
        None => Vec::new(),
    }
}

fn parse_document(raw: &Value) -> GeneratedDocument {
    GeneratedDocument {
        title: raw
            .get("name")
            .or_else(|| raw.get("title"))
            .and_then(Value::as_str)
            .unwrap_or("Generated Document")
            .to_string(),
        content: raw
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        doc_type: raw
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("document")
            .to_string(),
        summary: raw
            .get("summary")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

/// Classify a send-turn reply. Array payloads are normalized to their
/// first element before inspection.
pub fn classify(raw: &Value) -> Classified {
    let item = match raw {
        Value::Array(items) => match items.first() {
            Some(first) => first,
            None => return Classified::plain(MSG_EMPTY_REPLY),
        },
        Value::Null => return Classified::plain(MSG_EMPTY_REPLY),
        other => other,
    };

    if !item.is_object() {
        return Classified::plain(MSG_EMPTY_REPLY);
    }

    let files = item.get("files").and_then(non_empty_array);
    let is_vector_search = item.get("searchType").and_then(Value::as_str) == Some("vector");

    // 1. Semantic search
    if is_vector_search || files.is_some() {
        let parsed = parse_files(item.get("files").unwrap_or(&Value::Null));
        let count = item
            .get("count")
            .and_then(Value::as_u64)
            .unwrap_or(parsed.len() as u64);
        let data = SearchData {
            found: item
                .get("found")
                .and_then(Value::as_bool)
                .unwrap_or(!parsed.is_empty()),
            count,
            avg_similarity: item
                .get("avg_similarity")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            files: parsed,
            search_criteria: item.get("searchCriteria").cloned(),
        };
        return Classified {
            content: text_or(item, "message", MSG_SEARCH_DEFAULT),
            data: Some(MessageData::Search(data)),
        };
    }

    // 2. Document generation
    let is_doc_action = item.get("action").and_then(Value::as_str) == Some("document_generation");
    if is_doc_action || item.get("document").is_some() {
        let document = parse_document(item.get("document").unwrap_or(&Value::Null));
        return Classified {
            content: text_or(item, "message", MSG_DOCUMENT_DEFAULT),
            data: Some(MessageData::DocumentGeneration(DocumentData { document })),
        };
    }

    // 3. Duplicate upload
    if item.get("alreadyProcessed").map(is_true).unwrap_or(false) {
        return Classified {
            content: text_or(item, "message", MSG_ALREADY_PROCESSED),
            data: Some(MessageData::Upload(upload_data(item, true))),
        };
    }

    // 4. Single-file upload success
    if item.get("success").map(is_true).unwrap_or(false) && item.get("file").is_some() {
        return Classified {
            content: text_or(item, "message", MSG_UPLOAD_DEFAULT),
            data: Some(MessageData::Upload(upload_data(item, false))),
        };
    }

    // 5. Free text
    if let Some(message) = item.get("message").and_then(Value::as_str) {
        return Classified::plain(message);
    }

    // 6. Nothing recognizable
    Classified::plain(MSG_PROCESSED_DEFAULT)
}

fn upload_data(item: &Value, already_processed: bool) -> UploadData {
    let file = item.get("file");
    let existing_file = item
        .get("existingFile")
        .and_then(|v| match serde_json::from_value::<ExistingFile>(v.clone()) {
            Ok(f) => Some(f),
            Err(e) => {
                warn!("Skipping unparseable existingFile: {}", e);
                None
            }
        });
    UploadData {
        already_processed,
        file_name: file
            .and_then(|f| f.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string),
        category: file
            .and_then(|f| f.get("category"))
            .and_then(Value::as_str)
            .map(str::to_string),
        drive_link: item
            .get("google_drive")
            .and_then(|g| g.get("link"))
            .and_then(Value::as_str)
            .map(str::to_string),
        existing_file,
    }
}

/// Pull authoritative identifiers out of a send-turn reply, if present.
/// `sessionId` wins over `conversation.session_id`; `conversation.id` is
/// accepted as number or string and stringified.
pub fn extract_identity(raw: &Value) -> Option<PromotedIdentity> {
    let item = match raw {
        Value::Array(items) => items.first()?,
        other => other,
    };

    let conversation = item.get("conversation");
    let session_id = item
        .get("sessionId")
        .and_then(Value::as_str)
        .or_else(|| {
            conversation
                .and_then(|c| c.get("session_id"))
                .and_then(Value::as_str)
        })?
        .to_string();

    let id = conversation.and_then(|c| c.get("id")).and_then(|v| match v {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    });

    Some(PromotedIdentity { session_id, id })
}

/// Classify one message from the conversation-detail endpoint. History
/// entries carry flattened fields rather than the send-turn reply shape.
pub fn classify_history(msg: &BackendMessage) -> Option<MessageData> {
    let has_files = msg.files.as_ref().map(|f| !f.is_empty()).unwrap_or(false);

    if msg.action.as_deref() == Some("semantic_search_results") || has_files {
        let files: Vec<SearchResultFile> = msg
            .files
            .as_ref()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        let count = msg.results_count.unwrap_or(files.len() as u64);
        return Some(MessageData::Search(SearchData {
            found: count > 0,
            count,
            avg_similarity: msg.avg_similarity.unwrap_or(0.0),
            files,
            search_criteria: msg.search_criteria.clone(),
        }));
    }

    let has_generated_doc = msg.document_content.is_some() && msg.file_info.is_some();
    if msg.action.as_deref() == Some("document_generated") || has_generated_doc {
        let info = msg.file_info.as_ref();
        return Some(MessageData::DocumentGeneration(DocumentData {
            document: GeneratedDocument {
                title: info
                    .map(|i| i.name.clone())
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| "Generated Document".to_string()),
                content: msg.document_content.clone().unwrap_or_default(),
                doc_type: info
                    .map(|i| i.file_type.clone())
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "document".to_string()),
                summary: None,
            },
        }));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_by_marker() {
        let reply = json!({ "searchType": "vector", "files": [], "message": "3 matches" });
        let c = classify(&reply);
        assert_eq!(c.content, "3 matches");
        assert!(matches!(c.data, Some(MessageData::Search(_))));
    }

    #[test]
    fn test_search_by_files_with_count_fallback() {
        let reply = json!({
            "files": [{ "id": 1, "name": "inv.pdf" }],
            "avg_similarity": 0.8
        });
        let c = classify(&reply);
        assert_eq!(c.content, MSG_SEARCH_DEFAULT);
        match c.data {
            Some(MessageData::Search(s)) => {
                assert_eq!(s.count, 1);
                assert!((s.avg_similarity - 0.8).abs() < f64::EPSILON);
                assert_eq!(s.files[0].name, "inv.pdf");
                assert!(s.found);
            }
            other => panic!("expected search, got {:?}", other),
        }
    }

    #[test]
    fn test_search_wins_over_document() {
        // Overlapping fields: files + document. Search is the richer
        // interpretation and takes precedence.
        let reply = json!({
            "files": [{ "id": 7, "name": "report.docx" }],
            "document": { "name": "report.docx", "content": "..." }
        });
        let c = classify(&reply);
        assert!(matches!(c.data, Some(MessageData::Search(_))));
    }

    #[test]
    fn test_document_by_action_and_by_field() {
        let by_action = json!({ "action": "document_generation", "message": "done" });
        assert!(matches!(
            classify(&by_action).data,
            Some(MessageData::DocumentGeneration(_))
        ));

        let by_field = json!({ "document": { "name": "Summary", "content": "body" } });
        let c = classify(&by_field);
        assert_eq!(c.content, MSG_DOCUMENT_DEFAULT);
        match c.data {
            Some(MessageData::DocumentGeneration(d)) => {
                assert_eq!(d.document.title, "Summary");
                assert_eq!(d.document.content, "body");
            }
            other => panic!("expected document, got {:?}", other),
        }
    }

    #[test]
    fn test_already_processed_upload() {
        let reply = json!({
            "alreadyProcessed": true,
            "existingFile": { "id": 3, "file_name": "a.pdf" }
        });
        let c = classify(&reply);
        assert_eq!(c.content, MSG_ALREADY_PROCESSED);
        match c.data {
            Some(MessageData::Upload(u)) => {
                assert!(u.already_processed);
                assert_eq!(u.existing_file.unwrap().file_name, "a.pdf");
            }
            other => panic!("expected upload, got {:?}", other),
        }
    }

    #[test]
    fn test_upload_success() {
        let reply = json!({
            "success": true,
            "file": { "name": "cv.pdf", "category": "hr" },
            "google_drive": { "link": "https://drive/x" }
        });
        let c = classify(&reply);
        assert_eq!(c.content, MSG_UPLOAD_DEFAULT);
        match c.data {
            Some(MessageData::Upload(u)) => {
                assert!(!u.already_processed);
                assert_eq!(u.file_name.as_deref(), Some("cv.pdf"));
                assert_eq!(u.drive_link.as_deref(), Some("https://drive/x"));
            }
            other => panic!("expected upload, got {:?}", other),
        }
    }

    #[test]
    fn test_success_without_file_is_not_an_upload() {
        let reply = json!({ "success": true, "message": "saved" });
        let c = classify(&reply);
        assert_eq!(c.content, "saved");
        assert!(c.data.is_none());
    }

    #[test]
    fn test_plain_and_empty_fallbacks() {
        assert_eq!(classify(&json!({ "message": "hi" })).content, "hi");
        assert_eq!(classify(&json!({})).content, MSG_PROCESSED_DEFAULT);
        assert_eq!(classify(&Value::Null).content, MSG_EMPTY_REPLY);
        assert_eq!(classify(&json!([])).content, MSG_EMPTY_REPLY);
    }

    #[test]
    fn test_array_reply_uses_first_item() {
        let reply = json!([{ "message": "first" }, { "message": "second" }]);
        assert_eq!(classify(&reply).content, "first");
    }

    #[test]
    fn test_extract_identity_variants() {
        let top_level = json!({ "sessionId": "session-abc", "conversation": { "id": 42 } });
        let identity = extract_identity(&top_level).unwrap();
        assert_eq!(identity.session_id, "session-abc");
        assert_eq!(identity.id.as_deref(), Some("42"));

        let nested = json!({ "conversation": { "session_id": "session-xyz", "id": "77" } });
        let identity = extract_identity(&nested).unwrap();
        assert_eq!(identity.session_id, "session-xyz");
        assert_eq!(identity.id.as_deref(), Some("77"));

        assert!(extract_identity(&json!({ "message": "hi" })).is_none());
    }

    #[test]
    fn test_classify_history_search() {
        let msg = BackendMessage {
            role: "assistant".to_string(),
            action: Some("semantic_search_results".to_string()),
            content: "found".to_string(),
            timestamp: None,
            files: Some(vec![json!({ "id": 1, "name": "a.pdf" })]),
            results_count: None,
            avg_similarity: Some(0.5),
            search_criteria: None,
            document_content: None,
            file_info: None,
        };
        match classify_history(&msg) {
            Some(MessageData::Search(s)) => {
                assert_eq!(s.count, 1);
                assert_eq!(s.files.len(), 1);
            }
            other => panic!("expected search, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_history_document() {
        let msg = BackendMessage {
            role: "assistant".to_string(),
            action: None,
            content: "here".to_string(),
            timestamp: None,
            files: None,
            results_count: None,
            avg_similarity: None,
            search_criteria: None,
            document_content: Some("body".to_string()),
            file_info: Some(crate::backend::FileInfo {
                name: "Report".to_string(),
                file_type: "docx".to_string(),
            }),
        };
        match classify_history(&msg) {
            Some(MessageData::DocumentGeneration(d)) => {
                assert_eq!(d.document.title, "Report");
                assert_eq!(d.document.doc_type, "docx");
            }
            other => panic!("expected document, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_history_plain() {
        let msg = BackendMessage {
            role: "assistant".to_string(),
            action: None,
            content: "plain".to_string(),
            timestamp: None,
            files: None,
            results_count: None,
            avg_similarity: None,
            search_criteria: None,
            document_content: None,
            file_info: None,
        };
        assert!(classify_history(&msg).is_none());
    }
}
