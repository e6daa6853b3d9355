/// In-memory conversation store
///
/// Owns the canonical conversation list and every mutation rule: message
/// append, remote-listing merge, provisional-id promotion, and the
/// optimistic select/rename/delete operations. Pure state, no I/O, so the
/// merge and promotion rules are testable without a network.
use crate::backend::RemoteConversation;
use crate::error::{ChatError, Result};
use crate::identity;
use crate::types::{derive_title, Conversation, Message};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    active_id: Option<String>,
}

fn parse_time(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active_id
            .as_deref()
            .and_then(|id| self.get(id))
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    pub fn find_by_session(&self, session_id: &str) -> Option<&Conversation> {
        self.conversations
            .iter()
            .find(|c| c.session_id.as_deref() == Some(session_id))
    }

    /// Create a provisional conversation and select it. The session id is
    /// generated eagerly so the first request can already carry it; the
    /// backend replaces the conversation id once it acknowledges.
    pub fn create(&mut self) -> (String, String) {
        let id = identity::provisional_conversation_id();
        let session_id = identity::new_session_id();
        let now = Utc::now();
        let conversation = Conversation {
            id: id.clone(),
            session_id: Some(session_id.clone()),
            title: "New Chat".to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.conversations.insert(0, conversation);
        self.active_id = Some(id.clone());
        (id, session_id)
    }

    pub fn select(&mut self, id: &str) -> Result<()> {
        if self.get(id).is_none() {
            return Err(ChatError::UnknownConversation(id.to_string()));
        }
        self.active_id = Some(id.to_string());
        Ok(())
    }

    /// Drop the active pointer; the next send creates a fresh conversation
    pub fn clear_active(&mut self) {
        self.active_id = None;
    }

    /// Select the first conversation when nothing is selected yet (initial
    /// listing load only; later merges must not steal the selection)
    pub fn select_first_if_none(&mut self) {
        if self.active_id.is_none() {
            if let Some(first) = self.conversations.first() {
                self.active_id = Some(first.id.clone());
            }
        }
    }

    /// Append a message. An unknown id is a defect in the caller's
    /// bookkeeping and is surfaced, not swallowed.
    pub fn append_message(&mut self, id: &str, message: Message) -> Result<()> {
        let conversation = self
            .get_mut(id)
            .ok_or_else(|| ChatError::UnknownConversation(id.to_string()))?;
        if conversation.messages.is_empty() {
            conversation.title = derive_title(&message.content);
        }
        conversation.messages.push(message);
        conversation.updated_at = Utc::now();
        Ok(())
    }

    /// Replace a conversation's messages with hydrated history
    pub fn replace_messages(&mut self, id: &str, messages: Vec<Message>) -> Result<()> {
        let conversation = self
            .get_mut(id)
            .ok_or_else(|| ChatError::UnknownConversation(id.to_string()))?;
        conversation.messages = messages;
        Ok(())
    }

    pub fn rename(&mut self, id: &str, title: &str) -> Result<()> {
        let conversation = self
            .get_mut(id)
            .ok_or_else(|| ChatError::UnknownConversation(id.to_string()))?;
        conversation.title = title.to_string();
        conversation.updated_at = Utc::now();
        Ok(())
    }

    /// Remove a conversation (optimistic: no backend acknowledgment is
    /// awaited). Returns the removed record so the caller can issue the
    /// backend delete when a session id exists.
    pub fn delete(&mut self, id: &str) -> Option<Conversation> {
        let pos = self.conversations.iter().position(|c| c.id == id)?;
        let removed = self.conversations.remove(pos);
        if self.active_id.as_deref() == Some(id) {
            self.active_id = None;
        }
        Some(removed)
    }

    /// Rewrite a conversation's identifiers once the backend reveals
    /// authoritative values. Idempotent: repeating the same mapping is a
    /// no-op. A mapping that matches no conversation (already deleted, or
    /// a reply for a conversation this store never held) is logged and
    /// ignored.
    pub fn promote(&mut self, old_id: &str, session_id: &str, new_id: Option<&str>) {
        let resolved = if self.get(old_id).is_some() {
            Some(old_id)
        } else {
            // Second application of the same mapping: the conversation
            // already lives under its promoted id.
            new_id.filter(|id| self.get(id).is_some())
        };

        let Some(found_id) = resolved.map(str::to_string) else {
            warn!(
                "Promotion target not found (old id {}, new id {:?})",
                old_id, new_id
            );
            return;
        };

        let promoted_id = new_id.unwrap_or(old_id).to_string();
        if let Some(conversation) = self.get_mut(&found_id) {
            conversation.session_id = Some(session_id.to_string());
            conversation.id = promoted_id.clone();
        }
        if self.active_id.as_deref() == Some(old_id) && promoted_id != old_id {
            debug!("Active conversation promoted {} -> {}", old_id, promoted_id);
            self.active_id = Some(promoted_id);
        }
    }

    /// Reconcile against the backend's authoritative listing.
    ///
    /// The listing never includes message bodies, so each remote record is
    /// resolved against an existing local conversation (by id first, then
    /// session id) and the local messages carry over. The remote list is
    /// authoritative for existence, order and titles of everything else.
    ///
    /// `preserve_id` names the conversation most recently touched by the
    /// current turn. The backend's listing index can lag a just-created or
    /// just-renamed conversation; if the preserved conversation is missing
    /// from the listing it is prepended unchanged from the pre-merge state
    /// rather than allowed to disappear. Falls back to the active
    /// conversation when no id is given.
    pub fn merge_remote_listing(
        &mut self,
        remote: Vec<RemoteConversation>,
        preserve_id: Option<&str>,
    ) {
        let mut mapped: Vec<Conversation> = {
            // Two-key index into the pre-merge state. Session-id entries
            // are inserted first so an id entry wins when both would match.
            let mut existing: HashMap<&str, &Conversation> = HashMap::new();
            for c in &self.conversations {
                if let Some(sid) = c.session_id.as_deref() {
                    existing.insert(sid, c);
                }
            }
            for c in &self.conversations {
                existing.insert(c.id.as_str(), c);
            }

            remote
                .iter()
                .map(|record| {
                    let backend_id = record.id_string();
                    let matched = existing.get(backend_id.as_str()).copied().or_else(|| {
                        record
                            .session_id
                            .as_deref()
                            .and_then(|sid| existing.get(sid).copied())
                    });
                    Conversation {
                        id: backend_id,
                        session_id: record.session_id.clone(),
                        title: record.title.clone(),
                        messages: matched.map(|c| c.messages.clone()).unwrap_or_default(),
                        created_at: parse_time(record.created_at.as_deref()),
                        updated_at: parse_time(record.last_activity.as_deref()),
                    }
                })
                .collect()
        };

        let id_to_preserve = preserve_id.or(self.active_id.as_deref()).map(str::to_string);
        if let Some(keep) = id_to_preserve {
            if let Some(kept) = self.get(&keep).cloned() {
                let by_id = mapped.iter().any(|c| c.id == keep);
                // The listing may already hold this conversation under its
                // backend id while we still track the provisional one; a
                // session-id match counts as present (prepending would
                // duplicate the session).
                let absorbed_as = if by_id {
                    None
                } else {
                    kept.session_id.as_deref().and_then(|sid| {
                        mapped
                            .iter()
                            .find(|c| c.session_id.as_deref() == Some(sid))
                            .map(|c| c.id.clone())
                    })
                };

                match (by_id, absorbed_as) {
                    (true, _) => {}
                    (false, Some(new_id)) => {
                        // Absorbed under its backend id: keep the active
                        // pointer on the same conversation.
                        if self.active_id.as_deref() == Some(keep.as_str()) {
                            debug!("Listing absorbed active {} as {}", keep, new_id);
                            self.active_id = Some(new_id);
                        }
                    }
                    (false, None) => {
                        debug!("Listing lag: preserving conversation {}", keep);
                        mapped.insert(0, kept);
                    }
                }
            }
        }

        self.conversations = mapped;
    }
}
