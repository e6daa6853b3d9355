/// Per-turn sync orchestration
///
/// Drives one user turn end to end: optimistic user-message append, the
/// single send-turn request, reply classification, identifier promotion,
/// assistant-message append, and the terminal listing refresh. Also owns
/// the optimistic select/rename/delete flows ("optimistic, no
/// compensation": local state mutates first and is never rolled back when
/// the backend call fails — the failure only surfaces to the caller).
use crate::backend::{Backend, BackendMessage};
use crate::classifier;
use crate::error::{ChatError, Result};
use crate::identity;
use crate::store::ConversationStore;
use crate::types::{FileAttachment, Message, MessageData, Role};
use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

pub const MSG_TRANSPORT_ERROR: &str =
    "Sorry, I encountered an error communicating with the server. Please try again.";

pub struct SyncCoordinator<B: Backend> {
    store: ConversationStore,
    backend: B,
    user_id: String,
    /// At most one outstanding turn; a second submit is rejected, not queued
    turn_in_flight: bool,
    initial_load_done: bool,
}

impl<B: Backend> SyncCoordinator<B> {
    pub fn new(backend: B, user_id: String) -> Self {
        Self {
            store: ConversationStore::new(),
            backend,
            user_id,
            turn_in_flight: false,
            initial_load_done: false,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn is_turn_in_flight(&self) -> bool {
        self.turn_in_flight
    }

    /// Clear the active pointer. The conversation itself is created on the
    /// first send, not here.
    pub fn new_conversation(&mut self) {
        self.store.clear_active();
    }

    /// Fetch the authoritative listing and merge it. Listing failures are
    /// logged, never surfaced as errors: a lagging index must not break a
    /// turn that already completed.
    pub async fn refresh_conversations(&mut self, preserve_id: Option<&str>) {
        match self.backend.list_conversations().await {
            Ok(Some(remote)) => {
                self.store.merge_remote_listing(remote, preserve_id);
            }
            Ok(None) => debug!("Listing returned no data"),
            Err(e) => warn!("Failed to fetch conversations: {}", e),
        }

        // First load only: select the top conversation and hydrate it
        if !self.initial_load_done {
            self.initial_load_done = true;
            self.store.select_first_if_none();
            if let Some(id) = self.store.active_id().map(str::to_string) {
                if let Err(e) = self.hydrate(&id).await {
                    warn!("Failed to load history for {}: {}", id, e);
                }
            }
        }
    }

    /// Select a conversation, loading its history from the backend when a
    /// session id is known and no messages are held locally yet
    pub async fn select_conversation(&mut self, id: &str) -> Result<()> {
        self.store.select(id)?;
        self.hydrate(id).await
    }

    async fn hydrate(&mut self, id: &str) -> Result<()> {
        let session_id = match self.store.get(id) {
            Some(c) if c.messages.is_empty() => match &c.session_id {
                Some(sid) => sid.clone(),
                None => return Ok(()),
            },
            _ => return Ok(()),
        };

        if let Some(history) = self.backend.conversation_history(&session_id).await? {
            let messages = history
                .iter()
                .enumerate()
                .map(|(index, m)| map_history_message(index, m))
                .collect();
            self.store.replace_messages(id, messages)?;
        }
        Ok(())
    }

    /// Run one user turn. Rejected outright when empty or when another
    /// turn is still unresolved. A transport failure does not return an
    /// error: it degrades to a synthetic assistant apology in the
    /// conversation, and the terminal listing refresh still runs.
    pub async fn send_message(&mut self, content: &str, files: Vec<FileAttachment>) -> Result<()> {
        if content.trim().is_empty() && files.is_empty() {
            return Err(ChatError::EmptySubmit);
        }
        if self.turn_in_flight {
            return Err(ChatError::TurnInProgress);
        }

        self.turn_in_flight = true;
        let final_id = self.run_turn(content, files).await;
        // Terminal step, success or failure: refresh titles/order without
        // losing the (possibly just-promoted) active conversation.
        match final_id {
            Ok(id) => {
                self.refresh_conversations(Some(&id)).await;
                self.turn_in_flight = false;
                Ok(())
            }
            Err(e) => {
                self.turn_in_flight = false;
                Err(e)
            }
        }
    }

    /// Returns the conversation's final id: promoted when the reply
    /// revealed authoritative identifiers, the captured one otherwise
    async fn run_turn(&mut self, content: &str, files: Vec<FileAttachment>) -> Result<String> {
        // Ensure an active conversation before the network call so the
        // user message is visible immediately. The eagerly generated
        // session id is carried into the request directly: the store holds
        // it too, but a fresh lookup would not be needed for the first
        // turn anyway.
        let (conversation_id, eager_session_id) = match self.store.active_id() {
            Some(id) => (id.to_string(), None),
            None => {
                let (id, session_id) = self.store.create();
                (id, Some(session_id))
            }
        };

        let user_message =
            Message::user(identity::message_id(), content.to_string(), files.clone());
        self.store.append_message(&conversation_id, user_message)?;

        let session_id = eager_session_id.or_else(|| {
            self.store
                .get(&conversation_id)
                .and_then(|c| c.session_id.clone())
        });

        let reply = self
            .backend
            .send_turn(content, &files, session_id.as_deref(), &self.user_id)
            .await;

        match reply {
            Ok(raw) => {
                // Promote before building the assistant message, so the
                // append matches the conversation under its new id.
                let mut final_id = conversation_id.clone();
                if let Some(revealed) = classifier::extract_identity(&raw) {
                    self.store.promote(
                        &conversation_id,
                        &revealed.session_id,
                        revealed.id.as_deref(),
                    );
                    if let Some(new_id) = revealed.id {
                        final_id = new_id;
                    }
                }

                let classified = classifier::classify(&raw);
                let assistant = Message::assistant(
                    identity::message_id(),
                    classified.content,
                    classified.data,
                );
                self.store.append_message(&final_id, assistant)?;
                Ok(final_id)
            }
            Err(e) => {
                error!("Send turn failed: {}", e);
                let apology = Message::assistant(
                    identity::message_id(),
                    MSG_TRANSPORT_ERROR.to_string(),
                    None,
                );
                // Keyed by the captured id: the user may have navigated
                // away meanwhile, and that is fine.
                self.store.append_message(&conversation_id, apology)?;
                Ok(conversation_id)
            }
        }
    }

    /// Optimistic rename: the local title changes immediately; the backend
    /// call is only issued when a session id exists, and its failure does
    /// not revert the local change
    pub async fn rename_conversation(&mut self, id: &str, title: &str) -> Result<Option<String>> {
        self.store.rename(id, title)?;

        let session_id = self.store.get(id).and_then(|c| c.session_id.clone());
        let Some(sid) = session_id else {
            return Ok(None);
        };

        let response = self.backend.rename_conversation(&sid, title).await?;
        if response.success {
            Ok(response.message)
        } else {
            Err(ChatError::Backend(
                response
                    .error
                    .unwrap_or_else(|| "Failed to rename conversation".to_string()),
            ))
        }
    }

    /// Optimistic delete: removed locally first; no backend call at all
    /// when the conversation never got a session id
    pub async fn delete_conversation(&mut self, id: &str) -> Result<Option<String>> {
        let removed = self
            .store
            .delete(id)
            .ok_or_else(|| ChatError::UnknownConversation(id.to_string()))?;

        let Some(sid) = removed.session_id else {
            return Ok(None);
        };

        let response = self.backend.delete_conversation(&sid).await?;
        if response.success {
            Ok(response.message)
        } else {
            Err(ChatError::Backend(
                response
                    .error
                    .unwrap_or_else(|| "Failed to delete conversation".to_string()),
            ))
        }
    }
}

fn map_history_message(index: usize, msg: &BackendMessage) -> Message {
    let role = if msg.role == "assistant" {
        Role::Assistant
    } else {
        Role::User
    };
    let data: Option<MessageData> = classifier::classify_history(msg);
    let timestamp = msg
        .timestamp
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    Message {
        id: format!("hist-{}-{}", index, identity::message_id()),
        role,
        content: msg.content.clone(),
        timestamp,
        files: Vec::new(),
        data,
    }
}
