/// Filewise — client core for an AI file-assistant chat
///
/// Conversation state, webhook backend client, reply classification, and
/// per-turn sync orchestration. The backend is the source of truth; this
/// crate's job is to keep locally-optimistic state consistent with it
/// across asynchronous, out-of-order responses.

pub mod backend;
pub mod classifier;
pub mod cli_app;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod identity;
pub mod store;
pub mod types;

pub use backend::{Backend, BackendClient};
pub use config::Config;
pub use coordinator::SyncCoordinator;
pub use error::{ChatError, Result};
pub use store::ConversationStore;
