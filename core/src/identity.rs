/// Local identifier generation
///
/// Conversations and messages get provisional, time-based ids before the
/// backend has assigned authoritative ones. Session ids are generated
/// eagerly at conversation-creation time so the very first request can
/// already carry one.
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Last issued time-based id. Ensures strict monotonicity even when two
/// ids are requested within the same millisecond.
static LAST_ID: AtomicU64 = AtomicU64::new(0);

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Next strictly monotonic millisecond reading
fn monotonic_millis() -> u64 {
    let now = now_millis();
    let mut last = LAST_ID.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_ID.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(observed) => last = observed,
        }
    }
}

/// Provisional conversation id, valid until the backend reveals a real one.
/// Locally unique only; not meant to survive the session.
pub fn provisional_conversation_id() -> String {
    monotonic_millis().to_string()
}

/// Locally unique message id
pub fn message_id() -> String {
    monotonic_millis().to_string()
}

/// Backend-facing session correlation key: "session-" + UUID v4
pub fn new_session_id() -> String {
    format!("session-{}", Uuid::new_v4())
}
