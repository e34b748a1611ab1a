//! text/event-stream framing for normalized chat events.
//!
//! ```rust
//! use qchat::{ChatEvent, encode_frame};
//!
//! let frame = encode_frame(&ChatEvent::Chunk { text: "hi".into() }).expect("encodable");
//! assert_eq!(frame, "data: {\"type\":\"chunk\",\"text\":\"hi\"}\n\n");
//! ```

use crate::{ChatError, ChatEvent};

/// Encodes one event as a `data: {json}\n\n` frame, the wire convention
/// the API layer forwards to chat clients.
pub fn encode_frame(event: &ChatEvent) -> Result<String, ChatError> {
    let json = serde_json::to_string(event).map_err(|err| {
        ChatError::pipeline_critical(format!("failed to encode stream event: {err}"))
    })?;

    Ok(format!("data: {json}\n\n"))
}
