//! Redis-backed durable storage: envelope (de)serialization and key naming.
//!
//! Grounded on `original_source/app/core/context_store.py`'s
//! `_serialize_context`/`_deserialize_context`/`_get_redis_key`.

use super::model::ConversationContext;
use serde::{Deserialize, Serialize};

const COMPRESS_IF_OVER: usize = 10;
const KEEP_FULL_TAIL: usize = 20;
const COMPRESSED_CONTENT_CAP: usize = 500;

pub fn redis_key(conversation_id: &str) -> String {
    format!("conversation:{conversation_id}")
}

/// The on-the-wire envelope: the context plus a compression flag, matching
/// the `_compressed` sibling field the Python original stores alongside the
/// message array.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(default)]
    compressed: bool,
    context: ConversationContext,
}

/// Serialize a context to its durable JSON envelope, compressing older
/// messages when the history exceeds [`KEEP_FULL_TAIL`] and the caller has
/// compression enabled.
pub fn serialize_envelope(ctx: &ConversationContext, enable_compression: bool) -> String {
    let mut ctx = ctx.clone();
    let compressed = enable_compression && ctx.messages.len() > COMPRESS_IF_OVER;

    if compressed && ctx.messages.len() > KEEP_FULL_TAIL {
        let split_at = ctx.messages.len() - KEEP_FULL_TAIL;
        for msg in &mut ctx.messages[..split_at] {
            if msg.content.len() > COMPRESSED_CONTENT_CAP {
                msg.content.truncate(COMPRESSED_CONTENT_CAP);
            }
        }
    }

    let envelope = Envelope {
        compressed,
        context: ctx,
    };
    serde_json::to_string(&envelope).expect("ConversationContext envelope must serialize")
}

/// Deserialize a stored envelope. Any parse failure is treated as "missing"
/// by the caller, matching the read-path contract in §4.7.
pub fn deserialize_envelope(data: &str) -> Result<ConversationContext, serde_json::Error> {
    let envelope: Envelope = serde_json::from_str(data)?;
    Ok(envelope.context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Message, Role};

    #[test]
    fn round_trips_small_context() {
        let mut ctx = ConversationContext::new("c1".into());
        ctx.add_message(Message::new(Role::User, "hello"));
        let data = serialize_envelope(&ctx, true);
        let back = deserialize_envelope(&data).unwrap();
        assert_eq!(back.messages.len(), 1);
        assert_eq!(back.messages[0].content, "hello");
    }

    #[test]
    fn compresses_prefix_when_over_threshold() {
        let mut ctx = ConversationContext::new("c1".into());
        ctx.max_context_length = 1000;
        for i in 0..25 {
            ctx.add_message(Message::new(Role::User, "x".repeat(600) + &i.to_string()));
        }
        let data = serialize_envelope(&ctx, true);
        let back = deserialize_envelope(&data).unwrap();
        // Older messages (all but the last 20) were truncated to the cap.
        assert!(back.messages[0].content.len() <= COMPRESSED_CONTENT_CAP);
        // Most recent tail keeps full content.
        assert!(back.messages.last().unwrap().content.len() > COMPRESSED_CONTENT_CAP);
    }

    #[test]
    fn garbage_input_is_a_deserialize_error() {
        assert!(deserialize_envelope("not json").is_err());
    }

    #[test]
    fn key_namespacing() {
        assert_eq!(redis_key("abc"), "conversation:abc");
    }
}
