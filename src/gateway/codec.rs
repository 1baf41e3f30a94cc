//! Frame codec for the WebSocket chat protocol.
//!
//! Inbound: `{"conversationId": "...", "content": "..."}`.
//! Outbound: `{"type": "message", ...}` or `{"type": "error", "error": "..."}`.

use crate::{error::FrameError, upstream::MessageRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const PROCESSING_FAILED: &str = "Failed to process your message";
pub const TOO_MANY_IN_FLIGHT: &str = "Too many messages in progress";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundCommand {
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum OutboundFrame<'a> {
    #[serde(rename = "message", rename_all = "camelCase")]
    Message {
        conversation_id: &'a str,
        user_message: &'a MessageRecord,
        assistant_message: &'a MessageRecord,
    },
    #[serde(rename = "error")]
    Error { error: &'a str },
}

/// Parses a raw frame. A missing key decodes to an empty field and is left to [`validate`].
///
/// Only a JSON object is a command; derived struct decoding would also take a
/// positional array, so the object shape is checked first.
pub fn decode(raw: &[u8]) -> Result<InboundCommand, FrameError> {
    let object: Map<String, Value> = serde_json::from_slice(raw)?;
    Ok(serde_json::from_value(Value::Object(object))?)
}

pub fn validate(command: &InboundCommand) -> Result<(), FrameError> {
    if command.conversation_id.is_empty() {
        return Err(FrameError::MissingField("conversationId"));
    }
    if command.content.is_empty() {
        return Err(FrameError::MissingField("content"));
    }
    Ok(())
}

pub fn encode_success(
    conversation_id: &str,
    user_message: &MessageRecord,
    assistant_message: &MessageRecord,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&OutboundFrame::Message {
        conversation_id,
        user_message,
        assistant_message,
    })
}

pub fn encode_failure(message: &str) -> String {
    serde_json::to_string(&OutboundFrame::Error { error: message })
        .unwrap_or_else(|_| format!(r#"{{"type":"error","error":"{PROCESSING_FAILED}"}}"#))
}
