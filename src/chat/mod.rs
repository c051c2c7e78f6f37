pub(crate) mod http;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::conversation::{Conversation, Turn};

/// Placeholder answer when a successful body lacks `choices[0].message.content`.
pub const MISSING_ANSWER: &str = "N/A";

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub messages: [&'a Turn; 2],
}

impl<'a> From<&'a Conversation> for ChatRequest<'a> {
    fn from(conversation: &'a Conversation) -> Self {
        Self {
            messages: conversation.turns(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatReply {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("timeout")]
    Timeout,
    #[error("{0}")]
    Request(String),
}

/// One POST to the chat-completions endpoint.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn post(&self, request: &ChatRequest<'_>) -> Result<ChatReply, TransportError>;
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for &T {
    async fn post(&self, request: &ChatRequest<'_>) -> Result<ChatReply, TransportError> {
        (**self).post(request).await
    }
}

/// Pulls the answer text out of a decoded success body.
///
/// Returns `Err` with a description of what was missing when the body does
/// not have the expected shape.
pub fn extract_answer(body: &serde_json::Value) -> Result<String, String> {
    let content = body
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"));

    match content {
        Some(serde_json::Value::String(text)) => Ok(text.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(describe_missing(body)),
    }
}

fn describe_missing(body: &serde_json::Value) -> String {
    let Some(choices) = body.get("choices") else {
        return "missing key 'choices'".to_owned();
    };
    let Some(first) = choices.get(0) else {
        return "no entry at choices[0]".to_owned();
    };
    let Some(message) = first.get("message") else {
        return "missing key 'message'".to_owned();
    };
    match message.get("content") {
        Some(_) => "unexpected response shape".to_owned(),
        None => "missing key 'content'".to_owned(),
    }
}
