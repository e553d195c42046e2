//! Construction of the chat-completion request body.
//!
//! A [`StreamRequest`] is built once per send action from a conversation and
//! the model options, and is immutable afterwards.

use nonempty::NonEmpty;
use serde::Serialize;

use crate::client::StreamError;
use crate::model::{Conversation, Message, Role};
use crate::options::ModelOptions;

/// One `(role, content)` pair of the outbound message list.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.text.clone(),
        }
    }
}

/// Immutable request descriptor, serialized as the POST body.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StreamRequest {
    model: String,
    messages: NonEmpty<ChatMessage>,
    temperature: f32,
    stream: bool,
}

impl StreamRequest {
    /// Build a request from a conversation.
    ///
    /// Fails with `InvalidInput` if the conversation has no messages or the
    /// temperature is not finite. Out-of-range finite temperatures are passed
    /// through unchanged.
    pub fn build(conversation: &Conversation, options: &ModelOptions) -> Result<Self, StreamError> {
        Self::from_messages(&conversation.messages, &options.model, options.temperature)
    }

    pub fn from_messages(
        messages: &[Message],
        model: &str,
        temperature: f32,
    ) -> Result<Self, StreamError> {
        if !temperature.is_finite() {
            return Err(StreamError::InvalidInput(format!(
                "temperature must be finite, got {}",
                temperature
            )));
        }

        let messages = NonEmpty::from_vec(messages.iter().map(ChatMessage::from).collect())
            .ok_or_else(|| StreamError::InvalidInput("conversation has no messages".to_string()))?;

        Ok(Self {
            model: model.to_string(),
            messages,
            temperature,
            stream: true,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn messages(&self) -> &NonEmpty<ChatMessage> {
        &self.messages
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Always true: only streaming responses are supported.
    pub fn stream(&self) -> bool {
        self.stream
    }
}
