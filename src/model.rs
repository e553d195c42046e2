//! Conversation data model and the values a streaming session produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::StreamError;

/// Role of the message sender.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name of the role, as sent to the chat-completion endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single turn in a conversation.
///
/// Only the assistant message currently being streamed into is mutated, and
/// only by appending to `text`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message with a fresh id, stamped with the current time.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

/// Ordered list of messages plus a title and creation time.
///
/// Insertion order is conversation order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            created_at: Utc::now(),
            messages: Vec::new(),
        }
    }

    /// Append a message and return its id.
    pub fn push(&mut self, message: Message) -> Uuid {
        let id = message.id;
        self.messages.push(message);
        id
    }

    /// Builder-style variant of [`Conversation::push`].
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn message(&self, id: Uuid) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn message_mut(&mut self, id: Uuid) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Append a streamed fragment to the message with the given id.
    ///
    /// Returns `false` when no such message exists.
    pub fn apply_delta(&mut self, id: Uuid, delta: &ContentDelta) -> bool {
        match self.message_mut(id) {
            Some(message) => {
                message.text.push_str(delta.as_str());
                true
            }
            None => false,
        }
    }

    /// Keep the partial reply and append a description of the failure.
    pub fn annotate_failure(&mut self, id: Uuid, error: &StreamError) -> bool {
        match self.message_mut(id) {
            Some(message) => {
                if !message.text.is_empty() {
                    message.text.push_str("\n\n");
                }
                message.text.push_str(&format!("[error: {}]", error));
                true
            }
            None => false,
        }
    }
}

/// One decoded fragment of assistant output text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDelta(pub String);

impl ContentDelta {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for ContentDelta {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ContentDelta {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Terminal state of a streaming session.
#[derive(Debug)]
pub enum StreamOutcome {
    /// The `[DONE]` sentinel was seen, or the transport closed a successful response.
    Completed,
    Failed(StreamError),
    /// Requested by the consumer. Not a failure.
    Cancelled,
}

impl StreamOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StreamOutcome::Completed)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StreamOutcome::Cancelled)
    }

    pub fn error(&self) -> Option<&StreamError> {
        match self {
            StreamOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Item produced by a [`StreamSession`](crate::session::StreamSession).
///
/// Any number of `Delta`s followed by exactly one `Finished`.
#[derive(Debug)]
pub enum StreamEvent {
    Delta(ContentDelta),
    Finished(StreamOutcome),
}
