//! Error taxonomy and the `ChatClient` convenience facade.

use std::sync::Arc;
use thiserror::Error;

use crate::http::{HttpTransport, Transport};
use crate::model::{Conversation, StreamOutcome};
use crate::options::{ModelOptions, SecretString, TransportOptions};
use crate::request::StreamRequest;
use crate::session::{open_stream, StreamSession};

/// Boxed transport-level error source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that end a streaming request.
///
/// Cancellation is not an error; see [`StreamOutcome::Cancelled`].
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No API credential configured")]
    MissingCredential,

    #[error("HTTP {status}: {message}")]
    BadStatus { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[source] BoxError),

    #[error("JSON parse error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for StreamError {
    fn from(e: reqwest::Error) -> Self {
        StreamError::Network(Box::new(e))
    }
}

/// Fieldless mirror of [`StreamError`] for matching and diagnostics.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    MissingCredential,
    BadStatus(u16),
    NetworkError,
    DecodeError,
}

impl StreamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StreamError::InvalidInput(_) => ErrorKind::InvalidInput,
            StreamError::MissingCredential => ErrorKind::MissingCredential,
            StreamError::BadStatus { status, .. } => ErrorKind::BadStatus(*status),
            StreamError::Network(_) => ErrorKind::NetworkError,
            StreamError::Decode(_) => ErrorKind::DecodeError,
        }
    }
}

/// Chat-completion client holding the model settings, the credential and a
/// transport.
///
/// # Example
/// ```no_run
/// use chatstream::client::ChatClient;
/// use chatstream::model::{Conversation, Message};
/// use chatstream::options::{ModelOptions, TransportOptions};
///
/// # async fn run() -> Result<(), chatstream::StreamError> {
/// let client = ChatClient::new(
///     ModelOptions::default(),
///     TransportOptions::default(),
///     "sk-...".into(),
/// )?;
///
/// let conversation = Conversation::new("demo").with_message(Message::user("Hello"));
/// let reply = client.chat(&conversation).await?;
/// println!("{}", reply);
/// # Ok(())
/// # }
/// ```
pub struct ChatClient<T: Transport = HttpTransport> {
    model_options: ModelOptions,
    credential: SecretString,
    transport: Arc<T>,
}

impl ChatClient<HttpTransport> {
    /// Create a client backed by the reqwest transport.
    pub fn new(
        model_options: ModelOptions,
        transport_options: TransportOptions,
        credential: SecretString,
    ) -> Result<Self, StreamError> {
        let transport = HttpTransport::new(transport_options)?;
        Ok(Self::with_transport(model_options, credential, transport))
    }
}

impl<T: Transport> ChatClient<T> {
    /// Create a client over any transport.
    pub fn with_transport(model_options: ModelOptions, credential: SecretString, transport: T) -> Self {
        Self {
            model_options,
            credential,
            transport: Arc::new(transport),
        }
    }

    pub fn model_options(&self) -> &ModelOptions {
        &self.model_options
    }

    pub fn set_model_options(&mut self, model_options: ModelOptions) {
        self.model_options = model_options;
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Build the request for a conversation with the client's settings.
    pub fn build_request(&self, conversation: &Conversation) -> Result<StreamRequest, StreamError> {
        StreamRequest::build(conversation, &self.model_options)
    }

    /// Open a streaming session for a conversation.
    ///
    /// Invalid input is reported here; every later failure arrives through the
    /// session as [`StreamOutcome::Failed`]. Must be called within a Tokio
    /// runtime.
    pub fn stream(&self, conversation: &Conversation) -> Result<StreamSession, StreamError> {
        let request = self.build_request(conversation)?;
        Ok(open_stream(
            self.transport.clone(),
            request,
            self.credential.clone(),
        ))
    }

    /// Stream a reply to completion and return the full text.
    pub async fn chat(&self, conversation: &Conversation) -> Result<String, StreamError> {
        let (text, outcome) = self.stream(conversation)?.collect_text().await;
        match outcome {
            StreamOutcome::Failed(e) => Err(e),
            StreamOutcome::Completed | StreamOutcome::Cancelled => Ok(text),
        }
    }
}
