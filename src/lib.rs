//! # chatstream - Streaming chat-completion client
//!
//! A small library that sends a conversation to an OpenAI-style
//! chat-completion endpoint and hands the reply back as it is generated.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Incremental Server-Sent Events decoding, tolerant of arbitrary chunk boundaries
//! - Cancellable sessions that release the connection on every exit path
//! - Pluggable transport for testing and alternative HTTP stacks
//!
//! ## Architecture
//!
//! - **`StreamRequest`** ([`request`]): immutable request body built from a conversation
//! - **`SseDecoder`** ([`sse`]): turns raw body bytes into content deltas or the `[DONE]` sentinel
//! - **`StreamSession`** ([`session`]): owns one request/response exchange and yields
//!   [`StreamEvent`]s until a terminal [`StreamOutcome`]
//!
//! ## Example
//! ```no_run
//! use futures::StreamExt;
//! use chatstream::client::ChatClient;
//! use chatstream::model::{Conversation, Message, StreamEvent};
//! use chatstream::options::{ModelOptions, SecretString, TransportOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credential = SecretString::from_env("OPENAI_API_KEY").unwrap_or_default();
//!     let client = ChatClient::new(
//!         ModelOptions::default().with_temperature(0.2),
//!         TransportOptions::default(),
//!         credential,
//!     )?;
//!
//!     let conversation = Conversation::new("demo").with_message(Message::user("Hello!"));
//!
//!     let mut session = client.stream(&conversation)?;
//!     while let Some(event) = session.next().await {
//!         match event {
//!             StreamEvent::Delta(delta) => print!("{}", delta.as_str()),
//!             StreamEvent::Finished(outcome) => println!("\n{:?}", outcome),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;
pub mod model;
pub mod options;
pub mod request;
pub mod session;
pub mod sse;

// Re-exports for convenience
pub use client::{ChatClient, ErrorKind, StreamError};
pub use model::{ContentDelta, Conversation, Message, Role, StreamEvent, StreamOutcome};
pub use request::StreamRequest;
pub use session::{open_stream, CancelHandle, SessionState, StreamSession};
