//! Streaming chat example.
//!
//! Run with:
//! ```bash
//! export OPENAI_API_KEY="your-api-key"
//! RUST_LOG=chatstream=debug cargo run --example stream_chat -- "Write a haiku about Rust."
//! ```

use std::io::Write;

use chatstream::client::ChatClient;
use chatstream::model::{Conversation, Message, StreamEvent, StreamOutcome};
use chatstream::options::{ModelOptions, SecretString, TransportOptions};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // A missing key is reported by the session itself.
    let credential = SecretString::from_env("OPENAI_API_KEY").unwrap_or_default();

    let mut transport_options =
        TransportOptions::default().with_timeout(std::time::Duration::from_secs(60));
    if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
        transport_options = transport_options.with_base_url(base_url);
    }

    let model_options = ModelOptions::default().with_temperature(0.9);
    let client = ChatClient::new(model_options, transport_options, credential)?;

    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Write a haiku about Rust programming.".to_string());

    let mut conversation = Conversation::new("demo")
        .with_message(Message::system("You are a concise assistant."))
        .with_message(Message::user(prompt));

    let mut session = client.stream(&conversation)?;
    let reply_id = conversation.push(Message::assistant(""));

    print!("Response: ");
    while let Some(event) = session.next().await {
        match event {
            StreamEvent::Delta(delta) => {
                print!("{}", delta.as_str());
                std::io::stdout().flush()?;
                conversation.apply_delta(reply_id, &delta);
            }
            StreamEvent::Finished(StreamOutcome::Completed) => {
                println!("\n\n=== Stream Complete ===");
            }
            StreamEvent::Finished(StreamOutcome::Cancelled) => {
                println!("\n\n=== Stream Cancelled ===");
            }
            StreamEvent::Finished(StreamOutcome::Failed(e)) => {
                eprintln!("\nError in stream: {}", e);
                conversation.annotate_failure(reply_id, &e);
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&conversation)?);
    Ok(())
}
