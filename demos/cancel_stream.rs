//! Cancels a streaming reply after a fixed number of fragments.
//!
//! Run with:
//! ```bash
//! export OPENAI_API_KEY="your-api-key"
//! cargo run --example cancel_stream
//! ```

use chatstream::client::ChatClient;
use chatstream::model::{Conversation, Message, StreamEvent};
use chatstream::options::{ModelOptions, SecretString, TransportOptions};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

const MAX_FRAGMENTS: usize = 10;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let credential = SecretString::from_env("OPENAI_API_KEY").unwrap_or_default();
    let client = ChatClient::new(ModelOptions::default(), TransportOptions::default(), credential)?;

    let conversation = Conversation::new("demo")
        .with_message(Message::user("Count slowly from one to one hundred."));

    let mut session = client.stream(&conversation)?;
    let cancel = session.cancel_handle();
    let mut fragments = 0;

    while let Some(event) = session.next().await {
        match event {
            StreamEvent::Delta(delta) => {
                print!("{}", delta.as_str());
                fragments += 1;
                if fragments == MAX_FRAGMENTS {
                    cancel.cancel();
                }
            }
            StreamEvent::Finished(outcome) => println!("\n\nOutcome: {:?}", outcome),
        }
    }

    println!("State: {:?}", session.state());
    Ok(())
}
