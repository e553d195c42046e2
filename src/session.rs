//! Cancellable streaming session over one chat-completion request.
//!
//! A driver task owns the connection: it sends the request, feeds the body
//! through the SSE decoder and pushes [`StreamEvent`]s into a bounded channel.
//! The consumer pulls events through the [`Stream`] impl on [`StreamSession`].
//! Cancellation aborts the driver task, which drops the response body and so
//! releases the connection instead of draining it.

use futures::future::{AbortHandle, AbortRegistration, Abortable};
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::client::StreamError;
use crate::http::{error_message, Transport};
use crate::model::{StreamEvent, StreamOutcome};
use crate::options::SecretString;
use crate::request::StreamRequest;
use crate::sse::{SseFrame, SseStreamExt};

/// Deltas buffered between the driver task and the consumer.
const EVENT_BUFFER: usize = 32;

/// Lifecycle of a [`StreamSession`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::Cancelled
        )
    }
}

/// Cancels a session from anywhere, including other tasks.
///
/// Cancelling is idempotent and never fails.
#[derive(Debug, Clone)]
pub struct CancelHandle(AbortHandle);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_aborted()
    }
}

/// One request/response exchange, consumed as a stream of [`StreamEvent`]s.
///
/// Yields any number of [`StreamEvent::Delta`] in arrival order, then exactly
/// one [`StreamEvent::Finished`], then `None`. A session is never restarted;
/// open a new one to retry. Dropping a session cancels it.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use futures::StreamExt;
/// use chatstream::http::HttpTransport;
/// use chatstream::model::{Conversation, Message, StreamEvent};
/// use chatstream::options::{ModelOptions, TransportOptions};
/// use chatstream::request::StreamRequest;
/// use chatstream::session::open_stream;
///
/// # async fn run() -> Result<(), chatstream::StreamError> {
/// let transport = Arc::new(HttpTransport::new(TransportOptions::default())?);
/// let conversation = Conversation::new("demo").with_message(Message::user("Hello"));
/// let request = StreamRequest::build(&conversation, &ModelOptions::default())?;
///
/// let mut session = open_stream(transport, request, "sk-...".into());
/// while let Some(event) = session.next().await {
///     match event {
///         StreamEvent::Delta(delta) => print!("{}", delta.as_str()),
///         StreamEvent::Finished(outcome) => println!("\n{:?}", outcome),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct StreamSession {
    state: SessionState,
    pending: Option<(Arc<dyn Transport>, StreamRequest, SecretString)>,
    early_outcome: Option<StreamOutcome>,
    events: Option<mpsc::Receiver<StreamEvent>>,
    abort: AbortHandle,
    registration: Option<AbortRegistration>,
}

/// Open a session and dispatch the request immediately.
///
/// An empty credential fails the session with
/// [`StreamError::MissingCredential`] without touching the transport. Must be
/// called within a Tokio runtime.
pub fn open_stream(
    transport: Arc<dyn Transport>,
    request: StreamRequest,
    credential: SecretString,
) -> StreamSession {
    let mut session = StreamSession::new(transport, request, credential);
    session.start();
    session
}

impl StreamSession {
    /// Create an idle session. Nothing is sent until [`start`](Self::start)
    /// is called or the session is first polled.
    pub fn new(transport: Arc<dyn Transport>, request: StreamRequest, credential: SecretString) -> Self {
        let (abort, registration) = AbortHandle::new_pair();
        Self {
            state: SessionState::Idle,
            pending: Some((transport, request, credential)),
            early_outcome: None,
            events: None,
            abort,
            registration: Some(registration),
        }
    }

    /// Dispatch the request on a background task. No-op unless idle.
    pub fn start(&mut self) {
        if self.state != SessionState::Idle {
            return;
        }
        let (Some((transport, request, credential)), Some(registration)) =
            (self.pending.take(), self.registration.take())
        else {
            return;
        };

        self.state = SessionState::Streaming;

        if self.abort.is_aborted() {
            return;
        }

        if credential.is_empty() {
            warn!("no API credential configured, not sending request");
            self.early_outcome = Some(StreamOutcome::Failed(StreamError::MissingCredential));
            return;
        }

        debug!(
            model = request.model(),
            messages = request.messages().len(),
            "starting stream session"
        );

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let driver = Abortable::new(drive(transport, request, credential, tx), registration);
        tokio::spawn(async move {
            if driver.await.is_err() {
                debug!("stream session aborted, connection released");
            }
        });
        self.events = Some(rx);
    }

    /// Request cancellation. Idempotent; a no-op once the session finished.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.abort.clone())
    }

    /// Current lifecycle state.
    ///
    /// A pending cancellation reports `Cancelled` before the consumer has
    /// polled the final event.
    pub fn state(&self) -> SessionState {
        if !self.state.is_terminal() && self.abort.is_aborted() {
            SessionState::Cancelled
        } else {
            self.state
        }
    }

    /// Drain the session, concatenating every delta.
    ///
    /// Partial text is returned alongside a failure. If the session had
    /// already reported its outcome, `Cancelled` is returned.
    pub async fn collect_text(mut self) -> (String, StreamOutcome) {
        let mut text = String::new();
        while let Some(event) = self.next().await {
            match event {
                StreamEvent::Delta(delta) => text.push_str(delta.as_str()),
                StreamEvent::Finished(outcome) => return (text, outcome),
            }
        }
        (text, StreamOutcome::Cancelled)
    }

    fn finish(&mut self, outcome: StreamOutcome) -> StreamEvent {
        self.state = match &outcome {
            StreamOutcome::Completed => SessionState::Completed,
            StreamOutcome::Failed(_) => SessionState::Failed,
            StreamOutcome::Cancelled => SessionState::Cancelled,
        };
        self.pending = None;
        self.events = None;
        debug!(state = ?self.state, "stream session finished");
        StreamEvent::Finished(outcome)
    }
}

impl Stream for StreamSession {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        if this.state.is_terminal() {
            return Poll::Ready(None);
        }

        // Checked before the channel so in-flight deltas are never yielded
        // after a cancel.
        if this.abort.is_aborted() {
            return Poll::Ready(Some(this.finish(StreamOutcome::Cancelled)));
        }

        if this.state == SessionState::Idle {
            this.start();
        }

        if let Some(outcome) = this.early_outcome.take() {
            return Poll::Ready(Some(this.finish(outcome)));
        }

        let Some(events) = this.events.as_mut() else {
            return Poll::Ready(Some(this.finish(StreamOutcome::Cancelled)));
        };

        let event = match ready!(events.poll_recv(cx)) {
            Some(StreamEvent::Delta(delta)) => StreamEvent::Delta(delta),
            Some(StreamEvent::Finished(outcome)) => this.finish(outcome),
            None if this.abort.is_aborted() => this.finish(StreamOutcome::Cancelled),
            None => this.finish(StreamOutcome::Failed(StreamError::Network(
                "stream task ended without an outcome".into(),
            ))),
        };

        Poll::Ready(Some(event))
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

/// Driver task body: always ends by sending exactly one `Finished` event,
/// unless aborted first.
async fn drive(
    transport: Arc<dyn Transport>,
    request: StreamRequest,
    credential: SecretString,
    tx: mpsc::Sender<StreamEvent>,
) {
    let outcome = match run(transport.as_ref(), &request, &credential, &tx).await {
        Ok(()) => StreamOutcome::Completed,
        Err(e) => {
            warn!(error = %e, "stream session failed");
            StreamOutcome::Failed(e)
        }
    };
    let _ = tx.send(StreamEvent::Finished(outcome)).await;
}

async fn run(
    transport: &dyn Transport,
    request: &StreamRequest,
    credential: &SecretString,
    tx: &mpsc::Sender<StreamEvent>,
) -> Result<(), StreamError> {
    let response = transport.send(request, credential).await?;

    if !response.is_success() {
        let status = response.status;
        let message = error_message(&response.text().await);
        return Err(StreamError::BadStatus { status, message });
    }

    let frames = response.body.sse_frames();
    futures::pin_mut!(frames);

    while let Some(frame) = frames.next().await {
        match frame? {
            SseFrame::Delta(delta) => {
                if tx.send(StreamEvent::Delta(delta)).await.is_err() {
                    // Consumer is gone.
                    return Ok(());
                }
            }
            SseFrame::Done => return Ok(()),
        }
    }

    // Successful response closed without the sentinel.
    Ok(())
}
