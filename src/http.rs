//! HTTP transport for the chat-completion endpoint.
//!
//! [`Transport`] is the seam between a streaming session and the network:
//! the session only needs a status code and a body byte stream. The
//! reqwest-backed [`HttpTransport`] is the production implementation.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::collections::HashMap;

use crate::client::StreamError;
use crate::options::{SecretString, TransportOptions};
use crate::request::StreamRequest;

/// Response head plus the body as a byte stream.
///
/// Dropping `body` releases the underlying connection.
pub struct TransportResponse {
    pub status: u16,
    pub body: BoxStream<'static, Result<Bytes, StreamError>>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Read the remaining body into a string, ignoring read failures.
    pub async fn text(mut self) -> String {
        let mut bytes = Vec::new();
        while let Some(Ok(chunk)) = self.body.next().await {
            bytes.extend_from_slice(&chunk);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Sends one streaming request and hands back the raw response.
///
/// Implementations must not read the body beyond the response head; the
/// session drives the body incrementally.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(
        &self,
        request: &StreamRequest,
        credential: &SecretString,
    ) -> Result<TransportResponse, StreamError>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    options: TransportOptions,
}

impl HttpTransport {
    pub fn new(options: TransportOptions) -> Result<Self, StreamError> {
        let client = build_http_client(&options)?;
        Ok(Self { client, options })
    }

    pub fn options(&self) -> &TransportOptions {
        &self.options
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &StreamRequest,
        credential: &SecretString,
    ) -> Result<TransportResponse, StreamError> {
        let url = self.options.endpoint();

        let authorization = HeaderValue::from_str(&format!("Bearer {}", credential.expose_secret()))
            .map_err(|_| StreamError::InvalidInput("Invalid API key".to_string()))?;

        let mut req = self
            .client
            .post(&url)
            .header(AUTHORIZATION, authorization)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream");

        req = add_extra_headers(req, &self.options.extra_headers);

        tracing::debug!(
            url = %url,
            model = request.model(),
            messages = request.messages().len(),
            "dispatching chat completion request"
        );

        let response = req.json(request).send().await?;
        let status = response.status().as_u16();

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(StreamError::from))
            .boxed();

        Ok(TransportResponse { status, body })
    }
}

/// Build a configured HTTP client from transport options.
///
/// This applies common configuration like timeouts and proxies.
pub fn build_http_client(transport_options: &TransportOptions) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder();

    if let Some(timeout) = transport_options.timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(proxy_url) = &transport_options.proxy {
        match reqwest::Proxy::all(proxy_url) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(e) => tracing::warn!("Ignoring invalid proxy {}: {}", proxy_url, e),
        }
    }

    builder.build()
}

/// Add extra headers to a request if specified in transport options.
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

/// Describe a non-success response body.
///
/// OpenAI-style error documents yield `"<type>: <message>"`; anything else is
/// returned as-is.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(resp) => match resp.error.error_type {
            Some(error_type) => format!("{}: {}", error_type, resp.error.message),
            None => resp.error.message,
        },
        Err(_) => body.trim().to_string(),
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: String,
}
