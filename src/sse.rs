//! Server-Sent Events (SSE) decoding for chat-completion streams.
//!
//! The endpoint answers with one JSON envelope per `data:` line and ends the
//! stream with a `[DONE]` sentinel:
//! ```text
//! data: {"choices":[{"delta":{"role":"assistant"}}]}
//!
//! data: {"choices":[{"delta":{"content":"Hi"}}]}
//!
//! data: [DONE]
//! ```
//!
//! Network chunks do not respect line boundaries, so [`SseDecoder`] buffers
//! bytes until a full `\n`-terminated line is available.

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use crate::client::StreamError;
use crate::model::ContentDelta;

/// A decoded, meaningful unit of the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    Delta(ContentDelta),
    /// The `[DONE]` sentinel. Nothing after it is decoded.
    Done,
}

/// Incremental, resumable decoder for chat-completion event streams.
///
/// Feed raw chunks with [`push`](SseDecoder::push) and drain frames with
/// [`next_frame`](SseDecoder::next_frame). Once the sentinel or a malformed
/// payload has been seen the decoder is finished and ignores further input.
///
/// # Example
/// ```
/// use chatstream::sse::{SseDecoder, SseFrame};
///
/// let mut decoder = SseDecoder::new();
/// decoder.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"H");
/// assert_eq!(decoder.next_frame().unwrap(), None);
///
/// decoder.push(b"i\"}}]}\n");
/// assert_eq!(decoder.next_frame().unwrap(), Some(SseFrame::Delta("Hi".into())));
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    /// Prefix of `buffer` already searched for a terminator.
    scanned: usize,
    finished: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an inbound chunk to the line buffer.
    pub fn push(&mut self, chunk: &[u8]) {
        if !self.finished {
            self.buffer.extend_from_slice(chunk);
        }
    }

    /// Decode the next frame from the complete lines buffered so far.
    ///
    /// Returns `Ok(None)` when more input is needed (or the decoder is
    /// finished). A trailing partial line is never decoded.
    pub fn next_frame(&mut self) -> Result<Option<SseFrame>, StreamError> {
        while !self.finished {
            let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') else {
                self.scanned = self.buffer.len();
                return Ok(None);
            };

            let pos = self.scanned + offset;
            let line = self.buffer.split_to(pos + 1);
            self.scanned = 0;
            let line = String::from_utf8_lossy(&line[..pos]);

            let Some(data) = parse_sse_line(&line) else {
                continue;
            };

            if data.is_empty() {
                continue;
            }

            if is_done_marker(data) {
                self.finish();
                return Ok(Some(SseFrame::Done));
            }

            match decode_content(data) {
                Ok(Some(content)) => {
                    tracing::trace!(len = content.len(), "decoded content delta");
                    return Ok(Some(SseFrame::Delta(ContentDelta(content))));
                }
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, len = data.len(), "parsing completion chunk failed");
                    tracing::debug!(payload = data, "unparsable completion chunk");
                    self.finish();
                    return Err(e.into());
                }
            }
        }

        Ok(None)
    }

    /// True once the sentinel or a decode failure has ended the stream.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bytes held back waiting for a line terminator.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn finish(&mut self) {
        self.finished = true;
        self.buffer.clear();
        self.scanned = 0;
    }
}

/// Extension trait turning a raw body stream into a stream of [`SseFrame`]s.
///
/// The resulting stream ends after yielding [`SseFrame::Done`], after the
/// first error, or when the body ends.
pub trait SseStreamExt {
    fn sse_frames(self) -> impl Stream<Item = Result<SseFrame, StreamError>> + Send;
}

impl<S> SseStreamExt for S
where
    S: Stream<Item = Result<Bytes, StreamError>> + Send + 'static,
{
    fn sse_frames(self) -> impl Stream<Item = Result<SseFrame, StreamError>> + Send {
        stream::unfold(
            (Box::pin(self), SseDecoder::new(), false),
            |(mut body, mut decoder, mut ended)| async move {
                loop {
                    if ended {
                        return None;
                    }

                    match decoder.next_frame() {
                        Ok(Some(frame)) => {
                            ended = frame == SseFrame::Done;
                            return Some((Ok(frame), (body, decoder, ended)));
                        }
                        Err(e) => return Some((Err(e), (body, decoder, true))),
                        Ok(None) => {}
                    }

                    match body.next().await {
                        Some(Ok(chunk)) => decoder.push(&chunk),
                        Some(Err(e)) => return Some((Err(e), (body, decoder, true))),
                        // Body closed; a trailing partial line is dropped.
                        None => return None,
                    }
                }
            },
        )
    }
}

/// Parse an SSE line to extract the data portion.
///
/// # Example
/// ```
/// use chatstream::sse::parse_sse_line;
///
/// assert_eq!(parse_sse_line("data: {\"key\": \"value\"}"), Some("{\"key\": \"value\"}"));
/// assert_eq!(parse_sse_line("data:[DONE]"), Some("[DONE]"));
/// assert_eq!(parse_sse_line("event: ping"), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(|s| s.trim())
}

/// Check if an SSE data payload is the end-of-stream sentinel.
///
/// # Example
/// ```
/// use chatstream::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(!is_done_marker("{\"data\": \"value\"}"));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data == "[DONE]"
}

/// Extract `choices[0].delta.content` from a data payload.
///
/// Missing or `null` envelope fields mean "no content"; only payloads that
/// are not JSON or carry wrongly typed fields are errors.
fn decode_content(data: &str) -> Result<Option<String>, serde_json::Error> {
    let envelope: ChunkEnvelope = serde_json::from_str(data)?;
    Ok(envelope
        .choices
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty()))
}

// --- Chat Completions Stream Types ---

#[derive(Debug, Deserialize)]
struct ChunkEnvelope {
    #[serde(default)]
    choices: Option<Vec<ChunkChoice>>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ErrorKind;

    const HI_LINE: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n";

    fn content_line(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"index": 0, "delta": {"content": content}}]})
        )
    }

    /// Feed every chunk and collect frames until the decoder stops or errors.
    fn decode(chunks: &[&[u8]]) -> (Vec<SseFrame>, Option<StreamError>) {
        let mut decoder = SseDecoder::new();
        let mut frames = Vec::new();
        for chunk in chunks {
            decoder.push(chunk);
            loop {
                match decoder.next_frame() {
                    Ok(Some(frame)) => frames.push(frame),
                    Ok(None) => break,
                    Err(e) => return (frames, Some(e)),
                }
            }
        }
        (frames, None)
    }

    fn text_of(frames: &[SseFrame]) -> String {
        frames
            .iter()
            .filter_map(|f| match f {
                SseFrame::Delta(d) => Some(d.as_str()),
                SseFrame::Done => None,
            })
            .collect()
    }

    #[test]
    fn test_parse_sse_line() {
        assert_eq!(parse_sse_line("data: hello"), Some("hello"));
        assert_eq!(parse_sse_line("data:hello"), Some("hello"));
        assert_eq!(parse_sse_line("data:   spaces  "), Some("spaces"));
        assert_eq!(parse_sse_line("data: x\r"), Some("x"));
        assert_eq!(parse_sse_line("id: 7"), None);
        assert_eq!(parse_sse_line(": keep-alive"), None);
        assert_eq!(parse_sse_line(""), None);
    }

    #[test]
    fn test_is_done_marker() {
        assert!(is_done_marker("[DONE]"));
        assert!(!is_done_marker(""));
        assert!(!is_done_marker("DONE"));
    }

    #[test]
    fn test_line_split_at_every_offset() {
        let bytes = HI_LINE.as_bytes();
        for split in 0..=bytes.len() {
            let (frames, err) = decode(&[&bytes[..split], &bytes[split..]]);
            assert!(err.is_none(), "split at {}", split);
            assert_eq!(
                frames,
                vec![SseFrame::Delta("Hi".into())],
                "split at {}",
                split
            );
        }
    }

    #[test]
    fn test_chunking_does_not_change_output() {
        let words = ["The", " quick", " brown", " fox", " & ", "jumps", " 🦀"];
        let body: String = words.iter().map(|w| content_line(w)).collect();
        let bytes = body.as_bytes();

        let (whole, _) = decode(&[bytes]);
        assert_eq!(text_of(&whole), words.concat());

        for size in [1, 2, 3, 7, 13, 64] {
            let chunks: Vec<&[u8]> = bytes.chunks(size).collect();
            let (frames, err) = decode(&chunks);
            assert!(err.is_none());
            assert_eq!(frames, whole, "chunk size {}", size);
        }
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let body = format!("{}{}data: [DONE]\n", content_line("a"), content_line("b"));
        let (frames, err) = decode(&[body.as_bytes()]);
        assert!(err.is_none());
        assert_eq!(
            frames,
            vec![
                SseFrame::Delta("a".into()),
                SseFrame::Delta("b".into()),
                SseFrame::Done
            ]
        );
    }

    #[test]
    fn test_done_stops_decoding() {
        let body = format!("data: [DONE]\n{}", content_line("late"));
        let mut decoder = SseDecoder::new();
        decoder.push(body.as_bytes());

        assert_eq!(decoder.next_frame().unwrap(), Some(SseFrame::Done));
        assert!(decoder.is_finished());
        assert_eq!(decoder.next_frame().unwrap(), None);

        decoder.push(content_line("later").as_bytes());
        assert_eq!(decoder.next_frame().unwrap(), None);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_malformed_payload_is_decode_error() {
        let body = format!("data: {{not valid json}}\n{}", content_line("after"));
        let (frames, err) = decode(&[body.as_bytes()]);
        assert!(frames.is_empty());
        assert_eq!(err.unwrap().kind(), ErrorKind::DecodeError);
    }

    #[test]
    fn test_wrong_envelope_shape_is_decode_error() {
        for payload in [
            &b"data: {\"choices\":\"oops\"}\n"[..],
            &b"data: {\"choices\":[{\"delta\":{\"content\":42}}]}\n"[..],
            &b"data: [1,2,3]\n"[..],
        ] {
            let (_, err) = decode(&[payload]);
            assert_eq!(err.unwrap().kind(), ErrorKind::DecodeError);
        }
    }

    #[test]
    fn test_decoder_halts_after_error() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"data: nope\n");
        assert!(decoder.next_frame().is_err());

        decoder.push(content_line("x").as_bytes());
        assert_eq!(decoder.next_frame().unwrap(), None);
    }

    #[test]
    fn test_role_only_delta_is_silent() {
        let (frames, err) = decode(&[
            b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n",
            b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n",
            b"data: {\"choices\":[]}\n",
        ]);
        assert!(err.is_none());
        assert!(frames.is_empty());
    }

    #[test]
    fn test_null_and_missing_envelope_fields_are_silent() {
        let body = format!(
            "{}{}{}{}{}data: [DONE]\n",
            "data: {\"choices\":[{\"delta\":null,\"finish_reason\":\"stop\"}]}\n",
            "data: {\"choices\":null,\"usage\":{\"prompt_tokens\":3}}\n",
            "data: {\"object\":\"chat.completion.chunk\",\"usage\":{}}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":null}}]}\n",
            content_line("still here"),
        );
        let (frames, err) = decode(&[body.as_bytes()]);
        assert!(err.is_none());
        assert_eq!(
            frames,
            vec![SseFrame::Delta("still here".into()), SseFrame::Done]
        );
    }

    #[test]
    fn test_long_line_in_tiny_chunks() {
        let content = "x".repeat(10_000);
        let line = content_line(&content);
        let mut decoder = SseDecoder::new();
        let mut frames = Vec::new();
        for byte in line.as_bytes().chunks(1) {
            decoder.push(byte);
            while let Some(frame) = decoder.next_frame().unwrap() {
                frames.push(frame);
            }
        }
        assert_eq!(frames, vec![SseFrame::Delta(content.into())]);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_non_data_and_empty_lines_are_ignored() {
        let body = format!(
            "event: message\nid: 1\n: comment\ndata: \ndata:\n\n{}",
            content_line("ok")
        );
        let (frames, err) = decode(&[body.as_bytes()]);
        assert!(err.is_none());
        assert_eq!(frames, vec![SseFrame::Delta("ok".into())]);
    }

    #[test]
    fn test_crlf_lines() {
        let (frames, err) = decode(&[b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\r\n\r\ndata: [DONE]\r\n"]);
        assert!(err.is_none());
        assert_eq!(frames, vec![SseFrame::Delta("Hi".into()), SseFrame::Done]);
    }

    #[test]
    fn test_trailing_partial_line_is_not_decoded() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}");
        assert_eq!(decoder.next_frame().unwrap(), None);
        assert!(!decoder.is_finished());
        assert!(decoder.buffered_len() > 0);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let line = content_line("héllo");
        let bytes = line.as_bytes();
        let split = line.find('é').unwrap() + 1;
        let (frames, err) = decode(&[&bytes[..split], &bytes[split..]]);
        assert!(err.is_none());
        assert_eq!(text_of(&frames), "héllo");
    }

    #[tokio::test]
    async fn test_sse_frames_ends_after_done() {
        let chunks: Vec<Result<Bytes, StreamError>> = vec![
            Ok(Bytes::from(content_line("a"))),
            Ok(Bytes::from("data: [DONE]\n")),
            Ok(Bytes::from(content_line("ignored"))),
        ];
        let frames: Vec<_> = stream::iter(chunks).sse_frames().collect().await;

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_ref().unwrap(), &SseFrame::Delta("a".into()));
        assert_eq!(frames[1].as_ref().unwrap(), &SseFrame::Done);
    }

    #[tokio::test]
    async fn test_sse_frames_propagates_body_error() {
        let chunks: Vec<Result<Bytes, StreamError>> = vec![
            Ok(Bytes::from(content_line("a"))),
            Err(StreamError::Network("connection reset".into())),
            Ok(Bytes::from(content_line("b"))),
        ];
        let frames: Vec<_> = stream::iter(chunks).sse_frames().collect().await;

        assert_eq!(frames.len(), 2);
        assert!(frames[0].is_ok());
        assert_eq!(
            frames[1].as_ref().unwrap_err().kind(),
            ErrorKind::NetworkError
        );
    }

    #[tokio::test]
    async fn test_sse_frames_ends_with_body() {
        let chunks: Vec<Result<Bytes, StreamError>> = vec![
            Ok(Bytes::from(content_line("a"))),
            Ok(Bytes::from("data: {\"choices\":")),
        ];
        let frames: Vec<_> = stream::iter(chunks).sse_frames().collect().await;
        assert_eq!(frames.len(), 1);
    }
}
