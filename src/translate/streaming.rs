//! State machine for translating OpenAI streaming chunks into Anthropic SSE events.
//!
//! The [`StreamTranslator`] consumes the `data:` payloads of an OpenAI stream one
//! at a time and decides which Anthropic event, if any, each one produces. It
//! never touches the network: [`reframe`] drives it over any byte stream, so the
//! same code runs against a live backend and against canned test input.
//!
//! Every stream has the same frame, whatever the backend does:
//!
//! ```text
//! message_start, content_block_start(0), content_block_delta(0)*, content_block_stop(0), message_stop
//! ```

use std::future::Future;

use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use tracing::{debug, warn};

use super::anthropic_types::{Delta, MessagesResponse, ResponseContentBlock, StreamEvent};
use super::openai_types::ChatCompletionChunk;
use crate::error::Result;

/// Model label reported in `message_start`; the stream opens before the backend answers.
pub const STREAM_MODEL_LABEL: &str = "unknown";

const TEXT_BLOCK_INDEX: usize = 0;
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    NotStarted,
    MessageOpen,
    BlockOpen,
    BlockClosed,
    MessageClosed,
}

/// What a single backend `data:` payload amounts to.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Emit(StreamEvent),
    Skip,
    Done,
}

#[derive(Debug)]
pub struct StreamTranslator {
    msg_id: String,
    state: StreamState,
}

impl Default for StreamTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamTranslator {
    pub fn new() -> Self {
        Self {
            msg_id: super::anthropic_types::new_message_id(),
            state: StreamState::NotStarted,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Open the message and its single text block. No-op once started.
    pub fn start(&mut self) -> Vec<StreamEvent> {
        if self.state != StreamState::NotStarted {
            return Vec::new();
        }

        let mut message = MessagesResponse::empty(STREAM_MODEL_LABEL);
        message.id = self.msg_id.clone();
        self.state = StreamState::MessageOpen;
        let message_start = StreamEvent::MessageStart { message };

        self.state = StreamState::BlockOpen;
        let block_start = StreamEvent::ContentBlockStart {
            index: TEXT_BLOCK_INDEX,
            content_block: ResponseContentBlock::Text {
                text: String::new(),
            },
        };

        vec![message_start, block_start]
    }

    /// Consume one SSE `data:` payload from the backend.
    ///
    /// Payloads that fail to decode are skipped rather than ending the stream.
    pub fn consume(&mut self, data: &str) -> Step {
        let data = data.trim();
        if data == DONE_SENTINEL {
            return Step::Done;
        }

        match serde_json::from_str::<ChatCompletionChunk>(data) {
            Ok(chunk) => self.process_chunk(&chunk).map_or(Step::Skip, Step::Emit),
            Err(e) => {
                debug!(error = %e, "Skipping unparseable chunk");
                Step::Skip
            }
        }
    }

    /// Turn a decoded chunk into a text delta, if it carries any text.
    pub fn process_chunk(&mut self, chunk: &ChatCompletionChunk) -> Option<StreamEvent> {
        if self.state != StreamState::BlockOpen {
            return None;
        }

        let text = chunk
            .choices
            .first()?
            .delta
            .content
            .as_deref()
            .filter(|s| !s.is_empty())?;

        Some(StreamEvent::ContentBlockDelta {
            index: TEXT_BLOCK_INDEX,
            delta: Delta::TextDelta {
                text: text.to_string(),
            },
        })
    }

    /// Close whatever is still open. Safe to call in any state, and more than once.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = self.start();

        if self.state == StreamState::BlockOpen {
            events.push(StreamEvent::ContentBlockStop {
                index: TEXT_BLOCK_INDEX,
            });
            self.state = StreamState::BlockClosed;
        }

        if matches!(
            self.state,
            StreamState::MessageOpen | StreamState::BlockClosed
        ) {
            events.push(StreamEvent::MessageStop);
            self.state = StreamState::MessageClosed;
        }

        events
    }
}

/// Re-frame an OpenAI SSE byte stream as Anthropic stream events.
///
/// The opening events are yielded before `connect` is polled, so the client sees
/// the message start while the backend is still loading the model. A failed
/// connection, a transport error mid-stream, or a body that ends without
/// `[DONE]` all still produce the closing events.
pub fn reframe<F, S, B, E>(connect: F) -> impl Stream<Item = StreamEvent> + Send + 'static
where
    F: Future<Output = Result<S>> + Send + 'static,
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    async_stream::stream! {
        let mut translator = StreamTranslator::new();
        for event in translator.start() {
            yield event;
        }

        match connect.await {
            Ok(upstream) => {
                let sse_events = upstream.eventsource();
                tokio::pin!(sse_events);

                let mut deltas = 0usize;
                while let Some(item) = sse_events.next().await {
                    let sse = match item {
                        Ok(sse) => sse,
                        Err(e) => {
                            warn!(error = %e, "Backend stream broke off");
                            break;
                        }
                    };

                    match translator.consume(&sse.data) {
                        Step::Emit(event) => {
                            deltas += 1;
                            yield event;
                        }
                        Step::Skip => {}
                        Step::Done => break,
                    }
                }
                debug!(deltas, "Backend stream finished");
            }
            Err(e) => warn!(error = %e, "Streaming request to backend failed"),
        }

        for event in translator.finish() {
            yield event;
        }
    }
}
