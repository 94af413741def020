//! Reading a chunked response on the calling side.

use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode};
use http_body::Body;
use http_body_util::{combinators::UnsyncBoxBody, BodyExt};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use synapse_core::headers::{AXON_IDENTITY, SYNAPSE_NAME};
use synapse_core::FrameParser;
use tracing::{debug, warn};

use crate::error::{AbortReason, StreamError};

/// Boxed error type accepted from response bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Default bound on the wait for the next chunk.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Counters for one exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeStats {
    /// DATA frames received
    pub chunks: u64,
    /// Payload bytes received
    pub bytes: u64,
    /// END_STREAM was seen
    pub completed: bool,
    /// Why the exchange ended early, if it did
    pub aborted: Option<String>,
    /// Time from start until completion or abort
    pub elapsed: Option<Duration>,
}

/// An inbound response whose body arrives as frames over time.
pub struct InboundResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<UnsyncBoxBody<Bytes, BoxError>>,
    idle_timeout: Duration,
    started: Instant,
    stats: ExchangeStats,
}

impl InboundResponse {
    pub fn new<B>(response: Response<B>) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = response.into_parts();
        Self {
            status: parts.status,
            headers: parts.headers,
            body: Some(body.map_err(Into::into).boxed_unsync()),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            started: Instant::now(),
            stats: ExchangeStats::default(),
        }
    }

    /// Bound the wait for each chunk.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Measure elapsed time from `started` instead of construction.
    pub fn with_started_at(mut self, started: Instant) -> Self {
        self.started = started;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn stats(&self) -> &ExchangeStats {
        &self.stats
    }

    pub fn is_consumed(&self) -> bool {
        self.body.is_none()
    }

    /// Identity the serving axon reported, if any.
    pub fn axon_identity(&self) -> Option<&str> {
        self.header_str(AXON_IDENTITY)
    }

    /// Synapse name the serving axon reported, if any.
    pub fn synapse_name(&self) -> Option<&str> {
        self.header_str(SYNAPSE_NAME)
    }

    fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Time until completion, or so far if still open.
    pub fn elapsed(&self) -> Duration {
        self.stats.elapsed.unwrap_or_else(|| self.started.elapsed())
    }

    /// Take the body for reading. A response can be read once.
    pub fn reader(&mut self) -> Result<ChunkReader<'_>, StreamError> {
        let body = self.body.take().ok_or(StreamError::AlreadyConsumed)?;
        Ok(ChunkReader {
            body,
            parser: FrameParser::new(),
            next_sequence: 0,
            idle_timeout: self.idle_timeout,
            started: self.started,
            stats: &mut self.stats,
            state: ReadState::Open,
        })
    }

    /// Read every chunk until end of stream.
    pub async fn collect_chunks(&mut self) -> Result<Vec<Bytes>, StreamError> {
        let mut reader = self.reader()?;
        let mut chunks = Vec::new();
        while let Some(chunk) = reader.next_chunk().await? {
            chunks.push(chunk);
        }
        Ok(chunks)
    }

    /// Key/value summary built from the response head and exchange counters.
    ///
    /// Never touches the body.
    pub fn summary(&self, synapse: &str) -> Value {
        json!({
            "synapse": synapse,
            "status_code": self.status.as_u16(),
            "status_message": self.status.canonical_reason().unwrap_or(""),
            "axon_identity": self.axon_identity(),
            "elapsed_ms": self.elapsed().as_millis() as u64,
            "chunks": self.stats.chunks,
            "bytes": self.stats.bytes,
            "completed": self.stats.completed,
            "aborted": self.stats.aborted,
        })
    }
}

impl std::fmt::Debug for InboundResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("consumed", &self.body.is_none())
            .field("idle_timeout", &self.idle_timeout)
            .field("stats", &self.stats)
            .finish()
    }
}

#[derive(Debug)]
enum ReadState {
    Open,
    Completed,
    Failed(StreamError),
}

/// Yields the chunks of one response in order.
pub struct ChunkReader<'a> {
    body: UnsyncBoxBody<Bytes, BoxError>,
    parser: FrameParser,
    next_sequence: u64,
    idle_timeout: Duration,
    started: Instant,
    stats: &'a mut ExchangeStats,
    state: ReadState,
}

impl ChunkReader<'_> {
    /// Next chunk, or `None` after end of stream.
    ///
    /// Every wait for more bytes is bounded by the idle timeout. Once the
    /// reader has failed it keeps returning the same error.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        loop {
            match &self.state {
                ReadState::Open => {}
                ReadState::Completed => return Ok(None),
                ReadState::Failed(err) => return Err(err.clone()),
            }

            let frame = match self.parser.parse_frame() {
                Ok(frame) => frame,
                Err(e) => return Err(self.fail(e.into())),
            };

            if let Some(frame) = frame {
                if frame.flags.is_data() {
                    if frame.sequence != self.next_sequence {
                        let err = StreamError::OutOfOrder {
                            expected: self.next_sequence,
                            found: frame.sequence,
                        };
                        return Err(self.fail(err));
                    }
                    self.next_sequence += 1;
                    self.stats.chunks += 1;
                    self.stats.bytes += frame.payload.len() as u64;
                    return Ok(Some(frame.payload));
                }

                if frame.flags.is_end_stream() {
                    if frame.sequence != self.next_sequence {
                        let err = StreamError::Protocol(format!(
                            "end of stream after {} chunks, {} received",
                            frame.sequence, self.next_sequence
                        ));
                        return Err(self.fail(err));
                    }
                    self.complete();
                    return Ok(None);
                }

                let reason = frame.cancel_reason().unwrap_or_default();
                return Err(self.fail(StreamError::Aborted(AbortReason::Cancelled(reason))));
            }

            let next = tokio::time::timeout(self.idle_timeout, self.body.frame()).await;
            match next {
                Err(_) => {
                    let err = StreamError::Aborted(AbortReason::Timeout(self.idle_timeout));
                    return Err(self.fail(err));
                }
                Ok(None) => {
                    return Err(self.fail(StreamError::Aborted(AbortReason::Disconnected)));
                }
                Ok(Some(Err(e))) => {
                    debug!(error = %e, "response body failed");
                    return Err(self.fail(StreamError::Aborted(AbortReason::Disconnected)));
                }
                Ok(Some(Ok(frame))) => {
                    // trailers carry nothing for this protocol
                    if let Ok(data) = frame.into_data() {
                        self.parser.feed(&data);
                    }
                }
            }
        }
    }

    fn complete(&mut self) {
        self.state = ReadState::Completed;
        self.stats.completed = true;
        self.stats.elapsed = Some(self.started.elapsed());
        debug!(
            chunks = self.stats.chunks,
            bytes = self.stats.bytes,
            "response stream complete"
        );
    }

    fn fail(&mut self, err: StreamError) -> StreamError {
        warn!(error = %err, chunks = self.stats.chunks, "response stream failed");
        self.stats.aborted = Some(err.to_string());
        self.stats.elapsed = Some(self.started.elapsed());
        self.state = ReadState::Failed(err.clone());
        err
    }
}
