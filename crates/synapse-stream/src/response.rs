//! Binding a chunk producer to the transport.
//!
//! A [`StreamingResponse`] owns one `token_streamer`: an async function that
//! is handed a [`ChunkSink`] and pushes chunks into it one at a time. The
//! producer runs on its own task and talks to the transport writer over a
//! bounded channel, so a slow peer applies backpressure to the producer and
//! the full payload is never held in memory.

use bytes::Bytes;
use futures_core::Stream;
use futures_util::StreamExt;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Response, StatusCode};
use http_body::Frame as HttpFrame;
use http_body_util::{combinators::UnsyncBoxBody, BodyExt, StreamBody};
use pin_project_lite::pin_project;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use synapse_core::headers::STREAM_CONTENT_TYPE;
use synapse_core::{Frame, FrameError, MAX_FRAME_SIZE};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::error::{AbortReason, StreamError};

/// Boxed future returned by a token streamer.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

type TokenStreamer = Box<dyn FnOnce(ChunkSink) -> BoxFuture<Result<(), StreamError>> + Send>;

/// Body type of a framed streaming response.
pub type StreamingBody = UnsyncBoxBody<Bytes, StreamError>;

/// Handle a producer uses to emit chunks in order.
#[derive(Debug)]
pub struct ChunkSink {
    tx: mpsc::Sender<Bytes>,
}

impl ChunkSink {
    /// Send one chunk, waiting while the channel is full.
    ///
    /// A chunk must fit in one frame: anything over [`MAX_FRAME_SIZE`] bytes
    /// fails with [`FrameError::FrameTooLarge`] and is not sent. Fails with
    /// [`AbortReason::Disconnected`] once the consumer is gone.
    pub async fn send(&self, chunk: impl Into<Bytes>) -> Result<(), StreamError> {
        let chunk = chunk.into();
        if chunk.len() > MAX_FRAME_SIZE {
            return Err(FrameError::FrameTooLarge(chunk.len() as u64).into());
        }
        self.tx
            .send(chunk)
            .await
            .map_err(|_| StreamError::Aborted(AbortReason::Disconnected))
    }

    /// Whether the consumer has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A response whose body is produced chunk by chunk.
pub struct StreamingResponse {
    token_streamer: TokenStreamer,
    capacity: usize,
    headers: HeaderMap,
}

impl StreamingResponse {
    /// Default number of chunks buffered between producer and writer.
    pub const DEFAULT_CAPACITY: usize = 16;

    pub fn new<F, Fut>(token_streamer: F) -> Self
    where
        F: FnOnce(ChunkSink) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), StreamError>> + Send + 'static,
    {
        Self {
            token_streamer: Box::new(move |sink| -> BoxFuture<Result<(), StreamError>> {
                Box::pin(token_streamer(sink))
            }),
            capacity: Self::DEFAULT_CAPACITY,
            headers: HeaderMap::new(),
        }
    }

    /// Set the channel capacity; at least one chunk is always allowed.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Add a header to the eventual HTTP response.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Start the producer and return its chunks in emission order.
    ///
    /// Must be called within a Tokio runtime.
    pub fn into_chunks(self) -> ResponseChunks {
        let (tx, rx) = mpsc::channel(self.capacity);
        let producer = tokio::spawn((self.token_streamer)(ChunkSink { tx }));
        ResponseChunks {
            rx: ReceiverStream::new(rx),
            producer: Some(producer),
        }
    }

    /// Framed HTTP body: one DATA frame per chunk, then END_STREAM, or a
    /// CANCEL frame if the producer fails.
    pub fn into_body(self) -> StreamingBody {
        let frames = FramedChunks::new(self.into_chunks())
            .map(|frame| Ok::<_, StreamError>(HttpFrame::data(frame.encode())));
        StreamBody::new(frames).boxed_unsync()
    }

    /// Full HTTP response carrying the framed body and any extra headers.
    pub fn into_http_response(mut self) -> Response<StreamingBody> {
        let mut headers = std::mem::take(&mut self.headers);
        let body = self.into_body();

        let mut response = Response::new(body);
        *response.status_mut() = StatusCode::OK;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(STREAM_CONTENT_TYPE));
        response.headers_mut().extend(headers);
        response
    }
}

impl fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("token_streamer", &"<fn>")
            .field("capacity", &self.capacity)
            .field("headers", &self.headers)
            .finish()
    }
}

/// Chunks of a running producer.
///
/// Yields every chunk in order, then the producer's error if it failed.
/// Dropping this stream aborts the producer task.
pub struct ResponseChunks {
    rx: ReceiverStream<Bytes>,
    producer: Option<JoinHandle<Result<(), StreamError>>>,
}

impl Stream for ResponseChunks {
    type Item = Result<Bytes, StreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(chunk) = ready!(Pin::new(&mut self.rx).poll_next(cx)) {
            return Poll::Ready(Some(Ok(chunk)));
        }

        // Channel closed: the producer has returned and dropped its sink.
        let Some(producer) = self.producer.as_mut() else {
            return Poll::Ready(None);
        };
        let result = ready!(Pin::new(producer).poll(cx));
        self.producer = None;

        match result {
            Ok(Ok(())) => Poll::Ready(None),
            Ok(Err(e)) => Poll::Ready(Some(Err(e))),
            Err(join_error) => Poll::Ready(Some(Err(StreamError::Producer(join_error.to_string())))),
        }
    }
}

impl Drop for ResponseChunks {
    fn drop(&mut self) {
        if let Some(producer) = self.producer.take() {
            if !producer.is_finished() {
                debug!("consumer dropped, aborting chunk producer");
            }
            producer.abort();
        }
    }
}

pin_project! {
    /// Wraps a chunk stream in protocol frames.
    pub struct FramedChunks<S> {
        #[pin]
        inner: S,
        sequence: u64,
        ended: bool,
    }
}

impl<S> FramedChunks<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            sequence: 0,
            ended: false,
        }
    }
}

impl<S> Stream for FramedChunks<S>
where
    S: Stream<Item = Result<Bytes, StreamError>>,
{
    type Item = Frame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.ended {
            return Poll::Ready(None);
        }

        match ready!(this.inner.poll_next(cx)) {
            Some(Ok(chunk)) => {
                let frame = Frame::data(*this.sequence, chunk);
                *this.sequence += 1;
                Poll::Ready(Some(frame))
            }
            Some(Err(e)) => {
                *this.ended = true;
                warn!(error = %e, chunks = *this.sequence, "chunk producer failed, cancelling stream");
                Poll::Ready(Some(Frame::cancel(*this.sequence, &e.to_string())))
            }
            None => {
                *this.ended = true;
                debug!(chunks = *this.sequence, "chunk stream complete");
                Poll::Ready(Some(Frame::end_stream(*this.sequence)))
            }
        }
    }
}
