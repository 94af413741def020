//! Streaming synapse exchanges.
//!
//! The serving side binds a chunk producer to the transport with
//! [`StreamingResponse`]; the calling side wraps the HTTP response in an
//! [`InboundResponse`] and hands it to a [`StreamingSynapse`], which
//! rebuilds the result from the chunks in order.
//!
//! # Example
//!
//! ```rust
//! use synapse_stream::{InboundResponse, StreamingSynapse, TextStreamSynapse};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let tokens = vec!["Hello".to_string(), ", ".to_string(), "world".to_string()];
//! let http = TextStreamSynapse::respond(tokens).into_http_response();
//!
//! let synapse = TextStreamSynapse::new("greet");
//! let mut response = InboundResponse::new(http);
//! let output = synapse.process_streaming_response(&mut response).await.unwrap();
//! assert_eq!(output.concat(), "Hello, world");
//! # }
//! ```

pub mod error;
pub mod inbound;
pub mod response;
pub mod synapse;
pub mod tensor;
pub mod text;

pub use error::{AbortReason, StreamError};
pub use inbound::{BoxError, ChunkReader, ExchangeStats, InboundResponse, DEFAULT_IDLE_TIMEOUT};
pub use response::{ChunkSink, FramedChunks, ResponseChunks, StreamingBody, StreamingResponse};
pub use synapse::{StreamingSynapse, Synapse};
pub use tensor::{TensorSynapse, DEFAULT_CHUNK_SIZE};
pub use text::TextStreamSynapse;
