//! Exchange capabilities.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;

use crate::error::StreamError;
use crate::inbound::InboundResponse;

/// A request type that can be posted to an axon.
///
/// The request body is the JSON form of the synapse; it is served at
/// `/{NAME}`.
pub trait Synapse: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Route name of this exchange kind.
    const NAME: &'static str;

    fn encode_request(&self) -> Result<Bytes, StreamError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| StreamError::Protocol(format!("cannot encode {}: {e}", Self::NAME)))
    }

    fn decode_request(body: &[u8]) -> Result<Self, StreamError> {
        serde_json::from_slice(body)
            .map_err(|e| StreamError::Protocol(format!("cannot decode {}: {e}", Self::NAME)))
    }
}

/// An exchange whose response arrives as a stream of chunks.
pub trait StreamingSynapse: Synapse {
    /// Structured result rebuilt from the chunks.
    type Output: Send;

    /// Consume the response body and rebuild the result.
    ///
    /// Completes only after the end-of-stream signal. Each response can be
    /// processed once; a second call fails with
    /// [`StreamError::AlreadyConsumed`]. A stalled stream fails with
    /// [`StreamError::Aborted`] after the response's idle timeout.
    fn process_streaming_response(
        &self,
        response: &mut InboundResponse,
    ) -> impl Future<Output = Result<Self::Output, StreamError>> + Send;

    /// Summarize a response (status, timing, peer identity) without
    /// decoding its body.
    fn extract_response_json(&self, response: &InboundResponse) -> Value;
}
