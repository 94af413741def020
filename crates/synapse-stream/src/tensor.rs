//! Tensor exchange: the response is one wire tensor split across chunks.

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use synapse_core::MAX_FRAME_SIZE;
use synapse_tensor::{Array, Tensor, WireTensor};

use crate::error::StreamError;
use crate::inbound::InboundResponse;
use crate::response::StreamingResponse;
use crate::synapse::{StreamingSynapse, Synapse};

/// Default chunk size for tensor responses (64KB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Sends a tensor and receives a tensor back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorSynapse {
    pub inputs: WireTensor,
}

impl TensorSynapse {
    pub fn new(inputs: Tensor) -> Result<Self, StreamError> {
        Ok(Self {
            inputs: inputs.into_wire()?,
        })
    }

    /// The request tensor, validated.
    pub fn input_tensor(&self) -> Result<Tensor, StreamError> {
        Ok(Tensor::try_from(self.inputs.clone())?)
    }

    /// Stream `tensor` back as its JSON wire triple in `chunk_size` pieces.
    ///
    /// `chunk_size` is clamped to `1..=MAX_FRAME_SIZE`.
    pub fn respond(tensor: Tensor, chunk_size: usize) -> Result<StreamingResponse, StreamError> {
        let wire = tensor.into_wire()?;
        let body = serde_json::to_vec(&wire)
            .map(Bytes::from)
            .map_err(|e| StreamError::Protocol(format!("cannot encode tensor: {e}")))?;
        let chunk_size = chunk_size.clamp(1, MAX_FRAME_SIZE);

        Ok(StreamingResponse::new(move |sink| async move {
            let mut offset = 0;
            while offset < body.len() {
                let end = (offset + chunk_size).min(body.len());
                sink.send(body.slice(offset..end)).await?;
                offset = end;
            }
            Ok(())
        }))
    }
}

impl Synapse for TensorSynapse {
    const NAME: &'static str = "TensorSynapse";
}

impl StreamingSynapse for TensorSynapse {
    type Output = Array;

    async fn process_streaming_response(
        &self,
        response: &mut InboundResponse,
    ) -> Result<Array, StreamError> {
        let mut reader = response.reader()?;
        let mut body = BytesMut::new();
        while let Some(chunk) = reader.next_chunk().await? {
            body.extend_from_slice(&chunk);
        }

        let wire: WireTensor = serde_json::from_slice(&body)
            .map_err(|e| StreamError::Protocol(format!("response is not a wire tensor: {e}")))?;
        Ok(Tensor::try_from(wire)?.deserialize()?)
    }

    fn extract_response_json(&self, response: &InboundResponse) -> Value {
        let mut summary = response.summary(Self::NAME);
        summary["input_dtype"] = Value::String(self.inputs.dtype.clone());
        summary["input_shape"] = Value::String(self.inputs.shape.clone());
        summary
    }
}
