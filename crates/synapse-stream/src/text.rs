//! Token streaming: each chunk is one UTF-8 token.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StreamError;
use crate::inbound::InboundResponse;
use crate::response::StreamingResponse;
use crate::synapse::{StreamingSynapse, Synapse};

/// Sends a prompt and receives generated tokens as they are produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStreamSynapse {
    pub prompt: String,
}

impl TextStreamSynapse {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }

    /// Stream each token as its own chunk.
    pub fn respond<I>(tokens: I) -> StreamingResponse
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        let tokens = tokens.into_iter();
        StreamingResponse::new(move |sink| async move {
            for token in tokens {
                sink.send(token).await?;
            }
            Ok(())
        })
    }
}

impl Synapse for TextStreamSynapse {
    const NAME: &'static str = "TextStreamSynapse";
}

impl StreamingSynapse for TextStreamSynapse {
    type Output = Vec<String>;

    async fn process_streaming_response(
        &self,
        response: &mut InboundResponse,
    ) -> Result<Vec<String>, StreamError> {
        let mut reader = response.reader()?;
        let mut tokens = Vec::new();
        while let Some(chunk) = reader.next_chunk().await? {
            let token = String::from_utf8(chunk.to_vec())
                .map_err(|e| StreamError::Protocol(format!("token is not UTF-8: {e}")))?;
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn extract_response_json(&self, response: &InboundResponse) -> Value {
        response.summary(Self::NAME)
    }
}
