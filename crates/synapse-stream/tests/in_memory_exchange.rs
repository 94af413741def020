use std::time::Duration;

use serde_json::json;
use synapse_core::MAX_FRAME_SIZE;
use synapse_stream::{
    AbortReason, InboundResponse, StreamError, StreamingResponse, StreamingSynapse,
    TensorSynapse, TextStreamSynapse,
};
use synapse_tensor::{Array, Tensor, TensorFactory};

fn exchange(response: StreamingResponse) -> InboundResponse {
    InboundResponse::new(response.into_http_response()).with_idle_timeout(Duration::from_secs(2))
}

#[tokio::test]
async fn tensor_survives_many_small_chunks() {
    let array = Array::from_vec((0..120).map(|i| i as f32 * 0.5).collect::<Vec<_>>(), [2, 3, 4, 5])
        .unwrap();
    let tensor = TensorFactory::create(array.clone()).unwrap();

    let synapse = TensorSynapse::new(tensor.clone()).unwrap();
    let mut response = exchange(TensorSynapse::respond(tensor, 7).unwrap());

    let output = synapse.process_streaming_response(&mut response).await.unwrap();
    assert_eq!(output, array);
    assert!(response.stats().chunks > 1);
    assert!(response.stats().completed);
}

#[tokio::test]
async fn tensor_larger_than_a_frame_is_split() {
    let array = Array::from_vec((0..1_500_000).map(|i| i as f32).collect::<Vec<_>>(), [1_500_000])
        .unwrap();
    let tensor = TensorFactory::create(array.clone()).unwrap();

    let synapse = TensorSynapse::new(tensor.clone()).unwrap();
    let mut response = exchange(TensorSynapse::respond(tensor, 4 * MAX_FRAME_SIZE).unwrap());

    let output = synapse.process_streaming_response(&mut response).await.unwrap();
    assert_eq!(output, array);
    assert!(response.stats().chunks >= 2);
    assert!(response.stats().completed);
}

#[tokio::test]
async fn oversized_chunk_cancels_the_stream() {
    let oversized = StreamingResponse::new(|sink| async move {
        sink.send("fits").await?;
        sink.send(vec![b'x'; MAX_FRAME_SIZE + 1]).await?;
        Ok(())
    });

    let synapse = TextStreamSynapse::new("big");
    let mut response = exchange(oversized);
    let err = synapse
        .process_streaming_response(&mut response)
        .await
        .unwrap_err();

    match err.abort_reason() {
        Some(AbortReason::Cancelled(reason)) => assert!(reason.contains("frame too large")),
        other => panic!("expected cancellation, got {other:?}"),
    }
    assert_eq!(response.stats().chunks, 1);
}

#[tokio::test]
async fn empty_tensor_round_trip() {
    let tensor = TensorFactory::create(json!([])).unwrap();
    let synapse = TensorSynapse::new(tensor.clone()).unwrap();
    let mut response = exchange(TensorSynapse::respond(tensor, 1024).unwrap());

    let output = synapse.process_streaming_response(&mut response).await.unwrap();
    assert_eq!(output.nelement(), 0);
}

#[tokio::test]
async fn tokens_keep_order_and_empty_tokens() {
    let tokens: Vec<String> = ["The", "", " quick", " fox"].iter().map(|t| t.to_string()).collect();
    let synapse = TextStreamSynapse::new("complete this");
    let mut response = exchange(TextStreamSynapse::respond(tokens.clone()));

    let output = synapse.process_streaming_response(&mut response).await.unwrap();
    assert_eq!(output, tokens);
    assert_eq!(response.stats().chunks, 4);
}

#[tokio::test]
async fn processing_twice_is_rejected() {
    let synapse = TextStreamSynapse::new("once");
    let mut response = exchange(TextStreamSynapse::respond(vec!["a".to_string()]));

    synapse.process_streaming_response(&mut response).await.unwrap();
    assert!(matches!(
        synapse.process_streaming_response(&mut response).await,
        Err(StreamError::AlreadyConsumed)
    ));
}

#[tokio::test]
async fn producer_failure_reaches_the_consumer_as_cancel() {
    let failing = StreamingResponse::new(|sink| async move {
        sink.send("partial").await?;
        Err(StreamError::Producer("generator crashed".into()))
    });

    let synapse = TextStreamSynapse::new("fail");
    let mut response = exchange(failing);
    let err = synapse
        .process_streaming_response(&mut response)
        .await
        .unwrap_err();

    match err.abort_reason() {
        Some(AbortReason::Cancelled(reason)) => assert!(reason.contains("generator crashed")),
        other => panic!("expected cancellation, got {other:?}"),
    }
    assert_eq!(response.stats().chunks, 1);
    assert!(!response.stats().completed);
}

#[tokio::test]
async fn stalled_producer_times_out() {
    let stalled = StreamingResponse::new(|sink| async move {
        sink.send("first").await?;
        std::future::pending::<()>().await;
        Ok(())
    });

    let synapse = TextStreamSynapse::new("stall");
    let mut response =
        InboundResponse::new(stalled.into_http_response()).with_idle_timeout(Duration::from_millis(50));

    let err = synapse
        .process_streaming_response(&mut response)
        .await
        .unwrap_err();
    assert!(matches!(err, StreamError::Aborted(AbortReason::Timeout(_))));
}

#[tokio::test]
async fn summary_reflects_the_exchange() {
    let tensor = Tensor::vector([1, 2, 3], "int32", [3]).unwrap();
    let synapse = TensorSynapse::new(tensor.clone()).unwrap();
    let mut response = exchange(TensorSynapse::respond(tensor, 4).unwrap());

    synapse.process_streaming_response(&mut response).await.unwrap();
    let summary = synapse.extract_response_json(&response);

    assert_eq!(summary["synapse"], "TensorSynapse");
    assert_eq!(summary["status_code"], 200);
    assert_eq!(summary["completed"], true);
    assert_eq!(summary["input_dtype"], "int32");
    assert_eq!(summary["chunks"], response.stats().chunks);
    assert!(summary["bytes"].as_u64().unwrap() > 0);
}
