use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use synapse_client::{Dendrite, DendriteConfig, DendriteError};
use synapse_core::{NodeConfig, ResolvedConfig, SynapseError};
use synapse_server::{Axon, AxonBuilder};
use synapse_stream::{AbortReason, StreamError, StreamingResponse, TensorSynapse, TextStreamSynapse};
use synapse_tensor::{Array, TensorFactory};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

fn node() -> ResolvedConfig {
    NodeConfig {
        axon_port: Some(0),
        remote_ip: Some("127.0.0.1".to_string()),
        ..Default::default()
    }
    .resolve(&mut StdRng::seed_from_u64(42))
    .unwrap()
}

/// Serve `builder` on a loopback port; the axon stops when the sender drops.
async fn spawn_axon(builder: AxonBuilder) -> (String, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(builder.build().serve_with_listener(listener, async move {
        let _ = rx.await;
    }));
    (format!("http://{addr}"), tx)
}

fn echo_axon(config: &ResolvedConfig) -> AxonBuilder {
    Axon::builder(config)
        .synapse(|synapse: TensorSynapse| async move {
            let tensor = synapse.input_tensor()?;
            Ok::<_, SynapseError>(TensorSynapse::respond(tensor, 32)?)
        })
        .synapse(|synapse: TextStreamSynapse| async move {
            let tokens = synapse
                .prompt
                .split_inclusive(' ')
                .map(str::to_string)
                .collect::<Vec<_>>();
            Ok::<_, SynapseError>(TextStreamSynapse::respond(tokens))
        })
}

#[tokio::test]
async fn tensor_round_trip_over_http() {
    let config = node();
    let (url, _shutdown) = spawn_axon(echo_axon(&config)).await;

    let array = Array::from_vec((0..60).map(|i| i as f64 / 3.0).collect::<Vec<_>>(), [3, 4, 5])
        .unwrap();
    let synapse = TensorSynapse::new(TensorFactory::create(array.clone()).unwrap()).unwrap();

    let exchange = Dendrite::new(url).call(&synapse).await.unwrap();
    assert_eq!(exchange.output, array);
    assert_eq!(exchange.summary["synapse"], "TensorSynapse");
    assert_eq!(exchange.summary["input_dtype"], "torch.float64");
    assert_eq!(exchange.summary["input_shape"], "[3, 4, 5]");
    assert!(exchange.summary["chunks"].as_u64().unwrap() > 1);
}

#[tokio::test]
async fn tokens_arrive_in_order() {
    let config = node();
    let (url, _shutdown) = spawn_axon(echo_axon(&config)).await;

    let exchange = Dendrite::new(url)
        .call(&TextStreamSynapse::new("the quick brown fox"))
        .await
        .unwrap();

    assert_eq!(exchange.output, vec!["the ", "quick ", "brown ", "fox"]);
    assert_eq!(exchange.summary["chunks"], 4);
    assert_eq!(exchange.summary["completed"], true);
}

#[tokio::test]
async fn summary_names_the_axon() {
    let config = node();
    let (url, _shutdown) = spawn_axon(echo_axon(&config)).await;

    let exchange = Dendrite::new(url)
        .call(&TextStreamSynapse::new("hello"))
        .await
        .unwrap();

    assert_eq!(exchange.summary["status_code"], 200);
    assert_eq!(exchange.summary["status_message"], "OK");
    assert_eq!(exchange.summary["axon_identity"], config.identity.as_str());
    assert!(exchange.summary["aborted"].is_null());
}

#[tokio::test]
async fn unknown_synapse_is_a_404_problem() {
    let config = node();
    let builder = Axon::builder(&config).synapse(|_: TextStreamSynapse| async move {
        Ok::<_, SynapseError>(TextStreamSynapse::respond(Vec::new()))
    });
    let (url, _shutdown) = spawn_axon(builder).await;

    let tensor = TensorFactory::create(vec![1.0f32, 2.0]).unwrap();
    let err = Dendrite::new(url)
        .call(&TensorSynapse::new(tensor).unwrap())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(http::StatusCode::NOT_FOUND));
    let problem = err.problem().unwrap();
    assert_eq!(problem.status, 404);
    assert_eq!(problem.instance.as_deref(), Some("/TensorSynapse"));
}

#[tokio::test]
async fn handler_error_maps_to_status() {
    let config = node();
    let builder = Axon::builder(&config).synapse(|_: TextStreamSynapse| async move {
        Err::<StreamingResponse, _>(SynapseError::Unavailable("model not loaded".into()))
    });
    let (url, _shutdown) = spawn_axon(builder).await;

    let err = Dendrite::new(url)
        .call(&TextStreamSynapse::new("hi"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(http::StatusCode::SERVICE_UNAVAILABLE));
    assert_eq!(
        err.problem().and_then(|pd| pd.detail.as_deref()),
        Some("model not loaded")
    );
}

#[tokio::test]
async fn producer_failure_cancels_the_exchange() {
    let config = node();
    let builder = Axon::builder(&config).synapse(|_: TextStreamSynapse| async move {
        Ok::<_, SynapseError>(StreamingResponse::new(|sink| async move {
            sink.send("partial").await?;
            Err(StreamError::Producer("out of memory".into()))
        }))
    });
    let (url, _shutdown) = spawn_axon(builder).await;

    let err = Dendrite::new(url)
        .call(&TextStreamSynapse::new("hi"))
        .await
        .unwrap_err();

    match err {
        DendriteError::Stream(StreamError::Aborted(AbortReason::Cancelled(reason))) => {
            assert!(reason.contains("out of memory"))
        }
        other => panic!("expected cancellation, got {other:?}"),
    }
}

#[tokio::test]
async fn stalled_stream_hits_idle_timeout() {
    let config = node();
    let builder = Axon::builder(&config).synapse(|_: TextStreamSynapse| async move {
        Ok::<_, SynapseError>(StreamingResponse::new(|sink| async move {
            sink.send("first").await?;
            std::future::pending::<()>().await;
            Ok(())
        }))
    });
    let (url, _shutdown) = spawn_axon(builder).await;

    let dendrite = Dendrite::with_config(
        url,
        DendriteConfig {
            idle_timeout: Duration::from_millis(100),
            ..Default::default()
        },
    );
    let err = dendrite
        .call(&TextStreamSynapse::new("hi"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DendriteError::Stream(StreamError::Aborted(AbortReason::Timeout(_)))
    ));
}

#[tokio::test]
async fn endless_stream_hits_exchange_timeout() {
    let config = node();
    let builder = Axon::builder(&config).synapse(|_: TextStreamSynapse| async move {
        Ok::<_, SynapseError>(StreamingResponse::new(|sink| async move {
            loop {
                sink.send("tick").await?;
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        }))
    });
    let (url, _shutdown) = spawn_axon(builder).await;

    let timeout = Duration::from_millis(200);
    let dendrite = Dendrite::with_config(
        url,
        DendriteConfig {
            timeout,
            ..Default::default()
        },
    );
    let err = dendrite
        .call(&TextStreamSynapse::new("hi"))
        .await
        .unwrap_err();

    match err {
        DendriteError::Stream(StreamError::Aborted(AbortReason::Timeout(after))) => {
            assert_eq!(after, timeout)
        }
        other => panic!("expected exchange timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_axon_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = Dendrite::new(format!("http://{addr}"))
        .call(&TextStreamSynapse::new("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, DendriteError::Transport(_)));
}
