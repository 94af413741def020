//! Axon server runtime

use crate::router::SynapseRouter;
use http::Request;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use std::convert::Infallible;
use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use synapse_core::{ResolvedConfig, SynapseError};
use synapse_stream::{StreamingResponse, Synapse};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Serving endpoint for synapse exchanges
pub struct Axon {
    router: Arc<SynapseRouter>,
    addr: SocketAddr,
}

impl Axon {
    /// Start configuring an axon for this node: bound to
    /// `0.0.0.0:<axon_port>` and stamping responses with the node identity.
    pub fn builder(config: &ResolvedConfig) -> AxonBuilder {
        AxonBuilder {
            router: SynapseRouter::new().with_identity(&config.identity),
            addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.axon_port)),
        }
    }

    /// Address `serve` binds to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn router(&self) -> &SynapseRouter {
        &self.router
    }

    /// Bind the configured address and serve until the process exits.
    pub async fn serve(self) -> Result<(), SynapseError> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve_with_listener(listener, std::future::pending())
            .await
    }

    /// Serve connections from `listener` until `shutdown` resolves.
    ///
    /// Shutdown stops accepting; connections already accepted run to
    /// completion on their own tasks.
    pub async fn serve_with_listener<F>(
        self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<(), SynapseError>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        info!(
            addr = %local_addr,
            synapses = ?self.router.paths().collect::<Vec<_>>(),
            "axon listening"
        );

        tokio::pin!(shutdown);
        loop {
            let (stream, remote_addr) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = &mut shutdown => {
                    info!(addr = %local_addr, "axon shutting down");
                    return Ok(());
                }
            };
            debug!(remote = %remote_addr, "accepted connection");

            let router = Arc::clone(&self.router);
            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let service = hyper::service::service_fn(move |req: Request<Incoming>| {
                    let router = Arc::clone(&router);
                    async move { Ok::<_, Infallible>(router.route(req).await) }
                });

                if let Err(err) = auto::Builder::new(TokioExecutor::new())
                    .serve_connection(io, service)
                    .await
                {
                    error!("Error serving connection from {}: {}", remote_addr, err);
                }
            });
        }
    }
}

/// Builder for creating an axon
pub struct AxonBuilder {
    router: SynapseRouter,
    addr: SocketAddr,
}

impl AxonBuilder {
    /// Register a handler for synapse `S`, served at `/{S::NAME}`
    pub fn synapse<S, F, Fut>(mut self, handler: F) -> Self
    where
        S: Synapse,
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StreamingResponse, SynapseError>> + Send + 'static,
    {
        self.router.synapse(handler);
        self
    }

    /// Override the bind address.
    pub fn addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn build(self) -> Axon {
        Axon {
            router: Arc::new(self.router),
            addr: self.addr,
        }
    }
}
