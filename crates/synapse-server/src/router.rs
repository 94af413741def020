//! HTTP router for synapse exchanges
//!
//! Routes match the pattern: /{synapse name}

use bytes::Bytes;
use http::header::{ALLOW, CONTENT_TYPE};
use http::{HeaderName, HeaderValue, Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use synapse_core::headers::{AXON_IDENTITY, PROBLEM_CONTENT_TYPE, SYNAPSE_NAME};
use synapse_core::{Identity, ProblemDetails, SynapseError};
use synapse_stream::{BoxError, StreamingBody, StreamingResponse, Synapse};
use tracing::{debug, warn};

/// Future returned by a boxed handler
pub type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<StreamingResponse, SynapseError>> + Send>>;

/// Type alias for boxed handlers: raw request body in, streaming response out
pub type HandlerFn = Arc<dyn Fn(Bytes) -> HandlerFuture + Send + Sync>;

struct Route {
    name: HeaderValue,
    handler: HandlerFn,
}

/// Synapse router
#[derive(Default)]
pub struct SynapseRouter {
    routes: HashMap<String, Route>,
    axon_identity: Option<HeaderValue>,
}

impl SynapseRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp every successful response with this axon's identity.
    pub fn with_identity(mut self, identity: &Identity) -> Self {
        self.axon_identity = HeaderValue::from_str(identity.as_str()).ok();
        self
    }

    /// Register a handler for synapse `S` at `/{S::NAME}`.
    ///
    /// The request body is decoded into `S` before the handler runs.
    pub fn synapse<S, F, Fut>(&mut self, handler: F)
    where
        S: Synapse,
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StreamingResponse, SynapseError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let handler: HandlerFn = Arc::new(move |body: Bytes| -> HandlerFuture {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let synapse = S::decode_request(&body)
                    .map_err(|e| SynapseError::InvalidRequest(e.to_string()))?;
                handler(synapse).await
            })
        });

        self.routes.insert(
            format!("/{}", S::NAME),
            Route {
                name: HeaderValue::from_static(S::NAME),
                handler,
            },
        );
    }

    /// Registered route paths.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Route an incoming request
    pub async fn route<B>(&self, req: Request<B>) -> Response<StreamingBody>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let path = req.uri().path().to_string();

        if req.method() != Method::POST {
            let mut response = problem_response(
                ProblemDetails::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
                    .with_detail("Only POST is supported for synapse calls")
                    .with_instance(path),
            );
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("POST"));
            return response;
        }

        let route = match self.routes.get(&path) {
            Some(route) => route,
            None => {
                debug!(path = %path, "no synapse registered");
                return problem_response(
                    ProblemDetails::new(StatusCode::NOT_FOUND, "Synapse not found")
                        .with_detail(format!("No handler registered for path: {path}"))
                        .with_instance(path),
                );
            }
        };

        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                let e: BoxError = e.into();
                return problem_response(
                    ProblemDetails::new(StatusCode::BAD_REQUEST, "Failed to read request body")
                        .with_detail(e.to_string())
                        .with_instance(path),
                );
            }
        };

        match (route.handler)(body).await {
            Ok(streaming) => {
                let mut response = streaming.into_http_response();
                let headers = response.headers_mut();
                headers.insert(HeaderName::from_static(SYNAPSE_NAME), route.name.clone());
                if let Some(identity) = &self.axon_identity {
                    headers.insert(HeaderName::from_static(AXON_IDENTITY), identity.clone());
                }
                response
            }
            Err(e) => {
                warn!(path = %path, error = %e, "synapse handler failed");
                problem_response(e.to_problem_details().with_instance(path))
            }
        }
    }
}

/// Problem Details JSON response with the matching status
fn problem_response(pd: ProblemDetails) -> Response<StreamingBody> {
    let json = pd.to_json().unwrap_or_else(|_| "{}".to_string());
    let body = Full::new(Bytes::from(json))
        .map_err(|never| match never {})
        .boxed_unsync();

    let mut response = Response::new(body);
    *response.status_mut() = pd.status_code();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(PROBLEM_CONTENT_TYPE));
    response
}
