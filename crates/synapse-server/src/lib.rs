//! Axon: the serving endpoint for synapse exchanges.
//!
//! This crate provides:
//! - A router mapping `/{synapse name}` to a handler
//! - The hyper server runtime bound to the node's axon port
//! - Tracing subscriber bootstrap

pub mod axon;
pub mod router;
pub mod telemetry;

pub use axon::{Axon, AxonBuilder};
pub use router::{HandlerFn, HandlerFuture, SynapseRouter};
pub use telemetry::init_tracing;
