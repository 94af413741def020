//! Dendrite: the calling endpoint for synapse exchanges.
//!
//! A [`Dendrite`] posts a synapse to a remote axon, drives the synapse's
//! response processing over the chunked body, and returns the rebuilt output
//! together with the exchange summary.

pub mod dendrite;
pub mod error;

pub use dendrite::{Dendrite, DendriteConfig, Exchange};
pub use error::DendriteError;
