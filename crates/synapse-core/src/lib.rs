//! Core types shared by every synapse crate.
//!
//! - Chunk framing (varint encoding, frame parsing)
//! - Problem Details error model
//! - Header names used by axon and dendrite
//! - Node configuration resolution

pub mod config;
pub mod error;
pub mod framing;
pub mod headers;

pub use config::{ConfigError, Identity, NodeConfig, ResolvedConfig};
pub use error::{ProblemDetails, SynapseError};
pub use framing::{Frame, FrameError, FrameFlags, FrameParser, MAX_FRAME_SIZE};
