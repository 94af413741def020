//! Header names and media types shared by the axon and dendrite.

/// Name of the synapse that produced a response.
pub const SYNAPSE_NAME: &str = "x-synapse-name";

/// Identity of the serving axon.
pub const AXON_IDENTITY: &str = "x-synapse-axon-identity";

/// Identity of the calling dendrite.
pub const DENDRITE_IDENTITY: &str = "x-synapse-dendrite-identity";

/// Media type of a framed chunk stream.
pub const STREAM_CONTENT_TYPE: &str = "application/x-synapse-stream";

/// Media type of a problem-details error body.
pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";
