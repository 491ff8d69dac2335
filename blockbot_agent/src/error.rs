// Error types for the agent crate.
//
// World-consistency errors (`WorldError`) are recoverable: callers
// retry later or drop the update. `ActionError` is what an action step can
// fail with; the scheduler logs it and discards the failing action.

use blockbot_protocol::EncodeError;

use crate::types::{BlockPos, ChunkKey};

/// Errors raised by world queries.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    /// No known chunk covers this cell.
    #[error("chunk not loaded at {0}")]
    ChunkNotLoaded(BlockPos),

    /// The chunk's payload could not be decoded.
    #[error("chunk {key} is corrupt: {reason}")]
    CorruptChunk { key: ChunkKey, reason: String },
}

/// Errors raised while emitting outbound messages.
#[derive(Debug, thiserror::Error)]
pub enum OutboundError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("transport write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors an action step can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    World(#[from] WorldError),

    #[error(transparent)]
    Outbound(#[from] OutboundError),
}
