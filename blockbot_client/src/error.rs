// Session-level errors.
//
// Anything in `ClientError` ends the session: transport and framing errors
// mean the byte stream can no longer be trusted, and a kick or an
// out-of-order handshake means the server is done with us. Recoverable
// conditions (dropped world updates, failed actions) are handled and logged
// inside the agent and never surface here.

use blockbot_agent::OutboundError;
use blockbot_protocol::{DecodeError, EncodeError, FieldError};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed stream: {0}")]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Outbound(#[from] OutboundError),

    #[error("malformed message: {0}")]
    Field(#[from] FieldError),

    #[error("kicked by server: {reason}")]
    Kicked { reason: String },

    #[error("unexpected `{name}` message: {detail}")]
    UnexpectedMessage { name: &'static str, detail: String },

    #[error("unrecognized message tag 0x{tag:02X}")]
    UnrecognizedMessage { tag: u8 },

    #[error("session service refused: {0}")]
    Auth(String),

    #[error("config error: {0}")]
    Config(String),
}
