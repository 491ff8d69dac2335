// blockbot_protocol: wire codec for the blockbot game-protocol client.
//
// The server speaks an unframed stream of messages, each a 1-byte tag
// followed by a fixed, per-tag sequence of big-endian fields. This crate
// turns that stream into named messages and back, and does no I/O: the
// caller owns the transport and feeds or drains bytes.
//
// Module overview:
// - `types.rs`:   Field kinds, decoded values, the ordered `Fields` map and
//                 the `Packet` enum.
// - `message.rs`: The static registry of message layouts (tag <-> name <->
//                 fields). Adding protocol coverage means adding rows here.
// - `codec.rs`:   `decode_all`/`Decoder` for buffered scanning, `decode_one`
//                 over the push-fed `FeedReader`, and `encode`.
// - `error.rs`:   `DecodeError`, `FrameError`, `EncodeError`, `FieldError`.
//
// Dependencies: `bytes` for buffers, `thiserror` for error enums, `serde`
// so decoded packets can be dumped as JSON for trace logging, and `tracing`
// for scan-level diagnostics (unknown tags, malformed messages).

pub mod codec;
pub mod error;
pub mod message;
pub mod types;

pub use codec::{Decoded, Decoder, decode_all, decode_one, encode};
pub use error::{DecodeError, EncodeError, FieldError, FrameError};
pub use types::{Fields, ItemStack, Packet, Value};
