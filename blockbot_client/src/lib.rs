// blockbot_client: session loop and command surface for the blockbot.
//
// Connects the wire codec (`blockbot_protocol`) to the agent
// (`blockbot_agent`) over a TCP socket. The agent never sees the socket:
// this crate decodes inbound bytes, routes each message into the agent's
// world, entity table and pose, and drives `Bot::tick()` on a fixed period.
//
// Module overview:
// - `client.rs`:   TCP connection, reader thread, and the tick/receive loop.
// - `dispatch.rs`: `Session`: handshake state and per-message routing.
// - `commands.rs`: chat/console command router (`come`, `dig`, `goto`, ...).
// - `services.rs`: session-service and named-location-store boundaries.
// - `config.rs`:   `ClientConfig`, loaded from JSON.
// - `error.rs`:    `ClientError`.
//
// The `blockbot` binary (`main.rs`) parses flags, sets up `tracing`, and
// runs one `Client` until it disconnects.

pub mod client;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod services;

#[cfg(test)]
mod testkit;

pub use client::Client;
pub use commands::{BuiltinCommands, CommandRouter, CommandSource};
pub use config::ClientConfig;
pub use dispatch::{Phase, Session};
pub use error::ClientError;
pub use services::{
    JsonLocationStore, LocationStore, MemoryLocationStore, OfflineSession, SessionService,
};
