// Autonomous agent for the blockbot client.
//
// This crate holds everything the bot knows and does, with no sockets and
// no clock: the session loop in `blockbot_client` feeds it decoded messages
// and calls `Bot::tick()` at a fixed period.
//
// Module overview:
// - `types.rs`:       `Vector`, `BlockPos`, `ChunkKey`, `Face`, angle helpers.
// - `block.rs`:       block catalog subset (material, preferred tool, mining time).
// - `chunk.rs`:       one chunk region, kept compressed until first access.
// - `world.rs`:       chunk map, terrain updates, `is_enterable`/`neighbors`.
// - `entity.rs`:      other players and mobs seen on the server.
// - `pathfinding.rs`: grid A* over the `Terrain` trait.
// - `action.rs`:      resumable action state machines and the `Step` contract.
// - `bot.rs`:         pose, action queue and the one-step-per-tick scheduler.
// - `outbound.rs`:    agent intents encoded into protocol messages.
// - `config.rs`:      `AgentConfig` tunables.
// - `error.rs`:       `WorldError`, `OutboundError`, `ActionError`.
//
// **Critical constraint: single owner.** All agent state is owned by one
// `Bot` and mutated only from the thread that calls `tick()`. Nothing here
// locks.

pub mod action;
pub mod block;
pub mod bot;
pub mod chunk;
pub mod config;
pub mod entity;
pub mod error;
pub mod outbound;
pub mod pathfinding;
pub mod types;
pub mod world;

#[cfg(test)]
mod testkit;

pub use action::{Action, ActionContext, NavMode, Step};
pub use bot::{Bot, Identity, Pose};
pub use config::AgentConfig;
pub use error::{ActionError, OutboundError, WorldError};
pub use outbound::{DigStatus, Outbound, PacketSink};
pub use types::{BlockPos, ChunkKey, Face, Vector};
pub use world::{BatchEntry, ChangeOutcome, World};
