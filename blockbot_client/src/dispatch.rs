// Inbound message dispatch and session state.
//
// `Session` owns the `Bot` plus the little state the connection needs on
// top of it: the handshake phase, the spawn point, whether the server has
// told us where we are yet. `handle()` routes each decoded message to the
// world store, the entity table, the pose, or the chat command router.
//
// Handshake sequence:
//   client  handshake(username)
//   server  handshake(server id)   "-" or "+" = no account check
//   client  login(protocol, username, password)
//   server  login(entity id in the protocol slot)
// Anything arriving out of that order is fatal.
//
// Position updates from the server carry `y` and `stance` in swapped slots
// relative to what the client sends. They are swapped back on arrival and
// the adopted pose is echoed so the server knows we accepted the correction.
//
// The scheduler only ticks once the session is ready (logged in and placed),
// so no pose is sent from the origin before the server has placed us.
//
// See also: `client.rs` for the loop that calls `handle()` and `tick()`,
// `commands.rs` for the chat router.

use blockbot_agent::chunk::Extents;
use blockbot_agent::{BatchEntry, BlockPos, Bot, ChangeOutcome, ChunkKey, Vector};
use blockbot_protocol::{FieldError, Fields, Packet};
use tracing::{Level, debug, error, info, trace, warn};

use crate::commands::{CommandRouter, CommandSource, parse_chat_line};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::services::SessionService;

/// Where the session is in the handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    HandshakeSent,
    LoggingIn,
    Playing,
}

/// Speaker name used for console commands.
const CONSOLE_USER: &str = "console";

fn int32(fields: &Fields, name: &'static str) -> Result<i32, FieldError> {
    fields.int(name).map(|v| v as i32)
}

pub struct Session {
    pub bot: Bot,
    phase: Phase,
    username: String,
    password: String,
    protocol: i32,
    services: Box<dyn SessionService>,
    router: Box<dyn CommandRouter>,
    spawn: Option<BlockPos>,
    world_time: Option<i64>,
    placed: bool,
}

impl Session {
    pub fn new(
        config: &ClientConfig,
        bot: Bot,
        services: Box<dyn SessionService>,
        router: Box<dyn CommandRouter>,
    ) -> Self {
        Self {
            bot,
            phase: Phase::Connecting,
            username: config.username.clone(),
            password: config.password.clone().unwrap_or_default(),
            protocol: config.protocol,
            services,
            router,
            spawn: None,
            world_time: None,
            placed: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn spawn(&self) -> Option<BlockPos> {
        self.spawn
    }

    pub fn world_time(&self) -> Option<i64> {
        self.world_time
    }

    /// Logged in and placed in the world.
    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Playing && self.placed
    }

    /// Open the handshake.
    pub fn start(&mut self) -> Result<(), ClientError> {
        let username = self.username.clone();
        self.bot.outbound().handshake(&username)?;
        self.phase = Phase::HandshakeSent;
        Ok(())
    }

    /// Run one scheduler tick if the session is ready.
    pub fn tick(&mut self) -> Result<(), ClientError> {
        if self.is_ready() {
            self.bot.tick()?;
        }
        Ok(())
    }

    fn unexpected(&self, name: &'static str) -> ClientError {
        ClientError::UnexpectedMessage {
            name,
            detail: format!("session is {:?}", self.phase),
        }
    }

    pub fn handle(&mut self, packet: Packet) -> Result<(), ClientError> {
        if tracing::enabled!(Level::TRACE) {
            match serde_json::to_string(&packet) {
                Ok(json) => trace!(packet = %json, "inbound"),
                Err(e) => trace!(error = %e, "inbound message not serializable"),
            }
        }
        let (name, fields) = match packet {
            Packet::Message { name, fields, .. } => (name, fields),
            Packet::Unrecognized { tag, payload } => {
                warn!(tag, buffered = payload.len(), "unrecognized message tag");
                return Err(ClientError::UnrecognizedMessage { tag });
            }
        };

        match name {
            "keep-alive" => self.bot.outbound().keep_alive()?,
            "handshake" => self.on_handshake(fields.str("token")?)?,
            "login" => self.on_login(&fields)?,
            "location" | "position" => self.on_position(name, &fields)?,
            "orientation" => {
                self.bot.pose.yaw = fields.float("yaw")?;
                self.bot.pose.pitch = fields.float("pitch")?;
            }
            "spawn-position" => {
                let spawn = BlockPos::new(
                    int32(&fields, "x")?,
                    int32(&fields, "y")?,
                    int32(&fields, "z")?,
                );
                debug!(%spawn, "spawn position");
                self.spawn = Some(spawn);
            }
            "time" => self.world_time = Some(fields.int("time")?),
            "pre-chunk" => {
                if !fields.bool("load")? {
                    let key = ChunkKey::new(int32(&fields, "x")?, 0, int32(&fields, "z")?);
                    if self.bot.world.unload(key) {
                        debug!(chunk = %key, "chunk unloaded");
                    }
                }
            }
            "map-chunk" => self.on_map_chunk(&fields)?,
            "multi-block-change" => self.on_multi_block_change(&fields)?,
            "block-change" => {
                let pos = BlockPos::new(
                    int32(&fields, "x")?,
                    (fields.int("y")? & 0xFF) as i32,
                    int32(&fields, "z")?,
                );
                let kind = fields.int("kind")? as u8;
                let metadata = fields.int("metadata")? as u8;
                self.bot.world.apply_single_change(pos, kind, metadata);
            }
            "named-entity-spawn" => {
                self.bot.entities.spawn_named(
                    int32(&fields, "eid")?,
                    fields.str("name")?,
                    fields.int("x")?,
                    fields.int("y")?,
                    fields.int("z")?,
                    fields.int("yaw")?,
                    fields.int("pitch")?,
                    fields.int("item")? as i16,
                );
            }
            "mob-spawn" => {
                self.bot.entities.spawn_mob(
                    int32(&fields, "eid")?,
                    fields.int("kind")? as i8,
                    fields.int("x")?,
                    fields.int("y")?,
                    fields.int("z")?,
                    fields.int("yaw")?,
                    fields.int("pitch")?,
                );
            }
            "entity-destroy" => {
                self.bot.entities.destroy(int32(&fields, "eid")?);
            }
            "entity-move" | "entity-look" | "entity-move-look" | "entity-teleport" => {
                self.on_entity_update(name, &fields)?
            }
            "chat" => self.on_chat(fields.str("message")?),
            "kick" => {
                let reason = fields.str("reason")?.to_owned();
                error!(%reason, "kicked by server");
                return Err(ClientError::Kicked { reason });
            }
            other => trace!(message = other, "ignored"),
        }
        Ok(())
    }

    fn on_handshake(&mut self, server_id: &str) -> Result<(), ClientError> {
        if self.phase != Phase::HandshakeSent {
            return Err(self.unexpected("handshake"));
        }
        if server_id != "-" && server_id != "+" {
            let token = self.services.login(&self.username, &self.password)?;
            self.services.join(server_id, &token)?;
        }
        info!(server_id, username = %self.username, "handshake accepted; logging in");
        self.bot
            .outbound()
            .login(self.protocol, &self.username, &self.password)?;
        self.phase = Phase::LoggingIn;
        Ok(())
    }

    fn on_login(&mut self, fields: &Fields) -> Result<(), ClientError> {
        if self.phase != Phase::LoggingIn {
            return Err(self.unexpected("login"));
        }
        // The server reuses the protocol slot for our entity id.
        let entity_id = int32(fields, "protocol")?;
        self.bot.set_entity_id(entity_id);
        self.phase = Phase::Playing;
        info!(entity_id, "logged in");
        Ok(())
    }

    fn on_position(&mut self, name: &'static str, fields: &Fields) -> Result<(), ClientError> {
        let pose = &mut self.bot.pose;
        // Swapped on the way in: the `y` slot holds the stance.
        pose.position = Vector::new(
            fields.float("x")?,
            fields.float("stance")?,
            fields.float("z")?,
        );
        pose.stance = fields.float("y")?;
        if name == "location" {
            pose.yaw = fields.float("yaw")?;
            pose.pitch = fields.float("pitch")?;
        }
        pose.on_ground = fields.bool("grounded")?;
        let pose = *pose;
        if !self.placed {
            info!(position = %pose.position, "placed by server");
        }
        self.placed = true;
        self.bot.outbound().pose(&pose)?;
        Ok(())
    }

    fn on_map_chunk(&mut self, fields: &Fields) -> Result<(), ClientError> {
        let origin = BlockPos::new(
            int32(fields, "x")?,
            int32(fields, "y")?,
            int32(fields, "z")?,
        );
        let extents = Extents::new(
            int32(fields, "size_x")? + 1,
            int32(fields, "size_y")? + 1,
            int32(fields, "size_z")? + 1,
        );
        let data = fields.bytes("data")?.clone();
        self.bot.world.on_region_loaded(origin, extents, data);
        Ok(())
    }

    fn on_multi_block_change(&mut self, fields: &Fields) -> Result<(), ClientError> {
        let coords = fields.int_array("coords")?;
        let kinds = fields.int_array("kinds")?;
        let metadata = fields.int_array("metadata")?;
        let entries: Vec<BatchEntry> = coords
            .iter()
            .zip(&kinds)
            .zip(&metadata)
            .map(|((&coord, &kind), &meta)| BatchEntry {
                coord: coord as u16,
                kind: kind as u8,
                metadata: meta as u8,
            })
            .collect();
        let (x, z) = (int32(fields, "x")?, int32(fields, "z")?);
        if self.bot.world.apply_batch_change(x, z, &entries) == ChangeOutcome::Dropped {
            debug!(x, z, count = entries.len(), "batch change partly dropped");
        }
        Ok(())
    }

    fn on_entity_update(&mut self, name: &'static str, fields: &Fields) -> Result<(), ClientError> {
        let eid = int32(fields, "eid")?;
        let entities = &mut self.bot.entities;
        let known = match name {
            "entity-move" => {
                entities.relative_move(eid, fields.int("dx")?, fields.int("dy")?, fields.int("dz")?)
            }
            "entity-look" => entities.look(eid, fields.int("yaw")?, fields.int("pitch")?),
            "entity-move-look" => {
                entities.relative_move(eid, fields.int("dx")?, fields.int("dy")?, fields.int("dz")?)
                    && entities.look(eid, fields.int("yaw")?, fields.int("pitch")?)
            }
            _ => entities.teleport(
                eid,
                fields.int("x")?,
                fields.int("y")?,
                fields.int("z")?,
                fields.int("yaw")?,
                fields.int("pitch")?,
            ),
        };
        if !known {
            trace!(eid, message = name, "update for unknown entity");
        }
        Ok(())
    }

    /// A line typed on the console: a command, or else plain chat.
    pub fn console(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        let handled = self
            .router
            .dispatch(CommandSource::Console, CONSOLE_USER, line, &mut self.bot);
        if handled {
            return;
        }
        if let Err(e) = self.bot.outbound().chat(line) {
            warn!(error = %e, "failed to send console chat");
        }
    }

    fn on_chat(&mut self, line: &str) {
        info!(line, "chat");
        if let Some((user, text)) = parse_chat_line(line) {
            self.router
                .dispatch(CommandSource::Chat, user, text, &mut self.bot);
        }
    }
}
