// Outbound command surface used by actions and the session loop.
//
// `Outbound` turns agent-level intents (say this, start digging there, here
// is my pose) into registered messages, encodes them, and hands the frames
// to a `PacketSink`. Sending is synchronous; an encode failure or transport
// error is returned to the caller as `OutboundError`.
//
// The sink is a trait so the agent never sees a socket: the client crate
// plugs in a buffered TCP writer, tests plug in a recorder.

use std::io;

use blockbot_protocol::{Fields, ItemStack, encode};
use bytes::Bytes;
use tracing::trace;

use crate::bot::Pose;
use crate::error::OutboundError;
use crate::types::{BlockPos, Face};

/// Destination for encoded frames.
pub trait PacketSink {
    fn send(&mut self, frame: Bytes) -> io::Result<()>;
}

/// Status codes of the `digging` message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DigStatus {
    Started = 0,
    Digging = 1,
    Stopped = 2,
    Broken = 3,
    Dropped = 4,
}

pub struct Outbound {
    sink: Box<dyn PacketSink>,
    sent: u64,
}

impl Outbound {
    pub fn new(sink: impl PacketSink + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            sent: 0,
        }
    }

    /// Number of frames handed to the sink so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Encode and send any registered message.
    pub fn send(&mut self, name: &'static str, fields: &Fields) -> Result<(), OutboundError> {
        let frame = encode(name, fields)?;
        trace!(message = name, bytes = frame.len(), "send");
        self.sink.send(frame)?;
        self.sent += 1;
        Ok(())
    }

    pub fn chat(&mut self, text: &str) -> Result<(), OutboundError> {
        self.send("chat", &Fields::new().with("message", text))
    }

    /// Ask the server to move `me` to `target` via its chat command.
    pub fn teleport_request(&mut self, me: &str, target: &str) -> Result<(), OutboundError> {
        self.chat(&format!("/tp {me} {target}"))
    }

    pub fn dig(
        &mut self,
        status: DigStatus,
        pos: BlockPos,
        face: Option<Face>,
    ) -> Result<(), OutboundError> {
        let fields = Fields::new()
            .with("status", status as i8)
            .with("x", pos.x)
            .with("y", pos.y)
            .with("z", pos.z)
            .with("face", Face::code(face));
        self.send("digging", &fields)
    }

    /// Use `item` against `face` of the block at `pos`.
    pub fn place(
        &mut self,
        item: Option<ItemStack>,
        pos: BlockPos,
        face: Option<Face>,
    ) -> Result<(), OutboundError> {
        let fields = Fields::new()
            .with("x", pos.x)
            .with("y", pos.y)
            .with("z", pos.z)
            .with("face", Face::code(face))
            .with("item", item);
        self.send("block-placement", &fields)
    }

    pub fn held_item(&mut self, slot: i32, item: i16) -> Result<(), OutboundError> {
        let fields = Fields::new().with("slot", slot).with("item", item);
        self.send("held-item-change", &fields)
    }

    pub fn arm_animation(&mut self, eid: i32, swing: bool) -> Result<(), OutboundError> {
        let fields = Fields::new()
            .with("eid", eid)
            .with("animation", i8::from(swing));
        self.send("arm-animation", &fields)
    }

    pub fn pose(&mut self, pose: &Pose) -> Result<(), OutboundError> {
        let fields = Fields::new()
            .with("x", pose.position.x)
            .with("y", pose.position.y)
            .with("stance", pose.stance)
            .with("z", pose.position.z)
            .with("yaw", pose.yaw as f32)
            .with("pitch", pose.pitch as f32)
            .with("grounded", pose.on_ground);
        self.send("location", &fields)
    }

    pub fn keep_alive(&mut self) -> Result<(), OutboundError> {
        self.send("keep-alive", &Fields::new())
    }

    pub fn handshake(&mut self, username: &str) -> Result<(), OutboundError> {
        self.send("handshake", &Fields::new().with("token", username))
    }

    pub fn login(
        &mut self,
        protocol: i32,
        username: &str,
        password: &str,
    ) -> Result<(), OutboundError> {
        let fields = Fields::new()
            .with("protocol", protocol)
            .with("username", username)
            .with("password", password)
            .with("seed", 0i64)
            .with("dimension", 0i8);
        self.send("login", &fields)
    }
}
