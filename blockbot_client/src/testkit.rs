// Test fixtures: a packet sink that keeps frames for inspection.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use blockbot_agent::PacketSink;
use blockbot_protocol::{Packet, decode_all};
use bytes::Bytes;

#[derive(Clone, Default)]
pub struct FrameLog {
    frames: Rc<RefCell<Vec<Bytes>>>,
}

impl FrameLog {
    pub fn packets(&self) -> Vec<Packet> {
        let joined: Vec<u8> = self.frames.borrow().iter().flatten().copied().collect();
        decode_all(&joined).unwrap().packets
    }

    /// Packets sent, by name, minus the per-tick pose.
    pub fn names(&self) -> Vec<&'static str> {
        self.packets()
            .iter()
            .filter_map(Packet::name)
            .filter(|n| *n != "location")
            .collect()
    }
}

impl PacketSink for FrameLog {
    fn send(&mut self, frame: Bytes) -> io::Result<()> {
        self.frames.borrow_mut().push(frame);
        Ok(())
    }
}

/// Text of every chat message sent.
pub fn chat_lines(log: &FrameLog) -> Vec<String> {
    log.packets()
        .into_iter()
        .filter_map(|p| match p {
            Packet::Message {
                name: "chat",
                fields,
                ..
            } => fields.str("message").ok().map(str::to_owned),
            _ => None,
        })
        .collect()
}
