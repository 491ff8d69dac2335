// Shared fixtures for unit tests: compressed chunk payloads, ready-made
// worlds, a recording packet sink and a log capture.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use blockbot_protocol::{Packet, decode_all};
use bytes::Bytes;
use flate2::Compression;
use flate2::write::ZlibEncoder;

use crate::chunk::Extents;
use crate::outbound::PacketSink;
use crate::types::BlockPos;
use crate::world::World;

/// Compress a region whose cell at local offset `p` holds `f(p)` =
/// (kind, metadata), in the wire layout.
pub fn compress_region(extents: Extents, f: impl Fn(BlockPos) -> (u8, u8)) -> Bytes {
    let n = extents.volume();
    let mut kinds = vec![0u8; n];
    let mut nibbles = vec![0u8; n.div_ceil(2)];
    for x in 0..extents.x {
        for z in 0..extents.z {
            for y in 0..extents.y {
                let index = (y + z * extents.y + x * extents.y * extents.z) as usize;
                let (kind, meta) = f(BlockPos::new(x, y, z));
                kinds[index] = kind;
                let shift = if (index & 1) == 0 { 0 } else { 4 };
                nibbles[index / 2] |= (meta & 0x0F) << shift;
            }
        }
    }
    let mut raw = kinds;
    raw.extend_from_slice(&nibbles);
    // Block light and sky light.
    raw.extend(std::iter::repeat_n(0xFF, n));

    let mut enc = ZlibEncoder::new(Vec::new(), Compression::fast());
    enc.write_all(&raw).unwrap();
    Bytes::from(enc.finish().unwrap())
}

/// One full chunk at the origin: stone floor at y = 0, air above, plus the
/// extra blocks given as (position, kind).
pub fn floor_world(extra: &[(BlockPos, u8)]) -> World {
    let mut world = World::new(false);
    let payload = compress_region(Extents::FULL, |p| {
        match extra.iter().find(|(pos, _)| *pos == p) {
            Some((_, kind)) => (*kind, 0),
            None if p.y == 0 => (1, 0),
            None => (0, 0),
        }
    });
    world.on_region_loaded(BlockPos::new(0, 0, 0), Extents::FULL, payload);
    world
}

/// Packet sink that keeps every frame for inspection.
#[derive(Clone, Default)]
pub struct RecordingSink {
    frames: Rc<RefCell<Vec<Bytes>>>,
}

impl RecordingSink {
    pub fn packets(&self) -> Vec<Packet> {
        let joined: Vec<u8> = self.frames.borrow().iter().flatten().copied().collect();
        let decoded = decode_all(&joined).unwrap();
        assert!(decoded.leftover.is_empty());
        decoded.packets
    }

    /// Decoded packets, minus the per-tick pose updates.
    pub fn actions(&self) -> Vec<Packet> {
        self.packets()
            .into_iter()
            .filter(|p| p.name() != Some("location"))
            .collect()
    }
}

impl PacketSink for RecordingSink {
    fn send(&mut self, frame: Bytes) -> io::Result<()> {
        self.frames.borrow_mut().push(frame);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a subscriber that records formatted log lines, and return
/// them along with `f`'s result.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let writer = CaptureWriter::default();
    let sink = writer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || sink.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8(writer.0.lock().unwrap().clone()).unwrap();
    (result, logs)
}
