// Incremental decoder and encoder for the tag-prefixed wire format.
//
// The stream has no length prefix: a message is a 1-byte tag followed by the
// fields its registry layout declares, so the only way to find a message
// boundary is to parse it. Two decoding styles share the same field reader,
// which is generic over `ByteSource`:
//
// - `decode_all` (and its stateful wrapper `Decoder`) scans a buffer and
//   decodes as many complete messages as it holds. A message cut off by the
//   end of the buffer is rolled back to its tag byte and returned as
//   leftover, never reported as an error.
// - `decode_one` over a `FeedReader` blocks each field read until the
//   producer side (`Feeder`) has pushed enough bytes. Exactly one read may be
//   outstanding; a second concurrent read fails with
//   `DecodeError::ReadAlreadyPending`.
//
// An unknown tag ends the scan with a `Packet::Unrecognized` carrying the
// remaining buffered bytes. Since nothing after an unknown tag can be framed,
// callers treat it as the end of a trustworthy stream. A malformed message
// ends it too, as a `FrameError` that still hands back every message decoded
// before the bad one.
//
// `encode` looks the message up by name and writes the caller's fields in
// declared order. Extra fields are ignored; a missing or mistyped field is
// an error rather than a silently zeroed value.
//
// See also: `message.rs` for the registry, `types.rs` for `Fields`/`Value`.
//
// **Critical constraint: no partial consumption.** `decode_all` either
// consumes a whole message or none of it, so feeding a stream split at any
// byte offset yields the same messages as feeding it whole.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::error::{DecodeError, EncodeError, FrameError};
use crate::message::{MessageSpec, by_name, by_tag};
use crate::types::{FieldKind, Fields, ItemStack, MetaValue, MetadataEntry, Packet, Prefix, Value};

/// Largest accepted blob, string or array length (16 MB). Anything larger is
/// treated as a corrupt length field rather than allocated.
pub const MAX_FIELD_LENGTH: i64 = 16 * 1024 * 1024;

/// Terminator byte of a metadata list.
const METADATA_END: u8 = 0x7F;

// ---------------------------------------------------------------------------
// Byte sources
// ---------------------------------------------------------------------------

/// Something the field reader can pull bytes from.
pub trait ByteSource {
    /// Fill `dst` completely or fail.
    fn read_exact(&mut self, dst: &mut [u8]) -> Result<(), DecodeError>;

    /// Take the next `n` bytes as an owned buffer.
    fn take(&mut self, n: usize) -> Result<Bytes, DecodeError> {
        let mut buf = vec![0u8; n];
        self.read_exact(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    /// Remove and return everything currently buffered.
    fn drain_buffered(&mut self) -> Bytes;
}

/// A cursor over a borrowed buffer. Running off the end is `Incomplete`.
pub struct SliceSource<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn claim(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos + n;
        if end > self.buf.len() {
            return Err(DecodeError::Incomplete {
                needed: end - self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

impl ByteSource for SliceSource<'_> {
    fn read_exact(&mut self, dst: &mut [u8]) -> Result<(), DecodeError> {
        let src = self.claim(dst.len())?;
        dst.copy_from_slice(src);
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<Bytes, DecodeError> {
        self.claim(n).map(Bytes::copy_from_slice)
    }

    fn drain_buffered(&mut self) -> Bytes {
        let rest = Bytes::copy_from_slice(&self.buf[self.pos..]);
        self.pos = self.buf.len();
        rest
    }
}

// ---------------------------------------------------------------------------
// Push-fed reader
// ---------------------------------------------------------------------------

struct FeedState {
    buf: BytesMut,
    /// Byte count the pending read is waiting for, if any.
    wanted: Option<usize>,
    closed: bool,
}

struct FeedShared {
    state: Mutex<FeedState>,
    ready: Condvar,
}

impl FeedShared {
    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Producer half of a push-fed byte stream.
#[derive(Clone)]
pub struct Feeder {
    shared: Arc<FeedShared>,
}

/// Consumer half of a push-fed byte stream. Reads block until enough bytes
/// have been pushed.
#[derive(Clone)]
pub struct FeedReader {
    shared: Arc<FeedShared>,
}

/// Create a connected feeder/reader pair.
pub fn feed_channel() -> (Feeder, FeedReader) {
    let shared = Arc::new(FeedShared {
        state: Mutex::new(FeedState {
            buf: BytesMut::new(),
            wanted: None,
            closed: false,
        }),
        ready: Condvar::new(),
    });
    (
        Feeder {
            shared: Arc::clone(&shared),
        },
        FeedReader { shared },
    )
}

impl Feeder {
    /// Append bytes. Wakes the pending read once it can be satisfied.
    pub fn push(&self, data: &[u8]) {
        let mut state = self.shared.lock();
        state.buf.extend_from_slice(data);
        if state.wanted.is_some_and(|n| state.buf.len() >= n) {
            self.shared.ready.notify_one();
        }
    }

    /// End the stream. A pending or later read that cannot be satisfied from
    /// what is already buffered fails with `DecodeError::Closed`.
    pub fn close(&self) {
        self.shared.lock().closed = true;
        self.shared.ready.notify_all();
    }
}

impl FeedReader {
    /// Byte count the outstanding read is waiting for.
    pub fn pending(&self) -> Option<usize> {
        self.shared.lock().wanted
    }

    fn wait_for(&self, n: usize) -> Result<MutexGuard<'_, FeedState>, DecodeError> {
        let mut state = self.shared.lock();
        if state.wanted.is_some() {
            return Err(DecodeError::ReadAlreadyPending);
        }
        while state.buf.len() < n {
            if state.closed {
                state.wanted = None;
                return Err(DecodeError::Closed);
            }
            state.wanted = Some(n);
            state = self
                .shared
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.wanted = None;
        Ok(state)
    }
}

impl ByteSource for FeedReader {
    fn read_exact(&mut self, dst: &mut [u8]) -> Result<(), DecodeError> {
        let mut state = self.wait_for(dst.len())?;
        state.buf.copy_to_slice(dst);
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<Bytes, DecodeError> {
        let mut state = self.wait_for(n)?;
        Ok(state.buf.split_to(n).freeze())
    }

    fn drain_buffered(&mut self) -> Bytes {
        self.shared.lock().buf.split().freeze()
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn read_bytes<const N: usize, S: ByteSource + ?Sized>(src: &mut S) -> Result<[u8; N], DecodeError> {
    let mut buf = [0u8; N];
    src.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_u8<S: ByteSource + ?Sized>(src: &mut S) -> Result<u8, DecodeError> {
    Ok(read_bytes::<1, S>(src)?[0])
}

fn read_i8<S: ByteSource + ?Sized>(src: &mut S) -> Result<i8, DecodeError> {
    Ok(i8::from_be_bytes(read_bytes(src)?))
}

fn read_i16<S: ByteSource + ?Sized>(src: &mut S) -> Result<i16, DecodeError> {
    Ok(i16::from_be_bytes(read_bytes(src)?))
}

fn read_i32<S: ByteSource + ?Sized>(src: &mut S) -> Result<i32, DecodeError> {
    Ok(i32::from_be_bytes(read_bytes(src)?))
}

fn check_length(field: &'static str, length: i64) -> Result<usize, DecodeError> {
    if !(0..=MAX_FIELD_LENGTH).contains(&length) {
        return Err(DecodeError::InvalidLength { field, length });
    }
    Ok(length as usize)
}

fn read_string<S: ByteSource + ?Sized>(
    src: &mut S,
    field: &'static str,
) -> Result<String, DecodeError> {
    let len = check_length(field, i64::from(read_i16(src)?))?;
    let raw = src.take(len)?;
    String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidString { field })
}

fn read_item<S: ByteSource + ?Sized>(src: &mut S, id: i16) -> Result<ItemStack, DecodeError> {
    let count = read_u8(src)?;
    let damage = read_i16(src)?;
    Ok(ItemStack { id, count, damage })
}

fn read_metadata<S: ByteSource + ?Sized>(
    src: &mut S,
    field: &'static str,
) -> Result<Vec<MetadataEntry>, DecodeError> {
    let mut entries = Vec::new();
    loop {
        let header = read_u8(src)?;
        if header == METADATA_END {
            return Ok(entries);
        }
        let key = header & 0x1F;
        let value = match header >> 5 {
            0 => MetaValue::Byte(read_i8(src)?),
            1 => MetaValue::Short(read_i16(src)?),
            2 => MetaValue::Int(read_i32(src)?),
            3 => MetaValue::Float(f32::from_be_bytes(read_bytes(src)?)),
            4 => MetaValue::Str(read_string(src, field)?),
            5 => {
                let id = read_i16(src)?;
                MetaValue::Item(read_item(src, id)?)
            }
            6 => MetaValue::Position(read_i32(src)?, read_i32(src)?, read_i32(src)?),
            code => return Err(DecodeError::BadMetadataType { code }),
        };
        entries.push(MetadataEntry { key, value });
    }
}

fn read_value<S: ByteSource + ?Sized>(
    src: &mut S,
    field: &'static str,
    kind: FieldKind,
    earlier: &Fields,
) -> Result<Value, DecodeError> {
    let value = match kind {
        FieldKind::U8 => Value::Int(i64::from(read_u8(src)?)),
        FieldKind::I8 => Value::Int(i64::from(read_i8(src)?)),
        FieldKind::U16 => Value::Int(i64::from(u16::from_be_bytes(read_bytes(src)?))),
        FieldKind::I16 => Value::Int(i64::from(read_i16(src)?)),
        FieldKind::I32 => Value::Int(i64::from(read_i32(src)?)),
        FieldKind::I64 => Value::Int(i64::from_be_bytes(read_bytes(src)?)),
        FieldKind::F32 => Value::Float(f64::from(f32::from_be_bytes(read_bytes(src)?))),
        FieldKind::F64 => Value::Float(f64::from_be_bytes(read_bytes(src)?)),
        FieldKind::Bool => Value::Bool(read_u8(src)? != 0),
        FieldKind::Str => Value::Str(read_string(src, field)?),
        FieldKind::Fixed(n) => Value::Bytes(src.take(n)?),
        FieldKind::Blob(prefix) => {
            let raw_len = match prefix {
                Prefix::U8 => i64::from(read_u8(src)?),
                Prefix::I16 => i64::from(read_i16(src)?),
                Prefix::I32 => i64::from(read_i32(src)?),
            };
            let len = check_length(field, raw_len)?;
            Value::Bytes(src.take(len)?)
        }
        FieldKind::Slot => {
            let id = read_i16(src)?;
            if id < 0 {
                Value::Slot(None)
            } else {
                Value::Slot(Some(read_item(src, id)?))
            }
        }
        FieldKind::Metadata => Value::Metadata(read_metadata(src, field)?),
        FieldKind::Array { count, element } => {
            // The registry guarantees the count field precedes the array.
            let n = check_length(field, earlier.int(count).unwrap_or(-1))?;
            let mut items = Vec::with_capacity(n.min(1024));
            for _ in 0..n {
                items.push(read_value(src, field, *element, earlier)?);
            }
            Value::Array(items)
        }
    };
    Ok(value)
}

fn read_fields<S: ByteSource + ?Sized>(
    src: &mut S,
    spec: &'static MessageSpec,
) -> Result<Fields, DecodeError> {
    let mut fields = Fields::new();
    for field in spec.fields {
        let value = read_value(src, field.name, field.kind, &fields)?;
        fields.set(field.name, value);
    }
    Ok(fields)
}

/// Decode exactly one message from `src`, blocking on the source for each
/// field as needed.
pub fn decode_one<S: ByteSource + ?Sized>(src: &mut S) -> Result<Packet, DecodeError> {
    let tag = read_u8(src)?;
    match by_tag(tag) {
        Some(spec) => Ok(Packet::Message {
            tag,
            name: spec.name,
            fields: read_fields(src, spec)?,
        }),
        None => Ok(Packet::Unrecognized {
            tag,
            payload: src.drain_buffered(),
        }),
    }
}

/// Result of a `decode_all` scan.
#[derive(Debug)]
pub struct Decoded<'a> {
    /// Complete messages, in arrival order.
    pub packets: Vec<Packet>,
    /// The unconsumed tail: a partial message, or empty.
    pub leftover: &'a [u8],
}

/// Decode every complete message at the start of `buffer`.
///
/// A trailing partial message is returned as `leftover`, starting at its tag
/// byte. Malformed fields are an error; the messages decoded before the
/// malformed one travel with it in `FrameError::decoded`.
pub fn decode_all(buffer: &[u8]) -> Result<Decoded<'_>, FrameError> {
    let mut src = SliceSource::new(buffer);
    let mut packets = Vec::new();
    while src.position() < buffer.len() {
        let start = src.position();
        match decode_one(&mut src) {
            Ok(packet) => {
                if let Packet::Unrecognized { tag, payload } = &packet {
                    trace!(
                        tag,
                        offset = start,
                        bytes = payload.len(),
                        "unrecognized tag ends the scan"
                    );
                    packets.push(packet);
                    break;
                }
                packets.push(packet);
            }
            Err(DecodeError::Incomplete { needed }) => {
                trace!(offset = start, needed, "partial message held back");
                return Ok(Decoded {
                    packets,
                    leftover: &buffer[start..],
                });
            }
            Err(error) => {
                debug!(offset = start, decoded = packets.len(), %error, "malformed message");
                return Err(FrameError {
                    decoded: packets,
                    error,
                });
            }
        }
    }
    Ok(Decoded {
        packets,
        leftover: &buffer[src.position()..],
    })
}

/// Stateful wrapper around `decode_all` that keeps leftovers between feeds.
#[derive(Debug, Default)]
pub struct Decoder {
    buf: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `data` and return every message that is now complete.
    ///
    /// A malformed message discards everything buffered, since nothing after
    /// it can be framed.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Packet>, FrameError> {
        self.buf.extend_from_slice(data);
        match decode_all(&self.buf) {
            Ok(Decoded { packets, leftover }) => {
                let consumed = self.buf.len() - leftover.len();
                self.buf.advance(consumed);
                Ok(packets)
            }
            Err(e) => {
                self.buf.clear();
                Err(e)
            }
        }
    }

    /// Bytes held back as a partial message.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

struct EncodeCtx<'a> {
    message: &'static str,
    field: &'static str,
    fields: &'a Fields,
}

impl EncodeCtx<'_> {
    fn out_of_range(&self) -> EncodeError {
        EncodeError::OutOfRange {
            message: self.message,
            field: self.field,
        }
    }

    fn mismatch(&self, expected: &'static str, found: &Value) -> EncodeError {
        EncodeError::TypeMismatch {
            message: self.message,
            field: self.field,
            expected,
            found: found.type_name(),
        }
    }

    fn int(&self, value: &Value) -> Result<i64, EncodeError> {
        match value {
            Value::Int(i) => Ok(*i),
            other => Err(self.mismatch("int", other)),
        }
    }

    fn narrow<T: TryFrom<i64>>(&self, value: &Value) -> Result<T, EncodeError> {
        T::try_from(self.int(value)?).map_err(|_| self.out_of_range())
    }

    fn float(&self, value: &Value) -> Result<f64, EncodeError> {
        match value {
            Value::Float(f) => Ok(*f),
            other => Err(self.mismatch("float", other)),
        }
    }

    fn bytes<'v>(&self, value: &'v Value) -> Result<&'v Bytes, EncodeError> {
        match value {
            Value::Bytes(b) => Ok(b),
            other => Err(self.mismatch("bytes", other)),
        }
    }
}

fn write_string(out: &mut BytesMut, ctx: &EncodeCtx<'_>, s: &str) -> Result<(), EncodeError> {
    let len = i16::try_from(s.len()).map_err(|_| ctx.out_of_range())?;
    out.put_i16(len);
    out.put_slice(s.as_bytes());
    Ok(())
}

fn write_item(out: &mut BytesMut, ctx: &EncodeCtx<'_>, item: &ItemStack) -> Result<(), EncodeError> {
    if item.id < 0 {
        return Err(ctx.out_of_range());
    }
    out.put_i16(item.id);
    out.put_u8(item.count);
    out.put_i16(item.damage);
    Ok(())
}

fn write_metadata(
    out: &mut BytesMut,
    ctx: &EncodeCtx<'_>,
    entries: &[MetadataEntry],
) -> Result<(), EncodeError> {
    for entry in entries {
        let header = (entry.value.type_code() << 5) | entry.key;
        // A header equal to the terminator would end the list early.
        if entry.key > 0x1F || header == METADATA_END {
            return Err(ctx.out_of_range());
        }
        out.put_u8(header);
        match &entry.value {
            MetaValue::Byte(v) => out.put_i8(*v),
            MetaValue::Short(v) => out.put_i16(*v),
            MetaValue::Int(v) => out.put_i32(*v),
            MetaValue::Float(v) => out.put_f32(*v),
            MetaValue::Str(s) => write_string(out, ctx, s)?,
            MetaValue::Item(item) => write_item(out, ctx, item)?,
            MetaValue::Position(x, y, z) => {
                out.put_i32(*x);
                out.put_i32(*y);
                out.put_i32(*z);
            }
        }
    }
    out.put_u8(METADATA_END);
    Ok(())
}

fn write_value(
    out: &mut BytesMut,
    ctx: &EncodeCtx<'_>,
    kind: FieldKind,
    value: &Value,
) -> Result<(), EncodeError> {
    match kind {
        FieldKind::U8 => out.put_u8(ctx.narrow(value)?),
        FieldKind::I8 => out.put_i8(ctx.narrow(value)?),
        FieldKind::U16 => out.put_u16(ctx.narrow(value)?),
        FieldKind::I16 => out.put_i16(ctx.narrow(value)?),
        FieldKind::I32 => out.put_i32(ctx.narrow(value)?),
        FieldKind::I64 => out.put_i64(ctx.int(value)?),
        FieldKind::F32 => out.put_f32(ctx.float(value)? as f32),
        FieldKind::F64 => out.put_f64(ctx.float(value)?),
        FieldKind::Bool => match value {
            Value::Bool(b) => out.put_u8(u8::from(*b)),
            other => return Err(ctx.mismatch("bool", other)),
        },
        FieldKind::Str => match value {
            Value::Str(s) => write_string(out, ctx, s)?,
            other => return Err(ctx.mismatch("string", other)),
        },
        FieldKind::Fixed(n) => {
            let bytes = ctx.bytes(value)?;
            if bytes.len() != n {
                return Err(ctx.out_of_range());
            }
            out.put_slice(bytes);
        }
        FieldKind::Blob(prefix) => {
            let bytes = ctx.bytes(value)?;
            let len = bytes.len();
            match prefix {
                Prefix::U8 => out.put_u8(u8::try_from(len).map_err(|_| ctx.out_of_range())?),
                Prefix::I16 => out.put_i16(i16::try_from(len).map_err(|_| ctx.out_of_range())?),
                Prefix::I32 => out.put_i32(i32::try_from(len).map_err(|_| ctx.out_of_range())?),
            }
            out.put_slice(bytes);
        }
        FieldKind::Slot => match value {
            Value::Slot(None) => out.put_i16(-1),
            Value::Slot(Some(item)) => write_item(out, ctx, item)?,
            other => return Err(ctx.mismatch("slot", other)),
        },
        FieldKind::Metadata => match value {
            Value::Metadata(entries) => write_metadata(out, ctx, entries)?,
            other => return Err(ctx.mismatch("metadata", other)),
        },
        FieldKind::Array { count, element } => {
            let items = match value {
                Value::Array(items) => items,
                other => return Err(ctx.mismatch("array", other)),
            };
            let declared = ctx.fields.int(count).map_err(|_| EncodeError::MissingField {
                message: ctx.message,
                field: count,
            })?;
            if usize::try_from(declared).ok() != Some(items.len()) {
                return Err(EncodeError::CountMismatch {
                    message: ctx.message,
                    field: ctx.field,
                    declared,
                    actual: items.len(),
                });
            }
            for item in items {
                write_value(out, ctx, *element, item)?;
            }
        }
    }
    Ok(())
}

/// Serialize the registered message `name` from `fields`.
pub fn encode(name: &str, fields: &Fields) -> Result<Bytes, EncodeError> {
    let spec = by_name(name).ok_or_else(|| EncodeError::UnknownMessage(name.to_owned()))?;
    let mut out = BytesMut::with_capacity(32);
    out.put_u8(spec.tag);
    for field in spec.fields {
        let value = fields.get(field.name).ok_or(EncodeError::MissingField {
            message: spec.name,
            field: field.name,
        })?;
        let ctx = EncodeCtx {
            message: spec.name,
            field: field.name,
            fields,
        };
        write_value(&mut out, &ctx, field.kind, value)?;
    }
    Ok(out.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::REGISTRY;
    use std::thread;
    use std::time::Duration;

    /// Plausible values for every field of a registered message. Integer
    /// fields that serve as array counts get the array length.
    fn sample_fields(spec: &MessageSpec) -> Fields {
        const ARRAY_LEN: usize = 3;
        let counts: Vec<&str> = spec
            .fields
            .iter()
            .filter_map(|f| match f.kind {
                FieldKind::Array { count, .. } => Some(count),
                _ => None,
            })
            .collect();
        let mut fields = Fields::new();
        for (i, field) in spec.fields.iter().enumerate() {
            let n = i as i64 + 1;
            let value = match field.kind {
                _ if counts.contains(&field.name) => Value::Int(ARRAY_LEN as i64),
                FieldKind::U8 => Value::Int(200 + n),
                FieldKind::I8 => Value::Int(-n),
                FieldKind::U16 => Value::Int(60_000),
                FieldKind::I16 => Value::Int(-300 * n),
                FieldKind::I32 => Value::Int(-70_000 * n),
                FieldKind::I64 => Value::Int(i64::MIN + n),
                FieldKind::F32 => Value::Float(1.5 * n as f64),
                FieldKind::F64 => Value::Float(-0.1 * n as f64),
                FieldKind::Bool => Value::Bool(true),
                FieldKind::Str => Value::Str(format!("field-{n} ☃")),
                FieldKind::Fixed(len) => Value::Bytes(Bytes::from(vec![7u8; len])),
                FieldKind::Blob(_) => Value::Bytes(Bytes::from_static(b"\x78\x9c\x03\x00")),
                FieldKind::Slot => Value::Slot(Some(ItemStack {
                    id: 4,
                    count: 64,
                    damage: 3,
                })),
                FieldKind::Metadata => Value::Metadata(vec![
                    MetadataEntry {
                        key: 0,
                        value: MetaValue::Byte(1),
                    },
                    MetadataEntry {
                        key: 16,
                        value: MetaValue::Str("wool".into()),
                    },
                ]),
                FieldKind::Array { .. } => Value::Array(
                    (0..ARRAY_LEN as i64).map(|k| Value::Int(k - 1)).collect(),
                ),
            };
            fields.set(field.name, value);
        }
        fields
    }

    fn single(bytes: &[u8]) -> Packet {
        let decoded = decode_all(bytes).unwrap();
        assert!(decoded.leftover.is_empty());
        assert_eq!(decoded.packets.len(), 1);
        decoded.packets.into_iter().next().unwrap()
    }

    #[test]
    fn every_registered_message_round_trips() {
        for spec in REGISTRY {
            let fields = sample_fields(spec);
            let bytes = encode(spec.name, &fields).unwrap();
            assert_eq!(bytes[0], spec.tag);
            let expected = Packet::Message {
                tag: spec.tag,
                name: spec.name,
                fields,
            };
            assert_eq!(single(&bytes), expected, "{}", spec.name);
        }
    }

    #[test]
    fn chat_wire_layout() {
        let bytes = encode("chat", &Fields::new().with("message", "minecraft")).unwrap();
        assert_eq!(&bytes[..], b"\x03\x00\x09minecraft");
    }

    #[test]
    fn bool_and_keep_alive_layout() {
        assert_eq!(&encode("keep-alive", &Fields::new()).unwrap()[..], b"\x00");
        let grounded = encode("grounded", &Fields::new().with("grounded", true)).unwrap();
        assert_eq!(&grounded[..], b"\x0a\x01");
    }

    #[test]
    fn empty_slot_is_a_negative_id() {
        let fields = Fields::new()
            .with("x", 1i32)
            .with("y", 64i8)
            .with("z", -1i32)
            .with("face", 1i8)
            .with("item", None::<ItemStack>);
        let bytes = encode("block-placement", &fields).unwrap();
        assert_eq!(bytes.len(), 1 + 4 + 1 + 4 + 1 + 2);
        assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xFF]);
        match single(&bytes) {
            Packet::Message { fields, .. } => {
                assert_eq!(fields.get("item"), Some(&Value::Slot(None)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn split_at_every_offset_yields_the_same_message() {
        for spec in REGISTRY {
            let whole = encode(spec.name, &sample_fields(spec)).unwrap();
            let expected = single(&whole);

            for split in 0..=whole.len() {
                let mut decoder = Decoder::new();
                let first = decoder.feed(&whole[..split]).unwrap();
                if first.is_empty() {
                    assert_eq!(decoder.buffered(), split, "{} split at {split}", spec.name);
                }
                let second = decoder.feed(&whole[split..]).unwrap();
                let all: Vec<Packet> = first.into_iter().chain(second).collect();
                assert_eq!(all, vec![expected.clone()], "{} split at {split}", spec.name);
                assert_eq!(decoder.buffered(), 0);
            }
        }
    }

    #[test]
    fn split_stream_of_every_message_decodes_in_order() {
        let mut whole = Vec::new();
        for spec in REGISTRY {
            whole.extend_from_slice(&encode(spec.name, &sample_fields(spec)).unwrap());
        }
        for split in (0..=whole.len()).step_by(7) {
            let mut decoder = Decoder::new();
            let mut names = Vec::new();
            for part in [&whole[..split], &whole[split..]] {
                names.extend(decoder.feed(part).unwrap().iter().filter_map(Packet::name));
            }
            let expected: Vec<&str> = REGISTRY.iter().map(|spec| spec.name).collect();
            assert_eq!(names, expected, "split at {split}");
        }
    }

    #[test]
    fn malformed_message_keeps_the_messages_before_it() {
        let mut stream = encode("time", &Fields::new().with("time", 6000i64))
            .unwrap()
            .to_vec();
        stream.extend_from_slice(&encode("keep-alive", &Fields::new()).unwrap());
        stream.extend_from_slice(b"\x03\xff\xfe");

        let err = decode_all(&stream).unwrap_err();
        let names: Vec<_> = err.decoded.iter().filter_map(Packet::name).collect();
        assert_eq!(names, vec!["time", "keep-alive"]);
        assert!(matches!(err.error, DecodeError::InvalidLength { field: "message", .. }));

        let mut decoder = Decoder::new();
        let err = decoder.feed(&stream).unwrap_err();
        assert_eq!(err.decoded.len(), 2);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn trailing_partial_message_is_leftover() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&encode("time", &Fields::new().with("time", 6000i64)).unwrap());
        stream.extend_from_slice(&encode("keep-alive", &Fields::new()).unwrap());
        let chat = encode("chat", &Fields::new().with("message", "hello")).unwrap();
        stream.extend_from_slice(&chat[..4]);

        let decoded = decode_all(&stream).unwrap();
        let names: Vec<_> = decoded.packets.iter().filter_map(Packet::name).collect();
        assert_eq!(names, vec!["time", "keep-alive"]);
        assert_eq!(decoded.leftover, &chat[..4]);
    }

    #[test]
    fn empty_buffer_decodes_nothing() {
        let decoded = decode_all(&[]).unwrap();
        assert!(decoded.packets.is_empty());
        assert!(decoded.leftover.is_empty());
    }

    #[test]
    fn unknown_tag_keeps_raw_payload() {
        let mut stream = encode("keep-alive", &Fields::new()).unwrap().to_vec();
        stream.extend_from_slice(&[0x99, 1, 2, 3]);
        let decoded = decode_all(&stream).unwrap();
        assert_eq!(decoded.packets.len(), 2);
        assert_eq!(
            decoded.packets[1],
            Packet::Unrecognized {
                tag: 0x99,
                payload: Bytes::from_static(&[1, 2, 3]),
            }
        );
        assert!(decoded.leftover.is_empty());
    }

    #[test]
    fn negative_string_length_is_malformed() {
        let err = decode_all(b"\x03\xff\xfe").unwrap_err();
        assert!(err.decoded.is_empty());
        assert_eq!(
            err.error,
            DecodeError::InvalidLength {
                field: "message",
                length: -2
            }
        );
    }

    #[test]
    fn oversized_blob_length_is_malformed() {
        let mut bytes = vec![0x33];
        bytes.extend_from_slice(&[0; 4 + 2 + 4 + 3]);
        bytes.extend_from_slice(&((MAX_FIELD_LENGTH + 1) as i32).to_be_bytes());
        let err = decode_all(&bytes).unwrap_err().error;
        assert!(matches!(err, DecodeError::InvalidLength { field: "data", .. }));
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let err = decode_all(b"\xff\x00\x02\xc3\x28").unwrap_err().error;
        assert_eq!(err, DecodeError::InvalidString { field: "reason" });
    }

    #[test]
    fn unknown_metadata_type_is_malformed() {
        // entity-metadata, eid 1, header with type code 7 and key 0.
        let err = decode_all(b"\x28\x00\x00\x00\x01\xe0\x00").unwrap_err().error;
        assert_eq!(err, DecodeError::BadMetadataType { code: 7 });
    }

    #[test]
    fn encode_rejects_unknown_message() {
        let err = encode("fly", &Fields::new()).unwrap_err();
        assert_eq!(err, EncodeError::UnknownMessage("fly".into()));
    }

    #[test]
    fn encode_rejects_missing_field() {
        let fields = Fields::new().with("status", 0i8).with("x", 1i32);
        let err = encode("digging", &fields).unwrap_err();
        assert_eq!(
            err,
            EncodeError::MissingField {
                message: "digging",
                field: "y"
            }
        );
    }

    #[test]
    fn encode_ignores_extra_fields() {
        let fields = Fields::new().with("message", "hi").with("colour", "red");
        assert_eq!(&encode("chat", &fields).unwrap()[..], b"\x03\x00\x02hi");
    }

    #[test]
    fn encode_rejects_wrong_type_and_range() {
        let err = encode("chat", &Fields::new().with("message", 5i32)).unwrap_err();
        assert!(matches!(err, EncodeError::TypeMismatch { expected: "string", found: "int", .. }));

        let fields = Fields::new()
            .with("status", 300i32)
            .with("x", 0i32)
            .with("y", 0i8)
            .with("z", 0i32)
            .with("face", 0i8);
        let err = encode("digging", &fields).unwrap_err();
        assert_eq!(
            err,
            EncodeError::OutOfRange {
                message: "digging",
                field: "status"
            }
        );
    }

    #[test]
    fn encode_rejects_count_mismatch() {
        let fields = Fields::new()
            .with("x", 0i32)
            .with("z", 0i32)
            .with("count", 2i16)
            .with("coords", vec![Value::Int(1)])
            .with("kinds", vec![Value::Int(1)])
            .with("metadata", vec![Value::Int(0)]);
        let err = encode("multi-block-change", &fields).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::CountMismatch {
                field: "coords",
                declared: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn metadata_terminator_collision_is_rejected() {
        let fields = Fields::new().with("eid", 1i32).with(
            "metadata",
            vec![MetadataEntry {
                key: 31,
                value: MetaValue::Float(1.0),
            }],
        );
        let err = encode("entity-metadata", &fields).unwrap_err();
        assert!(matches!(err, EncodeError::OutOfRange { field: "metadata", .. }));
    }

    #[test]
    fn feed_reader_waits_for_pushed_bytes() {
        let bytes = encode("chat", &Fields::new().with("message", "slow delivery")).unwrap();
        let (feeder, mut reader) = feed_channel();
        let producer = thread::spawn(move || {
            for chunk in bytes.chunks(3) {
                feeder.push(chunk);
                thread::sleep(Duration::from_millis(2));
            }
        });
        let packet = decode_one(&mut reader).unwrap();
        producer.join().unwrap();
        match packet {
            Packet::Message { name, fields, .. } => {
                assert_eq!(name, "chat");
                assert_eq!(fields.str("message").unwrap(), "slow delivery");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn second_pending_read_is_rejected() {
        let (feeder, reader) = feed_channel();
        let mut first = reader.clone();
        let waiting = thread::spawn(move || first.take(4));
        while reader.pending().is_none() {
            thread::sleep(Duration::from_millis(1));
        }
        let mut second = reader.clone();
        assert_eq!(second.take(1).unwrap_err(), DecodeError::ReadAlreadyPending);

        feeder.push(&[1, 2, 3, 4]);
        assert_eq!(&waiting.join().unwrap().unwrap()[..], &[1, 2, 3, 4]);
        assert_eq!(reader.pending(), None);
    }

    #[test]
    fn close_fails_the_pending_read() {
        let (feeder, mut reader) = feed_channel();
        feeder.push(&[0x03, 0x00]);
        let waiting = thread::spawn(move || decode_one(&mut reader));
        thread::sleep(Duration::from_millis(5));
        feeder.close();
        assert_eq!(waiting.join().unwrap().unwrap_err(), DecodeError::Closed);
    }
}
