// Static message registry: numeric tag <-> name <-> ordered field layout.
//
// Every message the client understands is one row in `REGISTRY`. The codec
// never special-cases a message; growing the protocol means adding rows
// here. The same layout serves both directions, which holds for this
// protocol revision except for `location`, where the server sends `stance`
// and `y` swapped. That swap is a dispatch concern, not a framing one.
//
// Field names are the keys callers use with `Fields`. Entity coordinates are
// absolute fixed-point (1/32 block) and entity angles are packed into one
// byte per angle (256 steps per turn); see `blockbot_agent::entity` for the
// conversions. The three `size_*` fields of `map-chunk` carry extent - 1.

use crate::types::{FieldKind, FieldSpec, Prefix};

/// Layout of one registered message.
#[derive(Debug)]
pub struct MessageSpec {
    pub tag: u8,
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

const fn f(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, kind }
}

use FieldKind::{Bool, F32, F64, I8, I16, I32, I64, Metadata, Slot, Str, U8};

pub static REGISTRY: &[MessageSpec] = &[
    MessageSpec {
        tag: 0x00,
        name: "keep-alive",
        fields: &[],
    },
    MessageSpec {
        tag: 0x01,
        name: "login",
        fields: &[
            f("protocol", I32),
            f("username", Str),
            f("password", Str),
            f("seed", I64),
            f("dimension", I8),
        ],
    },
    MessageSpec {
        tag: 0x02,
        name: "handshake",
        fields: &[f("token", Str)],
    },
    MessageSpec {
        tag: 0x03,
        name: "chat",
        fields: &[f("message", Str)],
    },
    MessageSpec {
        tag: 0x04,
        name: "time",
        fields: &[f("time", I64)],
    },
    MessageSpec {
        tag: 0x06,
        name: "spawn-position",
        fields: &[f("x", I32), f("y", I32), f("z", I32)],
    },
    MessageSpec {
        tag: 0x0A,
        name: "grounded",
        fields: &[f("grounded", Bool)],
    },
    MessageSpec {
        tag: 0x0B,
        name: "position",
        fields: &[
            f("x", F64),
            f("y", F64),
            f("stance", F64),
            f("z", F64),
            f("grounded", Bool),
        ],
    },
    MessageSpec {
        tag: 0x0C,
        name: "orientation",
        fields: &[f("yaw", F32), f("pitch", F32), f("grounded", Bool)],
    },
    MessageSpec {
        tag: 0x0D,
        name: "location",
        fields: &[
            f("x", F64),
            f("y", F64),
            f("stance", F64),
            f("z", F64),
            f("yaw", F32),
            f("pitch", F32),
            f("grounded", Bool),
        ],
    },
    MessageSpec {
        tag: 0x0E,
        name: "digging",
        fields: &[
            f("status", I8),
            f("x", I32),
            f("y", I8),
            f("z", I32),
            f("face", I8),
        ],
    },
    MessageSpec {
        tag: 0x0F,
        name: "block-placement",
        fields: &[
            f("x", I32),
            f("y", I8),
            f("z", I32),
            f("face", I8),
            f("item", Slot),
        ],
    },
    MessageSpec {
        tag: 0x10,
        name: "held-item-change",
        fields: &[f("slot", I32), f("item", I16)],
    },
    MessageSpec {
        tag: 0x12,
        name: "arm-animation",
        fields: &[f("eid", I32), f("animation", I8)],
    },
    MessageSpec {
        tag: 0x14,
        name: "named-entity-spawn",
        fields: &[
            f("eid", I32),
            f("name", Str),
            f("x", I32),
            f("y", I32),
            f("z", I32),
            f("yaw", I8),
            f("pitch", I8),
            f("item", I16),
        ],
    },
    MessageSpec {
        tag: 0x18,
        name: "mob-spawn",
        fields: &[
            f("eid", I32),
            f("kind", I8),
            f("x", I32),
            f("y", I32),
            f("z", I32),
            f("yaw", I8),
            f("pitch", I8),
            f("metadata", Metadata),
        ],
    },
    MessageSpec {
        tag: 0x1D,
        name: "entity-destroy",
        fields: &[f("eid", I32)],
    },
    MessageSpec {
        tag: 0x1F,
        name: "entity-move",
        fields: &[f("eid", I32), f("dx", I8), f("dy", I8), f("dz", I8)],
    },
    MessageSpec {
        tag: 0x20,
        name: "entity-look",
        fields: &[f("eid", I32), f("yaw", I8), f("pitch", I8)],
    },
    MessageSpec {
        tag: 0x21,
        name: "entity-move-look",
        fields: &[
            f("eid", I32),
            f("dx", I8),
            f("dy", I8),
            f("dz", I8),
            f("yaw", I8),
            f("pitch", I8),
        ],
    },
    MessageSpec {
        tag: 0x22,
        name: "entity-teleport",
        fields: &[
            f("eid", I32),
            f("x", I32),
            f("y", I32),
            f("z", I32),
            f("yaw", I8),
            f("pitch", I8),
        ],
    },
    MessageSpec {
        tag: 0x28,
        name: "entity-metadata",
        fields: &[f("eid", I32), f("metadata", Metadata)],
    },
    MessageSpec {
        tag: 0x32,
        name: "pre-chunk",
        fields: &[f("x", I32), f("z", I32), f("load", Bool)],
    },
    MessageSpec {
        tag: 0x33,
        name: "map-chunk",
        fields: &[
            f("x", I32),
            f("y", I16),
            f("z", I32),
            f("size_x", U8),
            f("size_y", U8),
            f("size_z", U8),
            f("data", FieldKind::Blob(Prefix::I32)),
        ],
    },
    MessageSpec {
        tag: 0x34,
        name: "multi-block-change",
        fields: &[
            f("x", I32),
            f("z", I32),
            f("count", I16),
            f(
                "coords",
                FieldKind::Array {
                    count: "count",
                    element: &I16,
                },
            ),
            f(
                "kinds",
                FieldKind::Array {
                    count: "count",
                    element: &I8,
                },
            ),
            f(
                "metadata",
                FieldKind::Array {
                    count: "count",
                    element: &I8,
                },
            ),
        ],
    },
    MessageSpec {
        tag: 0x35,
        name: "block-change",
        fields: &[
            f("x", I32),
            f("y", I8),
            f("z", I32),
            f("kind", I8),
            f("metadata", I8),
        ],
    },
    MessageSpec {
        tag: 0xFF,
        name: "kick",
        fields: &[f("reason", Str)],
    },
];

/// Look up a message layout by its wire tag.
pub fn by_tag(tag: u8) -> Option<&'static MessageSpec> {
    REGISTRY.iter().find(|m| m.tag == tag)
}

/// Look up a message layout by its registered name.
pub fn by_name(name: &str) -> Option<&'static MessageSpec> {
    REGISTRY.iter().find(|m| m.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tags_and_names_are_unique() {
        let tags: HashSet<u8> = REGISTRY.iter().map(|m| m.tag).collect();
        let names: HashSet<&str> = REGISTRY.iter().map(|m| m.name).collect();
        assert_eq!(tags.len(), REGISTRY.len());
        assert_eq!(names.len(), REGISTRY.len());
    }

    #[test]
    fn array_counts_refer_to_earlier_int_fields() {
        for msg in REGISTRY {
            for (i, field) in msg.fields.iter().enumerate() {
                if let FieldKind::Array { count, .. } = field.kind {
                    let earlier = msg.fields[..i].iter().find(|f| f.name == count);
                    let earlier = earlier.unwrap_or_else(|| {
                        panic!("{}: count field `{count}` not declared first", msg.name)
                    });
                    assert!(matches!(
                        earlier.kind,
                        FieldKind::I8 | FieldKind::I16 | FieldKind::I32 | FieldKind::U8
                    ));
                }
            }
        }
    }

    #[test]
    fn lookup_both_ways() {
        assert_eq!(by_tag(0x0E).unwrap().name, "digging");
        assert_eq!(by_name("kick").unwrap().tag, 0xFF);
        assert!(by_tag(0x99).is_none());
        assert!(by_name("teleport").is_none());
    }
}
