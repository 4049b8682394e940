//! Named compression profiles.
//!
//! A profile is a name plus a hook configuration for the shared walker.
//! The numbered profiles layer optimizations cumulatively; the `baseline`
//! entries pin the reference points the numbered ones are measured against.

use std::io::{Read, Write};

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use tracing::debug;

use crate::builder::AdaptiveModels;
use crate::context::ContextModels;
use crate::error::{Error, Result};
use crate::schema::Record;
use crate::text::TextOrder;
use crate::walk;

bitflags! {
    /// Hook-point switches layered by the numbered profiles.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HookFlags: u8 {
        /// 1-bit match flags for commonly-fixed enums.
        const ENUM_PREDICTION = 1 << 0;
        /// Domain-tuned byte models selected by field name.
        const CONTEXT_BYTES = 1 << 1;
        /// Bit-packed clusters of adjacent boolean fields.
        const CLUSTERS = 1 << 2;
        /// Per-name boolean and presence models.
        const FIELD_BOOLS = 1 << 3;
        /// Distinct first/continuation varint byte models.
        const VARINT_POSITION = 1 << 4;
    }
}

/// How field presence is transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStrategy {
    /// One boolean symbol per declared field, interleaved with values.
    Bits,
    /// A varint count of present fields followed by tag deltas.
    Deltas,
    /// A per-message strategy bit choosing between the other two.
    Flagged,
}

/// The full hook configuration of a profile.
#[derive(Debug, Clone, Copy)]
pub struct Hooks {
    pub presence: PresenceStrategy,
    pub flags: HookFlags,
    pub text: TextOrder,
}

/// Registry index of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ProfileId {
    Baseline = 0,
    BaselineOrder1,
    BaselineOrder2,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
    V7,
    V8,
    V9,
    V10,
}

/// A named encode/decode pair over the shared walker.
#[derive(Debug, Clone, Copy)]
pub struct Profile {
    id: ProfileId,
    name: &'static str,
    description: &'static str,
    hooks: Hooks,
}

const V4_FLAGS: HookFlags = HookFlags::ENUM_PREDICTION;
const V5_FLAGS: HookFlags = V4_FLAGS.union(HookFlags::CONTEXT_BYTES);
const V6_FLAGS: HookFlags = V5_FLAGS.union(HookFlags::CLUSTERS);
const V7_FLAGS: HookFlags = V6_FLAGS.union(HookFlags::FIELD_BOOLS);
const V8_FLAGS: HookFlags = V7_FLAGS.union(HookFlags::VARINT_POSITION);

const fn hooks(presence: PresenceStrategy, flags: HookFlags, text: TextOrder) -> Hooks {
    Hooks {
        presence,
        flags,
        text,
    }
}

static PROFILES: [Profile; 13] = [
    Profile {
        id: ProfileId::Baseline,
        name: "baseline",
        description: "presence bits, uniform models",
        hooks: hooks(
            PresenceStrategy::Bits,
            HookFlags::empty(),
            TextOrder::Order0,
        ),
    },
    Profile {
        id: ProfileId::BaselineOrder1,
        name: "baseline+order-1",
        description: "baseline with order-1 text coding",
        hooks: hooks(
            PresenceStrategy::Bits,
            HookFlags::empty(),
            TextOrder::Order1,
        ),
    },
    Profile {
        id: ProfileId::BaselineOrder2,
        name: "baseline+order-2",
        description: "baseline with order-2 text coding",
        hooks: hooks(
            PresenceStrategy::Bits,
            HookFlags::empty(),
            TextOrder::Order2,
        ),
    },
    Profile {
        id: ProfileId::V1,
        name: "v1",
        description: "presence bit per declared field",
        hooks: hooks(
            PresenceStrategy::Bits,
            HookFlags::empty(),
            TextOrder::Order0,
        ),
    },
    Profile {
        id: ProfileId::V2,
        name: "v2",
        description: "present-field tag deltas",
        hooks: hooks(
            PresenceStrategy::Deltas,
            HookFlags::empty(),
            TextOrder::Order0,
        ),
    },
    Profile {
        id: ProfileId::V3,
        name: "v3",
        description: "per-message presence strategy flag",
        hooks: hooks(
            PresenceStrategy::Flagged,
            HookFlags::empty(),
            TextOrder::Order0,
        ),
    },
    Profile {
        id: ProfileId::V4,
        name: "v4",
        description: "enum predictions",
        hooks: hooks(PresenceStrategy::Bits, V4_FLAGS, TextOrder::Order0),
    },
    Profile {
        id: ProfileId::V5,
        name: "v5",
        description: "context-aware byte models",
        hooks: hooks(PresenceStrategy::Bits, V5_FLAGS, TextOrder::Order0),
    },
    Profile {
        id: ProfileId::V6,
        name: "v6",
        description: "boolean clustering",
        hooks: hooks(PresenceStrategy::Bits, V6_FLAGS, TextOrder::Order0),
    },
    Profile {
        id: ProfileId::V7,
        name: "v7",
        description: "per-field boolean models",
        hooks: hooks(PresenceStrategy::Bits, V7_FLAGS, TextOrder::Order0),
    },
    Profile {
        id: ProfileId::V8,
        name: "v8",
        description: "varint position models",
        hooks: hooks(PresenceStrategy::Bits, V8_FLAGS, TextOrder::Order0),
    },
    Profile {
        id: ProfileId::V9,
        name: "v9",
        description: "v8 with order-1 text coding",
        hooks: hooks(PresenceStrategy::Bits, V8_FLAGS, TextOrder::Order1),
    },
    Profile {
        id: ProfileId::V10,
        name: "v10",
        description: "v8 with order-2 text coding",
        hooks: hooks(PresenceStrategy::Bits, V8_FLAGS, TextOrder::Order2),
    },
];

impl Profile {
    /// Every registered profile, in registry order.
    #[must_use]
    pub fn all() -> &'static [Profile] {
        &PROFILES
    }

    #[must_use]
    pub fn by_name(name: &str) -> Option<&'static Profile> {
        PROFILES.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn by_id(id: ProfileId) -> &'static Profile {
        &PROFILES[usize::from(u8::from(id))]
    }

    #[must_use]
    pub fn id(&self) -> ProfileId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Compress one record into `sink`.
    ///
    /// The output is a self-contained bitstream with no framing; the profile
    /// and the schema travel out of band.
    pub fn compress<W: Write>(&self, record: &Record, sink: &mut W) -> Result<()> {
        debug!(
            profile = self.name,
            message = record.descriptor().name(),
            "compress"
        );
        if self.hooks.flags.contains(HookFlags::CONTEXT_BYTES) {
            walk::encode_record(record, ContextModels::new(), self.hooks, sink)
        } else {
            walk::encode_record(record, AdaptiveModels::new(), self.hooks, sink)
        }
    }

    /// Compress one record into a fresh byte vector.
    pub fn compress_to_vec(&self, record: &Record) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.compress(record, &mut out)?;
        Ok(out)
    }

    /// Decompress one record from `source` into `record`, which must be a
    /// fresh (all-absent) instance of the right descriptor.
    pub fn decompress<R: Read>(&self, source: &mut R, record: &mut Record) -> Result<()> {
        if !record.is_empty() {
            return Err(Error::InvariantViolation(
                "decompress target record is not empty",
            ));
        }
        debug!(
            profile = self.name,
            message = record.descriptor().name(),
            "decompress"
        );
        if self.hooks.flags.contains(HookFlags::CONTEXT_BYTES) {
            walk::decode_record(record, ContextModels::new(), self.hooks, source)
        } else {
            walk::decode_record(record, AdaptiveModels::new(), self.hooks, source)
        }
    }
}
