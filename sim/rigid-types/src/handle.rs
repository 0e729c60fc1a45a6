//! Generation-checked handles for bodies, joints and joint groups.
//!
//! Every handle pairs a [`slotmap`] key with the identity of the world that
//! issued it. The key's generation rejects handles whose slot has been freed
//! and reused; the world tag rejects handles presented to the wrong world.

use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

slotmap::new_key_type! {
    /// Arena key for bodies.
    pub struct BodyKey;
    /// Arena key for joints.
    pub struct JointKey;
    /// Arena key for joint groups.
    pub struct GroupKey;
}

static NEXT_WORLD: AtomicU32 = AtomicU32::new(0);

/// Identity of a world, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WorldId(u32);

impl WorldId {
    /// Allocate a fresh world identity.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_WORLD.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for WorldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "World({})", self.0)
    }
}

macro_rules! world_handle {
    ($(#[$meta:meta])* $name:ident, $key:ty, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub struct $name {
            world: WorldId,
            key: $key,
        }

        impl $name {
            /// Create a handle from its world tag and arena key.
            #[must_use]
            pub const fn new(world: WorldId, key: $key) -> Self {
                Self { world, key }
            }

            /// World that issued this handle.
            #[must_use]
            pub const fn world(self) -> WorldId {
                self.world
            }

            /// Arena key inside the issuing world.
            #[must_use]
            pub const fn key(self) -> $key {
                self.key
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                use slotmap::Key;
                write!(f, concat!($label, "({:#x}@{})"), self.key.data().as_ffi(), self.world.0)
            }
        }
    };
}

world_handle!(
    /// Handle to a rigid body.
    BodyId,
    BodyKey,
    "Body"
);
world_handle!(
    /// Handle to a joint of any variant.
    JointId,
    JointKey,
    "Joint"
);
world_handle!(
    /// Handle to a joint group.
    JointGroupId,
    GroupKey,
    "JointGroup"
);
