//! Versioned (key, value) properties.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::clock::{ClockRef, VClock};

/// A string key/value pair with creation and deletion stamps.
///
/// Identity is the (key, value) pair alone: two properties compare equal
/// whenever key and value match, regardless of their stamps, and the hash
/// depends only on the key. This is what makes a predicate property (built
/// with [`Property::new`], no meaningful stamps) usable as an equality probe
/// against stored, stamped properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub key: String,
    pub value: String,
    creat_time: ClockRef,
    del_time: Option<ClockRef>,
}

impl Property {
    /// An unstamped property, suitable as an edge predicate.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            creat_time: ClockRef::new(VClock::ZERO),
            del_time: None,
        }
    }

    /// A stored property stamped with its creation clock.
    pub fn stamped(key: impl Into<String>, value: impl Into<String>, creat: ClockRef) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            creat_time: creat,
            del_time: None,
        }
    }

    pub fn creat_time(&self) -> &ClockRef {
        &self.creat_time
    }

    pub fn del_time(&self) -> Option<&ClockRef> {
        self.del_time.as_ref()
    }

    pub fn is_deleted(&self) -> bool {
        self.del_time.is_some()
    }

    /// True iff the property is live at `at`.
    pub fn visible_at(&self, at: VClock) -> bool {
        *self.creat_time <= at && self.del_time.as_deref().is_none_or(|del| at < *del)
    }

    /// Mark the property deleted.
    ///
    /// An already-set deletion stamp should only move forward; a non-later
    /// stamp indicates a misordered write upstream.
    pub fn update_del_time(&mut self, del: ClockRef) {
        debug_assert!(
            self.del_time.as_deref().is_none_or(|old| *old < *del),
            "deletion stamp moved backwards"
        );
        self.del_time = Some(del);
    }

    /// Re-stamp the creation clock (used when elements migrate shards).
    pub fn update_creat_time(&mut self, creat: ClockRef) {
        self.creat_time = creat;
    }
}

impl PartialEq for Property {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.value == other.value
    }
}

impl Eq for Property {}

impl Hash for Property {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}
