//! Logical timestamps attached to graph elements.
//!
//! Clocks are produced by the coordinator's timeline service; the shard only
//! ever compares them. A request's id doubles as the clock it reads the graph
//! at, which is what gives a traversal a stable snapshot: every visibility
//! check during the request uses the same stamp, no matter how many hops it
//! takes or what gets written concurrently.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// An opaque, orderable timestamp.
///
/// Two sentinels bracket the timeline: [`VClock::ZERO`] (beginning of time)
/// and [`VClock::END_OF_TIME`]. A live element has `creat <= now < del`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct VClock(u64);

impl VClock {
    /// Beginning of time; everything is visible at or after it.
    pub const ZERO: VClock = VClock(0);

    /// End of time; the deletion stamp of every live element.
    pub const END_OF_TIME: VClock = VClock(u64::MAX);

    pub fn new(ticks: u64) -> Self {
        Self(ticks)
    }

    /// Raw tick count. Node handles are the ticks of their creation stamp.
    pub fn ticks(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for VClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared handle to a stamp.
///
/// A single stamp may be referenced by many properties and edges (one bulk
/// write stamps everything it touched), so holders share rather than copy.
pub type ClockRef = Arc<VClock>;

/// A fresh shared handle for the given tick count.
pub fn stamp(ticks: u64) -> ClockRef {
    Arc::new(VClock::new(ticks))
}

/// Shared handle to the end-of-time sentinel.
pub fn end_of_time() -> ClockRef {
    Arc::new(VClock::END_OF_TIME)
}
