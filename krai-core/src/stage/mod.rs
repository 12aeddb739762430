//! Stage state machine (spec §4.5).

mod tracker;

pub use tracker::StageTracker;
