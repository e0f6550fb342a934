//! Per-instance supervisor for one sticky region.

mod core;

pub use self::core::{StuckState, TrackedElement, TrackedElementConfig};
