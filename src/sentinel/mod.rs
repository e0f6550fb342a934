//! Boundary markers bracketing a tracked element.
//!
//! The implementation lives in the private `core` module; this module only
//! re-exports the public surface.

mod core;

pub use self::core::{
    BottomSentinelGeometry, LOCATION_ATTR, Length, OWNER_ATTR, Sentinel, SentinelGeometry,
    SentinelLocation, SentinelPair, SentinelStyle, TopSentinelGeometry,
};
