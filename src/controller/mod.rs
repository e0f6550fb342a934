//! Dual-boundary controller: two shared watchers per scroll root, one for
//! each sentinel edge, routed back to tracked elements by owner id.

mod core;

pub use self::core::{
    BOTTOM_THRESHOLDS, Boundary, BoundaryDecision, BoundaryRouter, DualBoundaryController,
    ObserverPair, TOP_THRESHOLDS, classify_bottom, classify_top,
};
