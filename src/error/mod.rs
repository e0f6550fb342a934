mod types;

pub use types::{Result, StickyError};
