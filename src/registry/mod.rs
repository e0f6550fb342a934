mod core;

pub use self::core::{ObservationRegistry, OwnerId, StuckCallback};
