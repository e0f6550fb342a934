mod core;

pub use self::core::{ProviderConfig, ProviderHandle, ViewportProvider};
