use thiserror::Error;

/// Unified result type for the sticky detection engine.
pub type Result<T> = std::result::Result<T, StickyError>;

/// Errors surfaced while bracketing regions or talking to the host.
///
/// Registry outcomes (duplicate registration, removal of an absent id) are
/// not errors; they are reported as `bool` by the registry itself. Logging
/// failures never reach callers and keep their own [`LoggingError`].
///
/// [`LoggingError`]: crate::logging::LoggingError
#[derive(Debug, Error)]
pub enum StickyError {
    #[error("host node `{0}` not found")]
    UnknownNode(String),
    #[error("tracked element `{0}` is already mounted")]
    AlreadyMounted(String),
    #[error("owner id `{0}` is already registered with this provider")]
    DuplicateOwner(String),
    #[error("host error: {0}")]
    Host(String),
}
