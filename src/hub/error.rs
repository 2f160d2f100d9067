//! Hub error types

/// Error type for hub operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    /// The hub has been shut down
    #[error("hub is shut down")]
    Closed,
}
