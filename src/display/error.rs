// src/display/error.rs
//! Tagged errors returned by the session entry points.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DisplayError {
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Target buffer is already checked out")]
    Busy,
    #[error("Stale buffer: fingerprint {returned} does not match live buffer {live}")]
    StaleBuffer { returned: u64, live: u64 },
    #[error("Render context initialization failed: {0}")]
    ContextInitFailed(String),
    #[error("Display session was shut down")]
    Shutdown,
    #[error("Failed to compose frame: {0}")]
    ComposeFailed(String),
    #[error("Failed to present frame: {0}")]
    PresentFailed(String),
    #[error("Failed to spawn render thread: {0}")]
    Spawn(String),
    #[error("Render thread panicked")]
    RenderThreadPanicked,
}

impl DisplayError {
    /// Whether the error only affected a single frame.
    pub fn is_per_frame(&self) -> bool {
        matches!(
            self,
            DisplayError::ComposeFailed(_) | DisplayError::PresentFailed(_)
        )
    }
}
