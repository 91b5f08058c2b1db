// src/renderer.rs

//! This module defines the `Renderer` capability and the render thread that
//! drives it.
//!
//! A `Renderer` owns whatever graphics context is needed to turn a list of
//! layers into pixels inside the session's target buffer. The session never
//! looks at those pixels: it only sequences `initialize_context` and
//! `compose_into` calls on a dedicated thread (see [`actor`]) and forwards the
//! result to the display proxy.

pub mod actor;
#[cfg(test)]
pub(crate) mod mock;
pub mod software;

pub use software::SoftwareRenderer;

use crate::display::buffer::BufferRecord;
use crate::display::types::{BufferDescription, Layer};
use anyhow::Result;

/// Opaque graphics capability used by the render thread.
///
/// Both methods are only ever called from the render thread, so
/// implementations need `Send` but not `Sync`.
pub trait Renderer: Send {
    /// Sets up the graphics context. Called once, lazily, when the render
    /// thread starts. A failure here is fatal to the render thread.
    fn initialize_context(&mut self, description: &BufferDescription) -> Result<()>;

    /// Composes `layers` into the buffer identified by `target`.
    ///
    /// `layers` arrive sorted by ascending z-order. When `target.fingerprint`
    /// differs from the previous call the buffer was reallocated and must be
    /// imported again. A failure only loses this frame.
    fn compose_into(&mut self, target: &BufferRecord, layers: &[Layer]) -> Result<()>;
}
