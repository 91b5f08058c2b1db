// src/display/proxy.rs
//! DisplayProxy trait - the platform service that owns the physical output.
//!
//! ## Threading Model
//! - `acquire_display_resource` and `release_display_resource` run on whatever
//!   thread constructs or shuts down the session
//! - `present_buffer` runs on the render thread, once per composed frame
//!
//! Implementations must therefore be `Send + Sync` and do their own interior
//! locking if they keep state.

use crate::display::types::{ComposedFrame, ResourceHandle};
use anyhow::Result;

pub trait DisplayProxy: Send + Sync {
    /// Grants this session the output identified by `display_id`.
    fn acquire_display_resource(&self, display_id: u64) -> Result<ResourceHandle>;

    /// Pushes a composed frame to the output.
    ///
    /// A failure only loses this frame; the session keeps rendering.
    fn present_buffer(&self, resource: ResourceHandle, frame: &ComposedFrame) -> Result<()>;

    /// Gives the output back. Called once, at shutdown.
    fn release_display_resource(&self, display_id: u64);
}
