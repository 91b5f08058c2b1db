// src/display/mod.rs
//! Display session: the target buffer handoff between caller threads and the
//! render thread.
//!
//! - DisplaySession: public request/return/shutdown protocol
//! - DisplayProxy: platform service owning the physical output
//! - FrameBufferSlot / Handoff / RenderThreadState: the state guarded by the
//!   session mutex

pub mod buffer;
pub mod drivers;
pub mod error;
pub mod handoff;
pub mod proxy;
pub mod session;
pub mod thread_state;
pub mod types;

pub use buffer::{BufferRecord, TargetBuffer};
pub use drivers::HeadlessDisplayProxy;
pub use error::DisplayError;
pub use proxy::DisplayProxy;
pub use session::DisplaySession;
pub use thread_state::RenderThreadState;
pub use types::{
    BufferDescription, BufferHandle, BufferUsage, ComposedFrame, DisplayDescriptor, DisplayState,
    Layer, PixelFormat, Rect, ResourceHandle, Rgba, SessionStats,
};
