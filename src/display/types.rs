// src/display/types.rs
//! Plain data exchanged between callers, the session and its capabilities.
//!
//! Buffer descriptions follow the usual graphics-buffer descriptor shape
//! (width, height, layers, format, usage, stride) and are passed through
//! untouched; nothing in the session interprets the pixels they describe.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Static capability metadata for the display a session drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayDescriptor {
    pub id: u64,
    pub name: String,
    pub width_px: u32,
    pub height_px: u32,
    pub vendor_flags: u32,
}

/// Display state as requested by the session owner.
///
/// `Dead` is entered only through a forced shutdown and can never be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayState {
    NotVisible,
    /// Becomes `Visible` once the next frame has been presented.
    VisibleOnNextFrame,
    Visible,
    Dead,
}

impl DisplayState {
    /// Whether frames returned in this state are composed and presented.
    pub fn is_visible(self) -> bool {
        matches!(self, DisplayState::VisibleOnNextFrame | DisplayState::Visible)
    }
}

/// Pixel layout of the target buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgba8888,
    Rgbx8888,
    Bgra8888,
    Rgb565,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8888 | PixelFormat::Rgbx8888 | PixelFormat::Bgra8888 => 4,
            PixelFormat::Rgb565 => 2,
        }
    }
}

bitflags! {
    /// Intended uses of a graphics buffer, mirrored to the allocator.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct BufferUsage: u64 {
        const CPU_READ_OFTEN    = 1 << 0;
        const CPU_WRITE_OFTEN   = 1 << 1;
        const GPU_TEXTURE       = 1 << 2;
        const GPU_RENDER_TARGET = 1 << 3;
        const COMPOSER_OVERLAY  = 1 << 4;
    }
}

/// Format and size metadata of a graphics buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDescription {
    pub width_px: u32,
    pub height_px: u32,
    pub layers: u32,
    pub format: PixelFormat,
    pub usage: BufferUsage,
    /// Row pitch in pixels, at least `width_px`.
    pub stride_px: u32,
}

impl BufferDescription {
    /// Size in bytes of one layer's backing store, `None` if it does not fit
    /// in the address space.
    pub fn byte_len(&self) -> Option<usize> {
        (self.stride_px as usize)
            .checked_mul(self.height_px as usize)?
            .checked_mul(self.format.bytes_per_pixel())
    }

    /// Checks that the description names a buffer that can be allocated and
    /// addressed row by row.
    pub fn validate(&self) -> Result<(), String> {
        if self.stride_px < self.width_px {
            return Err(format!(
                "stride {} is narrower than width {}",
                self.stride_px, self.width_px
            ));
        }
        if self.byte_len().is_none() {
            return Err(format!(
                "{}x{} buffer with stride {} is too large",
                self.width_px, self.height_px, self.stride_px
            ));
        }
        Ok(())
    }
}

/// Opaque reference to the memory behind the target buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// Opaque reference to a display resource granted by the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle(pub u64);

/// An RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Pixel rectangle in buffer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One item of content to compose into the target buffer.
///
/// Layers are composed in ascending `z_order`; equal orders keep list order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub z_order: i32,
    pub rect: Rect,
    pub color: Rgba,
}

/// What the render thread hands to the proxy after composing a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposedFrame {
    pub handle: BufferHandle,
    pub fingerprint: u64,
    pub description: BufferDescription,
    /// Monotonic count of frames the render thread has composed.
    pub sequence: u64,
}

/// Frame counters kept by the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_presented: u64,
    /// Frames returned while the display was not visible.
    pub frames_discarded: u64,
    pub compose_failures: u64,
    pub present_failures: u64,
}
