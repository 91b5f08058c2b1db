// src/renderer/software.rs
//! CPU renderer composing solid layers into an in-memory RGBA buffer.
//!
//! Useful for headless runs and tests. The backing store is keyed by the
//! buffer fingerprint: a new fingerprint drops the old store and imports a
//! fresh one sized for the new description.

use crate::display::buffer::BufferRecord;
use crate::display::types::{BufferDescription, Layer, PixelFormat, Rgba};
use crate::renderer::Renderer;
use anyhow::{bail, Result};
use log::{debug, info, trace};
use std::sync::{Arc, Mutex};

/// A snapshot of the last composed frame, shared with whoever built the renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameSnapshot {
    pub fingerprint: u64,
    pub width_px: u32,
    pub height_px: u32,
    pub pixels: Vec<u8>,
}

impl FrameSnapshot {
    /// The RGBA value at `(x, y)`, if inside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width_px || y >= self.height_px {
            return None;
        }
        let offset = (y as usize * self.width_px as usize + x as usize) * 4;
        let px = self.pixels.get(offset..offset + 4)?;
        Some(Rgba::new(px[0], px[1], px[2], px[3]))
    }
}

struct ImportedBuffer {
    fingerprint: u64,
    description: BufferDescription,
    pixels: Box<[u8]>,
}

pub struct SoftwareRenderer {
    clear_color: Rgba,
    initialized: bool,
    imported: Option<ImportedBuffer>,
    last_frame: Arc<Mutex<FrameSnapshot>>,
}

impl SoftwareRenderer {
    pub fn new(clear_color: Rgba) -> Self {
        Self {
            clear_color,
            initialized: false,
            imported: None,
            last_frame: Arc::new(Mutex::new(FrameSnapshot::default())),
        }
    }

    /// Handle to the last composed frame. Stays valid after the renderer has
    /// moved onto the render thread.
    pub fn last_frame(&self) -> Arc<Mutex<FrameSnapshot>> {
        Arc::clone(&self.last_frame)
    }

    fn import(&mut self, target: &BufferRecord, byte_len: usize) -> &mut ImportedBuffer {
        let buffer = match self.imported.take() {
            Some(buffer) if buffer.fingerprint == target.fingerprint => buffer,
            _ => {
                debug!(
                    "SoftwareRenderer: Importing buffer {:?} (fingerprint {})",
                    target.handle, target.fingerprint
                );
                ImportedBuffer {
                    fingerprint: target.fingerprint,
                    description: target.description,
                    pixels: vec![0u8; byte_len].into_boxed_slice(),
                }
            }
        };
        self.imported.insert(buffer)
    }
}

fn check_format(description: &BufferDescription) -> Result<()> {
    match description.format {
        PixelFormat::Rgba8888 | PixelFormat::Rgbx8888 => Ok(()),
        other => bail!("SoftwareRenderer only draws 32-bit RGBA, got {:?}", other),
    }
}

fn fill(pixels: &mut [u8], stride_px: u32, width_px: u32, height_px: u32, layer: &Layer) {
    let x_end = layer.rect.x.saturating_add(layer.rect.width).min(width_px);
    let y_end = layer.rect.y.saturating_add(layer.rect.height).min(height_px);
    let rgba = [layer.color.r, layer.color.g, layer.color.b, layer.color.a];
    for y in layer.rect.y..y_end {
        let row = y as usize * stride_px as usize * 4;
        for x in layer.rect.x..x_end {
            let offset = row + x as usize * 4;
            pixels[offset..offset + 4].copy_from_slice(&rgba);
        }
    }
}

impl Renderer for SoftwareRenderer {
    fn initialize_context(&mut self, description: &BufferDescription) -> Result<()> {
        check_format(description)?;
        info!(
            "SoftwareRenderer: Context ready for {}x{} {:?}",
            description.width_px, description.height_px, description.format
        );
        self.initialized = true;
        Ok(())
    }

    fn compose_into(&mut self, target: &BufferRecord, layers: &[Layer]) -> Result<()> {
        if !self.initialized {
            bail!("compose_into called before initialize_context");
        }
        check_format(&target.description)?;
        if let Err(reason) = target.description.validate() {
            bail!("SoftwareRenderer cannot address buffer: {}", reason);
        }
        let Some(byte_len) = target.description.byte_len() else {
            bail!("SoftwareRenderer cannot size buffer {:?}", target.handle);
        };

        let clear = self.clear_color;
        let buffer = self.import(target, byte_len);
        let BufferDescription {
            width_px,
            height_px,
            stride_px,
            ..
        } = buffer.description;

        for px in buffer.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&[clear.r, clear.g, clear.b, clear.a]);
        }
        for layer in layers {
            trace!("SoftwareRenderer: Layer z={} {:?}", layer.z_order, layer.rect);
            fill(&mut buffer.pixels, stride_px, width_px, height_px, layer);
        }

        let mut snapshot = FrameSnapshot {
            fingerprint: buffer.fingerprint,
            width_px,
            height_px,
            pixels: Vec::with_capacity(width_px as usize * height_px as usize * 4),
        };
        for y in 0..height_px as usize {
            let row = y * stride_px as usize * 4;
            snapshot
                .pixels
                .extend_from_slice(&buffer.pixels[row..row + width_px as usize * 4]);
        }
        *self
            .last_frame
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = snapshot;
        Ok(())
    }
}
