// src/display/buffer.rs
//! The single target buffer slot and the handle callers hold while it is
//! checked out.

use crate::display::error::DisplayError;
use crate::display::types::{BufferDescription, BufferHandle, Layer};

/// The live graphics buffer owned by a session.
///
/// `fingerprint` changes whenever the memory behind `handle` is reallocated,
/// so anything that imported the old buffer knows to import it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferRecord {
    pub description: BufferDescription,
    pub handle: BufferHandle,
    pub fingerprint: u64,
}

/// Buffer record plus the checkout flag.
#[derive(Debug)]
pub(crate) struct FrameBufferSlot {
    record: BufferRecord,
    busy: bool,
    next_handle: u64,
}

impl FrameBufferSlot {
    pub(crate) fn new(description: BufferDescription) -> Self {
        Self {
            record: BufferRecord {
                description,
                handle: BufferHandle(1),
                fingerprint: 1,
            },
            busy: false,
            next_handle: 2,
        }
    }

    pub(crate) fn record(&self) -> &BufferRecord {
        &self.record
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.busy
    }

    /// Marks the buffer as checked out. Never blocks.
    pub(crate) fn check_out(&mut self) -> Result<TargetBuffer, DisplayError> {
        if self.busy {
            return Err(DisplayError::Busy);
        }
        self.busy = true;
        Ok(TargetBuffer {
            description: self.record.description,
            handle: self.record.handle,
            fingerprint: self.record.fingerprint,
            layers: Vec::new(),
        })
    }

    /// Confirms `buffer` refers to the live record and is checked out.
    pub(crate) fn validate_return(&self, buffer: &TargetBuffer) -> Result<(), DisplayError> {
        if buffer.fingerprint != self.record.fingerprint {
            return Err(DisplayError::StaleBuffer {
                returned: buffer.fingerprint,
                live: self.record.fingerprint,
            });
        }
        if !self.busy {
            return Err(DisplayError::InvalidState(
                "target buffer is not checked out".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn check_in(&mut self) {
        self.busy = false;
    }

    /// Replaces the backing memory, bumping the fingerprint and revoking any
    /// outstanding checkout.
    pub(crate) fn reallocate(&mut self, description: BufferDescription) -> BufferRecord {
        self.record = BufferRecord {
            description,
            handle: BufferHandle(self.next_handle),
            fingerprint: self.record.fingerprint + 1,
        };
        self.next_handle += 1;
        self.busy = false;
        self.record
    }
}

/// A checked-out target buffer.
///
/// Callers fill `layers` with the content to show and hand the whole value
/// back to `DisplaySession::release_target_buffer`. The layer list moves into
/// the render handoff at that point, so later edits cannot leak into the frame.
#[derive(Debug)]
pub struct TargetBuffer {
    description: BufferDescription,
    handle: BufferHandle,
    fingerprint: u64,
    pub layers: Vec<Layer>,
}

impl TargetBuffer {
    pub fn description(&self) -> &BufferDescription {
        &self.description
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub(crate) fn into_layers(self) -> Vec<Layer> {
        self.layers
    }
}
