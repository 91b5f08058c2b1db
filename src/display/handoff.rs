// src/display/handoff.rs
//! Single-slot, two-phase rendezvous between a returning caller and the
//! render thread.
//!
//! The caller `raise`s a frame (render-ready), the render thread `take`s it and
//! later `complete`s it (buffer-done), and the caller collects the outcome with
//! `take_done`. The slot holds at most one frame, so at most one frame is ever
//! in flight. The slot itself does no locking; it lives inside the session
//! mutex and the condition variables are signalled by the caller of these
//! methods.

use crate::display::buffer::BufferRecord;
use crate::display::error::DisplayError;
use crate::display::types::Layer;

/// Result of rendering one frame.
pub type FrameOutcome = Result<(), DisplayError>;

/// A frame waiting for the render thread.
#[derive(Debug)]
pub struct PendingFrame {
    /// The buffer as it stood when the caller returned it.
    pub record: BufferRecord,
    pub layers: Vec<Layer>,
}

#[derive(Debug, Default)]
pub(crate) enum Handoff {
    #[default]
    Idle,
    Ready(PendingFrame),
    Rendering,
    Done(FrameOutcome),
}

impl Handoff {
    pub(crate) fn is_idle(&self) -> bool {
        matches!(self, Handoff::Idle)
    }

    pub(crate) fn is_ready(&self) -> bool {
        matches!(self, Handoff::Ready(_))
    }

    pub(crate) fn is_done(&self) -> bool {
        matches!(self, Handoff::Done(_))
    }

    /// Idle -> Ready. Refused if another frame occupies the slot.
    pub(crate) fn raise(&mut self, frame: PendingFrame) -> Result<(), DisplayError> {
        if !self.is_idle() {
            return Err(DisplayError::InvalidState(
                "a frame is already in flight".to_string(),
            ));
        }
        *self = Handoff::Ready(frame);
        Ok(())
    }

    /// Ready -> Rendering, handing the frame to the render thread.
    pub(crate) fn take(&mut self) -> Option<PendingFrame> {
        match std::mem::take(self) {
            Handoff::Ready(frame) => {
                *self = Handoff::Rendering;
                Some(frame)
            }
            other => {
                *self = other;
                None
            }
        }
    }

    /// Rendering -> Done. Returns false if the frame was abandoned meanwhile.
    pub(crate) fn complete(&mut self, outcome: FrameOutcome) -> bool {
        if matches!(self, Handoff::Rendering) {
            *self = Handoff::Done(outcome);
            true
        } else {
            false
        }
    }

    /// Done -> Idle, yielding the outcome to the waiting caller.
    pub(crate) fn take_done(&mut self) -> Option<FrameOutcome> {
        match std::mem::take(self) {
            Handoff::Done(outcome) => Some(outcome),
            other => {
                *self = other;
                None
            }
        }
    }

    /// Drops a frame the render thread never picked up. A frame already being
    /// rendered is left alone; the render thread clears it on exit.
    pub(crate) fn withdraw(&mut self) {
        if self.is_ready() {
            *self = Handoff::Idle;
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Handoff::Idle;
    }
}
