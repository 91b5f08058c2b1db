// src/display/session.rs
//! DisplaySession - hands the target buffer between caller threads and the
//! render thread.
//!
//! ## Threading Model
//! - Any number of caller threads use the public entry points
//! - Exactly one render thread per session (see `renderer::actor`)
//! - All shared state sits behind one mutex; two condition variables signal
//!   the render-ready and buffer-done phases of the handoff
//!
//! ## Suspension points
//! - `acquire_target_buffer` never blocks; it fails with `Busy` instead
//! - `release_target_buffer` blocks until the frame is done or the session
//!   is shut down
//! - the render thread blocks until a frame is ready or the session is shut down
//!
//! `force_shutdown` wakes every waiter on both condition variables and every
//! wait re-checks the shutdown state, so no thread is left blocked.

use crate::config::{Config, RenderConfig};
use crate::display::buffer::{BufferRecord, FrameBufferSlot, TargetBuffer};
use crate::display::error::DisplayError;
use crate::display::handoff::{Handoff, PendingFrame};
use crate::display::proxy::DisplayProxy;
use crate::display::thread_state::{RenderThreadState, ThreadEvent};
use crate::display::types::{
    BufferDescription, DisplayDescriptor, DisplayState, ResourceHandle, SessionStats,
};
use crate::renderer::actor::spawn_render_thread;
use crate::renderer::Renderer;
use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

/// Everything guarded by the session mutex.
pub(crate) struct SessionState {
    pub(crate) slot: FrameBufferSlot,
    pub(crate) requested: DisplayState,
    pub(crate) thread: RenderThreadState,
    pub(crate) handoff: Handoff,
    /// Fatal render thread error; once set the thread is never restarted.
    pub(crate) fault: Option<DisplayError>,
    pub(crate) stats: SessionStats,
    /// Consumed by the first start of the render thread.
    renderer: Option<Box<dyn Renderer>>,
}

impl SessionState {
    /// Whether callers blocked on the handoff must give up.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.requested == DisplayState::Dead || !self.thread.is_running()
    }

    /// Applies a thread lifecycle event, logging instead of failing on an
    /// illegal transition.
    pub(crate) fn apply(&mut self, event: ThreadEvent) {
        match self.thread.transition(event) {
            Ok(next) => {
                debug!("DisplaySession: Render thread {:?} -> {:?}", self.thread, next);
                self.thread = next;
            }
            Err(e) => error!("DisplaySession: {}", e),
        }
    }
}

/// State shared with the render thread.
pub(crate) struct Shared {
    state: Mutex<SessionState>,
    pub(crate) render_ready: Condvar,
    pub(crate) buffer_done: Condvar,
}

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionState> {
        // Every mutation leaves the state consistent before anything that can
        // panic runs, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wakes every waiter on both condition variables.
    pub(crate) fn wake_all(&self) {
        self.render_ready.notify_all();
        self.buffer_done.notify_all();
    }
}

/// A display session: one physical output, one target buffer, one render thread.
///
/// Share it between caller threads with an `Arc`. Dropping the last reference
/// shuts the session down.
pub struct DisplaySession {
    info: DisplayDescriptor,
    render: RenderConfig,
    shared: Arc<Shared>,
    proxy: Arc<dyn DisplayProxy>,
    resource: ResourceHandle,
    render_thread: Mutex<Option<JoinHandle<()>>>,
}

impl DisplaySession {
    /// Creates a session and acquires the display from `proxy`.
    ///
    /// The render thread is not started until the display is first made
    /// visible.
    pub fn new(
        config: &Config,
        proxy: Arc<dyn DisplayProxy>,
        renderer: Box<dyn Renderer>,
    ) -> Result<Self> {
        let info = config.display_descriptor();
        let description = config.buffer_description();
        description
            .validate()
            .map_err(|reason| anyhow!(reason))
            .context("Invalid target buffer configuration")?;
        info!(
            "DisplaySession: Creating session for display {} ({}x{})",
            info.id, info.width_px, info.height_px
        );

        let resource = proxy
            .acquire_display_resource(info.id)
            .with_context(|| format!("Failed to acquire display {}", info.id))?;

        let state = SessionState {
            slot: FrameBufferSlot::new(description),
            requested: DisplayState::NotVisible,
            thread: RenderThreadState::Stopped,
            handoff: Handoff::default(),
            fault: None,
            stats: SessionStats::default(),
            renderer: Some(renderer),
        };

        Ok(Self {
            info,
            render: config.render.clone(),
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                render_ready: Condvar::new(),
                buffer_done: Condvar::new(),
            }),
            proxy,
            resource,
            render_thread: Mutex::new(None),
        })
    }

    /// Static capability metadata of the display.
    pub fn info(&self) -> &DisplayDescriptor {
        &self.info
    }

    /// The last requested display state.
    pub fn state(&self) -> DisplayState {
        self.shared.lock().requested
    }

    pub fn render_thread_state(&self) -> RenderThreadState {
        self.shared.lock().thread
    }

    pub fn stats(&self) -> SessionStats {
        self.shared.lock().stats
    }

    /// The error that stopped the render thread, if any.
    pub fn fault(&self) -> Option<DisplayError> {
        self.shared.lock().fault.clone()
    }

    /// The live buffer record.
    pub fn buffer_record(&self) -> BufferRecord {
        *self.shared.lock().slot.record()
    }

    /// Requests a new display state.
    ///
    /// Making the display visible starts the render thread if it is not
    /// running yet. Asking for a visible state while it already runs is a
    /// no-op as far as the thread is concerned.
    ///
    /// # Errors
    /// * `InvalidState` when `new_state` is `Dead` or the session was shut down.
    /// * `Spawn` when the render thread could not be created.
    pub fn set_state(&self, new_state: DisplayState) -> Result<(), DisplayError> {
        if new_state == DisplayState::Dead {
            return Err(DisplayError::InvalidState(
                "Dead can only be entered through a forced shutdown".to_string(),
            ));
        }

        let mut state = self.shared.lock();
        if state.requested == DisplayState::Dead {
            return Err(DisplayError::InvalidState(
                "display session was shut down".to_string(),
            ));
        }

        debug!(
            "DisplaySession: State {:?} -> {:?}",
            state.requested, new_state
        );

        if new_state.is_visible() && state.thread == RenderThreadState::Stopped {
            match state.fault.clone() {
                Some(fault) => warn!(
                    "DisplaySession: Not restarting render thread after fault: {}",
                    fault
                ),
                None => self.start_render_thread(&mut state)?,
            }
        }
        state.requested = new_state;
        Ok(())
    }

    /// Stopped -> Running. Called with the session lock held so concurrent
    /// visible requests start at most one thread.
    fn start_render_thread(&self, state: &mut SessionState) -> Result<(), DisplayError> {
        let running = state.thread.transition(ThreadEvent::Start)?;
        let renderer = state.renderer.take().ok_or_else(|| {
            DisplayError::InvalidState("renderer already consumed".to_string())
        })?;
        state.thread = running;

        let spawned = spawn_render_thread(
            &self.render,
            Arc::clone(&self.shared),
            renderer,
            Arc::clone(&self.proxy),
            self.resource,
        );
        match spawned {
            Ok(handle) => {
                info!("DisplaySession: Render thread started");
                *self
                    .render_thread
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(handle);
                Ok(())
            }
            Err(e) => {
                error!("DisplaySession: {}", e);
                state.apply(ThreadEvent::Stop);
                state.apply(ThreadEvent::Exited);
                state.fault = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Checks out the target buffer. Never blocks.
    ///
    /// # Errors
    /// * `InvalidState` once the session was shut down.
    /// * `Busy` while another caller holds the buffer.
    pub fn acquire_target_buffer(&self) -> Result<TargetBuffer, DisplayError> {
        let mut state = self.shared.lock();
        if state.requested == DisplayState::Dead {
            return Err(DisplayError::InvalidState(
                "display session was shut down".to_string(),
            ));
        }
        let buffer = state.slot.check_out()?;
        debug!(
            "DisplaySession: Buffer {:?} checked out (fingerprint {})",
            buffer.handle(),
            buffer.fingerprint()
        );
        Ok(buffer)
    }

    /// Returns the target buffer for display and waits for it to be rendered.
    ///
    /// The layers inside `buffer` move into the render handoff under the lock,
    /// so the frame rendered is exactly the content handed over here.
    ///
    /// While the display is not visible the frame is discarded and the call
    /// returns immediately.
    ///
    /// # Errors
    /// * `StaleBuffer` if the buffer was reallocated since it was acquired.
    ///   Nothing is rendered and the live buffer is untouched.
    /// * `InvalidState` if the buffer is not checked out.
    /// * `Shutdown` if the session was shut down, or the render thread
    ///   stopped, before the frame completed.
    /// * `ComposeFailed` / `PresentFailed` if this frame failed to draw.
    pub fn release_target_buffer(&self, buffer: TargetBuffer) -> Result<(), DisplayError> {
        let mut state = self.shared.lock();
        state.slot.validate_return(&buffer)?;

        if state.requested == DisplayState::Dead {
            state.slot.check_in();
            return Err(DisplayError::Shutdown);
        }
        if !state.requested.is_visible() {
            debug!("DisplaySession: Display not visible, discarding frame");
            state.stats.frames_discarded += 1;
            state.slot.check_in();
            return Ok(());
        }
        if !state.thread.is_running() {
            state.slot.check_in();
            return Err(DisplayError::Shutdown);
        }

        let frame = PendingFrame {
            record: *state.slot.record(),
            layers: buffer.into_layers(),
        };
        if let Err(e) = state.handoff.raise(frame) {
            state.slot.check_in();
            return Err(e);
        }
        self.shared.render_ready.notify_one();

        let mut state = self
            .shared
            .buffer_done
            .wait_while(state, |s| !s.handoff.is_done() && !s.is_cancelled())
            .unwrap_or_else(PoisonError::into_inner);

        let outcome = match state.handoff.take_done() {
            Some(outcome) => outcome,
            None => {
                debug!("DisplaySession: Shut down while waiting for frame");
                state.handoff.withdraw();
                Err(DisplayError::Shutdown)
            }
        };
        state.slot.check_in();
        outcome
    }

    /// Replaces the target buffer with a freshly allocated one.
    ///
    /// The fingerprint changes, so a caller still holding the old buffer gets
    /// `StaleBuffer` when returning it, and the renderer and proxy import the
    /// new buffer on the next frame.
    ///
    /// # Errors
    /// * `InvalidState` once the session was shut down, or if `description`
    ///   has a stride narrower than its width or does not fit in memory.
    /// * `Busy` while a frame is being rendered.
    pub fn reallocate_target_buffer(
        &self,
        description: BufferDescription,
    ) -> Result<BufferRecord, DisplayError> {
        let mut state = self.shared.lock();
        if state.requested == DisplayState::Dead {
            return Err(DisplayError::InvalidState(
                "display session was shut down".to_string(),
            ));
        }
        if !state.handoff.is_idle() {
            return Err(DisplayError::Busy);
        }
        description.validate().map_err(DisplayError::InvalidState)?;
        if state.slot.is_busy() {
            warn!("DisplaySession: Reallocating buffer while it is checked out");
        }
        let record = state.slot.reallocate(description);
        info!(
            "DisplaySession: Buffer reallocated as {:?} (fingerprint {})",
            record.handle, record.fingerprint
        );
        Ok(record)
    }

    /// Tears the session down because another owner took the display.
    ///
    /// Marks the display `Dead`, stops and joins the render thread, wakes
    /// every blocked caller with `Shutdown`, and gives the display back to the
    /// proxy. Calling it again does nothing.
    pub fn force_shutdown(&self) {
        {
            let mut state = self.shared.lock();
            if state.requested == DisplayState::Dead {
                debug!("DisplaySession: Already shut down");
                return;
            }
            info!("DisplaySession: Shutting down display {}", self.info.id);
            state.requested = DisplayState::Dead;
            if state.thread.is_running() {
                state.apply(ThreadEvent::Stop);
            }
            self.shared.wake_all();
        }

        let handle = self
            .render_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("DisplaySession: Render thread panicked");
            }
        }

        self.proxy.release_display_resource(self.info.id);
        info!("DisplaySession: Display {} released", self.info.id);
    }
}

impl Drop for DisplaySession {
    fn drop(&mut self) {
        self.force_shutdown();
    }
}

#[cfg(test)]
mod tests;
