// src/renderer/actor.rs
//! RenderThread - dedicated thread that composes and presents frames.
//!
//! Handoff protocol with `DisplaySession`:
//! - wait on render-ready until a frame is raised or the thread must stop
//! - take the frame, drop the lock, compose it and present it
//! - retake the lock, publish the outcome, signal buffer-done
//!
//! Threading model:
//! - Owns: the Renderer (and with it the render context)
//! - No queuing: the handoff slot holds one frame, so at most one frame is in flight
//! - Exit is always acknowledged under the lock and broadcast to every waiter,
//!   including when the thread unwinds from a panic

use crate::config::RenderConfig;
use crate::display::error::DisplayError;
use crate::display::handoff::PendingFrame;
use crate::display::proxy::DisplayProxy;
use crate::display::session::{SessionState, Shared};
use crate::display::thread_state::ThreadEvent;
use crate::display::types::{ComposedFrame, DisplayState, ResourceHandle};
use crate::renderer::Renderer;
use log::*;
use std::sync::{Arc, PoisonError};
use std::thread::{self, JoinHandle};

/// How a frame left the render thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rendered {
    Presented,
    /// The display went invisible between the release and the render.
    Discarded,
}

/// Acknowledges the thread's exit however `run` leaves, so no caller is left
/// waiting on a thread that no longer exists.
struct ExitGuard<'a> {
    shared: &'a Shared,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        if thread::panicking() && state.fault.is_none() {
            state.fault = Some(DisplayError::RenderThreadPanicked);
        }
        if state.thread.is_running() {
            state.apply(ThreadEvent::Stop);
        }
        state.apply(ThreadEvent::Exited);
        state.handoff.reset();
        self.shared.wake_all();
    }
}

/// RenderThread state (runs on dedicated thread)
struct RenderThread {
    shared: Arc<Shared>,
    renderer: Box<dyn Renderer>,
    proxy: Arc<dyn DisplayProxy>,
    resource: ResourceHandle,
    sequence: u64,
}

impl RenderThread {
    fn run(mut self) {
        info!("RenderThread: Thread started");
        let shared = Arc::clone(&self.shared);
        let _exit = ExitGuard { shared: &shared };

        if let Err(e) = self.initialize() {
            error!("RenderThread: {}", e);
            let mut state = shared.lock();
            state.fault = Some(e);
            return;
        }

        while let Some((frame, requested)) = self.next_frame() {
            let result = self.render_frame(frame, requested);
            self.finish_frame(result);
        }

        info!("RenderThread: Thread stopped");
    }

    /// Lazily sets up the render context against the current buffer.
    fn initialize(&mut self) -> Result<(), DisplayError> {
        let description = self.shared.lock().slot.record().description;
        self.renderer
            .initialize_context(&description)
            .map_err(|e| DisplayError::ContextInitFailed(format!("{:#}", e)))?;
        debug!("RenderThread: Render context initialized");
        Ok(())
    }

    /// Blocks until a frame is raised. `None` once the thread must stop.
    fn next_frame(&self) -> Option<(PendingFrame, DisplayState)> {
        let state = self.shared.lock();
        let mut state = self
            .shared
            .render_ready
            .wait_while(state, |s| s.thread.is_running() && !s.handoff.is_ready())
            .unwrap_or_else(PoisonError::into_inner);

        if !state.thread.is_running() {
            debug!("RenderThread: Stop requested");
            return None;
        }
        let requested = state.requested;
        let frame = state.handoff.take()?;
        trace!(
            "RenderThread: Took frame for buffer {:?} ({} layers)",
            frame.record.handle,
            frame.layers.len()
        );
        Some((frame, requested))
    }

    /// Composes and presents one frame. Runs without the session lock.
    fn render_frame(
        &mut self,
        mut frame: PendingFrame,
        requested: DisplayState,
    ) -> Result<Rendered, DisplayError> {
        if !requested.is_visible() {
            debug!("RenderThread: Display not visible, skipping frame");
            return Ok(Rendered::Discarded);
        }

        frame.layers.sort_by_key(|layer| layer.z_order);
        self.renderer
            .compose_into(&frame.record, &frame.layers)
            .map_err(|e| DisplayError::ComposeFailed(format!("{:#}", e)))?;

        self.sequence += 1;
        let composed = ComposedFrame {
            handle: frame.record.handle,
            fingerprint: frame.record.fingerprint,
            description: frame.record.description,
            sequence: self.sequence,
        };
        self.proxy
            .present_buffer(self.resource, &composed)
            .map_err(|e| DisplayError::PresentFailed(format!("{:#}", e)))?;
        trace!("RenderThread: Presented frame {}", composed.sequence);
        Ok(Rendered::Presented)
    }

    /// Publishes the outcome and wakes the caller waiting on buffer-done.
    fn finish_frame(&self, result: Result<Rendered, DisplayError>) {
        let mut state = self.shared.lock();
        record_outcome(&mut state, &result);
        if !state.handoff.complete(result.map(|_| ())) {
            debug!("RenderThread: Frame was abandoned before completion");
        }
        self.shared.buffer_done.notify_all();
    }
}

fn record_outcome(state: &mut SessionState, result: &Result<Rendered, DisplayError>) {
    match result {
        Ok(Rendered::Presented) => {
            state.stats.frames_presented += 1;
            if state.requested == DisplayState::VisibleOnNextFrame {
                debug!("RenderThread: First frame presented, display now visible");
                state.requested = DisplayState::Visible;
            }
        }
        Ok(Rendered::Discarded) => state.stats.frames_discarded += 1,
        Err(e) => {
            warn!("RenderThread: Frame dropped: {}", e);
            match e {
                DisplayError::ComposeFailed(_) => state.stats.compose_failures += 1,
                DisplayError::PresentFailed(_) => state.stats.present_failures += 1,
                _ => {}
            }
        }
    }
}

/// Spawn the render thread.
///
/// The caller must already have moved the session's thread state to
/// `Running`; the thread acknowledges its exit by moving it to `Stopped`.
pub(crate) fn spawn_render_thread(
    config: &RenderConfig,
    shared: Arc<Shared>,
    renderer: Box<dyn Renderer>,
    proxy: Arc<dyn DisplayProxy>,
    resource: ResourceHandle,
) -> Result<JoinHandle<()>, DisplayError> {
    let actor = RenderThread {
        shared,
        renderer,
        proxy,
        resource,
        sequence: 0,
    };

    let mut builder = thread::Builder::new().name(config.thread_name.clone());
    if let Some(stack_size) = config.stack_size {
        builder = builder.stack_size(stack_size);
    }
    builder
        .spawn(move || actor.run())
        .map_err(|e| DisplayError::Spawn(e.to_string()))
}
