//! Headless display proxy implementation.
//!
//! Accepts every frame without a physical output. It keeps enough bookkeeping
//! (recently presented frames, buffer imports, acquire/release calls) for tests
//! and the headless binary to observe what the session did.

use crate::display::proxy::DisplayProxy;
use crate::display::types::{ComposedFrame, ResourceHandle};
use anyhow::{bail, Result};
use log::{info, trace};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Number of presented frames kept for inspection.
pub const PRESENTED_HISTORY: usize = 32;

#[derive(Debug, Default)]
struct HeadlessState {
    acquired: Option<u64>,
    acquire_calls: usize,
    release_calls: usize,
    /// The last `PRESENTED_HISTORY` frames, oldest first.
    presented: VecDeque<ComposedFrame>,
    presented_count: usize,
    /// Fingerprint of the buffer currently imported.
    imported_fingerprint: Option<u64>,
    imports: usize,
    fail_next_presents: usize,
    refuse_acquire: bool,
}

#[derive(Debug, Default)]
pub struct HeadlessDisplayProxy {
    state: Mutex<HeadlessState>,
}

impl HeadlessDisplayProxy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` presents fail.
    pub fn fail_next_presents(&self, count: usize) {
        self.lock().fail_next_presents = count;
    }

    /// Makes `acquire_display_resource` fail, as if another owner held the output.
    pub fn refuse_acquire(&self) {
        self.lock().refuse_acquire = true;
    }

    /// The most recently presented frames, oldest first.
    pub fn presented(&self) -> Vec<ComposedFrame> {
        self.lock().presented.iter().copied().collect()
    }

    pub fn last_presented(&self) -> Option<ComposedFrame> {
        self.lock().presented.back().copied()
    }

    /// Total frames presented since creation.
    pub fn presented_count(&self) -> usize {
        self.lock().presented_count
    }

    /// How many distinct buffers had to be imported.
    pub fn imports(&self) -> usize {
        self.lock().imports
    }

    pub fn acquire_calls(&self) -> usize {
        self.lock().acquire_calls
    }

    pub fn release_calls(&self) -> usize {
        self.lock().release_calls
    }

    pub fn is_acquired(&self) -> bool {
        self.lock().acquired.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        // Bookkeeping stays consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DisplayProxy for HeadlessDisplayProxy {
    fn acquire_display_resource(&self, display_id: u64) -> Result<ResourceHandle> {
        let mut state = self.lock();
        state.acquire_calls += 1;
        if state.refuse_acquire {
            bail!("display {} is owned by another client", display_id);
        }
        if let Some(owner) = state.acquired {
            bail!("display {} is already acquired", owner);
        }
        info!("HeadlessDisplayProxy: Acquired display {}", display_id);
        state.acquired = Some(display_id);
        Ok(ResourceHandle(display_id))
    }

    fn present_buffer(&self, resource: ResourceHandle, frame: &ComposedFrame) -> Result<()> {
        let mut state = self.lock();
        if state.acquired != Some(resource.0) {
            bail!("display resource {:?} is not acquired", resource);
        }
        if state.fail_next_presents > 0 {
            state.fail_next_presents -= 1;
            bail!("injected present failure for frame {}", frame.sequence);
        }
        if state.imported_fingerprint != Some(frame.fingerprint) {
            trace!(
                "HeadlessDisplayProxy: Importing buffer {:?} (fingerprint {})",
                frame.handle,
                frame.fingerprint
            );
            state.imported_fingerprint = Some(frame.fingerprint);
            state.imports += 1;
        }
        trace!("HeadlessDisplayProxy: Present frame {}", frame.sequence);
        if state.presented.len() == PRESENTED_HISTORY {
            state.presented.pop_front();
        }
        state.presented.push_back(*frame);
        state.presented_count += 1;
        Ok(())
    }

    fn release_display_resource(&self, display_id: u64) {
        let mut state = self.lock();
        state.release_calls += 1;
        if state.acquired == Some(display_id) {
            info!("HeadlessDisplayProxy: Released display {}", display_id);
            state.acquired = None;
            state.imported_fingerprint = None;
        }
    }
}
