// src/renderer/mock.rs
//! Scriptable renderer for tests.

use crate::display::buffer::BufferRecord;
use crate::display::types::{BufferDescription, Layer};
use crate::renderer::Renderer;
use anyhow::{bail, Result};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};

/// One composed frame as seen by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeCall {
    pub fingerprint: u64,
    pub layers: Vec<Layer>,
}

#[derive(Debug, Default)]
pub struct RenderLog {
    pub init_calls: usize,
    pub composed: Vec<ComposeCall>,
}

#[derive(Default)]
pub struct MockRenderer {
    log: Arc<Mutex<RenderLog>>,
    fail_init: bool,
    fail_composes: usize,
    /// Signalled when a compose starts.
    entered: Option<Sender<()>>,
    /// A compose does not finish until this yields (or disconnects).
    gate: Option<Receiver<()>>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Arc<Mutex<RenderLog>> {
        Arc::clone(&self.log)
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn failing_composes(mut self, count: usize) -> Self {
        self.fail_composes = count;
        self
    }

    pub fn gated(mut self, entered: Sender<()>, gate: Receiver<()>) -> Self {
        self.entered = Some(entered);
        self.gate = Some(gate);
        self
    }
}

impl Renderer for MockRenderer {
    fn initialize_context(&mut self, _description: &BufferDescription) -> Result<()> {
        self.log.lock().unwrap().init_calls += 1;
        if self.fail_init {
            bail!("no graphics device");
        }
        Ok(())
    }

    fn compose_into(&mut self, target: &BufferRecord, layers: &[Layer]) -> Result<()> {
        if let Some(entered) = &self.entered {
            let _ = entered.send(());
        }
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        if self.fail_composes > 0 {
            self.fail_composes -= 1;
            bail!("shader compile error");
        }
        self.log.lock().unwrap().composed.push(ComposeCall {
            fingerprint: target.fingerprint,
            layers: layers.to_vec(),
        });
        Ok(())
    }
}
