// src/lib.rs

//! Display surface manager.
//!
//! A [`DisplaySession`] owns one physical output (through a [`DisplayProxy`])
//! and one target buffer. Caller threads check the buffer out, fill it with
//! layers and return it; a dedicated render thread composes each returned
//! frame with a [`Renderer`] and presents it. Another owner can take the
//! display away at any time with [`DisplaySession::force_shutdown`].

pub mod config;
pub mod display;
pub mod renderer;

pub use display::{DisplayError, DisplayProxy, DisplaySession, DisplayState, TargetBuffer};
pub use renderer::Renderer;
