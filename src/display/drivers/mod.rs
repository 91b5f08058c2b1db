// src/display/drivers/mod.rs
//! Display proxy implementations.

pub mod headless;

pub use headless::HeadlessDisplayProxy;
