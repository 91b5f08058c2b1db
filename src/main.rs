// src/main.rs

// Headless driver for a display session: makes the display visible, pushes a
// number of frames through the render thread, then simulates another owner
// taking the display.

use display_session::config::CONFIG;
use display_session::display::{HeadlessDisplayProxy, Layer, Rect, Rgba};
use display_session::renderer::SoftwareRenderer;
use display_session::{DisplaySession, DisplayState};

use anyhow::Context;
use log::{info, warn};
use std::sync::Arc;

const DEFAULT_FRAME_COUNT: u64 = 60;
const BAR_WIDTH_PX: u32 = 8;

/// Left edge of the sweeping bar in `frame`, wrapped to the display width.
fn bar_offset(frame: u64, width_px: u32) -> u32 {
    let width = u64::from(width_px.max(1));
    (frame.wrapping_mul(u64::from(BAR_WIDTH_PX)) % width) as u32
}

fn main() -> anyhow::Result<()> {
    // Initialize the logger. Default filter is "info" if RUST_LOG is not set.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    let frame_count = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<u64>()
            .with_context(|| format!("Invalid frame count '{}'", arg))?,
        None => DEFAULT_FRAME_COUNT,
    };

    let config = &*CONFIG;
    info!("Starting display session with {:?}", config.display);

    let proxy = Arc::new(HeadlessDisplayProxy::new());
    let renderer = SoftwareRenderer::new(Rgba::new(0, 0, 0, 255));
    let last_frame = renderer.last_frame();
    let session = DisplaySession::new(config, proxy.clone(), Box::new(renderer))
        .context("Failed to create display session")?;

    session
        .set_state(DisplayState::VisibleOnNextFrame)
        .context("Failed to make display visible")?;

    let width = session.info().width_px.max(1);
    let height = session.info().height_px;
    for frame in 0..frame_count {
        let mut buffer = session
            .acquire_target_buffer()
            .context("Failed to acquire target buffer")?;
        // A bar sweeping across a static backdrop.
        buffer.layers.push(Layer {
            z_order: 1,
            rect: Rect {
                x: bar_offset(frame, width),
                y: 0,
                width: BAR_WIDTH_PX,
                height,
            },
            color: Rgba::new(255, 255, 255, 255),
        });
        buffer.layers.push(Layer {
            z_order: 0,
            rect: Rect {
                x: 0,
                y: height / 4,
                width,
                height: height / 2,
            },
            color: Rgba::new(0, 64, 128, 255),
        });
        if let Err(e) = session.release_target_buffer(buffer) {
            warn!("Frame {} was not shown: {}", frame, e);
        }
    }

    let stats = session.stats();
    info!(
        "Presented {} frames ({} imports), display {:?}, {:?}",
        stats.frames_presented,
        proxy.imports(),
        session.state(),
        stats
    );
    if let Ok(frame) = last_frame.lock() {
        info!(
            "Last frame: {}x{}, fingerprint {}",
            frame.width_px, frame.height_px, frame.fingerprint
        );
    }

    info!("Another owner took the display, shutting down");
    session.force_shutdown();
    info!("Display session exited: {:?}", session.state());
    Ok(())
}
