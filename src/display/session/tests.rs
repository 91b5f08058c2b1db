// src/display/session/tests.rs

use super::*;
use crate::display::drivers::HeadlessDisplayProxy;
use crate::display::types::{BufferUsage, Layer, PixelFormat, Rect, Rgba};
use crate::renderer::mock::{MockRenderer, RenderLog};
use std::sync::mpsc;
use std::sync::Barrier;
use std::thread;
use std::time::Duration;
use test_log::test;

fn session_with(renderer: MockRenderer) -> (Arc<DisplaySession>, Arc<HeadlessDisplayProxy>) {
    let proxy = Arc::new(HeadlessDisplayProxy::new());
    let session = DisplaySession::new(&Config::default(), proxy.clone(), Box::new(renderer))
        .expect("session should be created");
    (Arc::new(session), proxy)
}

fn session() -> (
    Arc<DisplaySession>,
    Arc<HeadlessDisplayProxy>,
    Arc<Mutex<RenderLog>>,
) {
    let renderer = MockRenderer::new();
    let log = renderer.log();
    let (session, proxy) = session_with(renderer);
    (session, proxy, log)
}

fn layer(z_order: i32) -> Layer {
    Layer {
        z_order,
        rect: Rect {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
        },
        color: Rgba::new(z_order as u8, 0, 0, 255),
    }
}

#[test]
fn acquire_then_release_succeeds_and_second_acquire_is_busy() {
    let (session, proxy, log) = session();
    session.set_state(DisplayState::Visible).unwrap();

    let buffer = session.acquire_target_buffer().unwrap();
    assert_eq!(
        session.acquire_target_buffer().unwrap_err(),
        DisplayError::Busy
    );
    session.release_target_buffer(buffer).unwrap();

    // The buffer is free again once the frame is done.
    let buffer = session.acquire_target_buffer().unwrap();
    session.release_target_buffer(buffer).unwrap();

    assert_eq!(log.lock().unwrap().composed.len(), 2);
    assert_eq!(proxy.presented_count(), 2);
    assert_eq!(session.stats().frames_presented, 2);
}

#[test]
fn stale_fingerprint_is_rejected_without_rendering() {
    let (session, proxy, log) = session();
    session.set_state(DisplayState::Visible).unwrap();

    let stale = session.acquire_target_buffer().unwrap();
    let description = *stale.description();
    session.reallocate_target_buffer(description).unwrap();

    assert_eq!(
        session.release_target_buffer(stale).unwrap_err(),
        DisplayError::StaleBuffer {
            returned: 1,
            live: 2
        }
    );
    assert!(log.lock().unwrap().composed.is_empty());
    assert_eq!(proxy.presented_count(), 0);

    // The live buffer is untouched and usable.
    let fresh = session.acquire_target_buffer().unwrap();
    assert_eq!(fresh.fingerprint(), 2);
    session.release_target_buffer(fresh).unwrap();
}

#[test]
fn reallocation_forces_a_reimport() {
    let (session, proxy, log) = session();
    session.set_state(DisplayState::Visible).unwrap();

    let buffer = session.acquire_target_buffer().unwrap();
    let first = buffer.handle();
    session.release_target_buffer(buffer).unwrap();

    let mut description = session.buffer_record().description;
    description.width_px = 320;
    description.stride_px = 320;
    let record = session.reallocate_target_buffer(description).unwrap();
    assert_ne!(record.handle, first);

    let buffer = session.acquire_target_buffer().unwrap();
    assert_eq!(buffer.description().width_px, 320);
    session.release_target_buffer(buffer).unwrap();

    let fingerprints: Vec<u64> = log
        .lock()
        .unwrap()
        .composed
        .iter()
        .map(|call| call.fingerprint)
        .collect();
    assert_eq!(fingerprints, vec![1, 2]);
    assert_eq!(proxy.imports(), 2);
}

#[test]
fn reallocation_is_refused_while_a_frame_is_in_flight() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (gate_tx, gate_rx) = mpsc::channel();
    let (session, _proxy) = session_with(MockRenderer::new().gated(entered_tx, gate_rx));
    session.set_state(DisplayState::Visible).unwrap();

    let caller = {
        let session = Arc::clone(&session);
        thread::spawn(move || {
            let buffer = session.acquire_target_buffer().unwrap();
            session.release_target_buffer(buffer)
        })
    };
    entered_rx.recv().unwrap();

    let description = session.buffer_record().description;
    assert_eq!(
        session.reallocate_target_buffer(description).unwrap_err(),
        DisplayError::Busy
    );

    gate_tx.send(()).unwrap();
    caller.join().unwrap().unwrap();
    assert!(session.reallocate_target_buffer(description).is_ok());
}

#[test]
fn frames_are_discarded_while_not_visible() {
    let (session, proxy, log) = session();

    let buffer = session.acquire_target_buffer().unwrap();
    session.release_target_buffer(buffer).unwrap();

    assert_eq!(session.render_thread_state(), RenderThreadState::Stopped);
    assert_eq!(log.lock().unwrap().init_calls, 0);
    assert_eq!(proxy.presented_count(), 0);
    assert_eq!(session.stats().frames_discarded, 1);
    assert!(session.acquire_target_buffer().is_ok());
}

#[test]
fn layers_reach_the_renderer_in_z_order() {
    let (session, _proxy, log) = session();
    session.set_state(DisplayState::Visible).unwrap();

    let mut buffer = session.acquire_target_buffer().unwrap();
    buffer.layers = vec![layer(3), layer(-1), layer(2)];
    session.release_target_buffer(buffer).unwrap();

    let orders: Vec<i32> = log.lock().unwrap().composed[0]
        .layers
        .iter()
        .map(|l| l.z_order)
        .collect();
    assert_eq!(orders, vec![-1, 2, 3]);
}

#[test]
fn visible_on_next_frame_becomes_visible_after_a_presented_frame() {
    let (session, _proxy, _log) = session();
    session.set_state(DisplayState::VisibleOnNextFrame).unwrap();
    assert_eq!(session.state(), DisplayState::VisibleOnNextFrame);
    assert_eq!(session.render_thread_state(), RenderThreadState::Running);

    let buffer = session.acquire_target_buffer().unwrap();
    session.release_target_buffer(buffer).unwrap();
    assert_eq!(session.state(), DisplayState::Visible);
}

#[test]
fn dead_cannot_be_requested() {
    let (session, _proxy, _log) = session();
    assert!(matches!(
        session.set_state(DisplayState::Dead),
        Err(DisplayError::InvalidState(_))
    ));
    assert_eq!(session.state(), DisplayState::NotVisible);
}

#[test]
fn concurrent_visible_requests_start_one_render_thread() {
    let (session, _proxy, log) = session();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let session = Arc::clone(&session);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                session.set_state(DisplayState::Visible)
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(session.render_thread_state(), RenderThreadState::Running);
    let buffer = session.acquire_target_buffer().unwrap();
    session.release_target_buffer(buffer).unwrap();
    assert_eq!(log.lock().unwrap().init_calls, 1);
}

#[test]
fn reallocation_refuses_descriptions_that_cannot_be_addressed() {
    let (session, proxy, _log) = session();
    session.set_state(DisplayState::Visible).unwrap();
    let live = session.buffer_record();

    let mut narrow = live.description;
    narrow.stride_px = narrow.width_px / 2;
    assert!(matches!(
        session.reallocate_target_buffer(narrow),
        Err(DisplayError::InvalidState(_))
    ));

    let mut huge = live.description;
    huge.width_px = u32::MAX;
    huge.height_px = u32::MAX;
    huge.stride_px = u32::MAX;
    assert!(matches!(
        session.reallocate_target_buffer(huge),
        Err(DisplayError::InvalidState(_))
    ));

    assert_eq!(session.buffer_record(), live);
    let buffer = session.acquire_target_buffer().unwrap();
    session.release_target_buffer(buffer).unwrap();
    assert_eq!(proxy.presented_count(), 1);
}

#[test]
fn construction_rejects_an_unaddressable_buffer() {
    let mut config = Config::default();
    config.buffer.width_px = Some(u32::MAX);
    config.buffer.height_px = Some(u32::MAX);
    let proxy = Arc::new(HeadlessDisplayProxy::new());
    let result = DisplaySession::new(&config, proxy.clone(), Box::new(MockRenderer::new()));
    let err = result.err().expect("construction should fail");
    assert!(format!("{:#}", err).contains("Invalid target buffer configuration"));
    assert_eq!(proxy.acquire_calls(), 0);
}

#[test]
fn reallocation_after_shutdown_is_invalid() {
    let (session, _proxy, _log) = session();
    let before = session.buffer_record();

    session.force_shutdown();

    assert!(matches!(
        session.reallocate_target_buffer(before.description),
        Err(DisplayError::InvalidState(_))
    ));
    assert_eq!(session.buffer_record().fingerprint, before.fingerprint);
}

// A petabyte stack cannot be mapped, so the spawn itself fails.
#[cfg(target_pointer_width = "64")]
#[test]
fn failed_spawn_leaves_the_display_state_unchanged() {
    let mut config = Config::default();
    config.render.stack_size = Some(1 << 50);
    let proxy = Arc::new(HeadlessDisplayProxy::new());
    let session = DisplaySession::new(&config, proxy, Box::new(MockRenderer::new())).unwrap();

    assert!(matches!(
        session.set_state(DisplayState::Visible),
        Err(DisplayError::Spawn(_))
    ));
    assert_eq!(session.state(), DisplayState::NotVisible);
    assert_eq!(session.render_thread_state(), RenderThreadState::Stopped);
    assert!(matches!(session.fault(), Some(DisplayError::Spawn(_))));

    // Frames are still discarded rather than waiting on a thread that never ran.
    let buffer = session.acquire_target_buffer().unwrap();
    session.release_target_buffer(buffer).unwrap();
    assert_eq!(session.stats().frames_discarded, 1);
}

#[test]
fn shutdown_is_final_and_idempotent() {
    let (session, proxy, _log) = session();
    session.set_state(DisplayState::Visible).unwrap();

    session.force_shutdown();
    session.force_shutdown();

    assert_eq!(session.state(), DisplayState::Dead);
    assert_eq!(session.render_thread_state(), RenderThreadState::Stopped);
    assert!(matches!(
        session.acquire_target_buffer(),
        Err(DisplayError::InvalidState(_))
    ));
    assert!(matches!(
        session.set_state(DisplayState::Visible),
        Err(DisplayError::InvalidState(_))
    ));
    assert_eq!(proxy.release_calls(), 1);
    assert!(!proxy.is_acquired());
}

#[test]
fn returning_a_buffer_after_shutdown_reports_shutdown() {
    let (session, _proxy, log) = session();
    session.set_state(DisplayState::Visible).unwrap();
    let buffer = session.acquire_target_buffer().unwrap();

    session.force_shutdown();

    assert_eq!(
        session.release_target_buffer(buffer).unwrap_err(),
        DisplayError::Shutdown
    );
    assert!(log.lock().unwrap().composed.is_empty());
}

#[test]
fn shutdown_wakes_a_caller_waiting_on_an_in_flight_frame() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (gate_tx, gate_rx) = mpsc::channel();
    let (session, proxy) = session_with(MockRenderer::new().gated(entered_tx, gate_rx));
    session.set_state(DisplayState::Visible).unwrap();

    let caller = {
        let session = Arc::clone(&session);
        thread::spawn(move || {
            let buffer = session.acquire_target_buffer().unwrap();
            session.release_target_buffer(buffer)
        })
    };
    entered_rx.recv().unwrap();

    // The render thread is stuck composing; shutdown must still free the caller.
    let shutdown = {
        let session = Arc::clone(&session);
        thread::spawn(move || session.force_shutdown())
    };
    assert_eq!(caller.join().unwrap().unwrap_err(), DisplayError::Shutdown);

    drop(gate_tx);
    shutdown.join().unwrap();
    assert_eq!(session.render_thread_state(), RenderThreadState::Stopped);
    assert!(!proxy.is_acquired());
}

#[test]
fn racing_callers_and_shutdown_never_hang() {
    const CALLERS: usize = 8;
    let (session, _proxy, _log) = session();
    session.set_state(DisplayState::Visible).unwrap();
    let barrier = Arc::new(Barrier::new(CALLERS + 1));

    let callers: Vec<_> = (0..CALLERS)
        .map(|_| {
            let session = Arc::clone(&session);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut completed = 0usize;
                loop {
                    match session.acquire_target_buffer() {
                        Ok(buffer) => match session.release_target_buffer(buffer) {
                            Ok(()) => completed += 1,
                            Err(DisplayError::Shutdown) => {}
                            Err(e) => panic!("unexpected release error: {}", e),
                        },
                        Err(DisplayError::Busy) => thread::yield_now(),
                        Err(DisplayError::InvalidState(_)) => return completed,
                        Err(e) => panic!("unexpected acquire error: {}", e),
                    }
                }
            })
        })
        .collect();

    barrier.wait();
    thread::sleep(Duration::from_millis(20));
    session.force_shutdown();

    let completed: usize = callers.into_iter().map(|c| c.join().unwrap()).sum();
    // A frame can finish presenting after its caller already saw Shutdown.
    assert!(completed as u64 <= session.stats().frames_presented);
    assert_eq!(session.render_thread_state(), RenderThreadState::Stopped);
}

#[test]
fn context_init_failure_stops_the_render_thread() {
    let renderer = MockRenderer::new().failing_init();
    let log = renderer.log();
    let (session, proxy) = session_with(renderer);
    session.set_state(DisplayState::Visible).unwrap();

    let buffer = session.acquire_target_buffer().unwrap();
    assert_eq!(
        session.release_target_buffer(buffer).unwrap_err(),
        DisplayError::Shutdown
    );
    assert!(matches!(
        session.fault(),
        Some(DisplayError::ContextInitFailed(_))
    ));
    assert_eq!(session.render_thread_state(), RenderThreadState::Stopped);

    // No retry: becoming visible again does not restart the thread.
    session.set_state(DisplayState::NotVisible).unwrap();
    session.set_state(DisplayState::Visible).unwrap();
    let buffer = session.acquire_target_buffer().unwrap();
    assert_eq!(
        session.release_target_buffer(buffer).unwrap_err(),
        DisplayError::Shutdown
    );
    assert_eq!(log.lock().unwrap().init_calls, 1);
    assert_eq!(proxy.presented_count(), 0);
}

#[test]
fn present_failure_only_drops_that_frame() {
    let (session, proxy, _log) = session();
    session.set_state(DisplayState::Visible).unwrap();
    proxy.fail_next_presents(1);

    let buffer = session.acquire_target_buffer().unwrap();
    assert!(matches!(
        session.release_target_buffer(buffer),
        Err(DisplayError::PresentFailed(_))
    ));

    let buffer = session.acquire_target_buffer().unwrap();
    session.release_target_buffer(buffer).unwrap();

    let stats = session.stats();
    assert_eq!(stats.present_failures, 1);
    assert_eq!(stats.frames_presented, 1);
    assert_eq!(session.render_thread_state(), RenderThreadState::Running);
}

#[test]
fn compose_failure_only_drops_that_frame() {
    let (session, proxy) = session_with(MockRenderer::new().failing_composes(1));
    session.set_state(DisplayState::VisibleOnNextFrame).unwrap();

    let buffer = session.acquire_target_buffer().unwrap();
    let err = session.release_target_buffer(buffer).unwrap_err();
    assert!(err.is_per_frame());
    assert_eq!(session.state(), DisplayState::VisibleOnNextFrame);

    let buffer = session.acquire_target_buffer().unwrap();
    session.release_target_buffer(buffer).unwrap();
    assert_eq!(session.state(), DisplayState::Visible);
    assert_eq!(session.stats().compose_failures, 1);
    assert_eq!(proxy.presented_count(), 1);
}

#[test]
fn construction_fails_when_the_display_is_taken() {
    let proxy = Arc::new(HeadlessDisplayProxy::new());
    proxy.refuse_acquire();
    let result = DisplaySession::new(
        &Config::default(),
        proxy.clone(),
        Box::new(MockRenderer::new()),
    );
    let err = result.err().expect("construction should fail");
    assert!(format!("{:#}", err).contains("Failed to acquire display 0"));
}

#[test]
fn dropping_the_session_releases_the_display() {
    let (session, proxy, _log) = session();
    session.set_state(DisplayState::Visible).unwrap();
    drop(session);
    assert_eq!(proxy.release_calls(), 1);
    assert!(!proxy.is_acquired());
}

#[test]
fn end_to_end_scenario() {
    let mut config = Config::default();
    config.buffer.format = PixelFormat::Rgba8888;
    config.buffer.usage = BufferUsage::CPU_WRITE_OFTEN;
    let renderer = MockRenderer::new();
    let log = renderer.log();
    let proxy = Arc::new(HeadlessDisplayProxy::new());
    let session = DisplaySession::new(&config, proxy.clone(), Box::new(renderer)).unwrap();
    assert_eq!(session.info().width_px, config.display.width_px);

    session.set_state(DisplayState::Visible).unwrap();
    let mut buffer = session.acquire_target_buffer().unwrap();
    let fingerprint = buffer.fingerprint();
    buffer.layers.push(layer(0));
    session.release_target_buffer(buffer).unwrap();

    assert_eq!(session.state(), DisplayState::Visible);
    let presented = proxy.presented();
    assert_eq!(presented.len(), 1);
    assert_eq!(presented[0].fingerprint, fingerprint);
    assert_eq!(presented[0].sequence, 1);
    assert_eq!(log.lock().unwrap().composed[0].layers, vec![layer(0)]);

    session.force_shutdown();
    assert_eq!(session.state(), DisplayState::Dead);
    assert_eq!(session.render_thread_state(), RenderThreadState::Stopped);
}
