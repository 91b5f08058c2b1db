// src/display/thread_state.rs
//! Lifecycle of the render thread as an explicit state machine.
//!
//! ```text
//! Stopped --Start--> Running --Stop--> Stopping --Exited--> Stopped
//! ```

use crate::display::error::DisplayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderThreadState {
    Stopped,
    Stopping,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadEvent {
    /// The session spawned the render thread.
    Start,
    /// Shutdown was requested, or the thread gave up on its own.
    Stop,
    /// The render thread acknowledged the stop and left its loop.
    Exited,
}

impl RenderThreadState {
    /// Applies `event`, rejecting every transition not in the diagram above.
    pub fn transition(self, event: ThreadEvent) -> Result<Self, DisplayError> {
        match (self, event) {
            (RenderThreadState::Stopped, ThreadEvent::Start) => Ok(RenderThreadState::Running),
            (RenderThreadState::Running, ThreadEvent::Stop) => Ok(RenderThreadState::Stopping),
            (RenderThreadState::Stopping, ThreadEvent::Exited) => Ok(RenderThreadState::Stopped),
            (state, event) => Err(DisplayError::InvalidState(format!(
                "render thread cannot handle {:?} while {:?}",
                event, state
            ))),
        }
    }

    pub fn is_running(self) -> bool {
        self == RenderThreadState::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn full_cycle_is_legal() {
        let state = RenderThreadState::Stopped
            .transition(ThreadEvent::Start)
            .and_then(|s| s.transition(ThreadEvent::Stop))
            .and_then(|s| s.transition(ThreadEvent::Exited))
            .unwrap();
        assert_eq!(state, RenderThreadState::Stopped);
    }

    #[test]
    fn every_other_transition_is_rejected() {
        let legal = [
            (RenderThreadState::Stopped, ThreadEvent::Start),
            (RenderThreadState::Running, ThreadEvent::Stop),
            (RenderThreadState::Stopping, ThreadEvent::Exited),
        ];
        for state in [
            RenderThreadState::Stopped,
            RenderThreadState::Stopping,
            RenderThreadState::Running,
        ] {
            for event in [ThreadEvent::Start, ThreadEvent::Stop, ThreadEvent::Exited] {
                let result = state.transition(event);
                if legal.contains(&(state, event)) {
                    assert!(result.is_ok(), "{:?} + {:?}", state, event);
                } else {
                    assert!(
                        matches!(result, Err(DisplayError::InvalidState(_))),
                        "{:?} + {:?} should be rejected",
                        state,
                        event
                    );
                }
            }
        }
    }

    #[test]
    fn starting_twice_is_an_error() {
        let running = RenderThreadState::Stopped
            .transition(ThreadEvent::Start)
            .unwrap();
        assert!(running.transition(ThreadEvent::Start).is_err());
    }
}
