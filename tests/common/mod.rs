#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::Poll;

use bevy_mr_session::runtime::{
    InputDevice, LoaderId, SubsystemError, TrackingOrigin, XrRuntime,
};

/// What the fake runtime does for one initialization attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Unavailable,
    NoLoader,
    SubsystemsFail,
    /// Loader comes up after `ticks` pending polls.
    Loader { ticks: u32 },
}

#[derive(Debug)]
pub struct FakeState {
    pub script: VecDeque<Outcome>,
    pub fallback: Outcome,
    pub active: Option<LoaderId>,
    pub passthrough: bool,
    pub devices: Vec<InputDevice>,
    pub tracking_origin: Option<TrackingOrigin>,
    pub loader_init_calls: u32,
    pub start_calls: u32,
    pub stop_calls: u32,
    pub deinit_calls: u32,
    pending: Option<(Outcome, u32)>,
    fail_start: bool,
}

impl FakeState {
    fn next(&self) -> Outcome {
        self.script.front().copied().unwrap_or(self.fallback)
    }

    fn advance(&mut self) -> Outcome {
        self.script.pop_front().unwrap_or(self.fallback)
    }
}

#[derive(Clone, Debug)]
pub struct FakeRuntime(Arc<Mutex<FakeState>>);

impl FakeRuntime {
    /// Plays `script` one attempt at a time, then keeps answering with `fallback`.
    pub fn scripted(script: impl IntoIterator<Item = Outcome>, fallback: Outcome) -> Self {
        Self(Arc::new(Mutex::new(FakeState {
            script: script.into_iter().collect(),
            fallback,
            active: None,
            passthrough: true,
            devices: Vec::new(),
            tracking_origin: None,
            loader_init_calls: 0,
            start_calls: 0,
            stop_calls: 0,
            deinit_calls: 0,
            pending: None,
            fail_start: false,
        })))
    }

    pub fn ready() -> Self {
        Self::scripted([], Outcome::Loader { ticks: 0 })
    }

    pub fn always(outcome: Outcome) -> Self {
        Self::scripted([], outcome)
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.0.lock().unwrap()
    }

    /// Simulates the host revoking the loader while the app is in the background.
    pub fn revoke_loader(&self) {
        self.state().active = None;
    }
}

impl XrRuntime for FakeRuntime {
    fn is_runtime_available(&self) -> bool {
        let mut state = self.state();
        if state.next() == Outcome::Unavailable {
            state.advance();
            return false;
        }
        true
    }

    fn active_loader(&self) -> Option<LoaderId> {
        self.state().active.clone()
    }

    fn initialize_loader(&mut self) {
        let mut state = self.state();
        state.loader_init_calls += 1;
        let outcome = state.advance();
        let ticks = match outcome {
            Outcome::Loader { ticks } => ticks,
            _ => 0,
        };
        state.pending = Some((outcome, ticks));
    }

    fn poll_loader(&mut self) -> Poll<Option<LoaderId>> {
        let mut state = self.state();
        let Some((outcome, ticks)) = state.pending else {
            return Poll::Ready(None);
        };
        if ticks > 0 {
            state.pending = Some((outcome, ticks - 1));
            return Poll::Pending;
        }
        state.pending = None;
        match outcome {
            Outcome::Unavailable | Outcome::NoLoader => Poll::Ready(None),
            Outcome::SubsystemsFail => {
                state.fail_start = true;
                Poll::Ready(Some(LoaderId::from("fake")))
            }
            Outcome::Loader { .. } => {
                state.active = Some(LoaderId::from("fake"));
                Poll::Ready(state.active.clone())
            }
        }
    }

    fn start_subsystems(&mut self) -> Result<(), SubsystemError> {
        let mut state = self.state();
        state.start_calls += 1;
        if std::mem::take(&mut state.fail_start) {
            return Err(SubsystemError("display subsystem refused to start".into()));
        }
        Ok(())
    }

    fn stop_subsystems(&mut self) {
        self.state().stop_calls += 1;
    }

    fn deinitialize_loader(&mut self) {
        let mut state = self.state();
        state.deinit_calls += 1;
        state.active = None;
        state.pending = None;
    }

    fn input_devices(&self) -> Vec<InputDevice> {
        self.state().devices.clone()
    }

    fn supports_passthrough(&self) -> bool {
        self.state().passthrough
    }

    fn request_tracking_origin(&mut self, origin: TrackingOrigin) {
        self.state().tracking_origin = Some(origin);
    }

    fn tracking_origin(&self) -> Option<TrackingOrigin> {
        let state = self.state();
        state.active.as_ref().and(state.tracking_origin)
    }
}
