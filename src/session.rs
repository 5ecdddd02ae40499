use std::task::Poll;
use std::time::Duration;

use bevy::log::{debug, error, info, warn};

use crate::error::SessionError;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::runtime::{InputDevice, LoaderId, TrackingOrigin, XrRuntime};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// No loader is running. Initial state, and the state after [`XrSessionManager::shutdown`].
    #[default]
    Uninitialized,
    /// An initialization sequence is in flight.
    Initializing,
    /// A loader is active and its subsystems are started.
    Ready,
    /// The last attempt failed. A retry may still be pending, see [`XrSessionManager::retry_pending`].
    Failed,
    /// Terminal, entered through [`XrSessionManager::exit`].
    ShuttingDown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitializeOutcome {
    Started,
    AlreadyReady,
    /// A sequence is already running. The request is dropped, not queued.
    AlreadyInProgress,
    Disposed,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    PhaseChanged {
        from: SessionPhase,
        to: SessionPhase,
    },
    Failed(SessionError),
    RetryScheduled {
        attempt: u32,
        delay: Duration,
    },
    GaveUp(SessionError),
}

/// Where the initialization sequence is suspended between ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Idle,
    WaitFrame,
    Attempt,
    AwaitLoader,
    RetryIn(Duration),
}

/// Owns the XR runtime and drives it through loader initialization, retries, pause/resume and
/// teardown.
///
/// Nothing here blocks: the host calls [`update`](Self::update) once per tick and the sequence
/// advances at most one suspension point at a time.
pub struct XrSessionManager {
    runtime: Box<dyn XrRuntime>,
    policy: RetryPolicy,
    phase: SessionPhase,
    step: Step,
    active_loader: Option<LoaderId>,
    loader_initialized: bool,
    subsystems_running: bool,
    retry_count: u32,
    attempts: u32,
    last_error: Option<SessionError>,
    events: Vec<SessionEvent>,
}

impl XrSessionManager {
    pub fn new(runtime: impl XrRuntime + 'static, policy: RetryPolicy) -> Self {
        Self::from_boxed(Box::new(runtime), policy)
    }

    pub fn from_boxed(runtime: Box<dyn XrRuntime>, policy: RetryPolicy) -> Self {
        Self {
            runtime,
            policy,
            phase: SessionPhase::Uninitialized,
            step: Step::Idle,
            active_loader: None,
            loader_initialized: false,
            subsystems_running: false,
            retry_count: 0,
            attempts: 0,
            last_error: None,
            events: Vec::new(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn active_loader(&self) -> Option<&LoaderId> {
        self.active_loader.as_ref()
    }

    /// Failed attempts in the current sequence.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Attempts made in the current sequence.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_retries(&self) -> u32 {
        self.policy.budget()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    pub fn retry_pending(&self) -> bool {
        matches!(self.step, Step::RetryIn(_))
    }

    pub fn is_ready(&self) -> bool {
        self.phase == SessionPhase::Ready
    }

    pub fn supports_passthrough(&self) -> bool {
        self.is_ready() && self.runtime.supports_passthrough()
    }

    pub fn tracking_origin(&self) -> Option<TrackingOrigin> {
        self.runtime.tracking_origin()
    }

    /// Only takes effect on the next initialization.
    pub fn request_tracking_origin(&mut self, origin: TrackingOrigin) {
        self.runtime.request_tracking_origin(origin);
    }

    /// Input devices reported by the runtime. Empty unless the session is ready.
    pub fn input_devices(&self) -> Vec<InputDevice> {
        if self.is_ready() {
            self.runtime.input_devices()
        } else {
            Vec::new()
        }
    }

    pub fn drain_events(&mut self) -> std::vec::Drain<'_, SessionEvent> {
        self.events.drain(..)
    }

    /// Requests a fresh initialization sequence.
    ///
    /// From [`SessionPhase::Failed`] this is a manual re-trigger: any pending retry is cancelled and
    /// the retry count starts over.
    pub fn initialize(&mut self) -> InitializeOutcome {
        match self.phase {
            SessionPhase::ShuttingDown => {
                warn!("Trying to initialize XR after the session was disposed, ignoring");
                InitializeOutcome::Disposed
            }
            SessionPhase::Ready => {
                debug!("XR is already initialized");
                InitializeOutcome::AlreadyReady
            }
            SessionPhase::Initializing => {
                warn!("Trying to initialize XR while an initialization is running, ignoring");
                InitializeOutcome::AlreadyInProgress
            }
            SessionPhase::Uninitialized | SessionPhase::Failed => {
                info!("Starting XR initialization");
                self.retry_count = 0;
                self.attempts = 0;
                self.last_error = None;
                self.step = Step::WaitFrame;
                self.set_phase(SessionPhase::Initializing);
                InitializeOutcome::Started
            }
        }
    }

    /// Advances the initialization sequence by one tick. `delta` is the time since the last call.
    pub fn update(&mut self, delta: Duration) {
        match self.step {
            Step::Idle => {}
            Step::WaitFrame => self.step = Step::Attempt,
            Step::Attempt => self.attempt(),
            Step::AwaitLoader => self.poll_loader(),
            Step::RetryIn(remaining) => {
                if delta >= remaining {
                    info!("Retrying XR initialization");
                    self.set_phase(SessionPhase::Initializing);
                    self.attempt();
                } else {
                    self.step = Step::RetryIn(remaining - delta);
                }
            }
        }
    }

    pub fn on_pause(&mut self) {
        debug!("App paused in XR phase {:?}", self.phase);
    }

    /// Re-enters initialization if the runtime revoked the loader while the app was in the
    /// background.
    pub fn on_resume(&mut self) {
        if self.phase != SessionPhase::Ready {
            return;
        }
        if self.runtime.active_loader().is_some() {
            debug!("App resumed with XR loader still active");
            return;
        }
        warn!("XR loader disappeared while the app was paused, reinitializing");
        self.release();
        self.set_phase(SessionPhase::Uninitialized);
        self.initialize();
    }

    /// Stops subsystems, releases the loader and cancels any pending retry. Safe from any phase.
    pub fn shutdown(&mut self) {
        if self.phase == SessionPhase::ShuttingDown {
            return;
        }
        self.release();
        self.set_phase(SessionPhase::Uninitialized);
    }

    /// Like [`shutdown`](Self::shutdown), but the session can never be initialized again.
    pub fn exit(&mut self) {
        if self.phase == SessionPhase::ShuttingDown {
            return;
        }
        self.release();
        self.set_phase(SessionPhase::ShuttingDown);
    }

    fn release(&mut self) {
        self.step = Step::Idle;
        if self.subsystems_running {
            info!("Stopping XR subsystems");
            self.runtime.stop_subsystems();
            self.subsystems_running = false;
        }
        if self.loader_initialized {
            self.runtime.deinitialize_loader();
            self.loader_initialized = false;
        }
        self.active_loader = None;
    }

    fn attempt(&mut self) {
        self.attempts += 1;
        info!(
            "XR initialization attempt {}/{}",
            self.attempts,
            self.policy.budget()
        );

        if !self.runtime.is_runtime_available() {
            self.fail(SessionError::RuntimeUnavailable);
            return;
        }

        if let Some(loader) = self.runtime.active_loader() {
            info!("XR runtime already has loader {loader} active, adopting it");
            self.loader_initialized = true;
            self.subsystems_running = true;
            self.become_ready(loader);
            return;
        }

        self.runtime.initialize_loader();
        self.loader_initialized = true;
        self.step = Step::AwaitLoader;
        self.poll_loader();
    }

    fn poll_loader(&mut self) {
        match self.runtime.poll_loader() {
            Poll::Pending => {}
            Poll::Ready(None) => {
                self.loader_initialized = false;
                self.fail(SessionError::LoaderUnavailable);
            }
            Poll::Ready(Some(loader)) => match self.runtime.start_subsystems() {
                Ok(()) => {
                    info!("XR subsystems started with loader {loader}");
                    self.subsystems_running = true;
                    self.become_ready(loader);
                }
                Err(err) => {
                    self.runtime.deinitialize_loader();
                    self.loader_initialized = false;
                    self.fail(err.into());
                }
            },
        }
    }

    fn become_ready(&mut self, loader: LoaderId) {
        self.step = Step::Idle;
        self.active_loader = Some(loader);
        self.last_error = None;
        self.set_phase(SessionPhase::Ready);
    }

    fn fail(&mut self, err: SessionError) {
        self.retry_count += 1;
        warn!("XR initialization attempt {} failed: {err}", self.attempts);
        self.set_phase(SessionPhase::Failed);
        self.events.push(SessionEvent::Failed(err.clone()));

        match self.policy.decide(self.retry_count) {
            RetryDecision::RetryAfter(delay) => {
                self.step = Step::RetryIn(delay);
                self.events.push(SessionEvent::RetryScheduled {
                    attempt: self.attempts + 1,
                    delay,
                });
                self.last_error = Some(err);
            }
            RetryDecision::GiveUp => {
                self.step = Step::Idle;
                let err = if self.policy.enabled {
                    SessionError::RetryBudgetExhausted {
                        attempts: self.attempts,
                        last: Box::new(err),
                    }
                } else {
                    err
                };
                error!("Unable to initialize XR: {err}");
                self.events.push(SessionEvent::GaveUp(err.clone()));
                self.last_error = Some(err);
            }
        }
    }

    fn set_phase(&mut self, to: SessionPhase) {
        let from = self.phase;
        if from == to {
            return;
        }
        debug!("XR phase {from:?} -> {to:?}");
        self.phase = to;
        self.events.push(SessionEvent::PhaseChanged { from, to });
    }
}

impl Drop for XrSessionManager {
    fn drop(&mut self) {
        self.release();
    }
}
