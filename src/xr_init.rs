use std::sync::Mutex;

use bevy::app::AppExit;
use bevy::prelude::*;
use bevy::window::ApplicationLifetime;

use crate::error::{Result, SessionError};
use crate::passthrough::{DisplayMode, MenuButtonWatcher, PassthroughController, PassthroughEnvironment};
use crate::retry::RetryPolicy;
use crate::runtime::{TrackingOrigin, XrRuntime};
use crate::scene::BevyScene;
use crate::session::{SessionEvent, SessionPhase, XrSessionManager};

#[derive(Clone, Debug)]
pub struct XrSessionConfig {
    /// Send [`InitializeXrSession`] on startup.
    pub auto_initialize: bool,
    /// Switch to passthrough when the session becomes ready, if the runtime supports it.
    pub enable_passthrough_on_ready: bool,
    pub retry: RetryPolicy,
    pub passthrough: PassthroughEnvironment,
    /// Take the opaque background and ambient light from the app's [`ClearColor`] and
    /// [`AmbientLight`] at startup, so leaving passthrough restores the scene as it was.
    pub opaque_from_scene: bool,
    pub tracking_origin: TrackingOrigin,
}

impl Default for XrSessionConfig {
    fn default() -> Self {
        Self {
            auto_initialize: true,
            enable_passthrough_on_ready: true,
            retry: default(),
            passthrough: default(),
            opaque_from_scene: true,
            tracking_origin: default(),
        }
    }
}

/// Adds the XR session lifecycle and passthrough mode switching to an App.
pub struct XrSessionPlugin {
    pub config: XrSessionConfig,
    runtime: Mutex<Option<Box<dyn XrRuntime>>>,
}

impl XrSessionPlugin {
    pub fn new(runtime: impl XrRuntime + 'static) -> Self {
        Self {
            config: default(),
            runtime: Mutex::new(Some(Box::new(runtime))),
        }
    }

    pub fn with_config(mut self, config: XrSessionConfig) -> Self {
        self.config = config;
        self
    }
}

#[derive(Resource, Deref, DerefMut)]
pub struct XrSession(pub XrSessionManager);

#[derive(Resource, Deref, DerefMut)]
pub struct XrPassthrough(pub PassthroughController);

#[derive(Resource, Clone, Copy, Debug)]
pub struct XrSessionSettings {
    pub auto_initialize: bool,
    pub enable_passthrough_on_ready: bool,
    pub opaque_from_scene: bool,
}

#[derive(Resource, Default, Deref, DerefMut)]
struct MenuButtonState(MenuButtonWatcher);

#[derive(Event, Clone, Copy, Default)]
pub struct InitializeXrSession;

#[derive(Event, Clone, Copy, Default)]
pub struct ShutdownXrSession;

#[derive(Event, Clone, Copy, Default)]
pub struct TogglePassthrough;

#[derive(Event, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetDisplayMode(pub DisplayMode);

#[derive(Event, Clone, Copy, Debug, PartialEq, Eq)]
pub struct XrSessionStatusChanged {
    pub from: SessionPhase,
    pub to: SessionPhase,
}

#[derive(Event, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayModeChanged(pub DisplayMode);

#[derive(Event, Clone, Debug, PartialEq)]
pub struct XrSessionFailed(pub SessionError);

impl Plugin for XrSessionPlugin {
    fn build(&self, app: &mut App) {
        let runtime = self.runtime.lock().ok().and_then(|mut runtime| runtime.take());
        let Some(mut runtime) = runtime else {
            error!("XrSessionPlugin was built twice, only the first App owns the XR runtime");
            return;
        };

        runtime.request_tracking_origin(self.config.tracking_origin);

        app.add_event::<InitializeXrSession>()
            .add_event::<ShutdownXrSession>()
            .add_event::<TogglePassthrough>()
            .add_event::<SetDisplayMode>()
            .add_event::<XrSessionStatusChanged>()
            .add_event::<DisplayModeChanged>()
            .add_event::<XrSessionFailed>()
            .add_event::<ApplicationLifetime>()
            .add_event::<AppExit>()
            .init_resource::<ClearColor>()
            .init_resource::<AmbientLight>()
            .init_resource::<MenuButtonState>()
            .insert_resource(XrSession(XrSessionManager::from_boxed(
                runtime,
                self.config.retry,
            )))
            .insert_resource(XrPassthrough(PassthroughController::new(
                self.config.passthrough.clone(),
            )))
            .insert_resource(XrSessionSettings {
                auto_initialize: self.config.auto_initialize,
                enable_passthrough_on_ready: self.config.enable_passthrough_on_ready,
                opaque_from_scene: self.config.opaque_from_scene,
            })
            .add_systems(PreStartup, capture_opaque_environment)
            .add_systems(Startup, request_initialize)
            .add_systems(
                First,
                (handle_session_requests, forward_app_lifetime, drive_session).chain(),
            )
            .add_systems(
                Update,
                (
                    watch_menu_button,
                    follow_session_status,
                    handle_display_requests,
                    log_status_changes,
                )
                    .chain(),
            )
            .add_systems(Last, exit_session_on_app_exit);
    }
}

/// A [`Condition`](bevy::ecs::schedule::Condition) system that says if the XR session is ready.
pub fn session_ready(session: Option<Res<XrSession>>) -> bool {
    session.is_some_and(|session| session.is_ready())
}

/// A function that returns a [`Condition`](bevy::ecs::schedule::Condition) system that says if the
/// session is in a specific [`SessionPhase`]
pub fn phase_equals(phase: SessionPhase) -> impl FnMut(Option<Res<XrSession>>) -> bool {
    move |session: Option<Res<XrSession>>| session.is_some_and(|s| s.phase() == phase)
}

pub fn passthrough_active(passthrough: Option<Res<XrPassthrough>>) -> bool {
    passthrough.is_some_and(|p| p.mode() == DisplayMode::Passthrough)
}

fn capture_opaque_environment(
    settings: Res<XrSessionSettings>,
    clear_color: Res<ClearColor>,
    ambient_light: Res<AmbientLight>,
    mut passthrough: ResMut<XrPassthrough>,
) {
    if !settings.opaque_from_scene {
        return;
    }
    let opaque = &mut passthrough.environment_mut().opaque;
    opaque.background = clear_color.0;
    opaque.ambient_color = ambient_light.color;
    opaque.ambient_intensity = ambient_light.brightness;
}

fn request_initialize(
    settings: Res<XrSessionSettings>,
    mut initialize: EventWriter<InitializeXrSession>,
) {
    if settings.auto_initialize {
        initialize.send_default();
    }
}

fn handle_session_requests(
    mut session: ResMut<XrSession>,
    mut initialize: EventReader<InitializeXrSession>,
    mut shutdown: EventReader<ShutdownXrSession>,
) {
    if !initialize.is_empty() {
        initialize.clear();
        session.initialize();
    }
    if !shutdown.is_empty() {
        shutdown.clear();
        session.shutdown();
    }
}

fn forward_app_lifetime(
    mut session: ResMut<XrSession>,
    mut lifetime: EventReader<ApplicationLifetime>,
) {
    for event in lifetime.read() {
        match event {
            ApplicationLifetime::Suspended => session.on_pause(),
            ApplicationLifetime::Resumed => session.on_resume(),
            _ => {}
        }
    }
}

fn drive_session(
    time: Res<Time>,
    mut session: ResMut<XrSession>,
    mut status: EventWriter<XrSessionStatusChanged>,
    mut failed: EventWriter<XrSessionFailed>,
) {
    session.update(time.delta());
    for event in session.drain_events() {
        match event {
            SessionEvent::PhaseChanged { from, to } => {
                status.send(XrSessionStatusChanged { from, to });
            }
            SessionEvent::Failed(err) | SessionEvent::GaveUp(err) => {
                failed.send(XrSessionFailed(err));
            }
            SessionEvent::RetryScheduled { attempt, delay } => {
                info!("Next XR initialization attempt ({attempt}) in {delay:?}");
            }
        }
    }
}

fn watch_menu_button(
    session: Res<XrSession>,
    mut menu_button: ResMut<MenuButtonState>,
    mut toggle: EventWriter<TogglePassthrough>,
) {
    if menu_button.poll(&session.input_devices()) {
        toggle.send_default();
    }
}

fn follow_session_status(
    settings: Res<XrSessionSettings>,
    session: Res<XrSession>,
    mut status: EventReader<XrSessionStatusChanged>,
    mut passthrough: ResMut<XrPassthrough>,
    mut scene: BevyScene,
    mut changed: EventWriter<DisplayModeChanged>,
) {
    for status in status.read() {
        if status.to == SessionPhase::Ready && settings.enable_passthrough_on_ready {
            if !session.supports_passthrough() {
                info!("XR runtime does not support passthrough, staying opaque");
                continue;
            }
            let before = passthrough.mode();
            let result = passthrough.enable_passthrough(&mut scene);
            report_mode(before, result, &mut changed);
        } else if status.from == SessionPhase::Ready {
            let before = passthrough.mode();
            let result = passthrough.disable_passthrough(&mut scene);
            report_mode(before, result, &mut changed);
        }
    }
}

fn handle_display_requests(
    mut toggles: EventReader<TogglePassthrough>,
    mut requests: EventReader<SetDisplayMode>,
    mut passthrough: ResMut<XrPassthrough>,
    mut scene: BevyScene,
    mut changed: EventWriter<DisplayModeChanged>,
) {
    for _ in toggles.read() {
        let before = passthrough.mode();
        let result = passthrough.toggle(&mut scene);
        report_mode(before, result, &mut changed);
    }
    for SetDisplayMode(mode) in requests.read() {
        let before = passthrough.mode();
        let result = passthrough.set_mode(*mode, &mut scene);
        report_mode(before, result, &mut changed);
    }
}

fn report_mode(
    before: DisplayMode,
    result: Result<DisplayMode>,
    changed: &mut EventWriter<DisplayModeChanged>,
) {
    match result {
        Ok(mode) if mode != before => {
            changed.send(DisplayModeChanged(mode));
        }
        Ok(_) => {}
        Err(err) => warn!("Unable to switch display mode: {err}"),
    }
}

fn log_status_changes(
    session: Res<XrSession>,
    mut status: EventReader<XrSessionStatusChanged>,
    mut modes: EventReader<DisplayModeChanged>,
    mut failures: EventReader<XrSessionFailed>,
) {
    for status in status.read() {
        info!("XR session {:?} -> {:?}", status.from, status.to);
        if status.to != SessionPhase::Ready {
            continue;
        }
        if let Some(loader) = session.active_loader() {
            info!("XR loader: {loader}");
        }
        if let Some(origin) = session.tracking_origin() {
            info!("XR tracking origin: {origin:?}");
        }
        let devices = session.input_devices();
        if devices.is_empty() {
            info!("No XR input devices detected");
        }
        for device in devices {
            info!("XR input device: {} {:?}", device.name, device.capabilities);
        }
    }
    for mode in modes.read() {
        info!("Display mode changed to {:?}", mode.0);
    }
    for failure in failures.read() {
        error!("XR session failure: {}", failure.0);
    }
}

fn exit_session_on_app_exit(mut exits: EventReader<AppExit>, mut session: ResMut<XrSession>) {
    if !exits.is_empty() {
        exits.clear();
        session.exit();
    }
}
