use bevy::ecs::schedule::{IntoSystemConfigs, SystemConfigs};

pub use crate::error::SessionError;
pub use crate::passthrough::{DisplayMode, PassthroughEnvironment, SkyboxMaterial};
pub use crate::retry::{Backoff, RetryPolicy};
pub use crate::runtime::{
    Button, DeviceCapability, InputDevice, LoaderId, TrackingOrigin, XrRuntime,
};
pub use crate::scene::XrSceneCamera;
pub use crate::session::SessionPhase;
pub use crate::xr_init::{
    passthrough_active, phase_equals, session_ready, DisplayModeChanged, InitializeXrSession,
    SetDisplayMode, ShutdownXrSession, TogglePassthrough, XrPassthrough, XrSession,
    XrSessionConfig, XrSessionFailed, XrSessionPlugin, XrSessionStatusChanged,
};
#[cfg(all(feature = "openxr", not(target_family = "wasm")))]
pub use crate::oxr::OpenXrRuntime;
pub use crate::DefaultXrSessionPlugins;

pub trait XrSystems<Marker> {
    fn xr_only(self) -> SystemConfigs;
}

impl<T: IntoSystemConfigs<M>, M> XrSystems<M> for T {
    fn xr_only(self) -> SystemConfigs {
        self.into_configs().run_if(session_ready)
    }
}
