use std::fmt;
use std::task::Poll;

use thiserror::Error;

/// Identifies the XR loader a runtime brought up, e.g. `"Oculus 1.0.33"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LoaderId(String);

impl LoaderId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LoaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LoaderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct SubsystemError(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceCapability {
    Controller,
    TrackedHand,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Button {
    Menu,
    Trigger,
    Primary,
}

/// Where the tracking space is anchored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TrackingOrigin {
    /// Origin on the floor, so the user's height is part of the head pose.
    #[default]
    Floor,
    /// Origin at the headset position when tracking started.
    Device,
}

impl TrackingOrigin {
    pub fn fallback(self) -> Option<TrackingOrigin> {
        match self {
            TrackingOrigin::Floor => Some(TrackingOrigin::Device),
            TrackingOrigin::Device => None,
        }
    }

    /// The first of `self` and its fallbacks that is in `supported`.
    pub fn resolve(self, supported: &[TrackingOrigin]) -> Option<TrackingOrigin> {
        let mut origin = Some(self);
        while let Some(candidate) = origin {
            if supported.contains(&candidate) {
                return Some(candidate);
            }
            origin = candidate.fallback();
        }
        None
    }
}

/// Snapshot of one input device as reported by the runtime for the current tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputDevice {
    pub name: String,
    pub capabilities: Vec<DeviceCapability>,
    pub pressed: Vec<Button>,
}

impl InputDevice {
    pub fn new(name: impl Into<String>, capabilities: &[DeviceCapability]) -> Self {
        Self {
            name: name.into(),
            capabilities: capabilities.to_vec(),
            pressed: Vec::new(),
        }
    }

    pub fn with_pressed(mut self, button: Button) -> Self {
        if !self.pressed.contains(&button) {
            self.pressed.push(button);
        }
        self
    }

    pub fn has(&self, capability: DeviceCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn button_state(&self, button: Button) -> bool {
        self.pressed.contains(&button)
    }
}

/// The platform XR facility the session manager drives.
///
/// Loader initialization may take several ticks: [`initialize_loader`](XrRuntime::initialize_loader)
/// starts the handshake and [`poll_loader`](XrRuntime::poll_loader) is called once per tick until
/// it stops returning [`Poll::Pending`].
pub trait XrRuntime: Send + Sync {
    fn is_runtime_available(&self) -> bool;

    /// The loader the runtime currently reports as running, if any.
    fn active_loader(&self) -> Option<LoaderId>;

    fn initialize_loader(&mut self);

    /// `Ready(None)` means the handshake finished without a usable loader.
    fn poll_loader(&mut self) -> Poll<Option<LoaderId>>;

    fn start_subsystems(&mut self) -> Result<(), SubsystemError>;

    fn stop_subsystems(&mut self);

    /// Releases the active loader. Also abandons a handshake that is still in flight.
    fn deinitialize_loader(&mut self);

    fn input_devices(&self) -> Vec<InputDevice>;

    fn supports_passthrough(&self) -> bool {
        false
    }

    /// Preferred tracking origin, set before the first initialization.
    fn request_tracking_origin(&mut self, _origin: TrackingOrigin) {}

    /// The tracking origin the runtime is configured for. `None` until a loader is up.
    fn tracking_origin(&self) -> Option<TrackingOrigin> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_falls_back_to_device() {
        let origin = TrackingOrigin::Floor;
        assert_eq!(
            origin.resolve(&[TrackingOrigin::Floor, TrackingOrigin::Device]),
            Some(TrackingOrigin::Floor)
        );
        assert_eq!(origin.resolve(&[TrackingOrigin::Device]), Some(TrackingOrigin::Device));
        assert_eq!(origin.resolve(&[]), None);
    }

    #[test]
    fn device_never_upgrades_to_floor() {
        assert_eq!(TrackingOrigin::Device.resolve(&[TrackingOrigin::Floor]), None);
    }
}
