use bevy::log::{info, warn};
use bevy::pbr::AmbientLight;
use bevy::prelude::{Color, Entity, Handle, Image};

use crate::error::{Result, SessionError};
use crate::runtime::{Button, DeviceCapability, InputDevice};

pub type CameraHandle = Entity;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DisplayMode {
    /// Regular VR rendering over a skybox.
    #[default]
    Opaque,
    /// Virtual content is composited over the headset's camera feed.
    Passthrough,
}

impl DisplayMode {
    pub fn inverse(self) -> Self {
        match self {
            DisplayMode::Opaque => DisplayMode::Passthrough,
            DisplayMode::Passthrough => DisplayMode::Opaque,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClearMode {
    Skybox,
    SolidColor,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SkyboxMaterial {
    pub image: Handle<Image>,
    pub brightness: f32,
}

/// Everything the controller writes to the scene for one display mode.
#[derive(Clone, Debug, PartialEq)]
pub struct EnvironmentState {
    pub clear_mode: ClearMode,
    pub background: Color,
    pub skybox: Option<SkyboxMaterial>,
    pub ambient_color: Color,
    pub ambient_intensity: f32,
}

impl EnvironmentState {
    fn apply<S: SceneRenderer + ?Sized>(&self, scene: &mut S, camera: CameraHandle) {
        scene.set_camera_clear_mode(camera, self.clear_mode);
        scene.set_camera_background(camera, self.background);
        scene.set_skybox(camera, self.skybox.as_ref());
        scene.set_ambient_light(self.ambient_color, self.ambient_intensity);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PassthroughEnvironment {
    pub passthrough: EnvironmentState,
    pub opaque: EnvironmentState,
}

impl Default for PassthroughEnvironment {
    fn default() -> Self {
        let light = AmbientLight::default();
        Self {
            passthrough: EnvironmentState {
                clear_mode: ClearMode::SolidColor,
                background: Color::NONE,
                skybox: None,
                // dim warm white so virtual content sits in the real room
                ambient_color: Color::rgb(1.0, 0.95, 0.8),
                ambient_intensity: light.brightness * 0.3,
            },
            opaque: EnvironmentState {
                clear_mode: ClearMode::Skybox,
                background: Color::BLACK,
                skybox: None,
                ambient_color: light.color,
                ambient_intensity: light.brightness,
            },
        }
    }
}

impl PassthroughEnvironment {
    pub fn with_skybox(mut self, skybox: SkyboxMaterial) -> Self {
        self.opaque.skybox = Some(skybox);
        self
    }

    pub fn state_for(&self, mode: DisplayMode) -> &EnvironmentState {
        match mode {
            DisplayMode::Opaque => &self.opaque,
            DisplayMode::Passthrough => &self.passthrough,
        }
    }
}

/// The scene the controller renders into. It owns the camera, skybox and lighting; the controller
/// only writes to it.
pub trait SceneRenderer {
    fn camera(&mut self) -> Option<CameraHandle>;
    fn set_camera_clear_mode(&mut self, camera: CameraHandle, mode: ClearMode);
    fn set_camera_background(&mut self, camera: CameraHandle, color: Color);
    fn set_skybox(&mut self, camera: CameraHandle, skybox: Option<&SkyboxMaterial>);
    fn set_ambient_light(&mut self, color: Color, intensity: f32);
}

/// Single source of truth for the active [`DisplayMode`], whatever triggered the switch.
#[derive(Clone, Debug, Default)]
pub struct PassthroughController {
    mode: DisplayMode,
    environment: PassthroughEnvironment,
}

impl PassthroughController {
    pub fn new(environment: PassthroughEnvironment) -> Self {
        Self {
            mode: DisplayMode::Opaque,
            environment,
        }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn environment(&self) -> &PassthroughEnvironment {
        &self.environment
    }

    /// Changing the presets does not touch the scene until the next switch.
    pub fn environment_mut(&mut self) -> &mut PassthroughEnvironment {
        &mut self.environment
    }

    pub fn enable_passthrough<S: SceneRenderer + ?Sized>(
        &mut self,
        scene: &mut S,
    ) -> Result<DisplayMode> {
        self.set_mode(DisplayMode::Passthrough, scene)
    }

    pub fn disable_passthrough<S: SceneRenderer + ?Sized>(
        &mut self,
        scene: &mut S,
    ) -> Result<DisplayMode> {
        self.set_mode(DisplayMode::Opaque, scene)
    }

    pub fn toggle<S: SceneRenderer + ?Sized>(&mut self, scene: &mut S) -> Result<DisplayMode> {
        self.set_mode(self.mode.inverse(), scene)
    }

    /// Switches to `mode`. Already being in `mode` leaves the scene untouched. Without a camera
    /// nothing is applied and the mode stays as it was.
    pub fn set_mode<S: SceneRenderer + ?Sized>(
        &mut self,
        mode: DisplayMode,
        scene: &mut S,
    ) -> Result<DisplayMode> {
        if self.mode == mode {
            return Ok(mode);
        }
        let Some(camera) = scene.camera() else {
            warn!("No XR camera available, staying in {:?} mode", self.mode);
            return Err(SessionError::RenderTargetUnavailable);
        };
        self.environment.state_for(mode).apply(scene, camera);
        self.mode = mode;
        info!("Display mode set to {mode:?}");
        Ok(mode)
    }
}

/// Edge detector for the controller menu button, so a held button toggles once.
#[derive(Clone, Copy, Debug, Default)]
pub struct MenuButtonWatcher {
    held: bool,
}

impl MenuButtonWatcher {
    /// Returns true on the tick the menu button of any controller goes down.
    pub fn poll(&mut self, devices: &[InputDevice]) -> bool {
        let pressed = devices.iter().any(|device| {
            device.has(DeviceCapability::Controller) && device.button_state(Button::Menu)
        });
        let rising = pressed && !self.held;
        self.held = pressed;
        rising
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeScene {
        camera: Option<CameraHandle>,
        state: EnvironmentState,
        writes: u32,
    }

    impl FakeScene {
        fn new(camera: Option<CameraHandle>) -> Self {
            Self {
                camera,
                state: PassthroughEnvironment::default().opaque,
                writes: 0,
            }
        }
    }

    impl SceneRenderer for FakeScene {
        fn camera(&mut self) -> Option<CameraHandle> {
            self.camera
        }

        fn set_camera_clear_mode(&mut self, _: CameraHandle, mode: ClearMode) {
            self.writes += 1;
            self.state.clear_mode = mode;
        }

        fn set_camera_background(&mut self, _: CameraHandle, color: Color) {
            self.writes += 1;
            self.state.background = color;
        }

        fn set_skybox(&mut self, _: CameraHandle, skybox: Option<&SkyboxMaterial>) {
            self.writes += 1;
            self.state.skybox = skybox.cloned();
        }

        fn set_ambient_light(&mut self, color: Color, intensity: f32) {
            self.writes += 1;
            self.state.ambient_color = color;
            self.state.ambient_intensity = intensity;
        }
    }

    fn scene() -> FakeScene {
        FakeScene::new(Some(Entity::from_raw(7)))
    }

    #[test]
    fn enabling_applies_the_passthrough_environment() {
        let mut controller = PassthroughController::default();
        let mut scene = scene();
        assert_eq!(
            controller.enable_passthrough(&mut scene),
            Ok(DisplayMode::Passthrough)
        );
        assert_eq!(scene.state, PassthroughEnvironment::default().passthrough);
        assert_eq!(scene.state.clear_mode, ClearMode::SolidColor);
        assert_eq!(scene.state.background, Color::NONE);
        assert!(scene.state.skybox.is_none());
    }

    #[test]
    fn enabling_twice_matches_enabling_once() {
        let mut controller = PassthroughController::default();
        let mut once = scene();
        controller.enable_passthrough(&mut once).unwrap();

        let mut controller = PassthroughController::default();
        let mut twice = scene();
        controller.enable_passthrough(&mut twice).unwrap();
        controller.enable_passthrough(&mut twice).unwrap();

        assert_eq!(once.state, twice.state);
        assert_eq!(controller.mode(), DisplayMode::Passthrough);
    }

    #[test]
    fn disabling_while_opaque_leaves_the_scene_alone() {
        let mut controller = PassthroughController::default();
        let mut scene = scene();
        let before = scene.state.clone();
        assert_eq!(controller.disable_passthrough(&mut scene), Ok(DisplayMode::Opaque));
        assert_eq!(scene.state, before);
        assert_eq!(scene.writes, 0);
    }

    #[test]
    fn toggling_twice_restores_the_original_scene() {
        let environment = PassthroughEnvironment::default().with_skybox(SkyboxMaterial {
            image: Handle::default(),
            brightness: 1000.0,
        });
        let mut controller = PassthroughController::new(environment.clone());
        let mut scene = scene();
        scene.state = environment.opaque.clone();
        let before = scene.state.clone();

        assert_eq!(controller.toggle(&mut scene), Ok(DisplayMode::Passthrough));
        assert_ne!(scene.state, before);
        assert_eq!(controller.toggle(&mut scene), Ok(DisplayMode::Opaque));
        assert_eq!(scene.state, before);
    }

    #[test]
    fn missing_camera_keeps_the_mode() {
        let mut controller = PassthroughController::default();
        let mut scene = FakeScene::new(None);
        assert_eq!(
            controller.enable_passthrough(&mut scene),
            Err(SessionError::RenderTargetUnavailable)
        );
        assert_eq!(controller.mode(), DisplayMode::Opaque);
        assert_eq!(scene.writes, 0);
    }

    #[test]
    fn menu_button_fires_once_per_press() {
        let released = [InputDevice::new("right", &[DeviceCapability::Controller])];
        let pressed = [released[0].clone().with_pressed(Button::Menu)];
        let mut watcher = MenuButtonWatcher::default();

        assert!(!watcher.poll(&released));
        assert!(watcher.poll(&pressed));
        assert!(!watcher.poll(&pressed));
        assert!(!watcher.poll(&released));
        assert!(watcher.poll(&pressed));
    }

    #[test]
    fn menu_button_on_a_tracked_hand_is_ignored() {
        let hand =
            [InputDevice::new("left hand", &[DeviceCapability::TrackedHand]).with_pressed(Button::Menu)];
        assert!(!MenuButtonWatcher::default().poll(&hand));
    }
}
