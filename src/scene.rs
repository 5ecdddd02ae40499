use bevy::core_pipeline::Skybox;
use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy::render::camera::ClearColorConfig;

use crate::passthrough::{CameraHandle, ClearMode, SceneRenderer, SkyboxMaterial};

/// Marks the camera whose clear color and skybox follow the display mode.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct XrSceneCamera;

/// [`SceneRenderer`] backed by the Bevy world.
///
/// A solid clear writes [`ClearColorConfig::Custom`] on the camera. A skybox clear falls back to
/// [`ClearColorConfig::Default`]. The global [`ClearColor`] is only read, never written.
#[derive(SystemParam)]
pub struct BevyScene<'w, 's> {
    commands: Commands<'w, 's>,
    cameras: Query<'w, 's, (Entity, &'static mut Camera), With<XrSceneCamera>>,
    clear_color: Res<'w, ClearColor>,
    ambient_light: ResMut<'w, AmbientLight>,
}

impl SceneRenderer for BevyScene<'_, '_> {
    fn camera(&mut self) -> Option<CameraHandle> {
        self.cameras.iter().next().map(|(entity, _)| entity)
    }

    fn set_camera_clear_mode(&mut self, camera: CameraHandle, mode: ClearMode) {
        let Ok((_, mut camera)) = self.cameras.get_mut(camera) else {
            return;
        };
        camera.clear_color = match mode {
            ClearMode::SolidColor => ClearColorConfig::Custom(self.clear_color.0),
            ClearMode::Skybox => ClearColorConfig::Default,
        };
    }

    fn set_camera_background(&mut self, camera: CameraHandle, color: Color) {
        let Ok((_, mut camera)) = self.cameras.get_mut(camera) else {
            return;
        };
        // a camera without its own clear color keeps following the app's ClearColor
        if matches!(camera.clear_color, ClearColorConfig::Custom(_)) {
            camera.clear_color = ClearColorConfig::Custom(color);
        }
    }

    fn set_skybox(&mut self, camera: CameraHandle, skybox: Option<&SkyboxMaterial>) {
        let mut entity = self.commands.entity(camera);
        match skybox {
            Some(skybox) => {
                entity.insert(Skybox {
                    image: skybox.image.clone(),
                    brightness: skybox.brightness,
                });
            }
            None => {
                entity.remove::<Skybox>();
            }
        }
    }

    fn set_ambient_light(&mut self, color: Color, intensity: f32) {
        self.ambient_light.color = color;
        self.ambient_light.brightness = intensity;
    }
}
