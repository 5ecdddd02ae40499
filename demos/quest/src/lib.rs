use bevy::prelude::*;
use bevy_mr_session::prelude::*;

/// Rotation applied every frame, in degrees per second around each axis.
#[derive(Component, Clone, Copy, Debug)]
pub struct Spin {
    pub degrees_per_second: Vec3,
}

impl Default for Spin {
    fn default() -> Self {
        Self {
            degrees_per_second: Vec3::new(0.0, 50.0, 0.0),
        }
    }
}

#[bevy_main]
fn main() {
    if let Err(e) = run() {
        error!("{e:?}");
    }
}

pub fn run() -> eyre::Result<()> {
    color_eyre::install()?;

    info!("Running quest passthrough cube demo");
    App::new()
        .add_plugins(DefaultXrSessionPlugins::new(
            OpenXrRuntime::new("Quest Passthrough Cube"),
            XrSessionConfig::default(),
        ))
        .add_systems(Startup, setup)
        .add_systems(Update, spin)
        .run();
    Ok(())
}

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    // cube, two meters ahead at eye level
    commands.spawn((
        PbrBundle {
            mesh: meshes.add(Cuboid::from_size(Vec3::splat(0.3))),
            material: materials.add(StandardMaterial {
                base_color: Color::CYAN,
                emissive: Color::BLUE * 0.3,
                ..default()
            }),
            transform: Transform::from_xyz(0.0, 1.5, 2.0),
            ..default()
        },
        Spin::default(),
    ));
    // light
    commands.spawn(PointLightBundle {
        point_light: PointLight {
            intensity: 1500.0,
            shadows_enabled: true,
            ..default()
        },
        transform: Transform::from_xyz(4.0, 8.0, 4.0),
        ..default()
    });
    // camera
    commands.spawn((
        Camera3dBundle {
            transform: Transform::from_xyz(0.0, 1.6, 0.0).looking_at(Vec3::new(0.0, 1.5, 2.0), Vec3::Y),
            ..default()
        },
        XrSceneCamera,
    ));
}

fn spin(time: Res<Time>, mut query: Query<(&mut Transform, &Spin)>) {
    for (mut transform, spin) in &mut query {
        let angles = spin.degrees_per_second * time.delta_seconds();
        transform.rotate(Quat::from_euler(
            EulerRot::XYZ,
            angles.x.to_radians(),
            angles.y.to_radians(),
            angles.z.to_radians(),
        ));
    }
}
