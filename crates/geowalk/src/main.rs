//! Globe scene viewer with simulated navigation modes.
//!
//! A Bevy viewer for exploring a terrain-bearing globe through six view
//! modes: orbit, explore, first-person walking, driving, free flight, and a
//! settings view. Navigation is integrated directly against the camera each
//! frame; the built-in screen-space controller takes over whenever no
//! simulated mode is active.

mod async_runtime;
mod coords;
mod floating_origin;
mod geo;
mod input;
mod launch_params;
mod sim;
mod terrain;
mod ui;
mod view_mode;

use bevy::prelude::*;
use glam::DVec3;
use leafwing_input_manager::prelude::ActionState;

use async_runtime::AsyncRuntimePlugin;
use coords::geodetic_to_ecef;
use floating_origin::{FloatingOriginCamera, FloatingOriginPlugin, WorldPosition};
use geo::GeoPlugin;
use input::{InputPlugin, NavAction, default_nav_input_map};
use launch_params::LaunchParams;
use sim::{NavCamera, SimulationPlugin};
use terrain::TerrainMap;
use ui::NavUiPlugin;
use view_mode::{ViewModePlugin, globe_projection};

/// Half-width of synthetic terrain coverage around the start location, in
/// degrees.
const TERRAIN_EXTENT_DEG: f64 = 0.2;

/// Plugin for the main application.
pub struct AppPlugin;

impl Plugin for AppPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((
            FloatingOriginPlugin,
            InputPlugin,
            ViewModePlugin,
            SimulationPlugin,
            GeoPlugin,
            NavUiPlugin,
        ))
        .init_resource::<TerrainMap>()
        .add_systems(Startup, setup_scene);
    }
}

/// Compute a start facing: north along the surface, pitched slightly down.
fn start_direction(position: DVec3) -> Vec3 {
    let up = position.normalize().as_vec3();
    let north = (Vec3::Z - up * Vec3::Z.dot(up)).normalize_or_zero();
    let north = if north == Vec3::ZERO { Vec3::X } else { north };
    (north - up * 0.3).normalize()
}

/// Set up the camera, terrain, globe, and lighting.
fn setup_scene(
    mut commands: Commands,
    params: Res<LaunchParams>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let start_position = geodetic_to_ecef(params.lat, params.lon, params.altitude);
    let direction = start_direction(start_position);
    let up = start_position.normalize().as_vec3();

    // The camera's transform stays at the render origin; the floating origin
    // system positions everything else relative to it.
    commands.spawn((
        Camera3d::default(),
        Camera::default(),
        Transform::from_translation(Vec3::ZERO).looking_to(direction, up),
        globe_projection(),
        FloatingOriginCamera::new(start_position),
        NavCamera::new(direction),
    ));

    // Action state for the discrete navigation actions.
    commands.spawn((default_nav_input_map(), ActionState::<NavAction>::default()));

    // Terrain around the start location.
    let terrain = TerrainMap::synthetic(params.lat, params.lon, TERRAIN_EXTENT_DEG);
    let (terrain_mesh, terrain_anchor) = terrain.to_mesh();
    commands.insert_resource(terrain);
    commands.spawn((
        Mesh3d(meshes.add(terrain_mesh)),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.36, 0.44, 0.26),
            perceptual_roughness: 0.95,
            ..Default::default()
        })),
        WorldPosition::new(terrain_anchor),
        Transform::default(),
    ));

    // The globe itself, for context outside terrain coverage.
    commands.spawn((
        Mesh3d(meshes.add(Sphere::new(coords::EARTH_RADIUS as f32).mesh().ico(6).unwrap_or_else(
            |_| Sphere::new(coords::EARTH_RADIUS as f32).mesh().uv(64, 32),
        ))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.16, 0.26, 0.38),
            perceptual_roughness: 0.9,
            ..Default::default()
        })),
        WorldPosition::new(DVec3::ZERO),
        Transform::default(),
    ));

    // Fixed sun; there is no day/night cycle.
    commands.spawn((
        DirectionalLight {
            illuminance: 15_000.0,
            ..Default::default()
        },
        Transform::default().looking_to(-up + Vec3::Z * 0.4, Vec3::Z),
    ));
    commands.insert_resource(GlobalAmbientLight {
        brightness: 250.0,
        ..Default::default()
    });

    tracing::info!(
        "Scene ready at {:.3}°, {:.3}° - pick a view mode in the navigation panel",
        params.lat,
        params.lon
    );
}

fn main() {
    // Initialize tracing for native platforms.
    #[cfg(not(target_family = "wasm"))]
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    // Initialize tracing for WASM (logs to the browser console).
    #[cfg(target_family = "wasm")]
    {
        console_error_panic_hook::set_once();
        tracing_wasm::set_as_global_default();
    }

    let mut app = App::new();

    #[allow(unused_mut)]
    let mut window = Window {
        title: "geowalk".to_string(),
        resolution: (1600, 900).into(),
        position: WindowPosition::Centered(MonitorSelection::Primary),
        ..Default::default()
    };

    // WASM: Fit canvas to parent element and prevent browser event handling.
    #[cfg(target_family = "wasm")]
    {
        window.fit_canvas_to_parent = true;
        window.prevent_default_event_handling = true;
    }

    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(window),
        ..Default::default()
    }));

    // Add async runtime (Tokio on native, no-op on WASM).
    app.add_plugins(AsyncRuntimePlugin);

    app.insert_resource(launch_params::parse());
    app.add_plugins(AppPlugin).run();
}
