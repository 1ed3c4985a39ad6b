//! Per-frame navigation simulation.
//!
//! [`SimulationDriver`] owns the running/stopped state and the active drive
//! mode; the tick system reads the pressed-key set, derives intent vectors,
//! and dispatches to the mode-appropriate integrator. Mouse look runs as its
//! own system in first-person mode; it and the tick both write camera state
//! within the same frame and their relative order is deliberately left
//! unconstrained (last write wins, as on any interactive control surface).

pub mod car;
pub mod movement;

use bevy::input::mouse::MouseMotion;
use bevy::prelude::*;

use crate::floating_origin::FloatingOriginCamera;
use crate::geo::fly_to_not_active;
use crate::input::{KeyBindings, PressedKeys, cursor_is_grabbed};
use crate::terrain::TerrainMap;
use crate::view_mode::{ViewMode, ViewModeState};
use car::car_step;
use movement::{
    CameraRig, apply_free_movement, apply_look, apply_surface_movement, movement_intent,
    turn_intent,
};

// ============================================================================
// Settings
// ============================================================================

/// Tunable parameters for the navigation modes.
///
/// Constructed once at startup; the Settings view exposes them for editing.
#[derive(Resource, Clone)]
pub struct NavSettings {
    /// Walking speed in meters per second.
    pub walk_speed: f32,
    /// Driving speed in meters per second.
    pub car_speed: f32,
    /// Flight speed in meters per second.
    pub flight_speed: f32,
    /// Keyboard turn rate in radians per second (car steering, flight arrows).
    pub turn_speed: f32,
    /// Walking eye height above the ground in meters.
    pub walk_eye_height: f32,
    /// Driving eye height above the ground in meters.
    pub car_eye_height: f32,
    /// Mouse look sensitivity in radians per count.
    pub mouse_sensitivity: f32,
}

impl Default for NavSettings {
    fn default() -> Self {
        Self {
            walk_speed: 5.0,
            car_speed: 20.0,
            flight_speed: 60.0,
            turn_speed: 1.5,
            walk_eye_height: 1.8,
            car_eye_height: 2.5,
            mouse_sensitivity: 0.001,
        }
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Which integrator the running simulation dispatches to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DriveMode {
    /// First-person ground movement.
    Walk,
    /// Vehicle-style ground movement.
    Car,
    /// Free flight.
    Flight,
}

/// The simulation loop state machine: stopped, or running one drive mode.
///
/// `start` and `stop` are idempotent; the drive mode can be set in either
/// state and only takes effect while running.
#[derive(Resource)]
pub struct SimulationDriver {
    running: bool,
    mode: DriveMode,
}

impl Default for SimulationDriver {
    fn default() -> Self {
        Self {
            running: false,
            mode: DriveMode::Walk,
        }
    }
}

impl SimulationDriver {
    /// Begin ticking. A no-op when already running.
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Stop ticking. A no-op when already stopped.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Select which integrator a running loop dispatches to.
    pub fn set_mode(&mut self, mode: DriveMode) {
        self.mode = mode;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The mode being ticked, if the driver is running.
    pub fn active_mode(&self) -> Option<DriveMode> {
        self.running.then_some(self.mode)
    }
}

/// Run condition: the simulation driver is running.
pub fn driver_is_running(driver: Res<SimulationDriver>) -> bool {
    driver.is_running()
}

/// Run condition: first-person mode is active.
fn is_first_person(state: Res<ViewModeState>) -> bool {
    state.current() == ViewMode::FirstPerson
}

// ============================================================================
// Camera components
// ============================================================================

/// Facing direction of the navigable camera (normalized).
#[derive(Component)]
pub struct NavCamera {
    pub direction: Vec3,
}

impl NavCamera {
    pub fn new(direction: Vec3) -> Self {
        Self {
            direction: direction.normalize(),
        }
    }
}

/// Snapshot the camera into a rig for the pure integrators.
pub fn load_rig(camera: &FloatingOriginCamera, nav: &NavCamera) -> CameraRig {
    CameraRig::new(camera.position, nav.direction)
}

/// Write an integrated rig back to the camera entity.
pub fn store_rig(
    rig: &CameraRig,
    camera: &mut FloatingOriginCamera,
    nav: &mut NavCamera,
    transform: &mut Transform,
) {
    camera.position = rig.position;
    nav.direction = rig.direction;
    transform.look_to(rig.direction, rig.local_up());
}

// ============================================================================
// Plugin
// ============================================================================

/// Plugin for the per-frame navigation simulation.
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<NavSettings>()
            .init_resource::<SimulationDriver>()
            .add_systems(
                Update,
                (
                    mouse_look.run_if(
                        is_first_person
                            .and(cursor_is_grabbed)
                            .and(fly_to_not_active),
                    ),
                    simulation_tick.run_if(driver_is_running.and(fly_to_not_active)),
                ),
            );
    }
}

// ============================================================================
// Systems
// ============================================================================

/// Integrate one simulation frame for the active drive mode.
#[allow(clippy::needless_pass_by_value)]
fn simulation_tick(
    time: Res<Time>,
    driver: Res<SimulationDriver>,
    keys: Res<PressedKeys>,
    bindings: Res<KeyBindings>,
    settings: Res<NavSettings>,
    terrain: Res<TerrainMap>,
    mut query: Query<(&mut FloatingOriginCamera, &mut Transform, &mut NavCamera)>,
) {
    let Some(mode) = driver.active_mode() else {
        return;
    };
    let Ok((mut camera, mut transform, mut nav)) = query.single_mut() else {
        return;
    };

    let dt = time.delta_secs();
    let intent = movement_intent(&keys, &bindings);
    let turn = turn_intent(&keys, &bindings);
    let sampler = crate::terrain::GroundSampler::new(&terrain);

    let mut rig = load_rig(&camera, &nav);
    match mode {
        DriveMode::Walk => {
            apply_surface_movement(
                &mut rig,
                intent,
                settings.walk_speed,
                settings.walk_eye_height,
                dt,
                &sampler,
            );
        }
        DriveMode::Car => {
            car_step(
                &mut rig,
                intent.z,
                intent.x,
                settings.car_speed,
                settings.turn_speed,
                settings.car_eye_height,
                dt,
                &sampler,
            );
        }
        DriveMode::Flight => {
            // Flight steering is stick-like: the arrow keys turn the view.
            if turn != Vec2::ZERO {
                apply_look(
                    &mut rig,
                    turn.x * settings.turn_speed * dt,
                    turn.y * settings.turn_speed * dt,
                );
            }
            apply_free_movement(&mut rig, intent, settings.flight_speed, dt);
        }
    }
    store_rig(&rig, &mut camera, &mut nav, &mut transform);
}

/// Convert mouse deltas into incremental first-person yaw/pitch.
///
/// Only active while the cursor is grabbed; when the windowing system drops
/// the grab on its own, this simply stops receiving motion until the grab is
/// reacquired.
#[allow(clippy::needless_pass_by_value)]
fn mouse_look(
    mut mouse_motion: MessageReader<MouseMotion>,
    settings: Res<NavSettings>,
    mut query: Query<(&mut FloatingOriginCamera, &mut Transform, &mut NavCamera)>,
) {
    let mut delta = Vec2::ZERO;
    for event in mouse_motion.read() {
        delta += event.delta;
    }
    if delta == Vec2::ZERO {
        return;
    }

    let Ok((mut camera, mut transform, mut nav)) = query.single_mut() else {
        return;
    };

    let mut rig = load_rig(&camera, &nav);
    apply_look(
        &mut rig,
        delta.x * settings.mouse_sensitivity,
        -delta.y * settings.mouse_sensitivity,
    );
    store_rig(&rig, &mut camera, &mut nav, &mut transform);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_starts_stopped() {
        let driver = SimulationDriver::default();
        assert!(!driver.is_running());
        assert_eq!(driver.active_mode(), None);
    }

    #[test]
    fn start_is_idempotent() {
        let mut driver = SimulationDriver::default();
        driver.start();
        driver.start();
        assert!(driver.is_running());
        driver.stop();
        assert!(!driver.is_running());
    }

    #[test]
    fn stop_when_stopped_is_a_no_op() {
        let mut driver = SimulationDriver::default();
        driver.stop();
        assert!(!driver.is_running());
    }

    #[test]
    fn mode_set_while_stopped_takes_effect_on_start() {
        let mut driver = SimulationDriver::default();
        driver.set_mode(DriveMode::Car);
        assert_eq!(driver.active_mode(), None);
        driver.start();
        assert_eq!(driver.active_mode(), Some(DriveMode::Car));
        driver.set_mode(DriveMode::Flight);
        assert_eq!(driver.active_mode(), Some(DriveMode::Flight));
    }
}
