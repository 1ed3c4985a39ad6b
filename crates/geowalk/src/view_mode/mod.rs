//! View-mode state machine.
//!
//! Exactly one view mode is active at a time. Orbit and Explore leave the
//! camera to the built-in screen-space controller; FirstPerson, Car, and
//! Flight hand it to the simulation driver; Settings suspends the driver and
//! touches nothing else. All mode changes go through [`ViewModeTransitions`]
//! and are reconciled by a single system so capability flags, cursor grab,
//! and the driver can never disagree about who owns the camera.
//!
//! ### Transition effects
//!
//! | Target       | Driver           | Capabilities | Cursor           | Scene    |
//! |--------------|------------------|--------------|------------------|----------|
//! | Orbit        | stop             | enable all   | release          | keep     |
//! | Explore      | stop             | enable all   | release          | morph 3D |
//! | FirstPerson  | restart (walk)   | disable all  | grab after delay | keep     |
//! | Car          | restart (car)    | disable all  | release          | keep     |
//! | Flight       | restart (flight) | disable all  | release          | keep     |
//! | Settings     | stop             | untouched    | release          | keep     |

pub mod orbit;

use bevy::{
    prelude::*,
    window::{CursorOptions, PrimaryWindow},
};
use leafwing_input_manager::prelude::ActionState;

use crate::floating_origin::FloatingOriginCamera;
use crate::input::{NavAction, set_cursor_grab};
use crate::launch_params::LaunchParams;
use crate::sim::{DriveMode, SimulationDriver};
pub use orbit::{ScreenSpaceController, ScreenSpaceControllerPlugin};

/// Delay before requesting the cursor grab after entering first-person mode,
/// leaving the click that triggered the transition fully processed first.
const CURSOR_GRAB_DELAY_SECS: f32 = 0.1;

// ============================================================================
// Modes
// ============================================================================

/// The discrete navigation modes of the viewer.
#[derive(Default, PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(not(target_family = "wasm"), derive(clap::ValueEnum))]
pub enum ViewMode {
    /// Built-in orbit navigation (default).
    #[default]
    Orbit,
    /// Orbit navigation with the scene morphed back to the 3D globe.
    Explore,
    /// First-person walking with mouse look.
    FirstPerson,
    /// Ground vehicle driving.
    Car,
    /// Free flight.
    Flight,
    /// Driver suspended; the settings panel is open.
    Settings,
}

/// The currently active view mode.
///
/// The initial value comes from the host launch parameters; changes go
/// through [`ViewModeTransitions`] only.
#[derive(Resource, Default)]
pub struct ViewModeState {
    current: ViewMode,
}

impl ViewModeState {
    pub fn current(&self) -> ViewMode {
        self.current
    }

    pub fn is_first_person(&self) -> bool {
        self.current == ViewMode::FirstPerson
    }
}

/// Pending view-mode transition requests.
///
/// Request a mode from anywhere (UI buttons, Escape handling, launch
/// parameters); the transition system drains the queue once per frame.
#[derive(Resource, Default)]
pub struct ViewModeTransitions {
    pending: Vec<ViewMode>,
}

impl ViewModeTransitions {
    pub fn request(&mut self, mode: ViewMode) {
        self.pending.push(mode);
    }

    fn take(&mut self) -> Vec<ViewMode> {
        std::mem::take(&mut self.pending)
    }
}

// ============================================================================
// Transition plan
// ============================================================================

/// The side effects a transition applies, in order: stop the driver, adjust
/// cursor and capabilities, morph the scene, then restart the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan {
    /// Restart the driver in this mode after stopping it.
    pub drive: Option<DriveMode>,
    /// Set all four capability flags to this value; `None` leaves them alone.
    pub capabilities: Option<bool>,
    /// Release the cursor grab if held.
    pub release_cursor: bool,
    /// Schedule a cursor grab after the fixed delay.
    pub request_cursor_grab: bool,
    /// Morph the scene back to the 3D globe projection.
    pub morph_to_3d: bool,
}

/// Compute the side effects for entering `target`.
///
/// Pure so the transition table can be verified in isolation; the driver is
/// always stopped before the plan is applied.
pub fn plan_transition(target: ViewMode) -> TransitionPlan {
    match target {
        ViewMode::Orbit => TransitionPlan {
            drive: None,
            capabilities: Some(true),
            release_cursor: true,
            request_cursor_grab: false,
            morph_to_3d: false,
        },
        ViewMode::Explore => TransitionPlan {
            drive: None,
            capabilities: Some(true),
            release_cursor: true,
            request_cursor_grab: false,
            morph_to_3d: true,
        },
        ViewMode::FirstPerson => TransitionPlan {
            drive: Some(DriveMode::Walk),
            capabilities: Some(false),
            release_cursor: false,
            request_cursor_grab: true,
            morph_to_3d: false,
        },
        ViewMode::Car => TransitionPlan {
            drive: Some(DriveMode::Car),
            capabilities: Some(false),
            release_cursor: true,
            request_cursor_grab: false,
            morph_to_3d: false,
        },
        ViewMode::Flight => TransitionPlan {
            drive: Some(DriveMode::Flight),
            capabilities: Some(false),
            release_cursor: true,
            request_cursor_grab: false,
            morph_to_3d: false,
        },
        ViewMode::Settings => TransitionPlan {
            drive: None,
            capabilities: None,
            // The grab is only ever held in first-person.
            release_cursor: true,
            request_cursor_grab: false,
            morph_to_3d: false,
        },
    }
}

// ============================================================================
// Cursor grab scheduling
// ============================================================================

/// A pending delayed cursor-grab request.
#[derive(Resource, Default)]
pub struct CursorGrabRequest {
    timer: Option<Timer>,
}

impl CursorGrabRequest {
    /// Schedule a grab after the fixed delay, replacing any pending request.
    pub fn schedule(&mut self) {
        self.timer = Some(Timer::from_seconds(CURSOR_GRAB_DELAY_SECS, TimerMode::Once));
    }

    /// Drop any pending request.
    pub fn cancel(&mut self) {
        self.timer = None;
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_some()
    }
}

// ============================================================================
// Scene projection
// ============================================================================

/// The scene's projection mode: the 3D globe or the 2D overhead map.
#[derive(Default, PartialEq, Eq, Clone, Copy, Debug)]
pub enum SceneProjectionMode {
    /// Full 3D perspective globe (default).
    #[default]
    Globe3D,
    /// Overhead orthographic map.
    Map2D,
}

/// Current scene projection, mirrored onto the camera's `Projection`
/// component whenever it changes.
#[derive(Resource, Default)]
pub struct SceneProjection {
    pub mode: SceneProjectionMode,
}

impl SceneProjection {
    /// Ensure the scene is in full 3D perspective.
    pub fn morph_to_3d(&mut self) {
        self.mode = SceneProjectionMode::Globe3D;
    }
}

/// Build the perspective projection used by the 3D globe.
pub fn globe_projection() -> Projection {
    Projection::Perspective(PerspectiveProjection {
        fov: std::f32::consts::FRAC_PI_4,
        near: 1.0,
        // Far enough to see the whole Earth.
        far: 100_000_000.0,
        ..Default::default()
    })
}

// ============================================================================
// Plugin
// ============================================================================

/// Plugin for the view-mode state machine.
pub struct ViewModePlugin;

impl Plugin for ViewModePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ViewModeState>()
            .init_resource::<ViewModeTransitions>()
            .init_resource::<CursorGrabRequest>()
            .init_resource::<SceneProjection>()
            .add_plugins(ScreenSpaceControllerPlugin)
            .add_systems(PostStartup, apply_initial_view_mode)
            .add_systems(
                Update,
                (
                    escape_exits_first_person,
                    click_regrabs_cursor,
                    process_transitions,
                    process_cursor_grab_request,
                    apply_scene_projection,
                )
                    .chain(),
            );
    }
}

// ============================================================================
// Systems
// ============================================================================

/// Request the launch-parameter mode once the scene exists.
fn apply_initial_view_mode(
    params: Res<LaunchParams>,
    mut transitions: ResMut<ViewModeTransitions>,
) {
    if params.mode != ViewMode::Orbit {
        transitions.request(params.mode);
    }
}

/// Escape leaves first-person mode for orbit.
///
/// `just_pressed` fires once per keypress, so a held Escape cannot queue a
/// second transition.
#[allow(clippy::needless_pass_by_value)]
fn escape_exits_first_person(
    action_query: Query<&ActionState<NavAction>>,
    state: Res<ViewModeState>,
    mut transitions: ResMut<ViewModeTransitions>,
) {
    let Ok(action_state) = action_query.single() else {
        return;
    };
    if action_state.just_pressed(&NavAction::ExitFirstPerson) && state.is_first_person() {
        transitions.request(ViewMode::Orbit);
    }
}

/// Left click reacquires the cursor grab in first-person mode.
///
/// The windowing system can drop the grab on its own (its own Escape
/// handling, focus loss); the mode stays active and a click restores mouse
/// look. `manage_input_focus` disables this action while the grab is held.
#[allow(clippy::needless_pass_by_value)]
fn click_regrabs_cursor(
    action_query: Query<&ActionState<NavAction>>,
    state: Res<ViewModeState>,
    mut contexts: bevy_egui::EguiContexts,
    mut cursor: Single<&mut CursorOptions>,
    mut window: Single<&mut Window, With<PrimaryWindow>>,
) {
    let Ok(action_state) = action_query.single() else {
        return;
    };
    if !action_state.just_pressed(&NavAction::GrabCursor) || !state.is_first_person() {
        return;
    }

    let egui_wants_pointer = contexts
        .ctx_mut()
        .ok()
        .is_some_and(|ctx| ctx.is_pointer_over_area());
    if !egui_wants_pointer {
        set_cursor_grab(&mut cursor, &mut window, true);
    }
}

/// Drain the transition queue and reconcile driver, capabilities, cursor,
/// and scene for each requested mode.
#[allow(clippy::too_many_arguments, clippy::needless_pass_by_value)]
fn process_transitions(
    mut transitions: ResMut<ViewModeTransitions>,
    mut state: ResMut<ViewModeState>,
    mut driver: ResMut<SimulationDriver>,
    mut controller: ResMut<ScreenSpaceController>,
    mut scene: ResMut<SceneProjection>,
    mut grab_request: ResMut<CursorGrabRequest>,
    camera_query: Query<(), With<FloatingOriginCamera>>,
    mut cursor: Single<&mut CursorOptions>,
    mut window: Single<&mut Window, With<PrimaryWindow>>,
) {
    for target in transitions.take() {
        // No camera to control: skip the transition entirely.
        if camera_query.is_empty() {
            tracing::debug!("Ignoring transition to {target:?}: no camera available");
            continue;
        }

        let plan = plan_transition(target);

        driver.stop();
        grab_request.cancel();
        if plan.release_cursor {
            set_cursor_grab(&mut cursor, &mut window, false);
        }
        if let Some(enabled) = plan.capabilities {
            controller.set_all(enabled);
        }
        if plan.morph_to_3d {
            scene.morph_to_3d();
        }
        if let Some(mode) = plan.drive {
            driver.set_mode(mode);
            driver.start();
        }
        if plan.request_cursor_grab {
            grab_request.schedule();
        }

        state.current = target;
        tracing::info!("Switched to {target:?} view mode");
    }
}

/// Fire a scheduled cursor grab once its delay elapses.
///
/// Dropped silently if the mode changed while the request was pending.
#[allow(clippy::needless_pass_by_value)]
fn process_cursor_grab_request(
    time: Res<Time>,
    state: Res<ViewModeState>,
    mut grab_request: ResMut<CursorGrabRequest>,
    mut cursor: Single<&mut CursorOptions>,
    mut window: Single<&mut Window, With<PrimaryWindow>>,
) {
    let Some(timer) = grab_request.timer.as_mut() else {
        return;
    };
    if !timer.tick(time.delta()).just_finished() {
        return;
    }
    grab_request.cancel();

    if state.is_first_person() {
        set_cursor_grab(&mut cursor, &mut window, true);
    } else {
        tracing::debug!("Dropping stale cursor grab request: mode changed during the delay");
    }
}

/// Mirror the scene projection onto the camera when it changes.
#[allow(clippy::needless_pass_by_value)]
fn apply_scene_projection(
    scene: Res<SceneProjection>,
    mut query: Query<(&mut Projection, &FloatingOriginCamera)>,
) {
    if !scene.is_changed() {
        return;
    }
    let Ok((mut projection, camera)) = query.single_mut() else {
        return;
    };

    *projection = match scene.mode {
        SceneProjectionMode::Globe3D => globe_projection(),
        SceneProjectionMode::Map2D => {
            // Overhead map: orthographic footprint sized by current altitude.
            let altitude = (camera.position.length() - crate::coords::EARTH_RADIUS).max(100.0);
            let mut ortho = OrthographicProjection::default_3d();
            ortho.scaling_mode = bevy::camera::ScalingMode::FixedVertical {
                viewport_height: (altitude * 2.0) as f32,
            };
            Projection::Orthographic(ortho)
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orbit_restores_native_control() {
        let plan = plan_transition(ViewMode::Orbit);
        assert_eq!(plan.drive, None);
        assert_eq!(plan.capabilities, Some(true));
        assert!(plan.release_cursor);
        assert!(!plan.request_cursor_grab);
        assert!(!plan.morph_to_3d);
    }

    #[test]
    fn explore_additionally_morphs_to_3d() {
        let plan = plan_transition(ViewMode::Explore);
        assert_eq!(plan.capabilities, Some(true));
        assert!(plan.morph_to_3d);
        assert_eq!(plan.drive, None);
    }

    #[test]
    fn first_person_disables_native_control_and_requests_grab() {
        let plan = plan_transition(ViewMode::FirstPerson);
        assert_eq!(plan.drive, Some(DriveMode::Walk));
        assert_eq!(plan.capabilities, Some(false));
        assert!(plan.request_cursor_grab);
        assert!(!plan.release_cursor);
    }

    #[test]
    fn car_and_flight_run_without_the_grab() {
        for (mode, drive) in [
            (ViewMode::Car, DriveMode::Car),
            (ViewMode::Flight, DriveMode::Flight),
        ] {
            let plan = plan_transition(mode);
            assert_eq!(plan.drive, Some(drive));
            assert_eq!(plan.capabilities, Some(false));
            assert!(plan.release_cursor);
            assert!(!plan.request_cursor_grab);
            assert!(!plan.morph_to_3d);
        }
    }

    #[test]
    fn settings_touches_nothing_but_the_driver() {
        let plan = plan_transition(ViewMode::Settings);
        assert_eq!(plan.drive, None);
        assert_eq!(plan.capabilities, None);
        assert!(!plan.request_cursor_grab);
        assert!(!plan.morph_to_3d);
    }

    #[test]
    fn transition_queue_drains_in_order() {
        let mut transitions = ViewModeTransitions::default();
        transitions.request(ViewMode::Car);
        transitions.request(ViewMode::Orbit);
        assert_eq!(transitions.take(), vec![ViewMode::Car, ViewMode::Orbit]);
        assert!(transitions.take().is_empty());
    }

    #[test]
    fn grab_request_schedule_and_cancel() {
        let mut request = CursorGrabRequest::default();
        assert!(!request.is_pending());
        request.schedule();
        assert!(request.is_pending());
        request.cancel();
        assert!(!request.is_pending());
    }
}
