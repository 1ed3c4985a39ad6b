//! Built-in screen-space camera controller.
//!
//! The globe's native mouse navigation: left-drag spins the globe (rotate),
//! middle-drag pans along the surface (translate), scroll changes altitude
//! (zoom), right-drag pitches the view (tilt). Each gesture is gated by its
//! own capability flag; the view-mode controller disables all four while a
//! simulated navigation mode owns the camera.

use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use bevy_egui::EguiContexts;
use glam::{DQuat, DVec3};

use crate::coords::EARTH_RADIUS;
use crate::floating_origin::FloatingOriginCamera;
use crate::geo::fly_to_not_active;
use crate::sim::movement::apply_look;
use crate::sim::{NavCamera, load_rig, store_rig};

/// Radians of globe rotation per pixel of drag, before altitude scaling.
const ROTATE_RATE: f32 = 0.002;

/// Fraction of altitude panned per pixel of drag.
const PAN_RATE: f64 = 0.002;

/// Radians of tilt per pixel of drag.
const TILT_RATE: f32 = 0.003;

/// Zoom factor per scroll line.
const ZOOM_STEP: f64 = 1.1;

/// Closest permitted zoom altitude in meters.
const MIN_ZOOM_ALTITUDE: f64 = 2.0;

/// Capability flags of the built-in screen-space controller.
///
/// All four default to enabled; the view-mode controller toggles them as a
/// group on mode transitions, but each gesture honors only its own flag.
#[derive(Resource, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenSpaceController {
    pub rotate_enabled: bool,
    pub translate_enabled: bool,
    pub zoom_enabled: bool,
    pub tilt_enabled: bool,
}

impl Default for ScreenSpaceController {
    fn default() -> Self {
        Self {
            rotate_enabled: true,
            translate_enabled: true,
            zoom_enabled: true,
            tilt_enabled: true,
        }
    }
}

impl ScreenSpaceController {
    /// Enable or disable all four capabilities at once.
    pub fn set_all(&mut self, enabled: bool) {
        self.rotate_enabled = enabled;
        self.translate_enabled = enabled;
        self.zoom_enabled = enabled;
        self.tilt_enabled = enabled;
    }

    pub fn all_enabled(&self) -> bool {
        self.rotate_enabled && self.translate_enabled && self.zoom_enabled && self.tilt_enabled
    }
}

/// Plugin for the built-in screen-space camera controller.
pub struct ScreenSpaceControllerPlugin;

impl Plugin for ScreenSpaceControllerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ScreenSpaceController>().add_systems(
            Update,
            (drag_gestures, scroll_zoom).run_if(fly_to_not_active),
        );
    }
}

/// Altitude-proportional gesture scale, so dragging feels the same at street
/// level and from orbit.
fn altitude_scale(altitude: f64) -> f64 {
    (altitude / EARTH_RADIUS).clamp(1e-5, 1.5)
}

/// Handle rotate, translate, and tilt drags.
#[allow(clippy::needless_pass_by_value)]
fn drag_gestures(
    controller: Res<ScreenSpaceController>,
    buttons: Res<ButtonInput<MouseButton>>,
    mut mouse_motion: MessageReader<MouseMotion>,
    mut contexts: EguiContexts,
    mut query: Query<(&mut FloatingOriginCamera, &mut Transform, &mut NavCamera)>,
) {
    let mut delta = Vec2::ZERO;
    for event in mouse_motion.read() {
        delta += event.delta;
    }
    if delta == Vec2::ZERO {
        return;
    }

    // Don't fight the UI for drags.
    let egui_wants_pointer = contexts
        .ctx_mut()
        .ok()
        .is_some_and(|ctx| ctx.is_pointer_over_area());
    if egui_wants_pointer {
        return;
    }

    let Ok((mut camera, mut transform, mut nav)) = query.single_mut() else {
        return;
    };
    let mut rig = load_rig(&camera, &nav);
    let altitude = rig.altitude().max(0.0);

    if buttons.pressed(MouseButton::Left) && controller.rotate_enabled {
        let scale = altitude_scale(altitude) as f32;
        // Horizontal drag spins the globe around its axis; vertical drag
        // rolls it around the camera's right vector.
        let spin = DQuat::from_axis_angle(DVec3::Z, f64::from(delta.x * ROTATE_RATE * scale));
        let up = rig.local_up();
        let right = rig.direction.cross(up).normalize_or_zero();
        let roll = if right == Vec3::ZERO {
            DQuat::IDENTITY
        } else {
            DQuat::from_axis_angle(
                right.as_dvec3().normalize(),
                f64::from(-delta.y * ROTATE_RATE * scale),
            )
        };
        let rotation = spin * roll;
        rig.position = rotation * rig.position;
        rig.direction = (rotation.as_quat() * rig.direction).normalize();
    } else if buttons.pressed(MouseButton::Middle) && controller.translate_enabled {
        let up = rig.local_up();
        let forward = (rig.direction - up * rig.direction.dot(up)).normalize_or_zero();
        let right = forward.cross(up).normalize_or_zero();
        let step = altitude.max(MIN_ZOOM_ALTITUDE) * PAN_RATE;
        let pan = right.as_dvec3() * f64::from(-delta.x) + forward.as_dvec3() * f64::from(delta.y);
        rig.position += pan * step;
        // Keep the altitude unchanged while panning.
        let radius = EARTH_RADIUS + altitude;
        rig.position = rig.position.normalize() * radius;
    } else if buttons.pressed(MouseButton::Right) && controller.tilt_enabled {
        apply_look(&mut rig, 0.0, -delta.y * TILT_RATE);
    } else {
        return;
    }

    store_rig(&rig, &mut camera, &mut nav, &mut transform);
}

/// Handle scroll-wheel zoom.
#[allow(clippy::needless_pass_by_value)]
fn scroll_zoom(
    controller: Res<ScreenSpaceController>,
    mut scroll_events: MessageReader<MouseWheel>,
    mut contexts: EguiContexts,
    mut query: Query<(&mut FloatingOriginCamera, &mut Transform, &mut NavCamera)>,
) {
    let mut scroll = 0.0_f32;
    for event in scroll_events.read() {
        // Normalize scroll value: web reports pixels, native reports lines.
        scroll += match event.unit {
            MouseScrollUnit::Line => event.y,
            MouseScrollUnit::Pixel => event.y / 120.0,
        };
    }
    if scroll == 0.0 || !controller.zoom_enabled {
        return;
    }

    let egui_wants_pointer = contexts
        .ctx_mut()
        .ok()
        .is_some_and(|ctx| ctx.is_pointer_over_area());
    if egui_wants_pointer {
        return;
    }

    let Ok((mut camera, mut transform, mut nav)) = query.single_mut() else {
        return;
    };
    let mut rig = load_rig(&camera, &nav);

    // Logarithmic zoom for smooth scaling across altitudes.
    let factor = ZOOM_STEP.powf(f64::from(-scroll));
    let altitude = (rig.altitude() * factor).max(MIN_ZOOM_ALTITUDE);
    rig.position = rig.position.normalize() * (EARTH_RADIUS + altitude);

    store_rig(&rig, &mut camera, &mut nav, &mut transform);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_toggle_as_a_group() {
        let mut controller = ScreenSpaceController::default();
        assert!(controller.all_enabled());
        controller.set_all(false);
        assert!(!controller.rotate_enabled);
        assert!(!controller.translate_enabled);
        assert!(!controller.zoom_enabled);
        assert!(!controller.tilt_enabled);
        controller.set_all(true);
        assert!(controller.all_enabled());
    }
}
