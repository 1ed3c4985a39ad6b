//! Movement intent and camera integration.
//!
//! Pure functions over [`CameraRig`] that can be tested in isolation without
//! Bevy dependencies. The simulation tick composes these: intent vectors are
//! derived from the pressed-key set each frame, then applied through the
//! mode-appropriate integrator.

use glam::{DVec3, Quat, Vec2, Vec3};

use crate::coords::EARTH_RADIUS;
use crate::input::{KeyBindings, PressedKeys};
use crate::terrain::GroundSampler;

/// Lowest permitted height relative to the ellipsoid surface, in meters.
const MIN_SURFACE_OFFSET: f64 = -100.0;

/// Highest permitted altitude above the ellipsoid surface, in meters.
const MAX_ALTITUDE: f64 = 10_000_000.0;

/// Zenith-alignment cutoff beyond which pitching further is suppressed.
const PITCH_LIMIT: f32 = 0.99;

/// The navigable camera state: high-precision position plus facing.
///
/// Navigation modes read and write this; the Bevy camera transform is derived
/// from it after the fact.
#[derive(Clone, Debug)]
pub struct CameraRig {
    /// Position in ECEF coordinates (meters).
    pub position: DVec3,
    /// Facing direction (normalized).
    pub direction: Vec3,
}

impl CameraRig {
    pub fn new(position: DVec3, direction: Vec3) -> Self {
        Self {
            position,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Local up vector (from Earth center through the camera).
    pub fn local_up(&self) -> Vec3 {
        self.position.normalize_or_zero().as_vec3()
    }

    /// Height above the ellipsoid surface in meters.
    pub fn altitude(&self) -> f64 {
        self.position.length() - EARTH_RADIUS
    }
}

/// Translation intent per axis, each in {-1, 0, 1}.
///
/// `x` strafes right, `y` ascends, `z` moves forward. Opposite keys held
/// together cancel to zero.
pub fn movement_intent(keys: &PressedKeys, bindings: &KeyBindings) -> Vec3 {
    Vec3::new(
        keys.axis(bindings.right, bindings.left),
        keys.axis(bindings.ascend, bindings.descend),
        keys.axis(bindings.forward, bindings.back),
    )
}

/// Rotation intent from the arrow keys: `x` yaws right, `y` pitches up.
pub fn turn_intent(keys: &PressedKeys, bindings: &KeyBindings) -> Vec2 {
    Vec2::new(
        keys.axis(bindings.yaw_right, bindings.yaw_left),
        keys.axis(bindings.pitch_up, bindings.pitch_down),
    )
}

/// Convenience: is any movement key currently held for this intent?
pub fn is_zero_intent(intent: Vec3) -> bool {
    intent == Vec3::ZERO
}

/// Apply incremental yaw/pitch to the rig's facing direction.
///
/// Positive `yaw_right` turns clockwise viewed from above; positive
/// `pitch_up` raises the view. Pitch is suppressed once the direction nearly
/// aligns with the local zenith or nadir, so the view cannot flip over.
pub fn apply_look(rig: &mut CameraRig, yaw_right: f32, pitch_up: f32) {
    let up = rig.local_up();
    let right = rig.direction.cross(up);

    // Degenerate when looking straight up or down; skip the step.
    if right.length_squared() < 1e-6 {
        return;
    }
    let right = right.normalize();

    let zenith_alignment = rig.direction.dot(up);
    let pitch_up = if (zenith_alignment > PITCH_LIMIT && pitch_up > 0.0)
        || (zenith_alignment < -PITCH_LIMIT && pitch_up < 0.0)
    {
        0.0
    } else {
        pitch_up
    };

    let yaw_rotation = Quat::from_axis_angle(up, -yaw_right);
    let pitch_rotation = Quat::from_axis_angle(right, pitch_up);

    rig.direction = (yaw_rotation * pitch_rotation * rig.direction).normalize();
}

/// Apply free (unclamped) movement along the camera's own basis.
///
/// The displacement is the intent-weighted sum of the forward/right/up basis
/// vectors, normalized and scaled by `speed * dt`. A zero intent never
/// mutates the rig. Altitude is kept within the navigable band around the
/// ellipsoid, and the facing direction is parallel-transported so the view
/// does not drift as the camera moves around the sphere.
pub fn apply_free_movement(rig: &mut CameraRig, intent: Vec3, speed: f32, dt: f32) {
    if is_zero_intent(intent) {
        return;
    }

    let old_up = rig.local_up();
    let forward = rig.direction;
    let right = forward.cross(old_up).normalize_or_zero();
    let camera_up = right.cross(forward).normalize_or_zero();

    let movement = right * intent.x + camera_up * intent.y + forward * intent.z;
    if movement == Vec3::ZERO {
        return;
    }
    let movement = movement.normalize() * speed * dt;

    let mut new_position = rig.position + movement.as_dvec3();

    // Clamp altitude while preserving lateral movement.
    let new_radius = new_position.length().clamp(
        EARTH_RADIUS + MIN_SURFACE_OFFSET,
        EARTH_RADIUS + MAX_ALTITUDE,
    );
    new_position = new_position.normalize() * new_radius;

    parallel_transport(rig, new_position, old_up);
}

/// Apply surface-clamped movement in the local tangent plane.
///
/// Only the strafe and forward axes of the intent are used; height comes from
/// the ground sampler (with slope rejection against the current position)
/// plus `eye_height`. When the sampler soft-fails, the candidate position is
/// applied without clamping so motion never freezes on missing terrain data.
pub fn apply_surface_movement(
    rig: &mut CameraRig,
    intent: Vec3,
    speed: f32,
    eye_height: f32,
    dt: f32,
    sampler: &GroundSampler<'_>,
) {
    if intent.x == 0.0 && intent.z == 0.0 {
        return;
    }

    let old_up = rig.local_up();
    // Project the facing direction onto the tangent plane for ground travel.
    let forward = (rig.direction - old_up * rig.direction.dot(old_up)).normalize_or_zero();
    if forward == Vec3::ZERO {
        return;
    }
    let right = forward.cross(old_up).normalize_or_zero();

    let movement = right * intent.x + forward * intent.z;
    if movement == Vec3::ZERO {
        return;
    }
    let movement = movement.normalize() * speed * dt;

    let candidate = rig.position + movement.as_dvec3();
    let new_position = match sampler.clamped_ground_height(candidate, rig.position) {
        Some(ground) => {
            candidate.normalize() * (EARTH_RADIUS + ground + f64::from(eye_height))
        }
        None => candidate,
    };

    parallel_transport(rig, new_position, old_up);
}

/// Move the rig and rotate its facing by the change in local up.
///
/// Prevents the view from "straightening out" as the camera travels around
/// the sphere.
fn parallel_transport(rig: &mut CameraRig, new_position: DVec3, old_up: Vec3) {
    rig.position = new_position;
    let new_up = rig.local_up();
    let rotation = Quat::from_rotation_arc(old_up, new_up);
    rig.direction = (rotation * rig.direction).normalize();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::geodetic_to_ecef;
    use crate::terrain::TerrainMap;

    /// A rig on the equator at altitude, facing north along the surface.
    fn equator_rig(altitude: f64) -> CameraRig {
        CameraRig::new(geodetic_to_ecef(0.0, 0.0, altitude), Vec3::Z)
    }

    fn bindings() -> KeyBindings {
        KeyBindings::default()
    }

    #[test]
    fn opposite_movement_keys_cancel() {
        let mut keys = PressedKeys::default();
        let b = bindings();
        keys.on_key_down(b.forward);
        keys.on_key_down(b.back);
        keys.on_key_down(b.right);
        let intent = movement_intent(&keys, &b);
        assert_eq!(intent, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn turn_intent_from_arrow_keys() {
        let mut keys = PressedKeys::default();
        let b = bindings();
        keys.on_key_down(b.yaw_right);
        keys.on_key_down(b.pitch_up);
        assert_eq!(turn_intent(&keys, &b), Vec2::new(1.0, 1.0));
        keys.on_key_down(b.yaw_left);
        assert_eq!(turn_intent(&keys, &b), Vec2::new(0.0, 1.0));
    }

    #[test]
    fn zero_intent_never_moves_the_rig() {
        let mut rig = equator_rig(100.0);
        let before = rig.clone();
        apply_free_movement(&mut rig, Vec3::ZERO, 5.0, 1.0 / 60.0);
        assert_eq!(rig.position, before.position);
        assert_eq!(rig.direction, before.direction);
    }

    #[test]
    fn single_axis_displacement_matches_speed_times_dt() {
        let mut rig = equator_rig(100.0);
        let before = rig.position;
        apply_free_movement(&mut rig, Vec3::new(0.0, 0.0, 1.0), 5.0, 1.0 / 60.0);
        let displacement = (rig.position - before).length();
        let expected = 5.0 * (1.0 / 60.0);
        assert!((displacement - f64::from(expected)).abs() < 1e-4);
    }

    #[test]
    fn diagonal_intent_is_normalized() {
        let mut rig = equator_rig(100.0);
        let before = rig.position;
        apply_free_movement(&mut rig, Vec3::new(1.0, 0.0, 1.0), 10.0, 0.1);
        let displacement = (rig.position - before).length();
        assert!((displacement - 1.0).abs() < 1e-3);
    }

    #[test]
    fn forward_intent_moves_along_facing() {
        let mut rig = equator_rig(1000.0);
        let before = rig.position;
        apply_free_movement(&mut rig, Vec3::new(0.0, 0.0, 1.0), 100.0, 1.0);
        let moved = (rig.position - before).as_vec3().normalize();
        assert!(moved.dot(Vec3::Z) > 0.999);
    }

    #[test]
    fn yaw_keeps_direction_in_tangent_plane() {
        let mut rig = equator_rig(10.0);
        apply_look(&mut rig, 0.3, 0.0);
        assert!((rig.direction.length() - 1.0).abs() < 1e-6);
        // Still perpendicular to local up after a pure yaw.
        assert!(rig.direction.dot(rig.local_up()).abs() < 1e-5);
        // Turned right: at (0°, 0°) facing north, right is east (+Y).
        assert!(rig.direction.y > 0.0);
    }

    #[test]
    fn pitch_is_limited_near_the_zenith() {
        let mut rig = equator_rig(10.0);
        for _ in 0..10_000 {
            apply_look(&mut rig, 0.0, 0.05);
        }
        let alignment = rig.direction.dot(rig.local_up());
        assert!(alignment < 0.9999, "view flipped over the zenith");
        // And back down past the nadir.
        for _ in 0..20_000 {
            apply_look(&mut rig, 0.0, -0.05);
        }
        let alignment = rig.direction.dot(rig.local_up());
        assert!(alignment > -0.9999, "view flipped under the nadir");
    }

    #[test]
    fn surface_movement_clamps_to_ground_plus_eye_height() {
        let map = TerrainMap::from_grid(-1.0, -1.0, 0.5, 5, 5, vec![50.0; 25]).unwrap();
        let sampler = GroundSampler::new(&map);
        let mut rig = equator_rig(500.0);
        apply_surface_movement(&mut rig, Vec3::new(0.0, 0.0, 1.0), 5.0, 1.8, 1.0, &sampler);
        let altitude = rig.altitude();
        assert!((altitude - 51.8).abs() < 1e-3);
    }

    #[test]
    fn surface_movement_ignores_vertical_intent() {
        let map = TerrainMap::from_grid(-1.0, -1.0, 0.5, 5, 5, vec![0.0; 25]).unwrap();
        let sampler = GroundSampler::new(&map);
        let mut rig = equator_rig(1.8);
        let before = rig.clone();
        apply_surface_movement(&mut rig, Vec3::new(0.0, 1.0, 0.0), 5.0, 1.8, 1.0, &sampler);
        assert_eq!(rig.position, before.position);
    }

    #[test]
    fn free_movement_clamps_altitude_band() {
        let mut rig = equator_rig(50.0);
        // Dive straight down far past the surface.
        rig.direction = -rig.local_up();
        // A tiny nudge sideways keeps the basis non-degenerate.
        rig.direction = (rig.direction + Vec3::Z * 0.01).normalize();
        for _ in 0..100 {
            apply_free_movement(&mut rig, Vec3::new(0.0, 0.0, 1.0), 10_000.0, 1.0);
        }
        assert!(rig.altitude() >= MIN_SURFACE_OFFSET - 1e-3);
    }
}
