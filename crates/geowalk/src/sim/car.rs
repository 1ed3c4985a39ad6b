//! Car navigation step.
//!
//! Drives the camera along the ground like a vehicle: W/S throttle forward
//! and backward, A/D steer the heading. Steering is coupled to motion (a
//! stationary car cannot turn), the one deliberate axis coupling in the
//! navigation modes.

use super::movement::{CameraRig, apply_look, apply_surface_movement};
use crate::terrain::GroundSampler;
use glam::Vec3;

/// Advance the car by one frame.
///
/// `throttle` and `steer` are intent values in {-1, 0, 1}: positive throttle
/// drives forward, positive steer turns right. Heading only changes while the
/// throttle is engaged. Height is clamped to the sampled ground plus
/// `eye_height`, with slope rejection handled by the sampler.
pub fn car_step(
    rig: &mut CameraRig,
    throttle: f32,
    steer: f32,
    speed: f32,
    turn_speed: f32,
    eye_height: f32,
    dt: f32,
    sampler: &GroundSampler<'_>,
) {
    if throttle == 0.0 {
        return;
    }

    if steer != 0.0 {
        apply_look(rig, steer * turn_speed * dt, 0.0);
    }

    apply_surface_movement(
        rig,
        Vec3::new(0.0, 0.0, throttle),
        speed,
        eye_height,
        dt,
        sampler,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::geodetic_to_ecef;
    use crate::terrain::TerrainMap;

    fn flat_terrain() -> TerrainMap {
        TerrainMap::from_grid(-1.0, -1.0, 0.5, 5, 5, vec![0.0; 25]).unwrap()
    }

    fn car_rig() -> CameraRig {
        CameraRig::new(geodetic_to_ecef(0.0, 0.0, 2.5), Vec3::Z)
    }

    #[test]
    fn stationary_car_cannot_steer() {
        let map = flat_terrain();
        let sampler = GroundSampler::new(&map);
        let mut rig = car_rig();
        let before = rig.clone();
        car_step(&mut rig, 0.0, 1.0, 20.0, 1.5, 2.5, 0.1, &sampler);
        assert_eq!(rig.direction, before.direction);
        assert_eq!(rig.position, before.position);
    }

    #[test]
    fn steering_while_driving_changes_heading() {
        let map = flat_terrain();
        let sampler = GroundSampler::new(&map);
        let mut rig = car_rig();
        let before_direction = rig.direction;
        car_step(&mut rig, 1.0, 1.0, 20.0, 1.5, 2.5, 0.1, &sampler);
        assert!(rig.direction.dot(before_direction) < 0.999);
        // Turned right: east is +Y at this location.
        assert!(rig.direction.y > 0.0);
    }

    #[test]
    fn throttle_moves_along_the_ground() {
        let map = flat_terrain();
        let sampler = GroundSampler::new(&map);
        let mut rig = car_rig();
        let before = rig.position;
        car_step(&mut rig, 1.0, 0.0, 20.0, 1.5, 2.5, 0.1, &sampler);
        let displacement = (rig.position - before).length();
        assert!(displacement > 1.0);
        // Still at car eye height over the flat ground.
        assert!((rig.altitude() - 2.5).abs() < 1e-3);
    }

    #[test]
    fn reverse_throttle_moves_backward() {
        let map = flat_terrain();
        let sampler = GroundSampler::new(&map);
        let mut rig = car_rig();
        let before = rig.position;
        car_step(&mut rig, -1.0, 0.0, 20.0, 1.5, 2.5, 0.1, &sampler);
        let moved = (rig.position - before).as_vec3();
        assert!(moved.dot(Vec3::Z) < 0.0);
    }
}
