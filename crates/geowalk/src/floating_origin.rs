//! Floating origin system for rendering globe-scale scenes with f32 precision.
//!
//! ECEF coordinates are millions of meters from the origin, far outside the
//! range where `f32` transforms are usable. Positions are therefore stored in
//! `f64` and every entity is rendered relative to the camera, which stays at
//! the render origin.

use bevy::prelude::*;
use glam::DVec3;

/// Plugin for the floating origin coordinate system.
pub struct FloatingOriginPlugin;

impl Plugin for FloatingOriginPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<FloatingOrigin>().add_systems(
            PostUpdate,
            (sync_origin_to_camera, update_relative_transforms).chain(),
        );
    }
}

/// The floating origin position in ECEF coordinates.
///
/// Entity transforms are computed relative to this position each frame.
#[derive(Resource, Default)]
pub struct FloatingOrigin {
    /// Current origin position in ECEF coordinates (meters).
    pub position: DVec3,
}

/// High-precision ECEF position for a scene entity.
///
/// The entity's `Transform` translation is derived from this each frame and
/// should not be written directly.
#[derive(Component, Clone, Debug)]
pub struct WorldPosition {
    /// Position in ECEF coordinates (meters).
    pub position: DVec3,
}

impl WorldPosition {
    pub fn new(position: DVec3) -> Self {
        Self { position }
    }
}

/// Marker for the camera whose position defines the floating origin.
///
/// The camera's `Transform` translation stays at zero; this component holds
/// its true ECEF position, which all navigation modes read and write.
#[derive(Component)]
pub struct FloatingOriginCamera {
    /// Camera position in ECEF coordinates (meters).
    pub position: DVec3,
}

impl FloatingOriginCamera {
    pub fn new(position: DVec3) -> Self {
        Self { position }
    }
}

/// Track the camera with the origin.
///
/// Runs after `Update` so every navigation system has written its camera
/// position for the frame.
fn sync_origin_to_camera(
    mut origin: ResMut<FloatingOrigin>,
    query: Query<&FloatingOriginCamera>,
) {
    if let Ok(camera) = query.single() {
        origin.position = camera.position;
    }
}

/// Re-derive entity transforms relative to the origin.
#[allow(clippy::type_complexity)]
fn update_relative_transforms(
    origin: Res<FloatingOrigin>,
    mut query: Query<(&WorldPosition, &mut Transform), Without<FloatingOriginCamera>>,
) {
    for (world_pos, mut transform) in &mut query {
        let relative = world_pos.position - origin.position;
        // Safe to narrow: relative coordinates are within render range.
        transform.translation = Vec3::new(relative.x as f32, relative.y as f32, relative.z as f32);
    }
}
