//! Terrain height sampling and ground detection.
//!
//! The globe carries a regular latitude/longitude height grid with bilinear
//! interpolation; outside its coverage the ellipsoid surface is the terrain.
//! [`GroundSampler`] layers the slope-rejection policy on top: walking and
//! driving cannot climb terrain steeper than a fixed threshold.

use bevy::asset::RenderAssetUsages;
use bevy::mesh::{Indices, PrimitiveTopology};
use bevy::prelude::*;
use glam::DVec3;

use crate::coords::{ecef_to_geodetic, geodetic_to_ecef, surface_distance};

/// Maximum ground slope a surface-clamped mode will climb, in radians.
pub const SLOPE_THRESHOLD: f64 = 0.5;

/// A regular latitude/longitude grid of terrain heights in meters.
///
/// Rows run south to north, columns west to east. Heights are above the
/// ellipsoid surface.
#[derive(Resource, Clone, Debug)]
pub struct TerrainMap {
    /// Latitude of the southern edge in degrees.
    origin_lat: f64,
    /// Longitude of the western edge in degrees.
    origin_lon: f64,
    /// Grid spacing in degrees.
    spacing: f64,
    /// Number of columns (longitude samples).
    columns: usize,
    /// Number of rows (latitude samples).
    rows: usize,
    /// Row-major heights, `rows * columns` entries.
    heights: Vec<f32>,
}

impl TerrainMap {
    /// Create a terrain map from raw grid data.
    ///
    /// Returns `None` if the dimensions do not match the data length or the
    /// spacing is non-positive.
    pub fn from_grid(
        origin_lat: f64,
        origin_lon: f64,
        spacing: f64,
        columns: usize,
        rows: usize,
        heights: Vec<f32>,
    ) -> Option<Self> {
        if spacing <= 0.0 || columns < 2 || rows < 2 || heights.len() != columns * rows {
            return None;
        }
        Some(Self {
            origin_lat,
            origin_lon,
            spacing,
            columns,
            rows,
            heights,
        })
    }

    /// Generate rolling synthetic terrain centered on a location.
    ///
    /// Deterministic sum-of-sines hills, used until a real elevation tileset
    /// is attached. `extent_deg` is the half-width of coverage in degrees.
    pub fn synthetic(center_lat: f64, center_lon: f64, extent_deg: f64) -> Self {
        let spacing = extent_deg / 64.0;
        let columns = 129;
        let rows = 129;
        let origin_lat = center_lat - extent_deg;
        let origin_lon = center_lon - extent_deg;
        let mut heights = Vec::with_capacity(columns * rows);
        for row in 0..rows {
            for col in 0..columns {
                let lat = origin_lat + row as f64 * spacing;
                let lon = origin_lon + col as f64 * spacing;
                // Two octaves of hills plus a gentle regional tilt.
                let h = 40.0 * (lat * 180.0).sin() * (lon * 140.0).cos()
                    + 12.0 * (lat * 650.0).cos() * (lon * 610.0).sin()
                    + 6.0 * (lat - center_lat) / extent_deg.max(1e-9);
                heights.push(h as f32);
            }
        }
        Self {
            origin_lat,
            origin_lon,
            spacing,
            columns,
            rows,
            heights,
        }
    }

    /// Bilinearly sampled terrain height at a geodetic location.
    ///
    /// Returns `None` outside the grid's coverage.
    pub fn height_at(&self, lat_deg: f64, lon_deg: f64) -> Option<f64> {
        let x = (lon_deg - self.origin_lon) / self.spacing;
        let y = (lat_deg - self.origin_lat) / self.spacing;
        if x < 0.0 || y < 0.0 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (col, row) = (x.floor() as usize, y.floor() as usize);
        if col + 1 >= self.columns || row + 1 >= self.rows {
            return None;
        }
        let fx = x - x.floor();
        let fy = y - y.floor();

        let h = |r: usize, c: usize| f64::from(self.heights[r * self.columns + c]);
        let south = h(row, col) * (1.0 - fx) + h(row, col + 1) * fx;
        let north = h(row + 1, col) * (1.0 - fx) + h(row + 1, col + 1) * fx;
        Some(south * (1.0 - fy) + north * fy)
    }
}

impl TerrainMap {
    /// Build a render mesh for the terrain grid.
    ///
    /// Vertices are relative to the returned ECEF anchor (the grid center on
    /// the ellipsoid surface), so the mesh entity carries the anchor as its
    /// `WorldPosition` and stays within f32 precision range.
    pub fn to_mesh(&self) -> (Mesh, DVec3) {
        let center_lat = self.origin_lat + (self.rows - 1) as f64 * self.spacing / 2.0;
        let center_lon = self.origin_lon + (self.columns - 1) as f64 * self.spacing / 2.0;
        let anchor = geodetic_to_ecef(center_lat, center_lon, 0.0);

        let mut positions = Vec::with_capacity(self.rows * self.columns);
        let mut uvs = Vec::with_capacity(self.rows * self.columns);
        for row in 0..self.rows {
            for col in 0..self.columns {
                let lat = self.origin_lat + row as f64 * self.spacing;
                let lon = self.origin_lon + col as f64 * self.spacing;
                let height = f64::from(self.heights[row * self.columns + col]);
                let relative = geodetic_to_ecef(lat, lon, height) - anchor;
                positions.push([relative.x as f32, relative.y as f32, relative.z as f32]);
                uvs.push([
                    col as f32 / (self.columns - 1) as f32,
                    row as f32 / (self.rows - 1) as f32,
                ]);
            }
        }

        let mut indices = Vec::with_capacity((self.rows - 1) * (self.columns - 1) * 6);
        for row in 0..self.rows - 1 {
            for col in 0..self.columns - 1 {
                let i0 = u32::try_from(row * self.columns + col).unwrap_or(0);
                let i1 = i0 + 1;
                let i2 = i0 + u32::try_from(self.columns).unwrap_or(0);
                let i3 = i2 + 1;
                indices.extend_from_slice(&[i0, i1, i2, i1, i3, i2]);
            }
        }

        let mut mesh = Mesh::new(
            PrimitiveTopology::TriangleList,
            RenderAssetUsages::default(),
        );
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
        mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
        mesh.insert_indices(Indices::U32(indices));
        mesh.compute_smooth_normals();
        (mesh, anchor)
    }
}

impl Default for TerrainMap {
    fn default() -> Self {
        Self::synthetic(0.0, 0.0, 0.5)
    }
}

/// Ground detection over a terrain map.
///
/// Borrowed per use; constructed by the caller and passed into the movement
/// integrators so they have no direct terrain dependency.
pub struct GroundSampler<'a> {
    terrain: &'a TerrainMap,
    /// Slope threshold in radians above which a new sample is rejected.
    slope_threshold: f64,
}

impl<'a> GroundSampler<'a> {
    pub fn new(terrain: &'a TerrainMap) -> Self {
        Self {
            terrain,
            slope_threshold: SLOPE_THRESHOLD,
        }
    }

    #[cfg(test)]
    fn with_threshold(terrain: &'a TerrainMap, slope_threshold: f64) -> Self {
        Self {
            terrain,
            slope_threshold,
        }
    }

    /// Terrain height (above the ellipsoid) under an ECEF position.
    ///
    /// Falls back to the position's own geodetic height when no terrain data
    /// covers the location. Returns `None` only when the position has no
    /// geodetic form at all.
    pub fn ground_height(&self, position: DVec3) -> Option<f64> {
        let geo = ecef_to_geodetic(position)?;
        Some(
            self.terrain
                .height_at(geo.lat, geo.lon)
                .unwrap_or(geo.height),
        )
    }

    /// Terrain height under `position`, with slope rejection against the
    /// ground under `current`.
    ///
    /// When the slope between the two ground points exceeds the threshold,
    /// the *current* ground height is returned instead of the new sample, so
    /// a surface-clamped mode cannot climb terrain steeper than the
    /// threshold. Soft-fails to `None` when either position has no geodetic
    /// form.
    pub fn clamped_ground_height(&self, position: DVec3, current: DVec3) -> Option<f64> {
        let sampled = self.ground_height(position)?;
        let current_height = self.ground_height(current)?;

        let distance = surface_distance(position, current);
        if distance <= f64::EPSILON {
            return Some(sampled);
        }

        let slope = ((sampled - current_height).abs() / distance).atan();
        if slope > self.slope_threshold {
            Some(current_height)
        } else {
            Some(sampled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::geodetic_to_ecef;

    fn flat_map(height: f32) -> TerrainMap {
        TerrainMap::from_grid(-1.0, -1.0, 0.5, 5, 5, vec![height; 25]).unwrap()
    }

    /// A map with a single tall column in the northeast quadrant.
    fn cliff_map() -> TerrainMap {
        let mut heights = vec![0.0f32; 25];
        for (i, h) in heights.iter_mut().enumerate() {
            // Columns 3-4 of every row form a plateau.
            if i % 5 >= 3 {
                *h = 5000.0;
            }
        }
        TerrainMap::from_grid(-1.0, -1.0, 0.5, 5, 5, heights).unwrap()
    }

    #[test]
    fn from_grid_rejects_mismatched_dimensions() {
        assert!(TerrainMap::from_grid(0.0, 0.0, 0.5, 4, 4, vec![0.0; 15]).is_none());
        assert!(TerrainMap::from_grid(0.0, 0.0, 0.0, 4, 4, vec![0.0; 16]).is_none());
        assert!(TerrainMap::from_grid(0.0, 0.0, 0.5, 1, 4, vec![0.0; 4]).is_none());
    }

    #[test]
    fn bilinear_interpolation_between_grid_points() {
        let heights = vec![
            0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, //
            100.0, 100.0, 100.0,
        ];
        let map = TerrainMap::from_grid(0.0, 0.0, 1.0, 3, 3, heights).unwrap();
        // Halfway between the middle and northern rows.
        let h = map.height_at(1.5, 1.0).unwrap();
        assert!((h - 50.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_coverage_returns_none() {
        let map = flat_map(10.0);
        assert!(map.height_at(30.0, 30.0).is_none());
        assert!(map.height_at(-30.0, 0.0).is_none());
    }

    #[test]
    fn ground_height_falls_back_to_ellipsoidal_height() {
        let map = flat_map(10.0);
        let sampler = GroundSampler::new(&map);
        // Far outside coverage: the position's own height is the answer.
        let position = geodetic_to_ecef(45.0, 45.0, 321.0);
        let h = sampler.ground_height(position).unwrap();
        assert!((h - 321.0).abs() < 1e-6);
    }

    #[test]
    fn ground_height_soft_fails_on_degenerate_position() {
        let map = flat_map(0.0);
        let sampler = GroundSampler::new(&map);
        assert!(sampler.ground_height(DVec3::ZERO).is_none());
    }

    #[test]
    fn steep_slope_is_rejected() {
        let map = cliff_map();
        let sampler = GroundSampler::new(&map);
        let current = geodetic_to_ecef(0.0, 0.0, 0.0);
        let target = geodetic_to_ecef(0.0, 0.6, 0.0);
        // 5 km rise over ~67 km would be fine, so shrink the threshold to
        // make the plateau unclimbable for the test.
        let strict = GroundSampler::with_threshold(&map, 0.05);
        let h = strict.clamped_ground_height(target, current).unwrap();
        // Rejected: the current ground height is returned.
        assert!((h - sampler.ground_height(current).unwrap()).abs() < 1e-6);
    }

    #[test]
    fn gentle_slope_is_accepted() {
        let map = cliff_map();
        let sampler = GroundSampler::new(&map);
        let current = geodetic_to_ecef(0.0, 0.0, 0.0);
        let target = geodetic_to_ecef(0.0, 0.6, 0.0);
        // 5 km over ~67 km of surface distance is well under 0.5 rad.
        let h = sampler.clamped_ground_height(target, current).unwrap();
        let expected = sampler.ground_height(target).unwrap();
        assert!((h - expected).abs() < 1e-6);
    }

    #[test]
    fn zero_distance_returns_the_sample() {
        let map = flat_map(25.0);
        let sampler = GroundSampler::new(&map);
        let p = geodetic_to_ecef(0.0, 0.0, 100.0);
        let h = sampler.clamped_ground_height(p, p).unwrap();
        assert!((h - 25.0).abs() < 1e-6);
    }
}
