//! Coordinate conversion utilities.
//!
//! Provides conversions between ECEF (Earth-Centered, Earth-Fixed) coordinates
//! and geodetic coordinates (latitude, longitude, height above the ellipsoid),
//! plus the interpolation helpers used by the fly-to animation.

use glam::DVec3;

/// Mean Earth radius in meters (spherical ellipsoid approximation).
pub const EARTH_RADIUS: f64 = 6_371_000.0;

/// A geodetic position on the spherical ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geodetic {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Height above the ellipsoid surface in meters.
    pub height: f64,
}

/// Convert an ECEF position to geodetic coordinates.
///
/// Returns `None` for degenerate positions (at or extremely near the Earth
/// center) where latitude and longitude are undefined.
pub fn ecef_to_geodetic(position: DVec3) -> Option<Geodetic> {
    let radius = position.length();
    if !radius.is_finite() || radius < 1.0 {
        return None;
    }
    let lat_rad = (position.z / radius).asin();
    let lon_rad = position.y.atan2(position.x);
    Some(Geodetic {
        lat: lat_rad.to_degrees(),
        lon: lon_rad.to_degrees(),
        height: radius - EARTH_RADIUS,
    })
}

/// Convert latitude, longitude (degrees), and height above the ellipsoid to
/// an ECEF position.
pub fn geodetic_to_ecef(lat_deg: f64, lon_deg: f64, height: f64) -> DVec3 {
    let lat_rad = lat_deg.to_radians();
    let lon_rad = lon_deg.to_radians();
    let radius = EARTH_RADIUS + height;
    DVec3::new(
        radius * lat_rad.cos() * lon_rad.cos(),
        radius * lat_rad.cos() * lon_rad.sin(),
        radius * lat_rad.sin(),
    )
}

/// Great-circle surface distance in meters between two ECEF positions.
///
/// Measured along the ellipsoid surface, ignoring the height of either point.
pub fn surface_distance(a: DVec3, b: DVec3) -> f64 {
    let (Some(a), Some(b)) = (a.try_normalize(), b.try_normalize()) else {
        return 0.0;
    };
    let angle = a.dot(b).clamp(-1.0, 1.0).acos();
    angle * EARTH_RADIUS
}

/// Smoother step interpolation (Ken Perlin's improved version).
///
/// Has zero first and second derivative at both endpoints.
pub fn smootherstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

/// Spherical linear interpolation for normalized `DVec3`.
///
/// Interpolates along the great circle between two points on a unit sphere.
/// Both inputs should be normalized.
pub fn slerp_dvec3(a: DVec3, b: DVec3, t: f64) -> DVec3 {
    let dot = a.dot(b).clamp(-1.0, 1.0);
    let theta = dot.acos();

    // Handle nearly identical or opposite vectors.
    if theta.abs() < 1e-10 {
        return a.lerp(b, t).normalize();
    }

    // Handle nearly antipodal vectors: pick an arbitrary perpendicular axis.
    if theta > std::f64::consts::PI - 1e-6 {
        let perp = if a.x.abs() < 0.9 {
            DVec3::X.cross(a).normalize()
        } else {
            DVec3::Y.cross(a).normalize()
        };
        let angle = t * std::f64::consts::PI;
        return (a * angle.cos() + perp * angle.sin()).normalize();
    }

    let sin_theta = theta.sin();
    let a_weight = ((1.0 - t) * theta).sin() / sin_theta;
    let b_weight = (t * theta).sin() / sin_theta;

    (a * a_weight + b * b_weight).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geodetic_round_trip() {
        let ecef = geodetic_to_ecef(40.7, -74.0, 200.0);
        let geo = ecef_to_geodetic(ecef).unwrap();
        assert!((geo.lat - 40.7).abs() < 1e-9);
        assert!((geo.lon - -74.0).abs() < 1e-9);
        assert!((geo.height - 200.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_position_has_no_geodetic_form() {
        assert!(ecef_to_geodetic(DVec3::ZERO).is_none());
        assert!(ecef_to_geodetic(DVec3::new(f64::NAN, 0.0, 0.0)).is_none());
    }

    #[test]
    fn surface_distance_quarter_circle() {
        let a = geodetic_to_ecef(0.0, 0.0, 0.0);
        let b = geodetic_to_ecef(0.0, 90.0, 0.0);
        let expected = std::f64::consts::FRAC_PI_2 * EARTH_RADIUS;
        assert!((surface_distance(a, b) - expected).abs() < 1.0);
    }

    #[test]
    fn smootherstep_endpoints() {
        assert_eq!(smootherstep(0.0), 0.0);
        assert_eq!(smootherstep(1.0), 1.0);
        assert_eq!(smootherstep(-1.0), 0.0);
        assert_eq!(smootherstep(2.0), 1.0);
    }

    #[test]
    fn slerp_stays_on_unit_sphere() {
        let a = DVec3::X;
        let b = DVec3::new(0.0, 1.0, 1.0).normalize();
        for i in 0..=10 {
            let t = f64::from(i) / 10.0;
            let p = slerp_dvec3(a, b, t);
            assert!((p.length() - 1.0).abs() < 1e-12);
        }
    }
}
