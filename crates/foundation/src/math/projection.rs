//! Spherical Web Mercator (EPSG:3857) forward and inverse projection.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use crate::bounds::{GeoExtent, GeoPoint, ProjectedExtent, ProjectedPoint};

/// Sphere radius used by Web Mercator (the WGS84 semi-major axis, meters).
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Half the projected world width (meters): the x of the antimeridian.
pub const HALF_WORLD_M: f64 = PI * EARTH_RADIUS_M;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum DomainError {
    /// `|lat| >= 90`: the poles project to infinity.
    LatitudeOutOfRange(f64),
    NonFinite,
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainError::LatitudeOutOfRange(lat) => {
                write!(f, "latitude {lat} is outside the open interval (-90, 90)")
            }
            DomainError::NonFinite => write!(f, "coordinate is not finite"),
        }
    }
}

impl std::error::Error for DomainError {}

pub fn to_projected(lon: f64, lat: f64) -> Result<ProjectedPoint, DomainError> {
    if !lon.is_finite() || !lat.is_finite() {
        return Err(DomainError::NonFinite);
    }
    if lat.abs() >= 90.0 {
        return Err(DomainError::LatitudeOutOfRange(lat));
    }
    let x = EARTH_RADIUS_M * lon.to_radians();
    let y = EARTH_RADIUS_M * (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    Ok(ProjectedPoint::new(x, y))
}

pub fn to_geographic(x: f64, y: f64) -> GeoPoint {
    let lon = (x / EARTH_RADIUS_M).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS_M).exp().atan() - FRAC_PI_2).to_degrees();
    GeoPoint::new(lon, lat)
}

pub fn geo_extent_to_projected(extent: &GeoExtent) -> Result<ProjectedExtent, DomainError> {
    let min = to_projected(extent.xmin, extent.ymin)?;
    let max = to_projected(extent.xmax, extent.ymax)?;
    Ok(ProjectedExtent {
        xmin: min.x,
        ymin: min.y,
        xmax: max.x,
        ymax: max.y,
    })
}

pub fn projected_extent_to_geo(extent: &ProjectedExtent) -> GeoExtent {
    let min = to_geographic(extent.xmin, extent.ymin);
    let max = to_geographic(extent.xmax, extent.ymax);
    GeoExtent {
        xmin: min.lon,
        ymin: min.lat,
        xmax: max.lon,
        ymax: max.lat,
    }
}

#[cfg(test)]
mod tests {
    use super::{DomainError, HALF_WORLD_M, geo_extent_to_projected, to_geographic, to_projected};
    use crate::bounds::GeoExtent;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn origin_maps_to_origin() {
        let p = to_projected(0.0, 0.0).unwrap();
        assert_close(p.x, 0.0, 1e-9);
        assert_close(p.y, 0.0, 1e-9);
    }

    #[test]
    fn antimeridian_is_half_world() {
        let p = to_projected(180.0, 0.0).unwrap();
        assert_close(p.x, HALF_WORLD_M, 1e-6);
        assert_close(p.x, 20_037_508.342789244, 1e-6);
    }

    #[test]
    fn rejects_poles_and_nan() {
        assert_eq!(
            to_projected(0.0, 90.0),
            Err(DomainError::LatitudeOutOfRange(90.0))
        );
        assert_eq!(
            to_projected(10.0, -91.0),
            Err(DomainError::LatitudeOutOfRange(-91.0))
        );
        assert_eq!(to_projected(f64::NAN, 0.0), Err(DomainError::NonFinite));
    }

    #[test]
    fn round_trips_within_tolerance() {
        let mut lat = -89.9;
        while lat < 90.0 {
            for lon in [-180.0, -97.25, -0.5, 0.0, 33.3, 108.66, 179.999] {
                let p = to_projected(lon, lat).unwrap();
                let g = to_geographic(p.x, p.y);
                assert_close(g.lon, lon, 1e-6);
                assert_close(g.lat, lat, 1e-6);
            }
            lat += 4.3;
        }
    }

    #[test]
    fn inverse_is_total() {
        let g = to_geographic(1e12, -1e12);
        assert!(g.lon.is_finite());
        assert_close(g.lat, -90.0, 1e-9);
    }

    #[test]
    fn dataset_extent_projects_to_published_mercator_extent() {
        let geo = GeoExtent::new(
            108.556089991995194,
            32.478813272518501,
            108.771856340087851,
            32.647048539145018,
        )
        .unwrap();
        let projected = geo_extent_to_projected(&geo).unwrap();
        assert_close(projected.xmin, 12084408.6604176853, 1e-3);
        assert_close(projected.ymin, 3826327.72376103653, 1e-3);
        assert_close(projected.xmax, 12108427.6604176853, 1e-3);
        assert_close(projected.ymax, 3848548.72376103653, 1e-3);
    }
}
