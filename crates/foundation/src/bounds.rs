use serde::{Deserialize, Serialize};

/// A point in geographic degrees.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// A point in projected (Web Mercator) meters.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub x: f64,
    pub y: f64,
}

impl ProjectedPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExtentError {
    NonFinite,
    /// `min >= max` along the named axis.
    Degenerate { axis: char },
}

impl std::fmt::Display for ExtentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtentError::NonFinite => write!(f, "extent has a non-finite bound"),
            ExtentError::Degenerate { axis } => {
                write!(f, "extent is empty or inverted along {axis}")
            }
        }
    }
}

impl std::error::Error for ExtentError {}

fn check_bounds(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Result<(), ExtentError> {
    if ![xmin, ymin, xmax, ymax].iter().all(|v| v.is_finite()) {
        return Err(ExtentError::NonFinite);
    }
    if xmin >= xmax {
        return Err(ExtentError::Degenerate { axis: 'x' });
    }
    if ymin >= ymax {
        return Err(ExtentError::Degenerate { axis: 'y' });
    }
    Ok(())
}

/// Extent in geographic degrees. `xmin < xmax` and `ymin < ymax`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoExtent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl GeoExtent {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Result<Self, ExtentError> {
        check_bounds(xmin, ymin, xmax, ymax)?;
        Ok(Self {
            xmin,
            ymin,
            xmax,
            ymax,
        })
    }

    /// Re-checks the ordering invariant, e.g. after deserialization.
    pub fn validate(&self) -> Result<(), ExtentError> {
        check_bounds(self.xmin, self.ymin, self.xmax, self.ymax)
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
        )
    }
}

/// Extent in projected meters. `xmin < xmax` and `ymin < ymax`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedExtent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl ProjectedExtent {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Result<Self, ExtentError> {
        check_bounds(xmin, ymin, xmax, ymax)?;
        Ok(Self {
            xmin,
            ymin,
            xmax,
            ymax,
        })
    }

    /// Builds the extent of a `width x height` box centered on `center`.
    pub fn from_center(center: ProjectedPoint, width: f64, height: f64) -> Self {
        Self {
            xmin: center.x - width / 2.0,
            ymin: center.y - height / 2.0,
            xmax: center.x + width / 2.0,
            ymax: center.y + height / 2.0,
        }
    }

    pub fn validate(&self) -> Result<(), ExtentError> {
        check_bounds(self.xmin, self.ymin, self.xmax, self.ymax)
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn center(&self) -> ProjectedPoint {
        ProjectedPoint::new(
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
        )
    }

    pub fn contains_point(&self, p: ProjectedPoint) -> bool {
        p.x >= self.xmin && p.x <= self.xmax && p.y >= self.ymin && p.y <= self.ymax
    }

    pub fn contains_extent(&self, other: &ProjectedExtent) -> bool {
        other.xmin >= self.xmin
            && other.xmax <= self.xmax
            && other.ymin >= self.ymin
            && other.ymax <= self.ymax
    }

    /// True when the interiors overlap; shared edges alone do not count.
    pub fn intersects(&self, other: &ProjectedExtent) -> bool {
        self.xmin < other.xmax
            && other.xmin < self.xmax
            && self.ymin < other.ymax
            && other.ymin < self.ymax
    }

    /// Grows the extent outward by the given distances (meters).
    pub fn expanded(&self, top: f64, right: f64, bottom: f64, left: f64) -> Self {
        Self {
            xmin: self.xmin - left,
            ymin: self.ymin - bottom,
            xmax: self.xmax + right,
            ymax: self.ymax + top,
        }
    }

    /// Largest absolute difference between corresponding bounds.
    pub fn max_bound_delta(&self, other: &ProjectedExtent) -> f64 {
        self.as_array()
            .iter()
            .zip(other.as_array().iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }
}
