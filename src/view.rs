use crate::{Error, Result};
use std::f64::consts::{FRAC_PI_2, PI};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The orientation and field of view of one virtual rectilinear camera.
///
/// All angles are in radians. `tilt` is measured from the zenith of the
/// fisheye (its optical axis), so a `tilt` of `0.0` looks straight down the
/// optical axis and a `tilt` of `π/2` looks at the rim of the disc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewParameters {
    /// Azimuth around the optical axis.
    pub pan: f64,
    /// Angle between the optical axis and the view direction.
    pub tilt: f64,
    /// Full field of view across the destination image, in `(0, π)`.
    pub fov: f64,
}

impl ViewParameters {
    /// Validates the field of view and constructs the parameters.
    pub fn new(pan: f64, tilt: f64, fov: f64) -> Result<Self> {
        let view = Self { pan, tilt, fov };
        view.validate()?;
        Ok(view)
    }

    /// Converts degree input into radians, flipping the elevation into a tilt.
    ///
    /// ```
    /// use fisheye_unwrap::{ViewAngles, ViewParameters};
    /// let view = ViewParameters::from_angles(ViewAngles::new(0.0, 90.0, 60.0)).unwrap();
    /// assert_eq!(view.tilt, 0.0);
    /// ```
    pub fn from_angles(angles: ViewAngles) -> Result<Self> {
        angles.validate()?;
        Self::new(
            angles.pan.to_radians(),
            (90.0 - angles.elevation).to_radians(),
            angles.fov.to_radians(),
        )
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.pan.is_finite() || !self.tilt.is_finite() {
            return Err(Error::InvalidParameters(format!(
                "pan {} and tilt {} must be finite",
                self.pan, self.tilt
            )));
        }
        if !(self.fov > 0.0 && self.fov < PI) {
            return Err(Error::InvalidParameters(format!(
                "field of view {} rad is outside of (0, π)",
                self.fov
            )));
        }
        Ok(())
    }
}

/// View orientation as it is entered by a user, in degrees.
///
/// `elevation` is measured from the horizon of the fisheye, so `90.0` looks
/// along the optical axis.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewAngles {
    /// Azimuth in `[0, 360]`.
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub pan: f64,
    /// Elevation in `[0, 180]`.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_elevation"))]
    pub elevation: f64,
    /// Field of view in `(0, 180)`.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_fov"))]
    pub fov: f64,
}

impl ViewAngles {
    pub fn new(pan: f64, elevation: f64, fov: f64) -> Self {
        Self {
            pan,
            elevation,
            fov,
        }
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=360.0).contains(&self.pan) {
            return Err(Error::InvalidParameters(format!(
                "pan {}° is outside of [0, 360]",
                self.pan
            )));
        }
        if !(0.0..=180.0).contains(&self.elevation) {
            return Err(Error::InvalidParameters(format!(
                "elevation {}° is outside of [0, 180]",
                self.elevation
            )));
        }
        if !(self.fov > 0.0 && self.fov < 180.0) {
            return Err(Error::InvalidParameters(format!(
                "field of view {}° is outside of (0, 180)",
                self.fov
            )));
        }
        Ok(())
    }
}

impl Default for ViewAngles {
    fn default() -> Self {
        Self::new(0.0, default_elevation(), default_fov())
    }
}

impl TryFrom<ViewAngles> for ViewParameters {
    type Error = Error;

    fn try_from(angles: ViewAngles) -> Result<Self> {
        Self::from_angles(angles)
    }
}

fn default_elevation() -> f64 {
    50.0
}

fn default_fov() -> f64 {
    95.0
}

/// The equidistant camera constants of one cropped fisheye disc.
///
/// They depend only on the size of the disc and are shared by every view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscGeometry {
    pub width: usize,
    pub height: usize,
    /// Radius of the disc, half of the shorter side.
    pub radius: f64,
    /// Equidistant focal scale, chosen so `π/2` off-axis lands on the radius.
    pub focal: f64,
    pub cx: f64,
    pub cy: f64,
}

impl DiscGeometry {
    pub fn new(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidSource(format!(
                "fisheye disc is {width}x{height}"
            )));
        }
        let radius = 0.5 * width.min(height) as f64;
        Ok(Self {
            width,
            height,
            radius,
            focal: radius / FRAC_PI_2,
            cx: (width - 1) as f64 / 2.0,
            cy: (height - 1) as f64 / 2.0,
        })
    }

    /// The `(width, height)` pair tables are keyed on.
    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}
