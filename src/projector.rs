//! The equidistant fisheye model that maps a virtual view pixel back into the disc.
//!
//! The view is a plane tangent to a sphere of radius `r` around the lens. A
//! destination pixel `(u, v)` is turned into a 3d ray through that plane, and
//! the angle `θ` between the ray and the optical axis is mapped linearly onto
//! a radial distance `f ⋅ θ` from the disc center.

use crate::{DiscGeometry, ViewParameters};
use std::f64::consts::FRAC_PI_2;

/// Map the destination pixel `(u, v)` (column, row) of `view` onto the disc.
///
/// Returns the `(x, y)` (column, row) coordinate in the disc as floating
/// point. Callers that need a pixel index truncate it.
pub fn project(u: f64, v: f64, view: &ViewParameters, disc: &DiscGeometry) -> (f64, f64) {
    ViewBasis::new(view, disc).project(u, v)
}

/// The per-view constants of [`project`].
///
/// These only change with the view or the disc, so table builds compute
/// them once and reuse them for every pixel.
#[derive(Debug, Clone, Copy)]
pub struct ViewBasis {
    disc: DiscGeometry,
    /// Position of the view center on the sphere.
    center: [f64; 3],
    /// Displacement of one pixel step along the destination columns.
    du: [f64; 3],
    /// Displacement of one pixel step along the destination rows.
    dv: [f64; 3],
}

impl ViewBasis {
    pub fn new(view: &ViewParameters, disc: &DiscGeometry) -> Self {
        let DiscGeometry { radius, cx, cy, .. } = *disc;
        let half_extent = radius * (view.fov / 2.0).tan();
        let wp = half_extent / (cx + 0.5);
        let hp = half_extent / (cy + 0.5);
        let (sin_pan, cos_pan) = view.pan.sin_cos();
        let (sin_tilt, cos_tilt) = view.tilt.sin_cos();
        Self {
            disc: *disc,
            center: [
                radius * sin_tilt * cos_pan,
                radius * sin_tilt * sin_pan,
                radius * cos_tilt,
            ],
            du: [wp * sin_pan, -wp * cos_pan, 0.0],
            dv: [
                -hp * cos_tilt * cos_pan,
                -hp * cos_tilt * sin_pan,
                hp * sin_tilt,
            ],
        }
    }

    /// See [`project`].
    pub fn project(&self, u: f64, v: f64) -> (f64, f64) {
        let DiscGeometry { cx, cy, .. } = self.disc;
        let a = cx - u;
        let b = v - cy;
        let xp = self.center[0] + a * self.du[0] + b * self.dv[0];
        let yp = self.center[1] + a * self.du[1] + b * self.dv[1];
        let zp = self.center[2] + b * self.dv[2];
        fisheye_point(xp, yp, zp, &self.disc)
    }
}

/// Equidistant projection of the ray `(xp, yp, zp)` onto the disc.
fn fisheye_point(xp: f64, yp: f64, zp: f64, disc: &DiscGeometry) -> (f64, f64) {
    let rho = (xp * xp + yp * yp).sqrt();
    if rho == 0.0 {
        // Along the optical axis the azimuth is undefined.
        return (disc.cx, disc.cy);
    }
    let theta = incidence(rho, zp);
    let cos_a = xp / rho;
    let sin_a = yp / rho;
    (
        disc.cx + disc.focal * theta * cos_a,
        disc.cy + disc.focal * theta * sin_a,
    )
}

/// Angle between a ray and the optical axis, given the ray's distance from
/// the axis `rho > 0` and its height `zp` along it.
///
/// Rays behind the lens plane (`zp < 0`) give a negative angle and land on
/// the opposite side of the disc center.
fn incidence(rho: f64, zp: f64) -> f64 {
    if zp == 0.0 {
        FRAC_PI_2
    } else {
        (rho / zp).atan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn disc() -> DiscGeometry {
        DiscGeometry::new(200, 200).unwrap()
    }

    #[test]
    fn optical_axis_maps_to_center() {
        let disc = disc();
        let view = ViewParameters::new(0.0, 0.0, 1.0).unwrap();
        assert_eq!(project(disc.cx, disc.cy, &view, &disc), (disc.cx, disc.cy));
    }

    #[test]
    fn ray_in_lens_plane_lands_on_rim() {
        let disc = disc();
        let (x, y) = fisheye_point(3.0, 0.0, 0.0, &disc);
        assert_relative_eq!(x, disc.cx + disc.radius, epsilon = 1e-9);
        assert_eq!(y, disc.cy);
        let (x, y) = fisheye_point(0.0, -1.0, 0.0, &disc);
        assert_eq!(x, disc.cx);
        assert_relative_eq!(y, disc.cy - disc.radius, epsilon = 1e-9);
    }

    #[test]
    fn rays_behind_the_lens_mirror_through_the_center() {
        let disc = disc();
        let (x, y) = fisheye_point(1.0, 0.0, -1.0, &disc);
        assert_relative_eq!(x, disc.cx - 0.5 * disc.radius, epsilon = 1e-9);
        assert_eq!(y, disc.cy);
    }

    #[test]
    fn upper_rows_of_a_low_view_stay_in_the_disc() {
        // The top rows of this view have `zp < 0`.
        let disc = disc();
        let view = ViewParameters::from_angles(crate::ViewAngles::new(0.0, 30.0, 95.0)).unwrap();
        let (x, y) = project(50.0, 0.0, &view, &disc);
        assert_relative_eq!(x, 23.006_612, epsilon = 1e-5);
        assert_relative_eq!(y, 128.827_877, epsilon = 1e-5);
    }

    #[test]
    fn view_center_lands_at_tilt_radius() {
        let disc = disc();
        for &(pan, tilt) in &[(0.0, 0.7), (1.0, 0.3), (4.0, 1.2)] {
            let view = ViewParameters::new(pan, tilt, 1.6).unwrap();
            let (x, y) = project(disc.cx, disc.cy, &view, &disc);
            let expected = disc.focal * tilt;
            assert_relative_eq!(x, disc.cx + expected * f64::cos(pan), epsilon = 1e-9);
            assert_relative_eq!(y, disc.cy + expected * f64::sin(pan), epsilon = 1e-9);
        }
    }

    #[test]
    fn rows_move_toward_the_center() {
        // Lower rows of a view tilted away from the axis look closer to it.
        let disc = disc();
        let view = ViewParameters::new(0.0, 1.0, 1.2).unwrap();
        let (top, _) = project(disc.cx, 0.0, &view, &disc);
        let (bottom, _) = project(disc.cx, disc.height as f64 - 1.0, &view, &disc);
        assert!(bottom < top);
    }

    #[test]
    fn basis_matches_free_function() {
        let disc = DiscGeometry::new(320, 240).unwrap();
        let view = ViewParameters::new(2.1, 0.9, 1.4).unwrap();
        let basis = ViewBasis::new(&view, &disc);
        for &(u, v) in &[(0.0, 0.0), (12.0, 200.0), (319.0, 5.0)] {
            assert_eq!(basis.project(u, v), project(u, v, &view, &disc));
        }
    }
}
