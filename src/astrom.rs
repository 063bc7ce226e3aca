// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Slant-orthographic (SIN) astrometry.
//!
//! The [`SinProjection`] record carries the same fields as an astrolib
//! `MAKE_ASTR` structure so it can be handed to FHD-style consumers, and the
//! world/pixel transforms implement the slant orthographic projection of
//! Calabretta & Greisen (2002), "Representations of celestial coordinates in
//! FITS", section 5.1.5. The slant offsets ξ and η are derived from the
//! zenith distance and parallactic angle of the phase centre, so a phase
//! centre at zenith yields a plain orthographic projection.

use std::f64::consts::PI;

use marlu::{hifitime::Epoch, RADec};

use crate::{
    constants::JD_TO_MJD,
    pos::{angle_between, normalize_rad, parallactic_angle},
};

/// A WCS-like description of a zenithal slant-orthographic sky projection.
///
/// Angles carried in the record are in degrees, following the FITS keyword
/// conventions; the transform methods take and return radians.
#[derive(Debug, Clone, PartialEq)]
pub struct SinProjection {
    /// Image dimensions \[pixels\].
    pub naxis: [usize; 2],
    /// Pixel rotation/skew matrix (identity here).
    pub cd: [[f64; 2]; 2],
    /// Pixel scale on each axis \[degrees\].
    pub cdelt: [f64; 2],
    /// Reference pixel, 1-based as in FITS.
    pub crpix: [f64; 2],
    /// Reference sky position (the phase centre) \[degrees\].
    pub crval: [f64; 2],
    /// Axis types; always `RA---SIN` / `DEC--SIN`.
    pub ctype: [String; 2],
    /// Native longitude of the celestial pole \[degrees\].
    pub longpole: f64,
    /// Native latitude of the celestial pole \[degrees\].
    pub latpole: f64,
    /// Longitude-axis projection parameters
    /// `[xyoff, phi0, theta0, longpole, latpole]`.
    pub pv1: [f64; 5],
    /// Slant offsets ξ and η (dimensionless).
    pub pv2: [f64; 2],
    /// Projection code (`SIN`).
    pub projection: String,
    /// Coordinate-system tag (`C` for celestial).
    pub coord_sys: char,
    /// Reference frame of `crval`.
    pub radecsys: String,
    /// Equinox of `crval` \[Julian years\].
    pub equinox: f64,
    /// Observation date in FITS format.
    pub date_obs: String,
    /// Observation date as a modified Julian date.
    pub mjd_obs: f64,
    /// Projection-plane offsets of the reference point \[degrees\].
    pub x0y0: [f64; 2],
}

impl SinProjection {
    /// Build the astrometry record for an observation phased to `phase` with
    /// the local zenith at `zenith`, both at the observation reference date
    /// `jd0`.
    ///
    /// `obsx`/`obsy` are the 0-based image-centre pixel coordinates; they
    /// land in `crpix` with the 1-based FITS offset applied.
    #[allow(clippy::too_many_arguments)]
    pub fn project(
        phase: RADec,
        zenith: RADec,
        dimension: usize,
        elements: usize,
        degpix: f64,
        obsx: f64,
        obsy: f64,
        jd0: f64,
    ) -> SinProjection {
        let (xi, eta) = slant_offsets(phase, zenith);
        SinProjection {
            naxis: [dimension, elements],
            cd: [[1.0, 0.0], [0.0, 1.0]],
            cdelt: [degpix, degpix],
            crpix: [obsx + 1.0, obsy + 1.0],
            crval: [phase.ra.to_degrees(), phase.dec.to_degrees()],
            ctype: ["RA---SIN".to_string(), "DEC--SIN".to_string()],
            longpole: 180.0,
            latpole: 0.0,
            // xyoff and phi0 are zero; theta0 is 90 for zenithal projections.
            pv1: [0.0, 0.0, 90.0, 180.0, 0.0],
            pv2: [xi, eta],
            projection: "SIN".to_string(),
            coord_sys: 'C',
            radecsys: "ICRS".to_string(),
            equinox: 2000.0,
            date_obs: fits_date(jd0),
            mjd_obs: jd0 - JD_TO_MJD,
            x0y0: [0.0, 0.0],
        }
    }

    /// Project a sky position onto the image, returning 0-based pixel
    /// coordinates.
    pub fn world_to_pixel(&self, radec: RADec) -> (f64, f64) {
        let ra0 = self.crval[0].to_radians();
        let dec0 = self.crval[1].to_radians();
        let (xi, eta) = (self.pv2[0], self.pv2[1]);

        let dra = radec.ra - ra0;
        let (s_dec, c_dec) = radec.dec.sin_cos();
        let (s_dec0, c_dec0) = dec0.sin_cos();

        let sin_theta = (s_dec * s_dec0 + c_dec * c_dec0 * dra.cos()).clamp(-1.0, 1.0);
        let cos_theta = (1.0 - sin_theta * sin_theta).sqrt();
        let phi = PI + f64::atan2(-c_dec * dra.sin(), s_dec * c_dec0 - c_dec * s_dec0 * dra.cos());

        let r = 1.0 - sin_theta;
        let x = cos_theta * phi.sin() + xi * r;
        let y = -(cos_theta * phi.cos() - eta * r);

        (
            (self.crpix[0] - 1.0) + x.to_degrees() / self.cdelt[0],
            (self.crpix[1] - 1.0) + y.to_degrees() / self.cdelt[1],
        )
    }

    /// Deproject 0-based pixel coordinates back onto the sky.
    pub fn pixel_to_world(&self, px: f64, py: f64) -> RADec {
        let ra0 = self.crval[0].to_radians();
        let dec0 = self.crval[1].to_radians();
        let (xi, eta) = (self.pv2[0], self.pv2[1]);

        let x = ((px - (self.crpix[0] - 1.0)) * self.cdelt[0]).to_radians();
        let y = ((py - (self.crpix[1] - 1.0)) * self.cdelt[1]).to_radians();

        // sin(theta) solves a quadratic; take the root nearest the pole.
        let a = 1.0 + xi * xi + eta * eta;
        let half_b = xi * (x - xi) - eta * (eta - y);
        let c = (x - xi) * (x - xi) + (eta - y) * (eta - y) - 1.0;
        let sin_theta = ((-half_b + (half_b * half_b - a * c).sqrt()) / a).clamp(-1.0, 1.0);
        let cos_theta = (1.0 - sin_theta * sin_theta).sqrt();

        let p = x - xi * (1.0 - sin_theta);
        let q = eta * (1.0 - sin_theta) - y;
        let phi = f64::atan2(p, q);

        let dphi = phi - PI;
        let (s_dec0, c_dec0) = dec0.sin_cos();
        let dec = (sin_theta * s_dec0 + cos_theta * c_dec0 * dphi.cos()).asin();
        let ra = ra0
            + f64::atan2(
                -cos_theta * dphi.sin(),
                sin_theta * c_dec0 - cos_theta * s_dec0 * dphi.cos(),
            );
        RADec::new(normalize_rad(ra), dec)
    }
}

/// The slant offsets (ξ, η) for a phase centre at the given zenith distance
/// and parallactic angle from the local zenith.
pub fn slant_offsets(phase: RADec, zenith: RADec) -> (f64, f64) {
    let phase_ra_deg = phase.ra.to_degrees();
    let zen_ra_deg = zenith.ra.to_degrees();
    // Wrap the RA offset when the two straddle the 0/360 boundary.
    let lon_offset_deg = if (phase_ra_deg - zen_ra_deg).abs() > 90.0 {
        phase_ra_deg - if phase_ra_deg > zen_ra_deg { 360.0 } else { -360.0 } - zen_ra_deg
    } else {
        phase_ra_deg - zen_ra_deg
    };

    let zenith_ang = angle_between(phase, zenith);
    let parallactic = parallactic_angle(zenith.dec, lon_offset_deg.to_radians(), phase.dec);

    let xi = -zenith_ang.tan() * parallactic.sin();
    let eta = zenith_ang.tan() * parallactic.cos();
    (xi, eta)
}

/// Render a Julian date as a FITS DATE-OBS string.
fn fits_date(jd: f64) -> String {
    let (y, mo, d, h, mi, s, nanos) = Epoch::from_jde_utc(jd).as_gregorian_utc();
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}",
        y,
        mo,
        d,
        h,
        mi,
        s,
        nanos / 1_000_000
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn phase_centred_projection(phase: RADec, zenith: RADec) -> SinProjection {
        SinProjection::project(phase, zenith, 2048, 2048, 0.01, 1024.0, 1024.0, 2_456_528.25)
    }

    #[test]
    fn test_offsets_vanish_when_phased_at_zenith() {
        let centre = RADec::new(0.8, -0.47);
        let (xi, eta) = slant_offsets(centre, centre);
        assert_abs_diff_eq!(xi, 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(eta, 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(angle_between(centre, centre), 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_phase_centre_lands_on_reference_pixel() {
        let phase = RADec::new(1.2, -0.46);
        let zenith = RADec::new(1.25, -0.47);
        let astr = phase_centred_projection(phase, zenith);
        let (px, py) = astr.world_to_pixel(phase);
        assert_abs_diff_eq!(px, 1024.0, epsilon = 1e-9);
        assert_abs_diff_eq!(py, 1024.0, epsilon = 1e-9);
    }

    #[test]
    fn test_one_pixel_north_is_one_cdelt() {
        let phase = RADec::new(0.5, -0.46);
        let astr = phase_centred_projection(phase, phase);
        let north = RADec::new(phase.ra, phase.dec + 0.01_f64.to_radians());
        let (px, py) = astr.world_to_pixel(north);
        assert_abs_diff_eq!(px, 1024.0, epsilon = 1e-6);
        assert_abs_diff_eq!(py, 1025.0, epsilon = 1e-4);
    }

    #[test]
    fn test_world_pixel_round_trip() {
        let phase = RADec::new(1.2, -0.46);
        let zenith = RADec::new(1.28, -0.44);
        let astr = phase_centred_projection(phase, zenith);
        let target = RADec::new(1.21, -0.43);
        let (px, py) = astr.world_to_pixel(target);
        let back = astr.pixel_to_world(px, py);
        assert_abs_diff_eq!(back.ra, target.ra, epsilon = 1e-9);
        assert_abs_diff_eq!(back.dec, target.dec, epsilon = 1e-9);
    }

    #[test]
    fn test_record_keywords() {
        let phase = RADec::new(0.0, -0.47);
        let astr = phase_centred_projection(phase, phase);
        assert_eq!(astr.ctype[0], "RA---SIN");
        assert_eq!(astr.ctype[1], "DEC--SIN");
        assert_abs_diff_eq!(astr.longpole, 180.0);
        assert_abs_diff_eq!(astr.equinox, 2000.0);
        assert_abs_diff_eq!(astr.crpix[0], 1025.0);
        assert_abs_diff_eq!(astr.mjd_obs, 2_456_528.25 - JD_TO_MJD);
        assert_eq!(astr.pv1, [0.0, 0.0, 90.0, 180.0, 0.0]);
        // 2013-08-23T18:00:00 UTC
        assert!(astr.date_obs.starts_with("2013-08-23T"));
    }

    #[test]
    fn test_ra_wrap_in_slant_offsets() {
        // phase and zenith straddling RA 0/360 must behave like a small
        // offset, not a near-360-degree one.
        let phase = RADec::new(359.0_f64.to_radians(), -0.47);
        let zenith = RADec::new(1.0_f64.to_radians(), -0.47);
        let (xi, eta) = slant_offsets(phase, zenith);
        assert!(xi.abs() < 0.1);
        assert!(eta.abs() < 0.1);
    }
}
