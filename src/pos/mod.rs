// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Positional-astronomy helpers.
//!
//! So that we don't require a full ERFA/PAL binding for a handful of
//! closed-form transforms, write the equivalent functions here. Everything is
//! textbook spherical trigonometry; the sidereal-time polynomial is from
//! Meeus, *Astronomical Algorithms* (2nd ed.), ch. 12, which agrees with the
//! IAU 1982 expression to well under a milliarcsecond over the MWA's
//! operational epoch. All angles are in radians unless noted.

use std::f64::consts::TAU;

use marlu::{AzEl, RADec};

use crate::constants::{DAYS_PER_CENTURY, J2000_JD};

/// Normalize an angle into the range `[0, 2π)`.
pub fn normalize_rad(angle: f64) -> f64 {
    let wrapped = angle % TAU;
    if wrapped < 0.0 {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Greenwich mean sidereal time for a UT1 (≈UTC) Julian date.
///
/// Meeus (2nd ed.) eq. 12.4.
pub fn gmst_rad(jd: f64) -> f64 {
    let d = jd - J2000_JD;
    let t = d / DAYS_PER_CENTURY;
    let gmst_deg = 280.460_618_37
        + 360.985_647_366_29 * d
        + 0.000_387_933 * t * t
        - t * t * t / 38_710_000.0;
    normalize_rad(gmst_deg.to_radians())
}

/// Local sidereal time for a Julian date and an east-positive longitude.
pub fn lst_rad(jd: f64, longitude_rad: f64) -> f64 {
    normalize_rad(gmst_rad(jd) + longitude_rad)
}

/// Convert a local horizontal direction to equatorial coordinates.
///
/// Azimuth is measured from north through east. For the zenith
/// (`alt = π/2`), the result is RA = LST, Dec = latitude.
pub fn altaz_to_radec(alt_rad: f64, az_rad: f64, latitude_rad: f64, lst_rad: f64) -> RADec {
    let (s_alt, c_alt) = alt_rad.sin_cos();
    let (s_lat, c_lat) = latitude_rad.sin_cos();
    let (s_az, c_az) = az_rad.sin_cos();

    let dec = (s_alt * s_lat + c_alt * c_lat * c_az).asin();
    let ha = f64::atan2(-s_az * c_alt, s_alt * c_lat - c_alt * s_lat * c_az);
    RADec::new(normalize_rad(lst_rad - ha), dec)
}

/// Convert equatorial coordinates to a local horizontal direction.
///
/// Azimuth is measured from north through east, in `[0, 2π)`.
pub fn radec_to_altaz(radec: RADec, latitude_rad: f64, lst_rad: f64) -> AzEl {
    let ha = lst_rad - radec.ra;
    let (s_dec, c_dec) = radec.dec.sin_cos();
    let (s_lat, c_lat) = latitude_rad.sin_cos();
    let (s_ha, c_ha) = ha.sin_cos();

    let el = (s_dec * s_lat + c_dec * c_lat * c_ha).asin();
    let az = normalize_rad(f64::atan2(
        -c_dec * s_ha,
        s_dec * c_lat - c_dec * s_lat * c_ha,
    ));
    AzEl::new(az, el)
}

/// The angular separation between two sky positions.
///
/// Haversine form, stable for small separations.
pub fn angle_between(a: RADec, b: RADec) -> f64 {
    let sin_half_dec = ((b.dec - a.dec) / 2.0).sin();
    let sin_half_ra = ((b.ra - a.ra) / 2.0).sin();
    let h = sin_half_dec * sin_half_dec + a.dec.cos() * b.dec.cos() * sin_half_ra * sin_half_ra;
    2.0 * h.sqrt().asin()
}

/// The parallactic angle of a direction at hour angle `ha_rad` and
/// declination `dec_rad`, seen from latitude `latitude_rad`.
///
/// Zero when the direction is on the local meridian.
pub fn parallactic_angle(latitude_rad: f64, ha_rad: f64, dec_rad: f64) -> f64 {
    f64::atan2(
        ha_rad.sin(),
        dec_rad.cos() * latitude_rad.tan() - dec_rad.sin() * ha_rad.cos(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use float_cmp::approx_eq;
    use marlu::LatLngHeight;

    /// Validate a double result.
    macro_rules! vvd {
        ($observed:expr, $expected:expr, $epsilon:expr) => {
            assert!(
                approx_eq!(f64, $observed, $expected, epsilon = $epsilon),
                "expected {:?}, observed {:?}",
                $expected,
                $observed
            )
        };
    }

    #[test]
    fn test_gmst_at_j2000() {
        // Meeus: GMST at 2000-01-01T12:00 UT is 280.46061837 degrees.
        vvd!(gmst_rad(J2000_JD), 280.460_618_37_f64.to_radians(), 1e-12);
    }

    #[test]
    fn test_gmst_meeus_example() {
        // Meeus example 12.b: 1987 April 10, 19h21m00s UT.
        let jd = 2_446_896.306_25;
        vvd!(gmst_rad(jd).to_degrees(), 128.737_873_4, 1e-4);
    }

    #[test]
    fn test_zenith_maps_to_lst_and_latitude() {
        let mwa = LatLngHeight::new_mwa();
        let jd = 2_456_528.25;
        let lst = lst_rad(jd, mwa.longitude_rad);
        let zen = altaz_to_radec(std::f64::consts::FRAC_PI_2, 0.0, mwa.latitude_rad, lst);
        assert_abs_diff_eq!(zen.ra, lst, epsilon = 1e-10);
        assert_abs_diff_eq!(zen.dec, mwa.latitude_rad, epsilon = 1e-10);
    }

    #[test]
    fn test_radec_altaz_round_trip() {
        let mwa = LatLngHeight::new_mwa();
        let jd = 2_457_000.125;
        let lst = lst_rad(jd, mwa.longitude_rad);
        let radec = RADec::new(1.234, -0.345);
        let azel = radec_to_altaz(radec, mwa.latitude_rad, lst);
        let back = altaz_to_radec(azel.el, azel.az, mwa.latitude_rad, lst);
        assert_abs_diff_eq!(back.ra, radec.ra, epsilon = 1e-10);
        assert_abs_diff_eq!(back.dec, radec.dec, epsilon = 1e-10);
    }

    #[test]
    fn test_angle_between_degenerate_and_quadrature() {
        let a = RADec::new(0.5, -0.4);
        assert_abs_diff_eq!(angle_between(a, a), 0.0, epsilon = 1e-15);
        let b = RADec::new(0.0, 0.0);
        let c = RADec::new(std::f64::consts::FRAC_PI_2, 0.0);
        assert_abs_diff_eq!(
            angle_between(b, c),
            std::f64::consts::FRAC_PI_2,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_parallactic_angle_on_meridian() {
        let mwa = LatLngHeight::new_mwa();
        assert_abs_diff_eq!(
            parallactic_angle(mwa.latitude_rad, 0.0, -0.6),
            0.0,
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_parallactic_angle_sign_flips_with_hour_angle() {
        let mwa = LatLngHeight::new_mwa();
        let east = parallactic_angle(mwa.latitude_rad, -0.3, -0.6);
        let west = parallactic_angle(mwa.latitude_rad, 0.3, -0.6);
        assert_abs_diff_eq!(east, -west, epsilon = 1e-12);
    }
}
