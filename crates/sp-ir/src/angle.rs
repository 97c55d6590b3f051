//! Azimuth helpers.
//!
//! Azimuths are degrees measured from straight ahead, positive towards the
//! listener's right. Directions are unit vectors `(cos θ, sin θ)`.

/// Wrap an azimuth into `[-180, 180)`.
pub fn normalize_azimuth(deg: f32) -> f32 {
    let wrapped = libm::fmodf(deg + 180.0, 360.0);
    let wrapped = if wrapped < 0.0 { wrapped + 360.0 } else { wrapped };
    // fmodf can land exactly on 360 after the correction above
    if wrapped >= 360.0 {
        -180.0
    } else {
        wrapped - 180.0
    }
}

/// Unit direction vector for an azimuth in degrees.
pub fn direction(deg: f32) -> (f64, f64) {
    let rad = f64::from(deg).to_radians();
    (libm::cos(rad), libm::sin(rad))
}

/// Clockwise angular distance from `from` to `to`, in `[0, 360)`.
pub fn clockwise_gap(from: f32, to: f32) -> f32 {
    let gap = normalize_azimuth(to - from);
    if gap < 0.0 {
        gap + 360.0
    } else {
        gap
    }
}
