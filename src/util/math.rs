//! Angle helpers shared by quantization, rotation and pose sampling.

/// Wraps an angle in degrees to the range [0, 360).
pub(crate) fn wrap_deg_360(angle_deg: f32) -> f32 {
    let wrapped = angle_deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Computes sine and cosine for an angle in degrees.
pub(crate) fn sin_cos_deg(angle_deg: f32) -> (f32, f32) {
    angle_deg.to_radians().sin_cos()
}
