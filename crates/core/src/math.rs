//! Small numeric helpers shared by the analysis and generator modules.

pub fn clamp01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Rounds halves towards positive infinity, so `-0.5` becomes `0`.
///
/// Register shifts are computed from `brightness - 0.5`; rounding away from
/// zero would drop the register a full octave at exactly mid brightness.
pub fn round_half_up(x: f32) -> i32 {
    (x + 0.5).floor() as i32
}

/// Wraps an angle in degrees into `[0, 360)`.
pub fn wrap_hue(deg: f32) -> f32 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can return exactly 360.0 for tiny negative inputs.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_negative_and_large_hues() {
        assert_eq!(wrap_hue(-30.0), 330.0);
        assert_eq!(wrap_hue(720.0), 0.0);
        assert!(wrap_hue(-1e-7) < 360.0);
    }

    #[test]
    fn rounds_halves_upwards() {
        assert_eq!(round_half_up(-0.5), 0);
        assert_eq!(round_half_up(0.5), 1);
        assert_eq!(round_half_up(-0.6), -1);
    }

    #[test]
    fn converts_decibels() {
        assert!((db_to_gain(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_gain(-20.0) - 0.1).abs() < 1e-6);
    }
}
