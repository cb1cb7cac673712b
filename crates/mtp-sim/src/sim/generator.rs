// crates/mtp-sim/src/sim/generator.rs

//! Signal shapes used by the engine.

use rand::Rng;
use std::f64::consts::PI;

/// `amplitude * sin(2π t / period)`. Periods below 1e-6 s are clamped.
pub fn next_sine(t_seconds: f64, amplitude: f64, period_seconds: f64) -> f64 {
    let omega = 2.0 * PI / period_seconds.max(1e-6);
    amplitude * (omega * t_seconds).sin()
}

/// Adds uniform noise in `[-noise_amplitude, +noise_amplitude]`.
pub fn add_noise<R: Rng + ?Sized>(value: f64, noise_amplitude: f64, rng: &mut R) -> f64 {
    value + (rng.r#gen::<f64>() * 2.0 - 1.0) * noise_amplitude
}

/// Steps `current` by `step`, wrapping to `min` once `max` is exceeded.
pub fn next_ramp(current: f64, step: f64, min: f64, max: f64) -> f64 {
    let next = current + step;
    if next > max { min } else { next }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_sine_shape() {
        assert!(next_sine(0.0, 50.0, 30.0).abs() < 1e-9);
        assert!((next_sine(7.5, 50.0, 30.0) - 50.0).abs() < 1e-9);
        assert!((next_sine(22.5, 50.0, 30.0) + 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_sine_with_zero_period_is_finite() {
        assert!(next_sine(1.0, 50.0, 0.0).is_finite());
    }

    #[test]
    fn test_noise_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let v = add_noise(10.0, 0.1, &mut rng);
            assert!((v - 10.0).abs() <= 0.1, "noise out of bounds: {v}");
        }
        assert_eq!(add_noise(10.0, 0.0, &mut rng), 10.0);
    }

    #[test]
    fn test_ramp_wraps() {
        assert_eq!(next_ramp(0.0, 0.5, 0.0, 1.0), 0.5);
        assert_eq!(next_ramp(1.0, 0.5, 0.0, 1.0), 0.0);
    }
}
