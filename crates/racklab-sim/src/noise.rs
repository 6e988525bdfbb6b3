//! ---
//! rl_section: "02-hardware-simulation"
//! rl_subsection: "module"
//! rl_type: "source"
//! rl_scope: "code"
//! rl_description: "Sensor jitter sources for the rack device simulator."
//! rl_version: "v0.1.0"
//! rl_owner: "tbd"
//! ---
use rand::prelude::*;

/// Amplitude of the temperature sensor jitter in degrees Celsius.
pub const SENSOR_JITTER_C: f64 = 1.5;

/// Source of per-read sensor jitter.
///
/// Supplied explicitly to the simulator instead of drawing from a global
/// generator, so assertion outcomes are reproducible under a fixed seed.
pub trait SensorNoise {
    fn sample(&mut self) -> f64;
}

/// Uniform jitter in `[-amplitude, +amplitude]`, drawn from a seeded generator.
#[derive(Debug)]
pub struct UniformNoise {
    rng: StdRng,
    amplitude: f64,
}

impl UniformNoise {
    pub fn seeded(seed: u64) -> Self {
        Self::with_amplitude(seed, SENSOR_JITTER_C)
    }

    pub fn with_amplitude(seed: u64, amplitude: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            amplitude: amplitude.abs(),
        }
    }
}

impl SensorNoise for UniformNoise {
    fn sample(&mut self) -> f64 {
        self.rng.gen_range(-self.amplitude..=self.amplitude)
    }
}

/// Constant jitter, used to pin down boundary assertions in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedNoise(pub f64);

impl SensorNoise for FixedNoise {
    fn sample(&mut self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_noise_stays_in_range() {
        let mut noise = UniformNoise::seeded(42);
        for _ in 0..10_000 {
            let sample = noise.sample();
            assert!((-SENSOR_JITTER_C..=SENSOR_JITTER_C).contains(&sample));
        }
    }

    #[test]
    fn uniform_noise_is_reproducible_per_seed() {
        let mut a = UniformNoise::seeded(7);
        let mut b = UniformNoise::seeded(7);
        for _ in 0..32 {
            assert_eq!(a.sample(), b.sample());
        }
    }

    #[test]
    fn fixed_noise_returns_its_value() {
        let mut noise = FixedNoise(-1.5);
        assert_eq!(noise.sample(), -1.5);
        assert_eq!(noise.sample(), -1.5);
    }
}
