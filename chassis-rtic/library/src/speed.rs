use chassis_message::{DEFAULT_ENCODER_PPR, DEFAULT_GEAR_RATIO};

/// Encoder pulses per wheel revolution, split in its two factors.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EncoderResolution {
    /// Pulses per motor revolution
    pub ppr: f32,
    /// Motor revolutions per wheel revolution
    pub gear_ratio: f32,
}

impl EncoderResolution {
    pub fn counts_per_rev(&self) -> f32 {
        self.ppr * self.gear_ratio
    }
}

impl Default for EncoderResolution {
    fn default() -> Self {
        Self {
            ppr: DEFAULT_ENCODER_PPR,
            gear_ratio: DEFAULT_GEAR_RATIO,
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SpeedSample {
    /// Pulses counted since the previous sample
    pub delta: u32,
    /// Milliseconds since the previous sample
    pub elapsed_ms: u32,
    /// Wheel speed in revolutions per second, always non-negative
    pub rev_per_s: f32,
}

/// Turns successive pulse counts into a wheel speed using the measured time between
/// samples rather than the nominal loop period.
pub struct SpeedEstimator {
    last_count: u32,
    last_ms: u32,
    last_speed: f32,
    counts_per_rev: f32,
}

impl SpeedEstimator {
    pub fn new(initial_count: u32, now_ms: u32, resolution: EncoderResolution) -> Self {
        Self {
            last_count: initial_count,
            last_ms: now_ms,
            last_speed: 0.0,
            counts_per_rev: resolution.counts_per_rev(),
        }
    }

    pub fn set_resolution(&mut self, resolution: EncoderResolution) {
        self.counts_per_rev = resolution.counts_per_rev();
    }

    /// Update the estimator with the current pulse count and clock. Both counters may
    /// wrap. When no time has passed the previous speed is returned and the pulses are
    /// left for the next sample.
    pub fn sample(&mut self, count: u32, now_ms: u32) -> SpeedSample {
        let elapsed_ms = now_ms.wrapping_sub(self.last_ms);
        if elapsed_ms == 0 {
            return SpeedSample {
                delta: 0,
                elapsed_ms,
                rev_per_s: self.last_speed,
            };
        }

        let delta = count.wrapping_sub(self.last_count);
        self.last_count = count;
        self.last_ms = now_ms;

        if self.counts_per_rev > 0.0 {
            self.last_speed = delta as f32 * 1000.0 / (self.counts_per_rev * elapsed_ms as f32);
        }

        SpeedSample {
            delta,
            elapsed_ms,
            rev_per_s: self.last_speed,
        }
    }

    pub fn last_speed(&self) -> f32 {
        self.last_speed
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn estimator(count: u32, now_ms: u32) -> SpeedEstimator {
        SpeedEstimator::new(count, now_ms, EncoderResolution::default())
    }

    #[test]
    fn test_speed_from_delta() {
        let mut speed = estimator(0, 0);
        // one wheel revolution in half a second
        let sample = speed.sample(616, 500);
        assert_eq!(sample.delta, 616);
        assert_eq!(sample.elapsed_ms, 500);
        assert_relative_eq!(sample.rev_per_s, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_uses_measured_interval() {
        let mut speed = estimator(100, 1000);
        // a late tick must not inflate the speed
        let sample = speed.sample(100 + 616, 1000 + 66);
        assert_relative_eq!(sample.rev_per_s, 1000.0 / 66.0, epsilon = 1e-3);
    }

    #[test]
    fn test_no_pulses() {
        let mut speed = estimator(42, 0);
        let sample = speed.sample(42, 33);
        assert_eq!(sample.delta, 0);
        assert_eq!(sample.rev_per_s, 0.0);
    }

    #[test]
    fn test_counter_wrap() {
        let mut speed = estimator(u32::MAX - 5, 0);
        let sample = speed.sample(10, 100);
        assert_eq!(sample.delta, 16);
    }

    #[test]
    fn test_clock_wrap() {
        let mut speed = estimator(0, u32::MAX - 9);
        let sample = speed.sample(62, 23);
        assert_eq!(sample.elapsed_ms, 33);
        assert!(sample.rev_per_s > 0.0);
    }

    #[test]
    fn test_zero_elapsed_keeps_speed() {
        let mut speed = estimator(0, 0);
        let first = speed.sample(308, 500);
        let repeated = speed.sample(400, 500);
        assert_eq!(repeated.delta, 0);
        assert_eq!(repeated.rev_per_s, first.rev_per_s);

        // the pulses seen during the zero-length interval are not lost
        let next = speed.sample(616, 1000);
        assert_eq!(next.delta, 308);
    }

    #[test]
    fn test_resolution() {
        let mut speed = SpeedEstimator::new(
            0,
            0,
            EncoderResolution {
                ppr: 13.0,
                gear_ratio: 30.0,
            },
        );
        let sample = speed.sample(390, 1000);
        assert_relative_eq!(sample.rev_per_s, 1.0, epsilon = 1e-6);

        speed.set_resolution(EncoderResolution::default());
        let sample = speed.sample(390 + 616, 2000);
        assert_relative_eq!(sample.rev_per_s, 1.0, epsilon = 1e-6);
    }
}
