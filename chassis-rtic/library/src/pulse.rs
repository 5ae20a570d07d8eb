use portable_atomic::{AtomicBool, AtomicU32, Ordering};

/// Debounced pulse counter for one single-edge encoder channel.
///
/// Only a rising edge followed by a falling edge counts as a pulse. Repeated rising
/// edges while armed, and falling edges while idle, are glitches and are ignored.
///
/// [`PulseCounter::on_edge`] is meant to be called from the pin interrupt, every other
/// method from any context. The counter wraps at `u32::MAX`; consumers compute deltas
/// with wrapping subtraction.
pub struct PulseCounter {
    count: AtomicU32,
    armed: AtomicBool,
}

impl PulseCounter {
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
            armed: AtomicBool::new(false),
        }
    }

    /// Feed the pin level sampled right after an edge interrupt.
    #[inline]
    pub fn on_edge(&self, level: bool) {
        if level {
            self.armed.store(true, Ordering::Relaxed);
        } else if self.armed.load(Ordering::Relaxed) {
            self.armed.store(false, Ordering::Relaxed);
            self.count.fetch_add(1, Ordering::Release);
        }
    }

    /// Feed the edge flags latched since the last interrupt together with the pin
    /// level read now.
    ///
    /// With both flags set a whole cycle went by, starting from the level the counter
    /// last saw. That cycle is replayed, and finished at `level`.
    pub fn on_edges(&self, rising: bool, falling: bool, level: bool) {
        match (rising, falling) {
            (false, false) => {}
            (true, false) => self.on_edge(true),
            (false, true) => self.on_edge(false),
            (true, true) => {
                let was_high = self.armed.load(Ordering::Relaxed);
                self.on_edge(!was_high);
                self.on_edge(was_high);
                if level != was_high {
                    self.on_edge(level);
                }
            }
        }
    }

    pub fn get_count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }
}

impl Default for PulseCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(counter: &PulseCounter, levels: &[bool]) {
        for &level in levels {
            counter.on_edge(level);
        }
    }

    #[test]
    fn test_counts_rising_then_falling() {
        let counter = PulseCounter::new();
        feed(&counter, &[true, false]);
        assert_eq!(counter.get_count(), 1);
        feed(&counter, &[true, false, true, false]);
        assert_eq!(counter.get_count(), 3);
    }

    #[test]
    fn test_ignores_glitches() {
        let counter = PulseCounter::new();

        // falling edge without a preceding rising edge
        feed(&counter, &[false, false]);
        assert_eq!(counter.get_count(), 0);

        // bouncing rising edge still counts once
        feed(&counter, &[true, true, true, false]);
        assert_eq!(counter.get_count(), 1);

        // bouncing falling edge does not count twice
        feed(&counter, &[true, false, false]);
        assert_eq!(counter.get_count(), 2);
    }

    #[test]
    fn test_matches_pair_count() {
        // pseudo random edge stream, compared against counting complete pairs directly
        let mut seed: u32 = 0x1234_5678;
        let mut levels = std::vec::Vec::new();
        for _ in 0..1000 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
            levels.push(seed & 0x1000 != 0);
        }

        let mut expected = 0;
        let mut seen_rising = false;
        for &level in &levels {
            if level {
                seen_rising = true;
            } else if seen_rising {
                expected += 1;
                seen_rising = false;
            }
        }

        let counter = PulseCounter::new();
        feed(&counter, &levels);
        assert_eq!(counter.get_count(), expected);
    }

    #[test]
    fn test_both_edges_latched() {
        // idle counter, pin high now: rise, fall, rise
        let counter = PulseCounter::new();
        counter.on_edges(true, true, true);
        assert_eq!(counter.get_count(), 1);
        // the last rising edge is armed and completes with the next fall
        counter.on_edges(false, true, false);
        assert_eq!(counter.get_count(), 2);

        // idle counter, pin low now: rise, fall
        let counter = PulseCounter::new();
        counter.on_edges(true, true, false);
        assert_eq!(counter.get_count(), 1);
        counter.on_edges(false, true, false);
        assert_eq!(counter.get_count(), 1);

        // armed counter, pin low now: fall, rise, fall
        let counter = PulseCounter::new();
        counter.on_edges(true, false, true);
        counter.on_edges(true, true, false);
        assert_eq!(counter.get_count(), 2);

        // armed counter, pin high now: fall, rise
        let counter = PulseCounter::new();
        counter.on_edges(true, false, true);
        counter.on_edges(true, true, true);
        assert_eq!(counter.get_count(), 1);
        counter.on_edges(false, true, false);
        assert_eq!(counter.get_count(), 2);
    }

    #[test]
    fn test_single_latched_edges() {
        let counter = PulseCounter::new();
        counter.on_edges(false, false, true);
        assert_eq!(counter.get_count(), 0);
        counter.on_edges(true, false, true);
        counter.on_edges(false, true, false);
        assert_eq!(counter.get_count(), 1);
    }
}
