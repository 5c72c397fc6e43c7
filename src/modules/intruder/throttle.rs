use std::time::Duration;

/// Consecutive rate-limited responses that cost one unit of concurrency.
pub const RATE_LIMIT_THRESHOLD: u32 = 5;
/// Pause taken after each concurrency reduction.
pub const COOLDOWN: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleEvent {
    /// No marker and no streak to clear.
    Clear,
    /// Marker seen; streak is the running count.
    Hit { streak: u32 },
    /// Streak reached the threshold; concurrency went `from -> to` (equal at the floor).
    Reduced { from: usize, to: usize },
    /// Marker absent after a streak of this length.
    Recovered { streak: u32 },
}

impl ThrottleEvent {
    pub fn needs_cooldown(&self) -> bool {
        matches!(self, ThrottleEvent::Reduced { .. })
    }
}

/// One-way safety valve: concurrency only ever goes down during a run.
#[derive(Debug, Clone)]
pub struct Throttle {
    streak: u32,
    threshold: u32,
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(RATE_LIMIT_THRESHOLD)
    }
}

impl Throttle {
    pub fn new(threshold: u32) -> Self {
        Self {
            streak: 0,
            threshold: threshold.max(1),
        }
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn observe(&mut self, rate_limited: bool, concurrency: &mut usize) -> ThrottleEvent {
        if !rate_limited {
            let streak = std::mem::take(&mut self.streak);
            return if streak > 0 {
                ThrottleEvent::Recovered { streak }
            } else {
                ThrottleEvent::Clear
            };
        }

        self.streak += 1;
        if self.streak < self.threshold {
            return ThrottleEvent::Hit { streak: self.streak };
        }

        self.streak = 0;
        let from = *concurrency;
        *concurrency = from.saturating_sub(1).max(1);
        ThrottleEvent::Reduced {
            from,
            to: *concurrency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_hits_cost_one_unit() {
        let mut throttle = Throttle::default();
        let mut concurrency = 50;
        for i in 1..5 {
            assert_eq!(throttle.observe(true, &mut concurrency), ThrottleEvent::Hit { streak: i });
        }
        assert_eq!(
            throttle.observe(true, &mut concurrency),
            ThrottleEvent::Reduced { from: 50, to: 49 }
        );
        assert_eq!(throttle.streak(), 0);

        // sixth hit starts a new streak
        assert_eq!(throttle.observe(true, &mut concurrency), ThrottleEvent::Hit { streak: 1 });
        assert_eq!(concurrency, 49);
        for _ in 0..4 {
            throttle.observe(true, &mut concurrency);
        }
        assert_eq!(concurrency, 48);
    }

    #[test]
    fn clean_response_resets_streak() {
        let mut throttle = Throttle::default();
        let mut concurrency = 10;
        throttle.observe(true, &mut concurrency);
        throttle.observe(true, &mut concurrency);
        assert_eq!(
            throttle.observe(false, &mut concurrency),
            ThrottleEvent::Recovered { streak: 2 }
        );
        assert_eq!(throttle.observe(false, &mut concurrency), ThrottleEvent::Clear);
        for _ in 0..4 {
            throttle.observe(true, &mut concurrency);
        }
        assert_eq!(concurrency, 10);
    }

    #[test]
    fn never_drops_below_one() {
        let mut throttle = Throttle::default();
        let mut concurrency = 2;
        for _ in 0..(RATE_LIMIT_THRESHOLD * 10) {
            throttle.observe(true, &mut concurrency);
        }
        assert_eq!(concurrency, 1);
        assert_eq!(throttle.streak(), 0);
    }

    #[test]
    fn only_reductions_need_cooldown() {
        assert!(ThrottleEvent::Reduced { from: 2, to: 1 }.needs_cooldown());
        assert!(!ThrottleEvent::Hit { streak: 3 }.needs_cooldown());
        assert!(!ThrottleEvent::Recovered { streak: 3 }.needs_cooldown());
    }
}
