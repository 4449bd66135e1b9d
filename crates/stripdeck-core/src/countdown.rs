//! Drift-free countdown to the device's next effect change.
//!
//! The remaining time is recomputed from an absolute deadline on every tick,
//! so late or skipped ticks never accumulate error. The expiry signal is
//! one-shot per activation.

use std::sync::Arc;

use crate::clock::{Clock, Millis};

/// Result of one [`CountdownTimer::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// No activation in progress.
    Inactive,
    /// Still counting; `expired` is true exactly once per activation.
    Running { remaining: i64, expired: bool },
    /// Deadline passed; the display is frozen and no further ticks are needed.
    Overrun { expired: bool },
}

impl Tick {
    pub fn expired(self) -> bool {
        matches!(
            self,
            Tick::Running { expired: true, .. } | Tick::Overrun { expired: true }
        )
    }
}

pub struct CountdownTimer {
    clock: Arc<dyn Clock>,
    threshold: Millis,
    deadline: Option<Millis>,
    display: Option<Millis>,
    fired: bool,
    overrun: bool,
}

impl std::fmt::Debug for CountdownTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountdownTimer")
            .field("threshold", &self.threshold)
            .field("deadline", &self.deadline)
            .field("display", &self.display)
            .field("fired", &self.fired)
            .field("overrun", &self.overrun)
            .finish()
    }
}

impl CountdownTimer {
    pub fn new(clock: Arc<dyn Clock>, threshold: Millis) -> Self {
        Self {
            clock,
            threshold,
            deadline: None,
            display: None,
            fired: false,
            overrun: false,
        }
    }

    /// Start counting down `duration` ms from now.
    ///
    /// A zero duration leaves the countdown inactive. Any previous deadline
    /// and one-shot guard are discarded. Returns whether the countdown runs.
    pub fn activate(&mut self, duration: Millis) -> bool {
        self.deactivate();
        if duration == 0 {
            return false;
        }
        // Saturates rather than wrapping for durations near `Millis::MAX`.
        self.deadline = Some(self.clock.now().saturating_add(duration));
        self.display = Some(duration);
        true
    }

    pub fn deactivate(&mut self) {
        self.deadline = None;
        self.display = None;
        self.fired = false;
        self.overrun = false;
    }

    pub fn is_active(&self) -> bool {
        self.deadline.is_some()
    }

    /// True while ticks can still change the display or fire the signal.
    pub fn needs_ticks(&self) -> bool {
        self.is_active() && !self.overrun
    }

    /// Last published remaining time; never negative.
    pub fn display(&self) -> Option<Millis> {
        self.display
    }

    pub fn tick(&mut self) -> Tick {
        let Some(deadline) = self.deadline else {
            return Tick::Inactive;
        };
        let now = self.clock.now();
        let remaining = remaining_ms(deadline, now);
        if deadline >= now {
            self.display = Some(deadline - now);
        }

        let threshold = i64::try_from(self.threshold).unwrap_or(i64::MAX);
        let expired = !self.fired && remaining <= threshold;
        if expired {
            self.fired = true;
        }

        if remaining < 0 {
            self.overrun = true;
            Tick::Overrun { expired }
        } else {
            Tick::Running { remaining, expired }
        }
    }
}

/// `deadline - now` as a signed value, clamped to the `i64` range.
fn remaining_ms(deadline: Millis, now: Millis) -> i64 {
    let diff = i128::from(deadline) - i128::from(now);
    diff.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn timer(threshold: Millis) -> (Arc<ManualClock>, CountdownTimer) {
        let clock = Arc::new(ManualClock::new(10_000));
        let timer = CountdownTimer::new(clock.clone(), threshold);
        (clock, timer)
    }

    #[test]
    fn zero_duration_stays_inactive() {
        let (_, mut t) = timer(100);
        assert!(!t.activate(0));
        assert!(!t.is_active());
        assert_eq!(t.tick(), Tick::Inactive);
        assert_eq!(t.display(), None);
    }

    #[test]
    fn activation_publishes_full_duration() {
        let (_, mut t) = timer(100);
        assert!(t.activate(500));
        assert_eq!(t.display(), Some(500));
        assert!(t.needs_ticks());
    }

    #[test]
    fn display_tracks_deadline_within_one_tick() {
        let (clock, mut t) = timer(100);
        t.activate(1_000);
        for elapsed in (50..=1_000).step_by(50) {
            clock.advance(50);
            t.tick();
            assert_eq!(t.display(), Some(1_000 - elapsed));
        }
    }

    #[test]
    fn late_ticks_do_not_drift() {
        let (clock, mut t) = timer(100);
        t.activate(1_000);
        // scheduler delivered ticks late and unevenly
        for step in [73, 51, 120, 49, 230] {
            clock.advance(step);
            t.tick();
        }
        assert_eq!(t.display(), Some(1_000 - 523));
    }

    #[test]
    fn fires_once_at_threshold() {
        let (clock, mut t) = timer(100);
        t.activate(500);
        let mut fired_at = Vec::new();
        for i in 1..=20 {
            clock.advance(50);
            if t.tick().expired() {
                fired_at.push(i * 50);
            }
        }
        assert_eq!(fired_at, vec![400]);
    }

    #[test]
    fn freezes_at_last_non_negative_value() {
        let (clock, mut t) = timer(100);
        t.activate(120);
        clock.advance(100);
        t.tick();
        assert_eq!(t.display(), Some(20));
        clock.advance(100);
        assert_eq!(t.tick(), Tick::Overrun { expired: false });
        assert_eq!(t.display(), Some(20));
        assert!(!t.needs_ticks());
        assert!(t.is_active());
    }

    #[test]
    fn overrun_on_first_tick_still_fires() {
        let (clock, mut t) = timer(100);
        t.activate(30);
        clock.advance(500);
        assert_eq!(t.tick(), Tick::Overrun { expired: true });
        assert_eq!(t.display(), Some(30));
    }

    #[test]
    fn reactivation_rearms_the_guard() {
        let (clock, mut t) = timer(100);
        t.activate(200);
        clock.advance(150);
        assert!(t.tick().expired());
        clock.advance(50);
        assert!(!t.tick().expired());

        t.activate(300);
        assert_eq!(t.display(), Some(300));
        clock.advance(250);
        assert!(t.tick().expired());
        clock.advance(10);
        assert!(!t.tick().expired());
    }

    #[test]
    fn deactivate_clears_state() {
        let (clock, mut t) = timer(100);
        t.activate(200);
        clock.advance(150);
        t.tick();
        t.deactivate();
        assert!(!t.is_active());
        assert_eq!(t.display(), None);
        assert_eq!(t.tick(), Tick::Inactive);
    }

    #[test]
    fn huge_duration_saturates_instead_of_overflowing() {
        let (clock, mut t) = timer(100);
        assert!(t.activate(Millis::MAX));
        assert_eq!(t.display(), Some(Millis::MAX));
        clock.advance(50);
        assert_eq!(
            t.tick(),
            Tick::Running {
                remaining: i64::MAX,
                expired: false
            }
        );
        assert_eq!(t.display(), Some(Millis::MAX - 10_050));
        assert!(t.needs_ticks());
    }

    #[test]
    fn deadline_beyond_i64_range_ticks() {
        let (clock, mut t) = timer(100);
        t.activate(i64::MAX as Millis + 5);
        clock.advance(1_000);
        assert_eq!(
            t.tick(),
            Tick::Running {
                remaining: i64::MAX - 995,
                expired: false
            }
        );
        assert_eq!(t.display(), Some(i64::MAX as Millis - 995));
    }

    #[test]
    fn remaining_is_signed_difference() {
        assert_eq!(remaining_ms(1_000, 400), 600);
        assert_eq!(remaining_ms(400, 1_000), -600);
        assert_eq!(remaining_ms(Millis::MAX, 0), i64::MAX);
        assert_eq!(remaining_ms(0, Millis::MAX), i64::MIN);
    }

    #[test]
    fn duration_below_threshold_fires_on_first_tick() {
        let (clock, mut t) = timer(100);
        t.activate(80);
        clock.advance(1);
        assert_eq!(t.tick(), Tick::Running { remaining: 79, expired: true });
    }
}
