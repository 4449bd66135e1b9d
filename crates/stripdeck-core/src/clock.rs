//! Time sources and timer primitives.
//!
//! Every component that reads "now" goes through [`Clock`], so the countdown
//! and the sampler can be driven by [`ManualClock`] in tests. Scheduling is
//! built on `tokio::time`, which honours a paused runtime clock
//! (`#[tokio::test(start_paused = true)]`); [`TokioClock`] reads that same
//! clock so timestamps and timers agree under simulation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Milliseconds on a clock's timeline.
pub type Millis = u64;

/// Source of the current time, in milliseconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> Millis;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Millis {
        (**self).now()
    }
}

/// Wall clock: milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Millis {
        unix_ms_now()
    }
}

pub(crate) fn unix_ms_now() -> Millis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Monotonic clock anchored to the wall clock at construction.
///
/// Advances with `tokio::time::Instant`, so it never jumps backwards and it
/// follows virtual time when the runtime clock is paused.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: tokio::time::Instant,
    origin_unix: Millis,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
            origin_unix: unix_ms_now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Millis {
        self.origin_unix + self.origin.elapsed().as_millis() as u64
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Millis) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    pub fn advance(&self, ms: Millis) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: Millis) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}

/// Repeating tick source with a fixed quantum.
///
/// Late ticks are delayed rather than bursted; callers recompute from an
/// absolute deadline, so a missed tick never needs to be replayed.
pub fn ticker(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// One-shot timer that delivers `event` on `tx` after a delay.
///
/// Cancelled by [`Scheduled::cancel`] or by dropping the handle, so a timer
/// can never outlive the state that armed it.
#[derive(Debug)]
pub struct Scheduled {
    token: CancellationToken,
    _guard: DropGuard,
}

impl Scheduled {
    pub fn after<E: Send + 'static>(delay: Duration, tx: UnboundedSender<E>, event: E) -> Self {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = child.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(event);
                }
            }
        });
        Self {
            _guard: token.clone().drop_guard(),
            token,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn manual_clock_advances_only_on_request() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now(), 1_000);
        clock.advance(50);
        assert_eq!(clock.now(), 1_050);
        clock.set(10);
        assert_eq!(clock.now(), 10);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now() > 1_577_836_800_000);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_virtual_time() {
        let clock = TokioClock::new();
        let start = clock.now();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(clock.now() - start, 250);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _timer = Scheduled::after(Duration::from_millis(100), tx, 7u32);
        let start = tokio::time::Instant::now();
        assert_eq!(rx.recv().await, Some(7));
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel::<u32>();
        let timer = Scheduled::after(Duration::from_millis(100), tx, 7);
        drop(timer);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel::<u32>();
        let timer = Scheduled::after(Duration::from_millis(100), tx, 7);
        timer.cancel();
        assert!(timer.is_cancelled());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }
}
