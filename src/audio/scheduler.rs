// Playback scheduling for streamed model speech.
//
// Audio arrives from the live session in many small buffers. To sound like
// one continuous utterance they must be queued back to back: each buffer
// starts either now (if the line is idle) or exactly where the previous
// buffer ends. The scheduler owns that cursor and the set of buffers still
// playing; the actual sample delivery lives in the playback sink.
//
// Time comes from an injected clock so the arithmetic can be tested
// without waiting on real playback.

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source for the scheduler.
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Production clock backed by [`Instant`].
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// One buffer currently scheduled on the line.
#[derive(Debug, Clone, Copy)]
struct ScheduledBuffer {
    end: Duration,
}

/// Bookkeeping for gapless playback of streamed audio buffers.
pub struct PlaybackScheduler {
    clock: Arc<dyn Clock>,
    /// Where the next buffer should begin.
    next_start: Duration,
    /// Buffers scheduled and not yet finished.
    active: Vec<ScheduledBuffer>,
}

impl PlaybackScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            clock,
            next_start: now,
            active: Vec::new(),
        }
    }

    /// Schedule one buffer of the given length.
    ///
    /// The buffer starts at `max(now, cursor)`: back to back with the
    /// previous buffer while playback is ahead of real time, immediately
    /// when the line has gone idle. Returns the start time, or `None` for
    /// an empty buffer, which would corrupt the cursor if admitted.
    pub fn schedule(&mut self, duration: Duration) -> Option<Duration> {
        if duration.is_zero() {
            return None;
        }
        let now = self.clock.now();
        let start = now.max(self.next_start);
        self.next_start = start + duration;
        self.active.push(ScheduledBuffer {
            end: self.next_start,
        });
        Some(start)
    }

    /// Retire buffers whose play time has passed. Returns how many are
    /// still playing.
    pub fn finish_elapsed(&mut self) -> usize {
        let now = self.clock.now();
        self.active.retain(|b| b.end > now);
        self.active.len()
    }

    /// Cut off everything scheduled and snap the cursor to now.
    ///
    /// This is the barge-in path: the user started talking over the
    /// model, so queued speech is stale. Returns how many buffers were
    /// cut off.
    pub fn interrupt(&mut self) -> usize {
        let cut = self.active.len();
        self.active.clear();
        self.next_start = self.clock.now();
        cut
    }

    /// Forget all scheduling state. Used at session teardown so a later
    /// session starts from a clean cursor.
    pub fn reset(&mut self) {
        self.active.clear();
        self.next_start = self.clock.now();
    }

    /// Buffers scheduled and not yet retired.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Current cursor position.
    pub fn next_start(&self) -> Duration {
        self.next_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ManualClock {
        now: Mutex<Duration>,
    }

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(Duration::ZERO),
            })
        }

        fn advance(&self, by: Duration) {
            *self.now.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Duration {
            *self.now.lock().unwrap()
        }
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_buffers_are_scheduled_back_to_back() {
        let clock = ManualClock::new();
        let mut sched = PlaybackScheduler::new(clock.clone());

        assert_eq!(sched.schedule(ms(250)), Some(ms(0)));
        assert_eq!(sched.schedule(ms(250)), Some(ms(250)));
        assert_eq!(sched.schedule(ms(100)), Some(ms(500)));
        assert_eq!(sched.next_start(), ms(600));
        assert_eq!(sched.active_count(), 3);
    }

    #[test]
    fn test_stale_cursor_snaps_forward_to_now() {
        let clock = ManualClock::new();
        let mut sched = PlaybackScheduler::new(clock.clone());

        sched.schedule(ms(100));
        clock.advance(ms(5_000));

        // The line drained long ago; the next buffer starts now, not at
        // the old cursor.
        assert_eq!(sched.schedule(ms(100)), Some(ms(5_000)));
        assert_eq!(sched.next_start(), ms(5_100));
    }

    #[test]
    fn test_empty_buffer_is_rejected() {
        let clock = ManualClock::new();
        let mut sched = PlaybackScheduler::new(clock.clone());

        sched.schedule(ms(100));
        let cursor = sched.next_start();

        assert_eq!(sched.schedule(Duration::ZERO), None);
        assert_eq!(sched.next_start(), cursor);
        assert_eq!(sched.active_count(), 1);
    }

    #[test]
    fn test_finished_buffers_are_retired() {
        let clock = ManualClock::new();
        let mut sched = PlaybackScheduler::new(clock.clone());

        sched.schedule(ms(100));
        sched.schedule(ms(100));
        sched.schedule(ms(100));

        clock.advance(ms(150));
        assert_eq!(sched.finish_elapsed(), 2);

        clock.advance(ms(150));
        assert_eq!(sched.finish_elapsed(), 0);
    }

    #[test]
    fn test_retirement_does_not_move_the_cursor() {
        let clock = ManualClock::new();
        let mut sched = PlaybackScheduler::new(clock.clone());

        sched.schedule(ms(100));
        clock.advance(ms(200));
        sched.finish_elapsed();

        // Cursor only moves on schedule/interrupt/reset.
        assert_eq!(sched.next_start(), ms(100));
    }

    #[test]
    fn test_interrupt_cuts_everything_and_resets_cursor() {
        let clock = ManualClock::new();
        let mut sched = PlaybackScheduler::new(clock.clone());

        sched.schedule(ms(300));
        sched.schedule(ms(300));
        sched.schedule(ms(300));
        clock.advance(ms(50));

        assert_eq!(sched.interrupt(), 3);
        assert_eq!(sched.active_count(), 0);
        assert_eq!(sched.next_start(), ms(50));

        // New speech after the barge-in starts immediately.
        assert_eq!(sched.schedule(ms(200)), Some(ms(50)));
    }

    #[test]
    fn test_interrupt_on_idle_line_is_harmless() {
        let clock = ManualClock::new();
        let mut sched = PlaybackScheduler::new(clock.clone());

        clock.advance(ms(40));
        assert_eq!(sched.interrupt(), 0);
        assert_eq!(sched.next_start(), ms(40));
    }

    #[test]
    fn test_reset_clears_state() {
        let clock = ManualClock::new();
        let mut sched = PlaybackScheduler::new(clock.clone());

        sched.schedule(ms(500));
        clock.advance(ms(20));
        sched.reset();

        assert_eq!(sched.active_count(), 0);
        assert_eq!(sched.next_start(), ms(20));
    }
}
