//! Time-gated task bookkeeping.
//!
//! Every periodic activity of the firmware is gated by a [`TaskSchedule`]. The
//! clock is a wrapping millisecond counter, so all comparisons go through
//! `wrapping_sub` and stay correct across the ~49.7 day overflow.

/// Milliseconds since boot. Wraps at `u32::MAX`.
pub type ClockTick = u32;

pub const WEATHER_INTERVAL_MS: u32 = 10 * 60 * 1_000;
pub const PROPAGATION_INTERVAL_MS: u32 = 60 * 60 * 1_000;
pub const POTA_INTERVAL_MS: u32 = 3 * 60 * 1_000;
pub const DX_KEEPALIVE_INTERVAL_MS: u32 = 30 * 1_000;
pub const RECONNECT_BACKOFF_MS: u32 = 20_000;
pub const DISPLAY_REFRESH_MS: u32 = 1_000;

/// Elapsed milliseconds from `since` to `now`, tolerant of counter wrap.
#[inline]
pub const fn elapsed_ms(now: ClockTick, since: ClockTick) -> u32 {
    now.wrapping_sub(since)
}

/// One periodic task: its interval and the tick it last ran at.
///
/// A schedule that never ran is due immediately, so every task fires on the
/// first scheduler pass after boot.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TaskSchedule {
    name: &'static str,
    interval_ms: u32,
    last_run: Option<ClockTick>,
}

impl TaskSchedule {
    pub const fn new(name: &'static str, interval_ms: u32) -> Self {
        Self {
            name,
            interval_ms,
            last_run: None,
        }
    }

    /// Creates a schedule that behaves as if it last ran at `last_run`.
    pub const fn with_last_run(mut self, last_run: ClockTick) -> Self {
        self.last_run = Some(last_run);
        self
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub const fn last_run(&self) -> Option<ClockTick> {
        self.last_run
    }

    pub fn is_due(&self, now: ClockTick) -> bool {
        match self.last_run {
            None => true,
            Some(last) => elapsed_ms(now, last) >= self.interval_ms,
        }
    }

    /// Records that the task ran at `now`. Call only after the action executed.
    pub fn mark_run(&mut self, now: ClockTick) {
        self.last_run = Some(now);
    }

    /// Milliseconds until the task becomes due, `0` when already due.
    pub fn remaining_ms(&self, now: ClockTick) -> u32 {
        match self.last_run {
            None => 0,
            Some(last) => self.interval_ms.saturating_sub(elapsed_ms(now, last)),
        }
    }
}

/// Fire-and-forget periodic polls.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PollTask {
    Weather,
    Propagation,
    Pota,
}

impl PollTask {
    pub const ALL: [Self; 3] = [Self::Weather, Self::Propagation, Self::Pota];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Propagation => "propagation",
            Self::Pota => "pota",
        }
    }
}

/// Scheduler-owned timers that are not tied to a peer connection.
///
/// The per-peer reconnect and keepalive timers live with their
/// [`crate::link::PeerLink`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TaskTimers {
    pub weather: TaskSchedule,
    pub propagation: TaskSchedule,
    pub pota: TaskSchedule,
    pub display_refresh: TaskSchedule,
}

impl TaskTimers {
    pub const fn new() -> Self {
        Self {
            weather: TaskSchedule::new("weather", WEATHER_INTERVAL_MS),
            propagation: TaskSchedule::new("propagation", PROPAGATION_INTERVAL_MS),
            pota: TaskSchedule::new("pota", POTA_INTERVAL_MS),
            display_refresh: TaskSchedule::new("display", DISPLAY_REFRESH_MS),
        }
    }

    pub fn poll(&self, task: PollTask) -> &TaskSchedule {
        match task {
            PollTask::Weather => &self.weather,
            PollTask::Propagation => &self.propagation,
            PollTask::Pota => &self.pota,
        }
    }

    pub fn poll_mut(&mut self, task: PollTask) -> &mut TaskSchedule {
        match task {
            PollTask::Weather => &mut self.weather,
            PollTask::Propagation => &mut self.propagation,
            PollTask::Pota => &mut self.pota,
        }
    }
}

impl Default for TaskTimers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn never_run_task_is_due_immediately() {
        let task = TaskSchedule::new("weather", WEATHER_INTERVAL_MS);
        assert!(task.is_due(0));
        assert_eq!(task.remaining_ms(0), 0);
    }

    #[test]
    fn ten_minute_weather_scenario() {
        let mut task = TaskSchedule::new("weather", 600_000).with_last_run(0);

        assert!(!task.is_due(599_999));
        assert!(task.is_due(600_000));

        task.mark_run(600_000);
        assert!(!task.is_due(1_199_999));
        assert!(task.is_due(1_200_000));
    }

    #[test]
    fn due_check_survives_counter_wrap() {
        let last = u32::MAX - 100;
        let task = TaskSchedule::new("pota", 1_000).with_last_run(last);

        assert!(!task.is_due(last.wrapping_add(999)));
        assert!(task.is_due(last.wrapping_add(1_000)));
        assert_eq!(task.remaining_ms(last.wrapping_add(400)), 600);
    }

    #[test]
    fn poll_accessors_reach_matching_timer() {
        let mut timers = TaskTimers::new();
        timers.poll_mut(PollTask::Pota).mark_run(42);

        assert_eq!(timers.pota.last_run(), Some(42));
        assert_eq!(timers.poll(PollTask::Weather).last_run(), None);
        assert_eq!(timers.poll(PollTask::Propagation).interval_ms(), 3_600_000);
    }

    proptest! {
        #[test]
        fn due_iff_interval_elapsed(last in any::<u32>(), interval in 1u32..=u32::MAX / 2, offset in 0u32..=u32::MAX / 2) {
            let task = TaskSchedule::new("prop", interval).with_last_run(last);
            let now = last.wrapping_add(offset);
            prop_assert_eq!(task.is_due(now), offset >= interval);
        }

        #[test]
        fn not_due_stays_monotonic_until_interval(last in any::<u32>(), interval in 2u32..=1_000_000, step in 1u32..=1_000_000) {
            let task = TaskSchedule::new("prop", interval).with_last_run(last);
            let first = last.wrapping_add(interval - 1);
            prop_assert!(!task.is_due(first));

            let second = first.wrapping_add(step);
            prop_assert!(task.is_due(second));
        }
    }
}
