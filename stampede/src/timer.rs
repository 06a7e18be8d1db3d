use std::fmt;
use std::time::Duration;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};

/// Paces the run loop and says when a progress report is due.
///
/// The loop wakes every `tick`; every `report_every` worth of ticks, [`Self::tick`] hands back
/// the measured length of the reporting window.
pub(crate) struct ProgressTimer {
    interval: Interval,
    report_every: Duration,
    window_start: Instant,
    ticks: u64,
}

impl ProgressTimer {
    pub fn new(tick: Duration, report_every: Duration) -> Self {
        let mut interval = interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // NOTE: `interval` fires immediately; push the first tick out by one period.
        interval.reset();
        Self {
            interval,
            report_every,
            window_start: Instant::now(),
            ticks: 0,
        }
    }

    /// Wait for the next tick. Returns the window length when a report is due.
    pub async fn tick(&mut self) -> Option<Duration> {
        self.interval.tick().await;
        let now = Instant::now();
        self.ticks += 1;

        let window = now.duration_since(self.window_start);
        if window < self.report_every {
            return None;
        }
        self.window_start = now;
        Some(window)
    }
}

impl fmt::Display for ProgressTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ticks of {}",
            self.ticks,
            humantime::format_duration(self.interval.period())
        )
    }
}
