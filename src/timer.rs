//! Frame timing and profiling.

use std::fmt;
use std::time::{Duration, Instant};

use crate::filter::ema::{Ema, EmaState};
use crate::filter::Filter;

/// Measures how long an operation takes, averaged over time.
///
/// Displaying a timer with `{}` prints its name and the averaged duration.
pub struct Timer {
    name: &'static str,
    ema: Ema,
    state: EmaState,
    average: Option<f32>,
    count: u32,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            ema: Ema::new(0.1),
            state: EmaState::default(),
            average: None,
            count: 0,
        }
    }

    /// Invokes `timee`, recording the time it takes.
    pub fn time<T>(&mut self, timee: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        timee()
    }

    /// Starts timing an operation. The time is recorded when the returned guard is dropped.
    pub fn start(&mut self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            timer: self,
        }
    }

    /// Returns the averaged duration in milliseconds, or `None` if nothing was timed yet.
    pub fn average_ms(&self) -> Option<f32> {
        self.average
    }

    fn record(&mut self, duration: Duration) {
        self.count += 1;
        let ms = duration.as_secs_f32() * 1000.0;
        self.average = Some(Filter::filter(&self.ema, &mut self.state, ms));
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.average_ms() {
            Some(avg) => write!(f, "{}: {}x{:.01}ms", self.name, self.count, avg),
            None => write!(f, "{}: -", self.name),
        }
    }
}

/// Guard returned by [`Timer::start`].
pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a mut Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.record(self.start.elapsed());
    }
}

/// Counts frames and logs the frame rate once per second.
pub struct FpsCounter {
    name: String,
    frames: u32,
    start: Instant,
}

impl FpsCounter {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            start: Instant::now(),
        }
    }

    /// Counts a frame.
    pub fn tick(&mut self) {
        self.tick_with(std::iter::empty::<&Timer>());
    }

    /// Counts a frame, including `timers` in the log line when one is emitted.
    pub fn tick_with<'a, I>(&mut self, timers: I)
    where
        I: IntoIterator<Item = &'a Timer>,
    {
        self.frames += 1;
        if self.start.elapsed() < Duration::from_secs(1) {
            return;
        }

        let extra = timers
            .into_iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>();
        if extra.is_empty() {
            log::debug!("{}: {} FPS", self.name, self.frames);
        } else {
            log::debug!("{}: {} FPS ({})", self.name, self.frames, extra.join(", "));
        }

        self.frames = 0;
        self.start = Instant::now();
    }
}

/// Results older than this are considered stale and pause the statistics.
pub const STALE_RESULT_MS: f64 = 500.0;

/// What the status line should show after a draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawStatus {
    /// The latest result is stale; detection is paused or stuck.
    Paused,
    Running {
        /// Detection rate implied by the age of the drawn result.
        process: f64,
        /// Rate at which the display is being refreshed.
        refresh: f64,
        /// Detection rate averaged over all draws so far.
        average: f64,
    },
}

impl fmt::Display for DrawStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrawStatus::Paused => f.write_str("paused"),
            DrawStatus::Running {
                process,
                refresh,
                average,
            } => write!(
                f,
                "process{:5.1} | refresh{:5.1} | avg{:5.1}",
                process, refresh, average
            ),
        }
    }
}

/// Draw-loop statistics, fed once per drawn result.
#[derive(Debug, Default)]
pub struct DrawStats {
    count: u64,
    total_age_ms: f64,
    last_draw_ms: Option<f64>,
}

impl DrawStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a draw at `now_ms` of a result produced at `result_ts_ms`.
    pub fn update(&mut self, now_ms: f64, result_ts_ms: f64) -> DrawStatus {
        let age = now_ms - result_ts_ms;
        if age > STALE_RESULT_MS {
            return DrawStatus::Paused;
        }
        // Results stamped in the same millisecond (or slightly in the future) still count.
        let age = age.max(1.0);

        let since_last = self
            .last_draw_ms
            .map_or(age, |last| (now_ms - last).max(1.0));
        self.last_draw_ms = Some(now_ms);
        self.count += 1;
        self.total_age_ms += age;

        DrawStatus::Running {
            process: 1000.0 / age,
            refresh: 1000.0 / since_last,
            average: 1000.0 * self.count as f64 / self.total_age_ms,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}
