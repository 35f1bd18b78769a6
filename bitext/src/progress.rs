//! Wall clock progress reporting for loops over a known number of batches.
use std::time::{Duration, Instant};

/// Estimates how much longer a fixed number of units of work (usually batches) will take, assuming
/// the remaining units take as long on average as the ones already done.
#[derive(Clone, Debug)]
pub struct Progress {
    started: Instant,
    total_units: usize,
}

impl Progress {
    pub fn new(total_units: usize) -> Self {
        Self {
            started: Instant::now(),
            total_units,
        }
    }

    pub fn total_units(&self) -> usize {
        self.total_units
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Something like `Time taken 01:05, Estimated time left 12:40`
    pub fn remains(&self, done_units: usize) -> String {
        format_remains(self.elapsed(), done_units, self.total_units)
    }
}

fn format_remains(elapsed: Duration, done_units: usize, total_units: usize) -> String {
    let taken = format_minutes(elapsed);

    if done_units == 0 {
        return format!("Time taken {taken}, Estimated time left unknown");
    }

    let left_units = total_units.saturating_sub(done_units) as f64;
    let left = Duration::try_from_secs_f64(elapsed.as_secs_f64() * left_units / done_units as f64)
        .unwrap_or(Duration::MAX);

    format!(
        "Time taken {taken}, Estimated time left {}",
        format_minutes(left)
    )
}

fn format_minutes(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
