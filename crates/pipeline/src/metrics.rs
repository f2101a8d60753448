use serde::Serialize;
use std::time::{Duration, Instant};

fn as_millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1e6
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTiming {
    pub stage: String,
    pub elapsed_ms: f64,
}

/// Wall-clock time per pipeline stage, in the order stages finished.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StageTimings {
    pub stages: Vec<StageTiming>,
    pub total_ms: f64,
}

impl StageTimings {
    pub fn record(&mut self, stage: &str, duration: Duration) {
        let elapsed_ms = as_millis(duration);
        tracing::debug!(stage, elapsed_ms, "Stage finished");
        self.stages.push(StageTiming {
            stage: stage.to_string(),
            elapsed_ms,
        });
    }

    pub fn finish(&mut self, total: Duration) {
        self.total_ms = as_millis(total);
    }

    pub fn get(&self, stage: &str) -> Option<f64> {
        self.stages
            .iter()
            .find(|s| s.stage == stage)
            .map(|s| s.elapsed_ms)
    }
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Runs `f` and returns its output with the time it took.
    pub fn measure<T>(f: impl FnOnce() -> T) -> (T, Duration) {
        let timer = Self::start();
        let out = f();
        (out, timer.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_lookup() {
        let mut timings = StageTimings::default();
        timings.record("load", Duration::from_millis(12));
        timings.record("build", Duration::from_micros(1500));
        timings.finish(Duration::from_millis(20));

        assert_eq!(timings.get("load"), Some(12.0));
        assert_eq!(timings.get("build"), Some(1.5));
        assert_eq!(timings.get("missing"), None);
        assert_eq!(timings.total_ms, 20.0);
    }

    #[test]
    fn test_measure_returns_output() {
        let (value, elapsed) = TimedOperation::measure(|| 2 + 2);
        assert_eq!(value, 4);
        assert!(elapsed < Duration::from_secs(5));
    }
}
