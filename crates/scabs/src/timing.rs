//! Explicit stage timing.
//!
//! Each pipeline stage starts a `StageTimer` and records it into the
//! `Timings` it returns; there is no global timer state.

use std::time::{Duration, Instant};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Timings {
    stages: Vec<(String, Duration)>,
}

impl Timings {
    pub fn record(&mut self, stage: impl Into<String>, elapsed: Duration) {
        self.stages.push((stage.into(), elapsed));
    }

    pub fn stages(&self) -> &[(String, Duration)] {
        &self.stages
    }

    pub fn get(&self, stage: &str) -> Option<Duration> {
        self.stages.iter().find(|(s, _)| s == stage).map(|(_, d)| *d)
    }

    pub fn total(&self) -> Duration {
        self.stages.iter().map(|(_, d)| *d).sum()
    }
}

#[must_use = "a started timer records nothing until finished"]
pub struct StageTimer {
    name: &'static str,
    start: Instant,
}

impl StageTimer {
    pub fn start(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    pub fn finish(self, timings: &mut Timings) -> Duration {
        let elapsed = self.start.elapsed();
        tracing::info!(stage = self.name, elapsed_ms = elapsed.as_secs_f64() * 1e3, "stage finished");
        timings.record(self.name, elapsed);
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_recorded_in_order() {
        let mut t = Timings::default();
        let a = StageTimer::start("partition").finish(&mut t);
        t.record("probabilities", Duration::from_millis(5));
        assert_eq!(t.stages()[0].0, "partition");
        assert_eq!(t.get("partition"), Some(a));
        assert_eq!(t.get("missing"), None);
        assert!(t.total() >= Duration::from_millis(5));
    }
}
