use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use super::Phase;
use crate::engine::stats::Summary;

#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub target: usize,
    pub launched: usize,
    pub summary: Summary,
    pub failed: usize,
    pub timed_out: usize,
    pub wall_time_secs: f64,
    /// Set for the additional phase: the newly added agents' own results.
    pub joined: Option<JoinedCohort>,
    #[serde(skip)]
    pub started_at: Instant,
    #[serde(skip)]
    pub completed_at: Instant,
    #[serde(skip)]
    pub last_converged_at: Option<Instant>,
}

impl PhaseReport {
    /// Stat line in the format downstream result parsers expect.
    pub fn stat_line(&self, added: usize) -> String {
        let line = format!(
            "Mean discovery time: {:.6}s, variance: {:.6}s",
            self.summary.mean, self.summary.std_dev
        );
        match self.phase {
            Phase::Initial => line,
            Phase::Additional => format!("After adding {} nodes: {}", added, line),
        }
    }

    pub fn has_losses(&self) -> bool {
        self.failed > 0 || self.timed_out > 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinedCohort {
    pub launched: usize,
    pub converged: usize,
    pub failed: usize,
    pub timed_out: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub started: DateTime<Utc>,
    pub initial_count: usize,
    pub additional_count: usize,
    pub external_count: usize,
    pub initial: PhaseReport,
    pub additional: Option<PhaseReport>,
}

impl BenchmarkReport {
    /// One stat line per phase that ran. Loss counts stay out of the text
    /// output; they are logged and carried in the JSON form.
    pub fn render_text(&self) -> String {
        std::iter::once(&self.initial)
            .chain(self.additional.as_ref())
            .map(|report| report.stat_line(self.additional_count))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase_report(phase: Phase, mean: f64, std_dev: f64) -> PhaseReport {
        let now = Instant::now();
        PhaseReport {
            phase,
            target: 2,
            launched: 2,
            summary: Summary {
                mean,
                std_dev,
                samples: 2,
            },
            failed: 0,
            timed_out: 0,
            wall_time_secs: mean,
            joined: None,
            started_at: now,
            completed_at: now,
            last_converged_at: None,
        }
    }

    #[test]
    fn test_initial_stat_line() {
        let report = phase_report(Phase::Initial, 1.5, 0.25);
        assert_eq!(
            report.stat_line(0),
            "Mean discovery time: 1.500000s, variance: 0.250000s"
        );
    }

    #[test]
    fn test_additional_stat_line() {
        let report = phase_report(Phase::Additional, 2.0, 0.0);
        assert_eq!(
            report.stat_line(3),
            "After adding 3 nodes: Mean discovery time: 2.000000s, variance: 0.000000s"
        );
    }

    #[test]
    fn test_render_text_keeps_losses_off_stdout() {
        let mut initial = phase_report(Phase::Initial, 1.0, 0.0);
        initial.failed = 1;
        let report = BenchmarkReport {
            started: Utc::now(),
            initial_count: 3,
            additional_count: 0,
            external_count: 0,
            initial,
            additional: None,
        };

        let text = report.render_text();
        assert_eq!(text.lines().count(), 1);
        assert!(!text.contains("failed"));
        assert!(text.starts_with("Mean discovery time: "));
    }
}
