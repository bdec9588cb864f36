use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::agent::VirtualNodeAgent;
use super::stats::mean_std_dev;
use super::watcher::wait_for_count;
use crate::config::BenchConfig;
use crate::discovery::{DiscoveryProvider, NodeManager};
use crate::error::HarnessError;
use crate::types::{
    AgentOutcome, BenchmarkReport, JoinedCohort, Phase, PhaseReport, VirtualNode,
};

/// Drives both benchmark phases against one discovery provider.
pub struct Orchestrator {
    config: BenchConfig,
    provider: Arc<dyn DiscoveryProvider>,
}

impl Orchestrator {
    pub fn new(config: BenchConfig, provider: Arc<dyn DiscoveryProvider>) -> Self {
        Self { config, provider }
    }

    pub async fn run(&self) -> Result<BenchmarkReport> {
        self.run_with(|_| Ok(())).await
    }

    /// Run both phases, handing each phase report to `on_phase` as soon as
    /// that phase completes.
    ///
    /// The initial report reaches `on_phase` before the additional phase
    /// starts, so it survives an additional phase that errors out.
    pub async fn run_with<F>(&self, mut on_phase: F) -> Result<BenchmarkReport>
    where
        F: FnMut(&PhaseReport) -> Result<()>,
    {
        self.config.validate()?;
        let started = Utc::now();

        let (initial, managers) = self.run_initial_phase().await?;
        on_phase(&initial)?;

        let additional = if self.config.additional_count > 0 {
            let report = self.run_additional_phase(managers).await?;
            on_phase(&report)?;
            Some(report)
        } else {
            None
        };

        Ok(BenchmarkReport {
            started,
            initial_count: self.config.initial_count,
            additional_count: self.config.additional_count,
            external_count: self.config.external_count,
            initial,
            additional,
        })
    }

    /// Launch the initial cohort and wait for every agent to report.
    ///
    /// Returns the managers of the agents that converged.
    pub async fn run_initial_phase(&self) -> Result<(PhaseReport, Vec<Arc<dyn NodeManager>>)> {
        let count = self.config.initial_count;
        let target = self.config.initial_target();
        let started_at = Instant::now();
        let deadline = self.deadline_from(started_at);

        log::info!("Starting {} nodes, expecting {} in total", count, target);

        let (tx, rx) = mpsc::channel(count.max(1));
        self.spawn_agents(count, target, deadline, &tx);
        drop(tx);

        let results = collect(rx, count).await;
        let report = summarize(Phase::Initial, target, &results, started_at, None)?;

        let managers = results
            .into_iter()
            .filter(|n| n.outcome.is_converged())
            .filter_map(|n| n.manager)
            .collect();

        Ok((report, managers))
    }

    /// Add the extra cohort and measure how long the first cohort's managers take
    /// to see it.
    pub async fn run_additional_phase(
        &self,
        managers: Vec<Arc<dyn NodeManager>>,
    ) -> Result<PhaseReport> {
        let added = self.config.additional_count;
        let target = self.config.escalated_target();
        let started_at = Instant::now();
        let deadline = self.deadline_from(started_at);

        log::info!(
            "Adding {} nodes, {} existing nodes now expect {}",
            added,
            managers.len(),
            target
        );

        let (joined_tx, joined_rx) = mpsc::channel(added.max(1));
        self.spawn_agents(added, target, deadline, &joined_tx);
        drop(joined_tx);

        let watchers = managers.len();
        let (watch_tx, watch_rx) = mpsc::channel(watchers.max(1));
        for manager in managers {
            let tx = watch_tx.clone();
            let interval = self.config.poll_interval;
            tokio::spawn(async move {
                let node = wait_for_count(manager, target, interval, deadline).await;
                let _ = tx.send(node).await;
            });
        }
        drop(watch_tx);

        let results = collect(watch_rx, watchers).await;
        let joined = joined_cohort(&collect(joined_rx, added).await);
        log::info!(
            "Added nodes: {}/{} converged",
            joined.converged,
            joined.launched
        );

        summarize(Phase::Additional, target, &results, started_at, Some(joined))
    }

    fn spawn_agents(
        &self,
        count: usize,
        target: usize,
        deadline: Option<Instant>,
        tx: &mpsc::Sender<VirtualNode>,
    ) {
        for _ in 0..count {
            let agent = VirtualNodeAgent::new(self.provider.clone(), self.config.poll_interval)
                .with_deadline(deadline);
            let tx = tx.clone();
            tokio::spawn(async move {
                let node = agent.run(target).await;
                let _ = tx.send(node).await;
            });
        }
    }

    fn deadline_from(&self, started_at: Instant) -> Option<Instant> {
        self.config.phase_timeout.map(|t| started_at + t)
    }
}

/// Receive exactly `expected` results in arrival order.
///
/// Tasks that died without sending are counted as failed once every sender
/// is gone.
async fn collect(mut rx: mpsc::Receiver<VirtualNode>, expected: usize) -> Vec<VirtualNode> {
    let mut results = Vec::with_capacity(expected);

    while results.len() < expected {
        match rx.recv().await {
            Some(node) => results.push(node),
            None => {
                let missing = expected - results.len();
                log::warn!("{} tasks exited without reporting", missing);
                let reason = "task exited without reporting";
                results.extend((0..missing).map(|_| VirtualNode::failed(None, reason)));
            }
        }
    }

    results
}

fn count_outcomes(results: &[VirtualNode]) -> (usize, usize) {
    results.iter().fold((0, 0), |(failed, timed_out), n| match n.outcome {
        AgentOutcome::Failed(_) => (failed + 1, timed_out),
        AgentOutcome::TimedOut => (failed, timed_out + 1),
        AgentOutcome::Converged => (failed, timed_out),
    })
}

fn joined_cohort(results: &[VirtualNode]) -> JoinedCohort {
    let (failed, timed_out) = count_outcomes(results);
    JoinedCohort {
        launched: results.len(),
        converged: results.len() - failed - timed_out,
        failed,
        timed_out,
    }
}

fn summarize(
    phase: Phase,
    target: usize,
    results: &[VirtualNode],
    started_at: Instant,
    joined: Option<JoinedCohort>,
) -> Result<PhaseReport> {
    let completed_at = Instant::now();
    let (failed, timed_out) = count_outcomes(results);

    let samples: Vec<f64> = results
        .iter()
        .filter(|n| n.outcome.is_converged())
        .map(|n| n.elapsed.as_secs_f64())
        .collect();
    let last_converged_at = results.iter().filter_map(|n| n.converged_at).max();

    if failed + timed_out > 0 {
        log::warn!("{} phase: {} failed, {} timed out", phase, failed, timed_out);
    }

    let summary = mean_std_dev(&samples).map_err(|_| HarnessError::NoSamples {
        phase,
        failed,
        timed_out,
    })?;

    log::info!(
        "{} phase: {} samples, mean {:.6}s, std dev {:.6}s",
        phase,
        summary.samples,
        summary.mean,
        summary.std_dev
    );

    Ok(PhaseReport {
        phase,
        target,
        launched: results.len(),
        summary,
        failed,
        timed_out,
        wall_time_secs: completed_at.duration_since(started_at).as_secs_f64(),
        joined,
        started_at,
        completed_at,
        last_converged_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn converged(secs: f64) -> VirtualNode {
        VirtualNode {
            identity: None,
            elapsed: Duration::from_secs_f64(secs),
            outcome: AgentOutcome::Converged,
            manager: None,
            converged_at: None,
        }
    }

    #[tokio::test]
    async fn test_collect_fills_missing_results() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(converged(1.0)).await.unwrap();
        drop(tx);

        let results = collect(rx, 3).await;
        assert_eq!(results.len(), 3);
        assert_eq!(count_outcomes(&results), (2, 0));
    }

    #[test]
    fn test_summarize_excludes_failures() {
        let results = vec![
            converged(1.0),
            converged(3.0),
            VirtualNode::failed(None, "boom"),
            VirtualNode::timed_out(None, None),
        ];
        let report = summarize(Phase::Initial, 4, &results, Instant::now(), None).unwrap();

        assert_eq!(report.launched, 4);
        assert_eq!(report.summary.samples, 2);
        assert_eq!(report.summary.mean, 2.0);
        assert_eq!(report.failed, 1);
        assert_eq!(report.timed_out, 1);
    }

    #[test]
    fn test_summarize_without_samples_is_error() {
        let results = vec![VirtualNode::failed(None, "boom")];
        let err = summarize(Phase::Additional, 1, &results, Instant::now(), None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HarnessError>(),
            Some(HarnessError::NoSamples {
                phase: Phase::Additional,
                failed: 1,
                timed_out: 0
            })
        ));
    }

    #[test]
    fn test_joined_cohort_counts() {
        let joined = joined_cohort(&[converged(0.5), VirtualNode::timed_out(None, None)]);
        assert_eq!(joined.launched, 2);
        assert_eq!(joined.converged, 1);
        assert_eq!(joined.timed_out, 1);
    }
}
