use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::discovery::NodeManager;
use crate::types::VirtualNode;

/// Poll `manager` until it knows at least `target` nodes.
///
/// Returns `false` if `deadline` passes first.
pub async fn poll_until(
    manager: &dyn NodeManager,
    target: usize,
    interval: Duration,
    deadline: Option<Instant>,
) -> bool {
    loop {
        if manager.node_count() >= target {
            return true;
        }

        let wake = Instant::now() + interval;
        match deadline {
            Some(d) if d <= Instant::now() => return false,
            Some(d) => tokio::time::sleep_until(wake.min(d)).await,
            None => tokio::time::sleep_until(wake).await,
        }
    }
}

/// Await `fut`, giving up at `deadline` if one is set.
pub async fn within_deadline<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(d) => tokio::time::timeout_at(d, fut).await.ok(),
        None => Some(fut.await),
    }
}

/// Passive watcher over an already converged manager: measures how long it
/// takes, from now, for the manager to see `target` nodes.
pub async fn wait_for_count(
    manager: Arc<dyn NodeManager>,
    target: usize,
    interval: Duration,
    deadline: Option<Instant>,
) -> VirtualNode {
    let start = Instant::now();
    let identity = Some(manager.name().clone());

    if poll_until(&*manager, target, interval, deadline).await {
        VirtualNode::converged(identity, Some(manager), start)
    } else {
        log::warn!(
            "{}: timed out at {}/{} nodes",
            manager.name(),
            manager.node_count(),
            target
        );
        VirtualNode::timed_out(identity, Some(manager))
    }
}
