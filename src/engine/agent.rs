use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::watcher::{poll_until, within_deadline};
use crate::discovery::DiscoveryProvider;
use crate::types::VirtualNode;

/// One simulated cluster member.
pub struct VirtualNodeAgent {
    provider: Arc<dyn DiscoveryProvider>,
    poll_interval: Duration,
    deadline: Option<Instant>,
}

impl VirtualNodeAgent {
    pub fn new(provider: Arc<dyn DiscoveryProvider>, poll_interval: Duration) -> Self {
        Self {
            provider,
            poll_interval,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Register a fresh node and wait until its manager sees `target` nodes.
    ///
    /// Always produces a result; setup errors are reported as a failed node.
    pub async fn run(&self, target: usize) -> VirtualNode {
        let identity = match self.provider.generate_identity() {
            Ok(id) => id,
            Err(e) => {
                log::warn!("error generating node identity: {}", e);
                return VirtualNode::failed(None, e.to_string());
            }
        };

        let manager = match self
            .provider
            .new_manager(&identity, self.provider.node_handler())
        {
            Ok(m) => m,
            Err(e) => {
                log::warn!("{}: error creating node manager: {}", identity, e);
                return VirtualNode::failed(Some(identity), e.to_string());
            }
        };
        let discovery = self.provider.new_discovery(manager.clone());

        let start = Instant::now();
        if let Err(e) = discovery.start(&identity) {
            log::warn!("{}: error starting discovery: {}", identity, e);
            return VirtualNode::failed(Some(identity), e.to_string());
        }

        match within_deadline(self.deadline, discovery.wait_registered()).await {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                log::warn!("{}: {}", identity, e);
                return VirtualNode::failed(Some(identity), e.to_string());
            }
            None => {
                log::warn!("{}: timed out waiting for registration", identity);
                return VirtualNode::timed_out(Some(identity), None);
            }
        }

        if poll_until(&*manager, target, self.poll_interval, self.deadline).await {
            let node = VirtualNode::converged(Some(identity), Some(manager), start);
            log::debug!("{:?} converged after {:?}", node.identity, node.elapsed);
            node
        } else {
            log::warn!(
                "{}: timed out at {}/{} nodes",
                identity,
                manager.node_count(),
                target
            );
            VirtualNode::timed_out(Some(identity), Some(manager))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::KvStoreDiscovery;
    use crate::kvstore::InMemoryKvStore;
    use crate::types::AgentOutcome;

    fn provider(latency: Duration) -> Arc<dyn DiscoveryProvider> {
        Arc::new(KvStoreDiscovery::new(Arc::new(
            InMemoryKvStore::default().with_latency(latency),
        )))
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_agent_converges_on_itself() {
        let provider = provider(Duration::from_millis(100));
        let agent = VirtualNodeAgent::new(provider, Duration::from_millis(10));
        let node = agent.run(1).await;

        assert_eq!(node.outcome, AgentOutcome::Converged);
        assert!(node.manager.is_some());
        assert!(node.elapsed >= Duration::from_millis(100));
        assert!(node.elapsed <= Duration::from_millis(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_peer_times_out() {
        let deadline = Instant::now() + Duration::from_secs(2);
        let agent = VirtualNodeAgent::new(provider(Duration::ZERO), Duration::from_millis(50))
            .with_deadline(Some(deadline));
        let node = agent.run(2).await;

        assert_eq!(node.outcome, AgentOutcome::TimedOut);
        assert_eq!(node.elapsed, Duration::ZERO);
        assert!(node.identity.is_some());
    }
}
