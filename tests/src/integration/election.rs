//! # Leader Election
//!
//! An election force-exits whatever request a node holds. Callbacks that
//! arrive for the abandoned request afterwards are ignored.

#[cfg(test)]
mod tests {
    use crate::cluster::Cluster;
    use sd_write_coordination::{CoordinatorError, RequestLog, WriteCoordinationApi};
    use shared_bus::{EventFilter, EventPublisher, ReplicationEvent};
    use shared_types::{AckPhase, LogId, NodeId, PrimaryDecision, RequestEnvelope, RequestType};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    async fn wait_until(what: &str, check: impl Fn() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting until {what}");
    }

    // =============================================================================
    // PRIMARY SIDE
    // =============================================================================

    /// A primary waiting on replicas gives up immediately when a new leader
    /// is elected.
    #[tokio::test]
    async fn test_election_interrupts_primary_wait() {
        let cluster = Arc::new(Cluster::start(2).unwrap());
        for replica in cluster.replicas() {
            replica.index.delay_writes(Duration::from_millis(300));
        }

        let writer = Arc::clone(&cluster);
        let write = tokio::spawn(async move {
            writer
                .primary()
                .write(RequestType::DocumentInsert, b"doc".to_vec())
                .await
        });

        let primary = cluster.primary();
        wait_until("the primary broadcasts", || {
            cluster.replicas().iter().all(|r| r.is_hooked())
        })
        .await;
        assert!(primary.is_hooked());

        cluster.elect(NodeId(2)).await;

        let result = timeout(Duration::from_secs(1), write)
            .await
            .expect("primary still waiting after election")
            .unwrap();
        assert!(matches!(result, Err(CoordinatorError::StaleHook { .. })));
        cluster.settle().await;

        for node in &cluster.nodes {
            assert!(node.log.is_empty(), "{}", node.id);
            assert_eq!(node.coordinator.stats().election_resets, 1, "{}", node.id);
        }
    }

    /// After an election the new leader coordinates writes and the old
    /// primary follows as a replica.
    #[tokio::test]
    async fn test_new_leader_takes_over() {
        let cluster = Cluster::start(2).unwrap();
        cluster
            .primary()
            .write(RequestType::DocumentInsert, b"before".to_vec())
            .await
            .unwrap();
        cluster.settle().await;

        cluster.elect(NodeId(3)).await;
        cluster.settle().await;

        let envelope = cluster
            .node(NodeId(3))
            .write(RequestType::DocumentUpdate, b"after".to_vec())
            .await
            .unwrap();
        cluster.settle().await;

        assert_eq!(envelope.inc_id, LogId(2));
        for node in &cluster.nodes {
            assert_eq!(node.log.last_log_id(), Some(LogId(2)), "{}", node.id);
            assert!(node.index.contains(envelope.request_id), "{}", node.id);
        }
    }

    // =============================================================================
    // REPLICA SIDE
    // =============================================================================

    /// A replica awaiting the primary's decision is released by the
    /// election; the late decision is counted as stale and never logged.
    #[tokio::test]
    async fn test_late_decision_after_election_is_stale() {
        let cluster = Cluster::start(1).unwrap();
        let old_primary = NodeId(9);
        let replica = cluster.node(NodeId(2));
        let mut acks = cluster
            .bus
            .subscribe(EventFilter::all().addressed_to(old_primary));

        let mut envelope = RequestEnvelope::new(RequestType::DocumentInsert, "doc");
        envelope.inc_id = LogId::FIRST;
        cluster
            .bus
            .publish(ReplicationEvent::RequestBroadcast {
                request_id: envelope.request_id,
                from: old_primary,
                to: vec![replica.id],
                request_type: envelope.request_type.code(),
                packed: envelope.pack().unwrap(),
            })
            .await;

        // The replica executed and is now waiting for a decision.
        match timeout(Duration::from_secs(1), acks.recv()).await {
            Ok(Some(ReplicationEvent::Ack { phase, success, .. })) => {
                assert_eq!(phase, AckPhase::Process);
                assert!(success);
            }
            other => panic!("Expected process ack, got {other:?}"),
        }
        assert!(replica.is_hooked());
        assert!(replica.index.contains(envelope.request_id));

        cluster.elect(NodeId(1)).await;
        wait_until("the replica is released", || !replica.is_hooked()).await;

        cluster
            .bus
            .publish(ReplicationEvent::Decision {
                request_id: envelope.request_id,
                from: old_primary,
                to: vec![replica.id],
                decision: PrimaryDecision::Commit { log: true },
            })
            .await;
        wait_until("the decision is dropped", || {
            replica.coordinator.stats().stale_callbacks >= 1
        })
        .await;

        assert!(replica.log.is_empty());
        assert_eq!(replica.coordinator.stats().election_resets, 1);
    }
}
