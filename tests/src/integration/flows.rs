//! # Write Flows
//!
//! One primary, two replicas, all talking over the replication bus.
//!
//! ```text
//! Primary                      Replicas
//!   │ execute locally              │
//!   ├── RequestBroadcast ─────────→│ execute
//!   │←──────────── Ack(process) ───┤
//!   │ append to log                │
//!   ├── Decision(commit) ─────────→│ append to log
//!   │←──────────────── Ack(log) ───┤
//!   ✓                              ✓
//! ```

#[cfg(test)]
mod tests {
    use crate::cluster::Cluster;
    use rand::Rng;
    use sd_write_coordination::{
        ChainStatus, CoordinatorError, RequestLog, WaitKind, WriteCoordinationApi,
    };
    use shared_bus::{EventFilter, EventPublisher, ReplicationEvent};
    use shared_types::{AckPhase, LogId, NodeId, RequestEnvelope, RequestType};
    use std::time::Duration;
    use tokio::time::timeout;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn random_doc() -> Vec<u8> {
        let mut rng = rand::thread_rng();
        (0..64).map(|_| rng.gen()).collect()
    }

    // =============================================================================
    // NOMINAL COMMIT
    // =============================================================================

    /// A logged write lands in every index and every log under the same id.
    #[tokio::test]
    async fn test_commit_reaches_every_node() {
        let cluster = Cluster::start(2).unwrap();
        let doc = random_doc();

        let envelope = cluster
            .primary()
            .write(RequestType::DocumentInsert, doc.clone())
            .await
            .unwrap();
        cluster.settle().await;

        assert_eq!(envelope.inc_id, LogId::FIRST);
        for node in &cluster.nodes {
            assert_eq!(node.index.get(envelope.request_id), Some(doc.clone()), "{}", node.id);
            let logged = node.log.entries();
            assert_eq!(logged.len(), 1, "{}", node.id);
            assert_eq!(logged[0].request_id, envelope.request_id);
            assert_eq!(logged[0].inc_id, LogId::FIRST);
        }
        assert_eq!(cluster.primary().coordinator.stats().committed, 1);
        for replica in cluster.replicas() {
            assert_eq!(replica.coordinator.stats().committed, 1);
        }
    }

    /// Consecutive writes get consecutive log ids on every node.
    #[tokio::test]
    async fn test_log_ids_stay_aligned() {
        let cluster = Cluster::start(2).unwrap();

        for expected in 1..=5u64 {
            let envelope = cluster
                .primary()
                .write(RequestType::DocumentUpdate, random_doc())
                .await
                .unwrap();
            assert_eq!(envelope.inc_id, LogId(expected));
            cluster.settle().await;
        }

        for node in &cluster.nodes {
            assert_eq!(node.log.last_log_id(), Some(LogId(5)), "{}", node.id);
        }
        let tail = cluster
            .node(NodeId(3))
            .coordinator
            .committed_since(LogId(4))
            .unwrap();
        assert_eq!(
            tail.iter().map(|e| e.inc_id).collect::<Vec<_>>(),
            vec![LogId(4), LogId(5)]
        );
    }

    /// Requests that need no backup replicate but never touch the log.
    #[tokio::test]
    async fn test_unlogged_request_commits_without_log() {
        let cluster = Cluster::start(2).unwrap();

        let envelope = cluster
            .primary()
            .write(RequestType::CronJob, b"compact".to_vec())
            .await
            .unwrap();
        cluster.settle().await;

        for node in &cluster.nodes {
            assert!(node.index.contains(envelope.request_id), "{}", node.id);
            assert!(node.log.is_empty(), "{}", node.id);
        }
    }

    // =============================================================================
    // FAILURES
    // =============================================================================

    /// A local failure on the primary never reaches the replicas.
    #[tokio::test]
    async fn test_local_failure_leaves_no_trace() {
        let cluster = Cluster::start(2).unwrap();
        cluster.primary().index.fail_writes(true);

        let result = cluster
            .primary()
            .write(RequestType::DocumentDelete, random_doc())
            .await;
        assert!(matches!(result, Err(CoordinatorError::LocalExecutionFailure)));
        cluster.settle().await;

        for node in &cluster.nodes {
            assert!(node.index.is_empty(), "{}", node.id);
            assert!(node.log.is_empty(), "{}", node.id);
        }
        for replica in cluster.replicas() {
            assert!(replica.index.rolled_back().is_empty());
        }

        // The primary is free for the next write, which reuses the log id.
        cluster.primary().index.fail_writes(false);
        let envelope = cluster
            .primary()
            .write(RequestType::DocumentInsert, random_doc())
            .await
            .unwrap();
        assert_eq!(envelope.inc_id, LogId::FIRST);
    }

    /// One replica failing aborts the request everywhere.
    #[tokio::test]
    async fn test_replica_failure_aborts_everywhere() {
        let cluster = Cluster::start(2).unwrap();
        cluster.node(NodeId(2)).index.fail_writes(true);

        let primary = cluster.primary();
        let result = primary
            .write(RequestType::DocumentInsert, random_doc())
            .await;
        assert!(matches!(
            result,
            Err(CoordinatorError::ReplicationFailed {
                phase: WaitKind::ReplicasProcess,
                ..
            })
        ));
        cluster.settle().await;

        let healthy = cluster.node(NodeId(3));
        let request_id = healthy.index.rolled_back()[0];
        for node in &cluster.nodes {
            assert!(!node.index.contains(request_id), "{}", node.id);
            assert!(node.log.is_empty(), "{}", node.id);
            assert!(node.index.rolled_back().contains(&request_id), "{}", node.id);
        }
        assert_eq!(primary.coordinator.stats().aborted, 1);
    }

    /// A broadcast whose announced type disagrees with the envelope is
    /// rejected with a negative process ack.
    #[tokio::test]
    async fn test_replica_rejects_mismatched_broadcast() {
        let cluster = Cluster::start(1).unwrap();
        let fake_primary = NodeId(9);
        let mut acks = cluster
            .bus
            .subscribe(EventFilter::all().addressed_to(fake_primary));

        let mut envelope = RequestEnvelope::new(RequestType::DocumentInsert, "doc");
        envelope.inc_id = LogId::FIRST;
        cluster
            .bus
            .publish(ReplicationEvent::RequestBroadcast {
                request_id: envelope.request_id,
                from: fake_primary,
                to: vec![NodeId(2)],
                request_type: RequestType::ConfigUpdate.code(),
                packed: envelope.pack().unwrap(),
            })
            .await;

        let event = timeout(Duration::from_secs(1), acks.recv())
            .await
            .expect("timeout waiting for ack")
            .expect("ack");
        match event {
            ReplicationEvent::Ack {
                request_id,
                from,
                phase,
                success,
                ..
            } => {
                assert_eq!(request_id, envelope.request_id);
                assert_eq!(from, NodeId(2));
                assert_eq!(phase, AckPhase::Process);
                assert!(!success);
            }
            other => panic!("Expected Ack, got {other:?}"),
        }
        assert!(!cluster.node(NodeId(2)).is_hooked());
    }

    // =============================================================================
    // CHAINS
    // =============================================================================

    /// Intermediate chain steps stay on the primary; only the final
    /// envelope is replicated and logged.
    #[tokio::test]
    async fn test_chain_replicates_final_step() {
        let cluster = Cluster::start(2).unwrap();
        let coordinator = &cluster.primary().coordinator;

        let envelope = coordinator
            .prepare(RequestType::IndexBatch, b"scd-batch".to_vec())
            .unwrap();

        coordinator.set_chain_status(ChainStatus::ChainBegin).unwrap();
        coordinator.process_local_begin().unwrap();
        coordinator
            .process_local_finished_with(true, envelope.clone().with_addition(b"a.scd".to_vec()))
            .await
            .unwrap();
        assert!(coordinator.is_hooked());
        assert!(cluster.replicas().iter().all(|r| !r.is_hooked()));

        coordinator.set_chain_status(ChainStatus::ChainEnd).unwrap();
        let prev = coordinator.read_prev_chain_data().unwrap();
        assert_eq!(prev.addition, b"a.scd".to_vec());
        coordinator.process_local_begin().unwrap();
        coordinator
            .process_local_finished_with(true, prev.with_addition(b"a.scd,b.scd".to_vec()))
            .await
            .unwrap();
        cluster.settle().await;

        for node in &cluster.nodes {
            let logged = node.log.entries();
            assert_eq!(logged.len(), 1, "{}", node.id);
            assert_eq!(logged[0].request_id, envelope.request_id);
            assert_eq!(logged[0].addition, b"a.scd,b.scd".to_vec());
        }
        for replica in cluster.replicas() {
            assert_eq!(
                replica.index.get(envelope.request_id),
                Some(b"scd-batch".to_vec())
            );
        }
    }
}
