//! # Request Log Durability
//!
//! Every node keeps its request log on disk. A restarted cluster resumes
//! numbering where the logs left off.

#[cfg(test)]
mod tests {
    use crate::cluster::Cluster;
    use sd_write_coordination::{CoordinatorError, FileRequestLog, LogError, RequestLog};
    use shared_types::{LogId, NodeId, RequestType};
    use std::path::Path;
    use tempfile::TempDir;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn start(root: &Path, replicas: usize) -> Result<Cluster<FileRequestLog>, CoordinatorError> {
        let root = root.to_path_buf();
        Cluster::start_with(replicas, move |id: NodeId| {
            FileRequestLog::new(root.join(format!("node-{}", id.0)))
        })
    }

    fn close(cluster: &Cluster<FileRequestLog>) {
        for node in &cluster.nodes {
            node.log.close();
        }
    }

    // =============================================================================
    // RESTART
    // =============================================================================

    #[tokio::test]
    async fn test_restarted_cluster_continues_log() {
        let dir = TempDir::new().unwrap();

        let first = start(dir.path(), 2).unwrap();
        let mut written = Vec::new();
        for body in ["a", "b"] {
            let envelope = first
                .primary()
                .write(RequestType::DocumentInsert, body)
                .await
                .unwrap();
            first.settle().await;
            written.push(envelope.request_id);
        }
        close(&first);
        drop(first);

        let second = start(dir.path(), 2).unwrap();
        for node in &second.nodes {
            assert_eq!(node.log.last_log_id(), Some(LogId(2)), "{}", node.id);
            let replayed = node.coordinator.committed_since(LogId::FIRST).unwrap();
            assert_eq!(
                replayed.iter().map(|e| e.request_id).collect::<Vec<_>>(),
                written
            );
        }

        let envelope = second
            .primary()
            .write(RequestType::ConfigUpdate, "replicas=3")
            .await
            .unwrap();
        second.settle().await;
        assert_eq!(envelope.inc_id, LogId(3));
        for node in &second.nodes {
            assert_eq!(node.log.last_log_id(), Some(LogId(3)), "{}", node.id);
        }
    }

    /// Two coordinators may not share one log directory.
    #[tokio::test]
    async fn test_log_directory_is_exclusive() {
        let dir = TempDir::new().unwrap();
        let _running = start(dir.path(), 1).unwrap();

        match start(dir.path(), 1) {
            Err(CoordinatorError::Log(LogError::Locked { .. })) => {}
            Err(other) => panic!("Expected Locked, got {other}"),
            Ok(_) => panic!("second cluster opened a locked log"),
        }
    }
}
