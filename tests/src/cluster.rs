//! # In-Process Cluster
//!
//! A primary and its replicas sharing one `InMemoryEventBus`. Every node runs
//! its own `RequestCoordinator` behind a `BusEventListener` and applies
//! requests to an `InMemoryIndex`.

use async_trait::async_trait;
use parking_lot::RwLock;
use sd_write_coordination::{
    BusEventListener, BusReplicationTransport, CoordinatorConfig, CoordinatorResult,
    InMemoryRequestLog, LocalRollback, ReplicaRequestHandler, RequestCoordinator, RequestLog,
    WriteCoordinationApi, WriteScope,
};
use shared_bus::{EventPublisher, InMemoryEventBus, ReplicationEvent};
use shared_types::{NodeId, RequestEnvelope, RequestId, RequestType};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Callback timeout used by cluster nodes unless a test overrides it.
pub const CLUSTER_CALLBACK_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// INDEX
// =============================================================================

/// Document store standing in for the search index.
///
/// Keyed by request id so a rollback can find what a request wrote.
#[derive(Default)]
pub struct InMemoryIndex {
    docs: RwLock<BTreeMap<RequestId, Vec<u8>>>,
    rolled_back: RwLock<Vec<RequestId>>,
    failing: AtomicBool,
    delay_ms: AtomicU64,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following execution fail.
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Stall every following execution for `delay`.
    pub fn delay_writes(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn contains(&self, request_id: RequestId) -> bool {
        self.docs.read().contains_key(&request_id)
    }

    pub fn get(&self, request_id: RequestId) -> Option<Vec<u8>> {
        self.docs.read().get(&request_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    pub fn rolled_back(&self) -> Vec<RequestId> {
        self.rolled_back.read().clone()
    }
}

#[async_trait]
impl ReplicaRequestHandler for InMemoryIndex {
    async fn execute(&self, envelope: &RequestEnvelope) -> bool {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return false;
        }
        self.docs
            .write()
            .insert(envelope.request_id, envelope.body.clone());
        true
    }
}

#[async_trait]
impl LocalRollback for InMemoryIndex {
    async fn rollback(&self, envelope: &RequestEnvelope) {
        self.docs.write().remove(&envelope.request_id);
        self.rolled_back.write().push(envelope.request_id);
    }
}

// =============================================================================
// NODE
// =============================================================================

pub type NodeCoordinator<L> = RequestCoordinator<L, BusReplicationTransport>;

pub struct Node<L>
where
    L: RequestLog + 'static,
{
    pub id: NodeId,
    pub coordinator: Arc<NodeCoordinator<L>>,
    pub log: Arc<L>,
    pub index: Arc<InMemoryIndex>,
    listener: JoinHandle<()>,
}

impl<L> Node<L>
where
    L: RequestLog + 'static,
{
    /// Execute one request end to end with this node as primary.
    pub async fn write(
        &self,
        request_type: RequestType,
        body: impl Into<Vec<u8>>,
    ) -> CoordinatorResult<RequestEnvelope> {
        let mut scope = WriteScope::begin(&self.coordinator)?;
        let envelope = scope.prepare(request_type, body).await?;
        if self.index.execute(&envelope).await {
            scope.set_success();
        }
        scope.finish().await?;
        Ok(envelope)
    }

    pub fn is_hooked(&self) -> bool {
        self.coordinator.is_hooked()
    }
}

impl<L> Drop for Node<L>
where
    L: RequestLog + 'static,
{
    fn drop(&mut self) {
        self.listener.abort();
    }
}

// =============================================================================
// CLUSTER
// =============================================================================

pub struct Cluster<L>
where
    L: RequestLog + 'static,
{
    pub bus: Arc<InMemoryEventBus>,
    pub nodes: Vec<Node<L>>,
}

impl Cluster<InMemoryRequestLog> {
    /// Node 1 as primary plus `replicas` replicas, all with in-memory logs.
    pub fn start(replicas: usize) -> CoordinatorResult<Self> {
        Self::start_with(replicas, |_| InMemoryRequestLog::new())
    }
}

impl<L> Cluster<L>
where
    L: RequestLog + 'static,
{
    pub fn start_with(replicas: usize, make_log: impl Fn(NodeId) -> L) -> CoordinatorResult<Self> {
        #[cfg(test)]
        sd_telemetry::init_test_logging();

        let bus = Arc::new(InMemoryEventBus::new());
        let ids: Vec<NodeId> = (1..=replicas as u32 + 1).map(NodeId).collect();
        let primary = ids[0];

        let mut nodes = Vec::with_capacity(ids.len());
        for &id in &ids {
            let transport = BusReplicationTransport::new(id, Arc::clone(&bus));
            if id == primary {
                transport.set_replicas(ids[1..].to_vec());
            } else {
                transport.follow_leader(primary);
            }

            let log = Arc::new(make_log(id));
            let index = Arc::new(InMemoryIndex::new());
            let config =
                CoordinatorConfig::for_node(id).with_callback_timeout(CLUSTER_CALLBACK_TIMEOUT);
            let coordinator = Arc::new(
                RequestCoordinator::new(config, Arc::clone(&log), Arc::new(transport))
                    .with_rollback(Arc::clone(&index) as Arc<dyn LocalRollback>),
            );
            coordinator.init()?;

            let listener = BusEventListener::new(
                Arc::clone(&coordinator),
                Arc::clone(&index) as Arc<dyn ReplicaRequestHandler>,
            )
            .spawn(&bus);

            nodes.push(Node {
                id,
                coordinator,
                log,
                index,
                listener,
            });
        }

        Ok(Self { bus, nodes })
    }

    pub fn primary(&self) -> &Node<L> {
        &self.nodes[0]
    }

    pub fn replicas(&self) -> &[Node<L>] {
        &self.nodes[1..]
    }

    pub fn node(&self, id: NodeId) -> &Node<L> {
        self.nodes
            .iter()
            .find(|node| node.id == id)
            .unwrap_or_else(|| panic!("no node {id}"))
    }

    /// Wait until no node holds a hook. Replicas finish on their own tasks,
    /// shortly after the primary returns.
    pub async fn settle(&self) {
        for _ in 0..200 {
            if self.nodes.iter().all(|node| !node.is_hooked()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("cluster did not settle");
    }

    /// Announce `leader` as the result of an election, point every
    /// transport at the new topology and wait for every listener to see it.
    pub async fn elect(&self, leader: NodeId) {
        for node in &self.nodes {
            let transport = node.coordinator.transport();
            if node.id == leader {
                transport.set_replicas(
                    self.nodes
                        .iter()
                        .map(|n| n.id)
                        .filter(|id| *id != leader)
                        .collect(),
                );
            } else {
                transport.set_replicas(Vec::new());
            }
        }
        self.bus
            .publish(ReplicationEvent::ElectingFinished { leader })
            .await;

        // Listeners follow the new leader as they handle the event.
        for _ in 0..200 {
            if self
                .nodes
                .iter()
                .all(|node| node.coordinator.transport().leader() == Some(leader))
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("election of {leader} not observed by every node");
    }
}
