//! Event Bus Listener
//!
//! Pumps replication events addressed to this node into its coordinator and
//! runs replica-side execution for broadcasts from the primary.

use crate::adapters::bus_transport::BusReplicationTransport;
use crate::error::CoordinatorError;
use crate::guard::WriteScope;
use crate::ports::inbound::{TransportEvent, WriteCoordinationApi};
use crate::ports::outbound::{ReplicaRequestHandler, ReplicationTransport, RequestLog};
use crate::service::RequestCoordinator;
use shared_bus::{EventFilter, InMemoryEventBus, ReplicationEvent, Subscription};
use shared_types::{AckPhase, NodeId, RequestId};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

type BusCoordinator<L> = RequestCoordinator<L, BusReplicationTransport>;

/// Listener for one node.
pub struct BusEventListener<L>
where
    L: RequestLog + 'static,
{
    coordinator: Arc<BusCoordinator<L>>,
    handler: Arc<dyn ReplicaRequestHandler>,
}

impl<L> BusEventListener<L>
where
    L: RequestLog + 'static,
{
    pub fn new(coordinator: Arc<BusCoordinator<L>>, handler: Arc<dyn ReplicaRequestHandler>) -> Self {
        Self {
            coordinator,
            handler,
        }
    }

    fn node_id(&self) -> NodeId {
        self.coordinator.transport().node_id()
    }

    /// Subscribe to `event_bus` and process events until it closes.
    pub fn spawn(self, event_bus: &InMemoryEventBus) -> JoinHandle<()> {
        let subscription = event_bus.subscribe(EventFilter::all().addressed_to(self.node_id()));
        tokio::spawn(self.run(subscription))
    }

    pub async fn run(self, mut subscription: Subscription) {
        info!("[sd-wc] 🎧 {} listening for replication events", self.node_id());
        while let Some(event) = subscription.recv().await {
            self.dispatch(event).await;
        }
        debug!("[sd-wc] {} event bus closed", self.node_id());
    }

    async fn dispatch(&self, event: ReplicationEvent) {
        match event {
            ReplicationEvent::RequestBroadcast {
                request_id,
                from,
                request_type,
                packed,
                ..
            } => {
                self.coordinator.transport().follow_leader(from);
                self.on_broadcast(request_id, request_type, &packed).await;
            }
            ReplicationEvent::Decision {
                request_id,
                decision,
                ..
            } => self.coordinator.handle_transport_event(TransportEvent::Decision {
                request_id,
                decision,
            }),
            ReplicationEvent::Ack {
                request_id,
                from,
                phase,
                success,
                ..
            } => self.coordinator.handle_transport_event(TransportEvent::Ack {
                request_id,
                from,
                phase,
                success,
            }),
            ReplicationEvent::ElectingFinished { leader } => {
                self.coordinator.transport().follow_leader(leader);
                self.coordinator
                    .handle_transport_event(TransportEvent::ElectingFinished);
            }
        }
    }

    async fn on_broadcast(&self, request_id: RequestId, type_code: u32, packed: &[u8]) {
        let envelope = match self.coordinator.on_request_from_primary(type_code, packed) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(%request_id, error = %e, "Rejecting broadcast");
                // Let the primary abort right away instead of timing out.
                if let Err(e) = self
                    .coordinator
                    .transport()
                    .send_ack(request_id, AckPhase::Process, false)
                    .await
                {
                    debug!(%request_id, error = %e, "Rejection not delivered");
                }
                return;
            }
        };

        // Execution waits on the primary's decision, which arrives through
        // this same listener, so it must run on its own task.
        let coordinator = Arc::clone(&self.coordinator);
        let handler = Arc::clone(&self.handler);
        tokio::spawn(async move {
            let mut scope = match WriteScope::begin(&coordinator) {
                Ok(scope) => scope,
                Err(e) => {
                    error!(%request_id, error = %e, "Cannot open write scope");
                    return;
                }
            };
            if let Err(e) = scope.prepare(envelope.request_type, Vec::new()).await {
                warn!(%request_id, error = %e, "Replica prepare failed");
                return;
            }
            if handler.execute(&envelope).await {
                scope.set_success();
            }
            match scope.finish().await {
                Ok(()) => debug!(%request_id, "Replica committed"),
                Err(CoordinatorError::Aborted { .. }) => {
                    info!(%request_id, "Replica rolled back on primary abort")
                }
                Err(e) => warn!(%request_id, error = %e, "Replica did not commit"),
            }
        });
    }
}
