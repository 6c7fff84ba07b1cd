//! # Request Coordinator
//!
//! Hooks one mutating request at a time and drives it through the
//! replication protocol.
//!
//! ## Primary
//!
//! ```text
//! prepare ─► process_local_begin ─► [execute] ─► process_local_finished(ok)
//!                                                     │
//!        ChainBegin/ChainMiddle: snapshot, stay hooked ◄┤
//!                                                     ▼
//!                          broadcast ─► wait Process acks (all replicas)
//!                                                     ▼
//!                     need backup? ─► append to log (bounded retries)
//!                                                     ▼
//!                 Commit{log} ─► wait Log acks (when logged) ─► clear
//!
//! any failure before the local append: Abort ─► wait Abort acks ─► rollback ─► clear
//! ```
//!
//! ## Replica
//!
//! ```text
//! on_request_from_primary ─► execute ─► Process ack ─► wait decision
//!        Commit{log}: append, Log ack, clear
//!        Abort:       rollback, Abort ack, clear
//! ```
//!
//! Every callback carries the request id it answers. The coordinator only
//! accepts callbacks for the currently hooked request, and every internal
//! step re-checks that the request it started with is still hooked, so a
//! reset (leader election, forced clear) turns late work into a no-op.

use crate::config::CoordinatorConfig;
use crate::domain::backup::is_need_backup;
use crate::domain::{validate_chain_transition, ChainStatus, HookRole, ProtocolPhase, WaitKind};
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::metrics;
use crate::ports::inbound::{LocalOutcome, TransportEvent, WriteCoordinationApi};
use crate::ports::outbound::{BroadcastHandle, LocalRollback, ReplicationTransport, RequestLog};
use crate::state::{
    ActiveRequest, ArmedWait, CoordinatorState, CoordinatorStats, Counters, WaitOutcome,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use sd_telemetry::request_span;
use shared_types::{AckPhase, LogId, PrimaryDecision, RequestEnvelope, RequestId, RequestType};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

/// Write coordinator for one node.
pub struct RequestCoordinator<L, T>
where
    L: RequestLog,
    T: ReplicationTransport,
{
    config: CoordinatorConfig,
    state: Mutex<CoordinatorState>,
    log: Arc<L>,
    transport: Arc<T>,
    rollback: Option<Arc<dyn LocalRollback>>,
    counters: Counters,
}

impl<L, T> RequestCoordinator<L, T>
where
    L: RequestLog,
    T: ReplicationTransport,
{
    /// Create a coordinator. Call `init` before hooking anything.
    pub fn new(config: CoordinatorConfig, log: Arc<L>, transport: Arc<T>) -> Self {
        Self {
            config,
            state: Mutex::new(CoordinatorState::default()),
            log,
            transport,
            rollback: None,
            counters: Counters::default(),
        }
    }

    /// Handler that discards local effects when a request is aborted.
    #[must_use]
    pub fn with_rollback(mut self, rollback: Arc<dyn LocalRollback>) -> Self {
        self.rollback = Some(rollback);
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn log(&self) -> &Arc<L> {
        &self.log
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Validate the configuration, open the request log and accept hooks.
    pub fn init(&self) -> CoordinatorResult<()> {
        self.config.validate()?;
        self.log.open()?;
        self.state.lock().initialized = true;
        info!(
            "[sd-wc] ✅ {} ready (last log entry {:?})",
            self.config.node_id,
            self.log.last_log_id()
        );
        Ok(())
    }

    /// Force-clear any hook and stop accepting new ones.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if let Some(active) = state.active.take() {
            warn!(
                request_id = %active.request_id,
                phase = %active.phase,
                "Shutting down with a hooked request"
            );
        }
        state.initialized = false;
        info!("[sd-wc] {} shut down", self.config.node_id);
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.counters.snapshot()
    }

    /// Outcome reported by the most recent local execution.
    pub fn last_local_outcome(&self) -> Option<LocalOutcome> {
        self.state.lock().last_outcome
    }

    /// Logged requests with id `>= from`, for a node catching up.
    pub fn committed_since(&self, from: LogId) -> CoordinatorResult<Vec<RequestEnvelope>> {
        Ok(self.log.read_from(from)?)
    }

    // =========================================================================
    // CALLBACK DELIVERY
    // =========================================================================

    /// Deliver one transport callback.
    ///
    /// Callbacks for a request that is not hooked, or for a phase nobody is
    /// waiting on, are ignored.
    pub fn handle_transport_event(&self, event: TransportEvent) {
        let accepted = match event {
            TransportEvent::ElectingFinished => {
                self.on_electing_finished();
                return;
            }
            TransportEvent::Ack {
                request_id,
                from,
                phase,
                success,
            } => {
                let mut state = self.state.lock();
                match state.active_for(request_id) {
                    Some(active) if active.role == HookRole::Primary => {
                        match active.wait.as_mut() {
                            Some(wait) if wait.kind.ack_phase() == Some(phase) => {
                                wait.record_ack(from, success);
                                true
                            }
                            _ => false,
                        }
                    }
                    _ => false,
                }
            }
            TransportEvent::Decision {
                request_id,
                decision,
            } => {
                let mut state = self.state.lock();
                match state.active_for(request_id) {
                    Some(active) if active.role == HookRole::Replica => {
                        match active.wait.as_mut() {
                            Some(wait) if wait.kind == WaitKind::Primary => {
                                wait.resolve(WaitOutcome::Decision(decision));
                            }
                            _ => active.pending_decision = Some(decision),
                        }
                        true
                    }
                    _ => false,
                }
            }
        };

        if !accepted {
            Counters::bump(&self.counters.stale_callbacks);
            metrics::record_stale_callback();
            debug!(?event, "Ignoring stale callback");
        }
    }

    /// Feed callbacks from `events` into `handle_transport_event` until the
    /// channel closes.
    pub fn spawn_event_pump(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> JoinHandle<()>
    where
        L: 'static,
        T: 'static,
    {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                coordinator.handle_transport_event(event);
            }
            debug!("Transport event channel closed");
        })
    }

    // =========================================================================
    // INTERNAL HELPERS
    // =========================================================================

    fn current_id(&self) -> CoordinatorResult<RequestId> {
        self.state
            .lock()
            .active
            .as_ref()
            .map(|active| active.request_id)
            .ok_or(CoordinatorError::NotHooked)
    }

    /// Run `f` against the hooked request if it is still `request_id`.
    fn with_request<R>(
        &self,
        request_id: RequestId,
        f: impl FnOnce(&mut ActiveRequest) -> CoordinatorResult<R>,
    ) -> CoordinatorResult<R> {
        let mut state = self.state.lock();
        match state.active_for(request_id) {
            Some(active) => f(active),
            None => Err(CoordinatorError::StaleHook { request_id }),
        }
    }

    fn set_phase(&self, request_id: RequestId, phase: ProtocolPhase) -> CoordinatorResult<()> {
        self.with_request(request_id, |active| {
            active.phase = phase;
            Ok(())
        })
    }

    fn hook(&self, active: ActiveRequest) -> CoordinatorResult<()> {
        let mut state = self.state.lock();
        if !state.initialized {
            return Err(CoordinatorError::InvalidContext);
        }
        if let Some(current) = state.active.as_ref() {
            warn!(
                active = %current.request_id,
                rejected = %active.request_id,
                "Re-entrant hook rejected"
            );
            return Err(CoordinatorError::ReentrantHook {
                active: current.request_id,
            });
        }
        debug!(request_id = %active.request_id, role = %active.role, "Hooked");
        state.active = Some(active);
        Ok(())
    }

    /// Id of a raw primary hook still waiting for its envelope.
    fn raw_hook(&self) -> Option<RequestId> {
        self.state
            .lock()
            .active
            .as_ref()
            .filter(|active| {
                active.role == HookRole::Primary
                    && active.phase == ProtocolPhase::Hooked
                    && active.envelope.is_none()
            })
            .map(|active| active.request_id)
    }

    /// Clear the hook if it is still `request_id`.
    pub(crate) fn release(&self, request_id: RequestId) -> bool {
        let mut state = self.state.lock();
        if state.active_for(request_id).is_some() {
            state.active = None;
            true
        } else {
            false
        }
    }

    /// Clear the hook and count the outcome.
    fn finalize(&self, request_id: RequestId, role: HookRole, committed: bool, reason: &str) {
        if !self.release(request_id) {
            return;
        }
        if committed {
            Counters::bump(&self.counters.committed);
            metrics::record_request_committed(role.as_str());
            info!("[sd-wc] ✅ {} committed {}", role, request_id);
        } else {
            Counters::bump(&self.counters.aborted);
            metrics::record_request_aborted(reason);
            info!("[sd-wc] ❌ {} finished {} without commit ({})", role, request_id, reason);
        }
    }

    pub(crate) fn record_outcome(&self, request_id: RequestId, success: bool) {
        self.state.lock().last_outcome = Some(LocalOutcome {
            request_id,
            success,
        });
    }

    /// Wait for the armed wait of `kind` to resolve.
    async fn wait_for(
        &self,
        request_id: RequestId,
        kind: WaitKind,
    ) -> CoordinatorResult<WaitOutcome> {
        let receiver = self.with_request(request_id, |active| {
            let phase = active.phase;
            active
                .wait
                .as_mut()
                .filter(|wait| wait.kind == kind)
                .and_then(|wait| wait.receiver.take())
                .ok_or(CoordinatorError::InvalidPhase {
                    operation: "wait",
                    phase,
                })
        })?;

        let started = Instant::now();
        let result = tokio::time::timeout(self.config.callback_timeout, receiver).await;
        metrics::observe_callback_wait(kind.as_str(), started.elapsed().as_secs_f64());

        let still_hooked = {
            let mut state = self.state.lock();
            match state.active_for(request_id) {
                Some(active) => {
                    if active.wait.as_ref().map(|wait| wait.kind) == Some(kind) {
                        active.wait = None;
                    }
                    true
                }
                None => false,
            }
        };

        match result {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) if !still_hooked => Err(CoordinatorError::StaleHook { request_id }),
            Ok(Err(_)) => Err(CoordinatorError::ReplicationFailed {
                phase: kind,
                reason: "wait cancelled".to_string(),
            }),
            Err(_) => Err(CoordinatorError::ReplicationTimeout {
                phase: kind,
                timeout_ms: self.config.callback_timeout_ms(),
            }),
        }
    }

    async fn wait_acks(&self, request_id: RequestId, kind: WaitKind) -> CoordinatorResult<()> {
        match self.wait_for(request_id, kind).await? {
            WaitOutcome::Acked => Ok(()),
            WaitOutcome::Failed { from } => Err(CoordinatorError::ReplicationFailed {
                phase: kind,
                reason: format!("{from} reported failure"),
            }),
            WaitOutcome::Decision(_) => Err(CoordinatorError::InvalidPhase {
                operation: "wait_acks",
                phase: ProtocolPhase::AwaitingPrimary,
            }),
        }
    }

    async fn wait_decision(&self, request_id: RequestId) -> CoordinatorResult<PrimaryDecision> {
        let early = self.with_request(request_id, |active| {
            if let Some(decision) = active.pending_decision.take() {
                return Ok(Some(decision));
            }
            match active.wait.as_ref().map(|wait| wait.kind) {
                None => active.wait = Some(ArmedWait::new(WaitKind::Primary, 1)),
                Some(WaitKind::Primary) => {}
                Some(_) => {
                    return Err(CoordinatorError::InvalidPhase {
                        operation: "wait_primary_callback",
                        phase: active.phase,
                    })
                }
            }
            Ok(None)
        })?;
        if let Some(decision) = early {
            return Ok(decision);
        }

        match self.wait_for(request_id, WaitKind::Primary).await? {
            WaitOutcome::Decision(decision) => Ok(decision),
            _ => Err(CoordinatorError::InvalidPhase {
                operation: "wait_primary_callback",
                phase: ProtocolPhase::AwaitingPrimary,
            }),
        }
    }

    /// Append the hooked envelope to the log, retrying with backoff.
    async fn write_log_for(&self, request_id: RequestId) -> CoordinatorResult<LogId> {
        let envelope = self.with_request(request_id, |active| {
            if active.phase != ProtocolPhase::Committing {
                return Err(CoordinatorError::InvalidPhase {
                    operation: "write_local_log",
                    phase: active.phase,
                });
            }
            active.envelope.clone().ok_or(CoordinatorError::InvalidPhase {
                operation: "write_local_log",
                phase: active.phase,
            })
        })?;

        let attempts = self.config.log_write_attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.log.append(&envelope) {
                Ok(log_id) => {
                    metrics::record_log_append(true);
                    Counters::bump(&self.counters.log_appends);
                    self.set_phase(request_id, ProtocolPhase::LogWritten)?;
                    debug!(%request_id, %log_id, attempt, "Request logged");
                    return Ok(log_id);
                }
                Err(e) => {
                    metrics::record_log_append(false);
                    warn!(%request_id, attempt, attempts, error = %e, "Request log append failed");
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.config.log_retry_backoff).await;
                    }
                }
            }
        }

        Err(CoordinatorError::LogWriteFailed {
            attempts,
            reason: last_error,
        })
    }

    /// Send Abort to replicas that got the broadcast and arm the abort wait.
    async fn abort_for(&self, request_id: RequestId) -> CoordinatorResult<()> {
        let handle = self.with_request(request_id, |active| {
            if active.role != HookRole::Primary {
                return Err(CoordinatorError::InvalidPhase {
                    operation: "abort_request",
                    phase: active.phase,
                });
            }
            active.phase = ProtocolPhase::Aborting;
            active.wait = None;
            Ok(active.broadcast.clone().map(|handle| {
                active.wait = Some(ArmedWait::new(
                    WaitKind::ReplicasAbort,
                    handle.expected_acks(),
                ));
                handle
            }))
        })?;

        let Some(handle) = handle else {
            debug!(%request_id, "Abort before broadcast, nothing to tell replicas");
            return Ok(());
        };

        if let Err(e) = self
            .transport
            .send_decision(&handle, PrimaryDecision::Abort)
            .await
        {
            warn!(%request_id, error = %e, "Abort decision not delivered");
            self.with_request(request_id, |active| {
                active.wait = None;
                Ok(())
            })?;
            return Err(e.into());
        }
        Ok(())
    }

    async fn wait_abort_acks(&self, request_id: RequestId) -> CoordinatorResult<()> {
        let armed = self.with_request(request_id, |active| {
            Ok(active
                .wait
                .as_ref()
                .is_some_and(|wait| wait.kind == WaitKind::ReplicasAbort))
        })?;
        if !armed {
            return Ok(());
        }
        self.wait_acks(request_id, WaitKind::ReplicasAbort).await
    }

    async fn rollback_local(&self, request_id: RequestId) {
        let Some(rollback) = self.rollback.as_ref() else {
            return;
        };
        let envelope = self.with_request(request_id, |active| Ok(active.envelope.clone()));
        if let Ok(Some(envelope)) = envelope {
            rollback.rollback(&envelope).await;
        }
    }

    // =========================================================================
    // PRIMARY PROTOCOL
    // =========================================================================

    /// Report the outcome of local execution for `request_id` and drive the
    /// protocol to its end.
    pub(crate) async fn finish_request(
        &self,
        request_id: RequestId,
        success: bool,
        updated: Option<RequestEnvelope>,
    ) -> CoordinatorResult<()> {
        let role = self.with_request(request_id, |active| {
            if !matches!(
                active.phase,
                ProtocolPhase::Prepared | ProtocolPhase::LocalExecuting
            ) {
                return Err(CoordinatorError::InvalidPhase {
                    operation: "process_local_finished",
                    phase: active.phase,
                });
            }
            if let (Some(mut updated), Some(current)) = (updated, active.envelope.as_ref()) {
                updated.request_id = current.request_id;
                updated.request_type = current.request_type;
                updated.inc_id = current.inc_id;
                active.envelope = Some(updated);
            }
            Ok(active.role)
        })?;
        self.record_outcome(request_id, success);

        let span = request_span!("process_local_finished", request_id = %request_id, role = %role);
        match role {
            HookRole::Primary => self.finish_as_primary(request_id, success).instrument(span).await,
            HookRole::Replica => self.finish_as_replica(request_id, success).instrument(span).await,
            HookRole::Unhooked => Err(CoordinatorError::NotHooked),
        }
    }

    async fn finish_as_primary(&self, request_id: RequestId, success: bool) -> CoordinatorResult<()> {
        if !success {
            return Err(self
                .fail_primary(request_id, CoordinatorError::LocalExecutionFailure)
                .await);
        }

        let chain_step = self.with_request(request_id, |active| {
            if active.chain_status.is_intermediate() {
                active.chain_snapshot = active.envelope.clone();
                active.phase = ProtocolPhase::ChainStepDone;
                Ok(true)
            } else {
                active.phase = ProtocolPhase::LocalSucceeded;
                Ok(false)
            }
        })?;
        if chain_step {
            debug!(%request_id, "Chain step done, staying hooked");
            return Ok(());
        }

        let (handle, request_type) = match self.replicate(request_id).await {
            Ok(replicated) => replicated,
            Err(e) => return Err(self.fail_primary(request_id, e).await),
        };

        let need_backup = is_need_backup(request_type);
        if need_backup {
            if let Err(e) = self.write_log_for(request_id).await {
                return Err(self.fail_primary(request_id, e).await);
            }
        }

        self.commit(request_id, &handle, need_backup).await
    }

    /// Broadcast the envelope and wait for every replica's execution ack.
    async fn replicate(
        &self,
        request_id: RequestId,
    ) -> CoordinatorResult<(BroadcastHandle, RequestType)> {
        let replicas = self.transport.replica_count();
        let (envelope, packed) = self.with_request(request_id, |active| {
            let envelope = active
                .envelope
                .clone()
                .ok_or(CoordinatorError::InvalidPhase {
                    operation: "replicate",
                    phase: active.phase,
                })?;
            let packed = envelope.pack()?;
            active.wait = Some(ArmedWait::new(WaitKind::ReplicasProcess, replicas));
            active.phase = ProtocolPhase::AwaitingReplicasProcess;
            Ok((envelope, packed))
        })?;

        let handle = match self.transport.broadcast(&envelope, packed).await {
            Ok(handle) => handle,
            Err(e) => {
                self.with_request(request_id, |active| {
                    active.wait = None;
                    Ok(())
                })?;
                return Err(e.into());
            }
        };
        self.with_request(request_id, |active| {
            if let Some(wait) = active.wait.as_mut() {
                wait.set_expected(handle.expected_acks());
            }
            active.broadcast = Some(handle.clone());
            Ok(())
        })?;

        self.wait_acks(request_id, WaitKind::ReplicasProcess).await?;
        self.set_phase(request_id, ProtocolPhase::Committing)?;
        Ok((handle, envelope.request_type))
    }

    /// Announce the commit. Failures here keep the local log entry.
    async fn commit(
        &self,
        request_id: RequestId,
        handle: &BroadcastHandle,
        logged: bool,
    ) -> CoordinatorResult<()> {
        let delivered = if logged {
            self.with_request(request_id, |active| {
                active.wait = Some(ArmedWait::new(
                    WaitKind::ReplicasLog,
                    handle.expected_acks(),
                ));
                active.phase = ProtocolPhase::AwaitingReplicasLog;
                Ok(())
            })?;
            match self
                .transport
                .send_decision(handle, PrimaryDecision::Commit { log: true })
                .await
            {
                Ok(()) => self.wait_acks(request_id, WaitKind::ReplicasLog).await,
                Err(e) => Err(CoordinatorError::ReplicationFailed {
                    phase: WaitKind::ReplicasLog,
                    reason: e.to_string(),
                }),
            }
        } else {
            self.transport
                .send_decision(handle, PrimaryDecision::Commit { log: false })
                .await
                .map_err(|e| CoordinatorError::ReplicationFailed {
                    phase: WaitKind::ReplicasProcess,
                    reason: e.to_string(),
                })
        };

        match delivered {
            Ok(()) => {
                self.set_phase(request_id, ProtocolPhase::Committed)?;
                self.finalize(request_id, HookRole::Primary, true, "");
                Ok(())
            }
            Err(e @ CoordinatorError::StaleHook { .. }) => Err(e),
            Err(e) => {
                warn!(%request_id, error = %e, "Commit not confirmed by every replica; local entry kept");
                self.finalize(request_id, HookRole::Primary, false, "commit_unconfirmed");
                Err(e.into_replication_failure())
            }
        }
    }

    /// Abort, roll back and clear. Returns the error the caller sees.
    async fn fail_primary(&self, request_id: RequestId, cause: CoordinatorError) -> CoordinatorError {
        if matches!(cause, CoordinatorError::StaleHook { .. }) {
            return cause;
        }
        warn!(%request_id, error = %cause, "[sd-wc] Aborting request");

        match self.abort_for(request_id).await {
            Ok(()) => {
                if let Err(e) = self.wait_abort_acks(request_id).await {
                    warn!(%request_id, error = %e, "Abort not confirmed by every replica");
                }
            }
            Err(e @ CoordinatorError::StaleHook { .. }) => return e,
            Err(e) => warn!(%request_id, error = %e, "Abort could not be sent"),
        }

        self.rollback_local(request_id).await;
        self.finalize(request_id, HookRole::Primary, false, abort_reason(&cause));
        cause.into_replication_failure()
    }

    // =========================================================================
    // REPLICA PROTOCOL
    // =========================================================================

    async fn finish_as_replica(&self, request_id: RequestId, success: bool) -> CoordinatorResult<()> {
        self.set_phase(request_id, ProtocolPhase::AwaitingPrimary)?;
        if let Err(e) = self
            .transport
            .send_ack(request_id, AckPhase::Process, success)
            .await
        {
            warn!(%request_id, error = %e, "Process ack not delivered");
        }

        match self.wait_decision(request_id).await {
            Ok(PrimaryDecision::Commit { log }) => {
                self.set_phase(request_id, ProtocolPhase::Committing)?;
                if log {
                    let written = self.write_log_for(request_id).await;
                    if let Err(e) = self
                        .transport
                        .send_ack(request_id, AckPhase::Log, written.is_ok())
                        .await
                    {
                        warn!(%request_id, error = %e, "Log ack not delivered");
                    }
                    if let Err(e) = written {
                        self.finalize(request_id, HookRole::Replica, false, "log_write_failed");
                        return Err(e);
                    }
                }
                self.set_phase(request_id, ProtocolPhase::Committed)?;
                self.finalize(request_id, HookRole::Replica, true, "");
                if success {
                    Ok(())
                } else {
                    Err(CoordinatorError::LocalExecutionFailure)
                }
            }
            Ok(PrimaryDecision::Abort) => {
                self.abort_callback_for(request_id).await?;
                if success {
                    Err(CoordinatorError::Aborted { request_id })
                } else {
                    Err(CoordinatorError::LocalExecutionFailure)
                }
            }
            Err(e @ CoordinatorError::StaleHook { .. }) => Err(e),
            Err(e) => {
                warn!(%request_id, error = %e, "No decision from primary, discarding request");
                self.rollback_local(request_id).await;
                self.finalize(request_id, HookRole::Replica, false, "no_decision");
                Err(e.into_replication_failure())
            }
        }
    }

    async fn abort_callback_for(&self, request_id: RequestId) -> CoordinatorResult<()> {
        self.with_request(request_id, |active| {
            if active.role != HookRole::Replica {
                return Err(CoordinatorError::InvalidPhase {
                    operation: "abort_request_callback",
                    phase: active.phase,
                });
            }
            active.phase = ProtocolPhase::Aborting;
            active.wait = None;
            Ok(())
        })?;

        self.rollback_local(request_id).await;
        if let Err(e) = self
            .transport
            .send_ack(request_id, AckPhase::Abort, true)
            .await
        {
            warn!(%request_id, error = %e, "Abort ack not delivered");
        }
        self.finalize(request_id, HookRole::Replica, false, "aborted_by_primary");
        Ok(())
    }
}

fn abort_reason(cause: &CoordinatorError) -> &'static str {
    match cause {
        CoordinatorError::LocalExecutionFailure => "local_failure",
        CoordinatorError::ReplicationFailed { .. } => "replica_failure",
        CoordinatorError::ReplicationTimeout { .. } => "timeout",
        CoordinatorError::LogWriteFailed { .. } => "log_write_failed",
        CoordinatorError::Transport { .. } => "transport",
        _ => "other",
    }
}

#[async_trait]
impl<L, T> WriteCoordinationApi for RequestCoordinator<L, T>
where
    L: RequestLog,
    T: ReplicationTransport,
{
    fn is_valid(&self) -> bool {
        self.state.lock().initialized
    }

    fn prepare(
        &self,
        request_type: RequestType,
        body: Vec<u8>,
    ) -> CoordinatorResult<RequestEnvelope> {
        let request_id = match self.raw_hook() {
            Some(request_id) => request_id,
            None => self.hook_current_req(body.clone())?,
        };

        let mut envelope = RequestEnvelope::new(request_type, body);
        envelope.request_id = request_id;
        envelope.inc_id = LogId::after(self.log.last_log_id());
        self.with_request(request_id, |active| {
            if active.phase != ProtocolPhase::Hooked || active.envelope.is_some() {
                return Err(CoordinatorError::ReentrantHook {
                    active: active.request_id,
                });
            }
            active.envelope = Some(envelope.clone());
            active.phase = ProtocolPhase::Prepared;
            Ok(())
        })?;

        Counters::bump(&self.counters.prepared);
        metrics::record_request_prepared(request_type.as_str());
        debug!(
            request_id = %envelope.request_id,
            %request_type,
            inc_id = %envelope.inc_id,
            "Prepared"
        );
        Ok(envelope)
    }

    fn hook_current_req(&self, raw: Vec<u8>) -> CoordinatorResult<RequestId> {
        let request_id = RequestId::new();
        self.hook(
            ActiveRequest::new(request_id, HookRole::Primary, ProtocolPhase::Hooked).with_raw(raw),
        )?;
        Ok(request_id)
    }

    fn on_request_from_primary(
        &self,
        type_code: u32,
        packed: &[u8],
    ) -> CoordinatorResult<RequestEnvelope> {
        let request_type = RequestType::from_code(type_code)?;
        let envelope = RequestEnvelope::unpack(packed)?;
        if envelope.request_type != request_type {
            return Err(CoordinatorError::RequestTypeMismatch {
                announced: type_code,
                carried: envelope.request_type.code(),
            });
        }

        self.hook(
            ActiveRequest::new(envelope.request_id, HookRole::Replica, ProtocolPhase::Prepared)
                .with_envelope(envelope.clone())
                .with_raw(packed.to_vec()),
        )?;
        info!(
            "[sd-wc] 📥 {} received {} {} (inc_id {})",
            self.config.node_id, request_type, envelope.request_id, envelope.inc_id
        );
        Ok(envelope)
    }

    fn is_hooked(&self) -> bool {
        self.state.lock().active.is_some()
    }

    fn hook_type(&self) -> HookRole {
        self.state
            .lock()
            .active
            .as_ref()
            .map_or(HookRole::Unhooked, |active| active.role)
    }

    fn addition_data(&self) -> Vec<u8> {
        self.state
            .lock()
            .active
            .as_ref()
            .map(ActiveRequest::addition_data)
            .unwrap_or_default()
    }

    fn current_envelope(&self) -> Option<RequestEnvelope> {
        self.state
            .lock()
            .active
            .as_ref()
            .and_then(|active| active.envelope.clone())
    }

    fn set_chain_status(&self, status: ChainStatus) -> CoordinatorResult<bool> {
        let mut state = self.state.lock();
        let Some(active) = state.active.as_mut() else {
            return Ok(true);
        };
        validate_chain_transition(active.chain_status, status).map_err(|violation| {
            CoordinatorError::ChainOrderViolation {
                from: violation.from,
                to: violation.to,
            }
        })?;
        active.chain_status = status;
        Ok(true)
    }

    fn chain_status(&self) -> ChainStatus {
        self.state
            .lock()
            .active
            .as_ref()
            .map_or(ChainStatus::NoChain, |active| active.chain_status)
    }

    fn read_prev_chain_data(&self) -> CoordinatorResult<RequestEnvelope> {
        let state = self.state.lock();
        let active = state.active.as_ref().ok_or(CoordinatorError::NotHooked)?;
        if !active.chain_status.has_previous_step() {
            return Err(CoordinatorError::NoPrevChainData);
        }
        active
            .chain_snapshot
            .clone()
            .ok_or(CoordinatorError::NoPrevChainData)
    }

    fn process_local_begin(&self) -> CoordinatorResult<()> {
        let mut state = self.state.lock();
        let active = state.active.as_mut().ok_or(CoordinatorError::NotHooked)?;
        if !active.phase.can_begin_local() {
            return Err(CoordinatorError::InvalidPhase {
                operation: "process_local_begin",
                phase: active.phase,
            });
        }
        active.phase = ProtocolPhase::LocalExecuting;
        Ok(())
    }

    async fn process_local_finished(&self, success: bool) -> CoordinatorResult<()> {
        let request_id = self.current_id()?;
        self.finish_request(request_id, success, None).await
    }

    async fn process_local_finished_with(
        &self,
        success: bool,
        updated: RequestEnvelope,
    ) -> CoordinatorResult<()> {
        let request_id = self.current_id()?;
        self.finish_request(request_id, success, Some(updated)).await
    }

    async fn process_finished_before_prepare(&self, success: bool) -> bool {
        let (request_id, role, phase) = {
            let state = self.state.lock();
            match state.active.as_ref() {
                Some(active) => (active.request_id, active.role, active.phase),
                None => return success,
            }
        };

        let result = if role == HookRole::Primary && phase == ProtocolPhase::Hooked {
            self.record_outcome(request_id, success);
            success
        } else {
            match self.finish_request(request_id, success, None).await {
                Ok(()) => true,
                Err(e) => {
                    debug!(%request_id, error = %e, "Finished before prepare with error");
                    false
                }
            }
        };

        self.release(request_id);
        result
    }

    async fn write_local_log(&self) -> CoordinatorResult<bool> {
        let request_id = self.current_id()?;
        let request_type = self.with_request(request_id, |active| {
            active
                .envelope
                .as_ref()
                .map(|envelope| envelope.request_type)
                .ok_or(CoordinatorError::InvalidPhase {
                    operation: "write_local_log",
                    phase: active.phase,
                })
        })?;
        if !is_need_backup(request_type) {
            return Ok(false);
        }
        self.write_log_for(request_id).await?;
        Ok(true)
    }

    async fn wait_replicas_process_callback(&self) -> CoordinatorResult<()> {
        let request_id = self.current_id()?;
        self.wait_acks(request_id, WaitKind::ReplicasProcess).await
    }

    async fn wait_replicas_log_callback(&self) -> CoordinatorResult<()> {
        let request_id = self.current_id()?;
        self.wait_acks(request_id, WaitKind::ReplicasLog).await
    }

    async fn wait_primary_callback(&self) -> CoordinatorResult<PrimaryDecision> {
        let request_id = self.current_id()?;
        self.with_request(request_id, |active| {
            if active.role == HookRole::Replica {
                Ok(())
            } else {
                Err(CoordinatorError::InvalidPhase {
                    operation: "wait_primary_callback",
                    phase: active.phase,
                })
            }
        })?;
        self.wait_decision(request_id).await
    }

    async fn abort_request(&self) -> CoordinatorResult<()> {
        let request_id = self.current_id()?;
        self.abort_for(request_id).await
    }

    async fn abort_request_callback(&self) -> CoordinatorResult<()> {
        let request_id = self.current_id()?;
        self.abort_callback_for(request_id).await
    }

    async fn wait_replicas_abort_callback(&self) -> CoordinatorResult<()> {
        let request_id = self.current_id()?;
        self.wait_abort_acks(request_id).await
    }

    fn clear_hook(&self, force: bool) -> CoordinatorResult<()> {
        let mut state = self.state.lock();
        let Some(active) = state.active.as_ref() else {
            return Ok(());
        };
        if !force && (active.phase.is_in_flight() || active.wait.is_some()) {
            return Err(CoordinatorError::InvalidPhase {
                operation: "clear_hook",
                phase: active.phase,
            });
        }
        debug!(request_id = %active.request_id, force, "Hook cleared");
        state.active = None;
        Ok(())
    }

    fn on_electing_finished(&self) {
        let reset = self.state.lock().active.take();
        match reset {
            // Local effects stay; the new leader's log decides what survives.
            Some(active) => {
                Counters::bump(&self.counters.election_resets);
                metrics::record_election_reset();
                warn!(
                    "[sd-wc] ⚠️ Leader election finished, force-exiting {} ({} in phase {})",
                    active.request_id, active.role, active.phase
                );
            }
            None => debug!("Leader election finished, nothing hooked"),
        }
    }
}
