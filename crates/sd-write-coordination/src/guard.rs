//! # Write Scope
//!
//! Scoped guard around one local write.
//!
//! ```rust,ignore
//! let mut scope = WriteScope::begin(&coordinator)?;
//! let envelope = scope.prepare(RequestType::DocumentInsert, body).await?;
//! if index.apply(&envelope).is_ok() {
//!     scope.set_success();
//! }
//! scope.finish().await?;
//! ```
//!
//! A scope is pessimistic: unless `set_success` is called, finishing it
//! reports a failed local execution, which aborts the request. Dropping it
//! without `finish` always aborts.

use crate::domain::HookRole;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::ports::inbound::WriteCoordinationApi;
use crate::ports::outbound::{ReplicationTransport, RequestLog};
use crate::service::RequestCoordinator;
use shared_types::{RequestEnvelope, RequestId, RequestType};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Guard that reports the end of local execution exactly once.
pub struct WriteScope<L, T>
where
    L: RequestLog + 'static,
    T: ReplicationTransport + 'static,
{
    coordinator: Arc<RequestCoordinator<L, T>>,
    request_id: Option<RequestId>,
    success: bool,
    finished: bool,
}

impl<L, T> WriteScope<L, T>
where
    L: RequestLog + 'static,
    T: ReplicationTransport + 'static,
{
    /// Open a scope. Fails with `InvalidContext` when the coordinator is not
    /// initialized.
    pub fn begin(coordinator: &Arc<RequestCoordinator<L, T>>) -> CoordinatorResult<Self> {
        if !coordinator.is_valid() {
            return Err(CoordinatorError::InvalidContext);
        }
        let request_id = coordinator.current_envelope().map(|e| e.request_id);
        Ok(Self {
            coordinator: Arc::clone(coordinator),
            request_id,
            success: false,
            finished: false,
        })
    }

    /// Obtain the envelope to execute and mark local execution as started.
    ///
    /// - Nothing hooked, or a raw primary hook: prepares the request as
    ///   primary.
    /// - Hooked as replica: returns the primary's envelope; `request_type`
    ///   must match it.
    /// - Hooked as primary inside a chain: returns the previous step's
    ///   snapshot.
    pub async fn prepare(
        &mut self,
        request_type: RequestType,
        body: impl Into<Vec<u8>>,
    ) -> CoordinatorResult<RequestEnvelope> {
        let envelope = match self.coordinator.hook_type() {
            HookRole::Unhooked => self.coordinator.prepare(request_type, body.into())?,
            HookRole::Replica => {
                let envelope = self
                    .coordinator
                    .current_envelope()
                    .ok_or(CoordinatorError::NotHooked)?;
                if envelope.request_type != request_type {
                    return Err(CoordinatorError::RequestTypeMismatch {
                        announced: request_type.code(),
                        carried: envelope.request_type.code(),
                    });
                }
                envelope
            }
            HookRole::Primary if self.coordinator.current_envelope().is_none() => {
                self.coordinator.prepare(request_type, body.into())?
            }
            HookRole::Primary => self.coordinator.read_prev_chain_data()?,
        };

        self.request_id = Some(envelope.request_id);
        self.coordinator.process_local_begin()?;
        Ok(envelope)
    }

    /// Mark local execution as successful.
    pub fn set_success(&mut self) {
        self.success = true;
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn request_id(&self) -> Option<RequestId> {
        self.request_id
    }

    /// Report the outcome and drive the protocol to its end.
    pub async fn finish(mut self) -> CoordinatorResult<()> {
        self.finished = true;
        let request_id = self.request_id.ok_or(CoordinatorError::NotHooked)?;
        self.coordinator
            .finish_request(request_id, self.success, None)
            .await
    }

    /// Same as `finish`, replacing the envelope with the executed copy.
    pub async fn finish_with(mut self, updated: RequestEnvelope) -> CoordinatorResult<()> {
        self.finished = true;
        let request_id = self.request_id.ok_or(CoordinatorError::NotHooked)?;
        self.coordinator
            .finish_request(request_id, self.success, Some(updated))
            .await
    }
}

impl<L, T> Drop for WriteScope<L, T>
where
    L: RequestLog + 'static,
    T: ReplicationTransport + 'static,
{
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let Some(request_id) = self.request_id else {
            return;
        };

        // Dropping is the early-return path: the request fails even when
        // `set_success` was called.
        warn!(
            %request_id,
            marked_success = self.success,
            "WriteScope dropped without finish, aborting"
        );
        self.coordinator.record_outcome(request_id, false);

        match Handle::try_current() {
            Ok(handle) => {
                let coordinator = Arc::clone(&self.coordinator);
                handle.spawn(async move {
                    match coordinator.finish_request(request_id, false, None).await {
                        Err(CoordinatorError::LocalExecutionFailure) => {
                            debug!(%request_id, "Abandoned write aborted")
                        }
                        Err(e) => {
                            warn!(%request_id, error = %e, "Abandoned write ended with error");
                            coordinator.release(request_id);
                        }
                        Ok(()) => {}
                    }
                });
            }
            Err(_) => {
                self.coordinator.release(request_id);
            }
        }
    }
}
