//! # `RequestEnvelope`
//!
//! The unit of replication for every mutating request.
//!
//! ## Two Forms
//!
//! - **Raw**: on the primary, `body` holds the caller-supplied request exactly
//!   as it arrived.
//! - **Packed**: what replicas receive. The whole envelope, including the
//!   fields computed by the primary (`inc_id`, `timestamp_ms`, `addition`),
//!   serialized with `bincode` behind a one-byte format version. Replicas
//!   apply the primary's decisions instead of recomputing them.

use crate::entities::{now_millis, LogId, RequestId, Timestamp};
use crate::errors::EnvelopeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of mutation carried by an envelope.
///
/// The numeric codes are stable; they travel on the wire and in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum RequestType {
    /// Insert new documents into a collection.
    DocumentInsert = 1,
    /// Update existing documents.
    DocumentUpdate = 2,
    /// Delete documents.
    DocumentDelete = 3,
    /// Index a batch of SCD files.
    IndexBatch = 4,
    /// Rebuild a collection from its SCD files.
    RebuildFromScd = 5,
    /// Change collection or node configuration.
    ConfigUpdate = 6,
    /// Rebuild recommendation data.
    RecommendIndex = 7,
    /// Periodic maintenance job fired by the scheduler.
    CronJob = 8,
    /// Callback from an asynchronous job.
    Callback = 9,
    /// Request whose execution needs no primary-computed data.
    NoAdditionData = 10,
}

impl RequestType {
    /// All known request types, in code order.
    pub const ALL: [RequestType; 10] = [
        RequestType::DocumentInsert,
        RequestType::DocumentUpdate,
        RequestType::DocumentDelete,
        RequestType::IndexBatch,
        RequestType::RebuildFromScd,
        RequestType::ConfigUpdate,
        RequestType::RecommendIndex,
        RequestType::CronJob,
        RequestType::Callback,
        RequestType::NoAdditionData,
    ];

    /// Stable wire code of this type.
    #[must_use]
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Look up a type by wire code.
    pub fn from_code(code: u32) -> Result<Self, EnvelopeError> {
        Self::ALL
            .into_iter()
            .find(|t| t.code() == code)
            .ok_or(EnvelopeError::UnknownRequestType { code })
    }

    /// Short name used in logs and metric labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RequestType::DocumentInsert => "document_insert",
            RequestType::DocumentUpdate => "document_update",
            RequestType::DocumentDelete => "document_delete",
            RequestType::IndexBatch => "index_batch",
            RequestType::RebuildFromScd => "rebuild_from_scd",
            RequestType::ConfigUpdate => "config_update",
            RequestType::RecommendIndex => "recommend_index",
            RequestType::CronJob => "cron_job",
            RequestType::Callback => "callback",
            RequestType::NoAdditionData => "no_addition_data",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u32> for RequestType {
    type Error = EnvelopeError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

/// A mutating request together with everything the primary decided about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Correlation id shared by the primary and every replica.
    pub request_id: RequestId,
    /// Mutation kind.
    pub request_type: RequestType,
    /// Log sequence number assigned by the primary. Every node logs the
    /// request under this id.
    pub inc_id: LogId,
    /// Primary wall clock at preparation time.
    pub timestamp_ms: Timestamp,
    /// Raw caller request.
    pub body: Vec<u8>,
    /// Primary-computed data replicas must apply verbatim
    /// (assigned document ids, resolved file lists, ...).
    pub addition: Vec<u8>,
}

impl RequestEnvelope {
    /// Current packed format version.
    pub const FORMAT_VERSION: u8 = 1;

    /// Create an envelope for a freshly received request.
    ///
    /// `inc_id` is left at zero; the coordinator assigns it in `prepare`.
    pub fn new(request_type: RequestType, body: impl Into<Vec<u8>>) -> Self {
        Self {
            request_id: RequestId::new(),
            request_type,
            inc_id: LogId::default(),
            timestamp_ms: now_millis(),
            body: body.into(),
            addition: Vec::new(),
        }
    }

    /// Attach primary-computed data.
    #[must_use]
    pub fn with_addition(mut self, addition: impl Into<Vec<u8>>) -> Self {
        self.addition = addition.into();
        self
    }

    /// Serialize into the packed form sent to replicas and stored in the log.
    pub fn pack(&self) -> Result<Vec<u8>, EnvelopeError> {
        let mut out = vec![Self::FORMAT_VERSION];
        bincode::serialize_into(&mut out, self)
            .map_err(|e| EnvelopeError::Encode(e.to_string()))?;
        Ok(out)
    }

    /// Decode the packed form.
    pub fn unpack(packed: &[u8]) -> Result<Self, EnvelopeError> {
        let (&version, rest) = packed.split_first().ok_or(EnvelopeError::Empty)?;
        if version != Self::FORMAT_VERSION {
            return Err(EnvelopeError::UnsupportedVersion {
                received: version,
                supported: Self::FORMAT_VERSION,
            });
        }
        bincode::deserialize(rest).map_err(|e| EnvelopeError::Decode(e.to_string()))
    }
}
