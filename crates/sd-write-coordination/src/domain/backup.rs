//! Which request types are written to the request log.
//!
//! Everything that changes collection data or configuration must be logged
//! so a lagging or restarted node can catch up. Scheduler-driven jobs and
//! asynchronous callbacks are re-derived rather than replayed.

use shared_types::RequestType;

/// Whether a committed request of this type is appended to the log on every
/// node.
pub(crate) fn is_need_backup(request_type: RequestType) -> bool {
    !matches!(
        request_type,
        RequestType::CronJob | RequestType::Callback | RequestType::NoAdditionData
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutations_are_logged() {
        assert!(is_need_backup(RequestType::DocumentInsert));
        assert!(is_need_backup(RequestType::DocumentDelete));
        assert!(is_need_backup(RequestType::RebuildFromScd));
        assert!(is_need_backup(RequestType::ConfigUpdate));
    }

    #[test]
    fn test_jobs_are_not_logged() {
        assert!(!is_need_backup(RequestType::CronJob));
        assert!(!is_need_backup(RequestType::Callback));
        assert!(!is_need_backup(RequestType::NoAdditionData));
    }
}
