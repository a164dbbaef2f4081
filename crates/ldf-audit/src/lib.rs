//! Write-through audit log and distribution build log emission.
//!
//! Both sinks are append-only and never block the business operation that
//! triggered them: a write failure is retried once, then swallowed with a
//! `tracing::error!` rather than surfaced to the caller.

use ldf_types::{AuditEvent, DistributionLogEntry, LogLevel};
use uuid::Uuid;

/// Persistence boundary for [`AuditEvent`]s.
#[async_trait::async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> anyhow::Result<()>;
}

/// Persistence boundary for [`DistributionLogEntry`] append operations.
#[async_trait::async_trait]
pub trait DistributionLogSink: Send + Sync {
    async fn append(&self, entry: &DistributionLogEntry) -> anyhow::Result<()>;
}

/// Builds an [`AuditEvent`] with a fresh id and the current timestamp.
pub fn build_event(
    action: impl Into<String>,
    user_id: Option<Uuid>,
    user_name: Option<String>,
    resource: impl Into<String>,
    client_ip: Option<String>,
    detail: Option<String>,
    success: bool,
) -> AuditEvent {
    AuditEvent {
        id: Uuid::new_v4(),
        action: action.into(),
        user_id,
        user_name,
        resource: resource.into(),
        client_ip,
        detail,
        success,
        timestamp: chrono::Utc::now(),
    }
}

/// Emits `event` through `sink`, retrying once on failure and swallowing
/// the error after that — an audit failure must never fail the caller's
/// underlying operation.
pub async fn emit(sink: &dyn AuditSink, event: AuditEvent) {
    if sink.record(&event).await.is_ok() {
        return;
    }
    if let Err(err) = sink.record(&event).await {
        tracing::error!(action = %event.action, resource = %event.resource, error = %err, "audit event dropped after retry");
    }
}

/// Appends a build log line for `distribution_id`, same best-effort
/// retry-then-swallow semantics as [`emit`].
pub async fn log(
    sink: &dyn DistributionLogSink,
    distribution_id: Uuid,
    level: LogLevel,
    message: impl Into<String>,
) {
    let entry = DistributionLogEntry {
        id: Uuid::new_v4(),
        distribution_id,
        level,
        message: message.into(),
        created_at: chrono::Utc::now(),
    };

    if sink.append(&entry).await.is_ok() {
        return;
    }
    if let Err(err) = sink.append(&entry).await {
        tracing::error!(%distribution_id, error = %err, "distribution log entry dropped after retry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<AuditEvent>>,
        fail_first_n: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl AuditSink for RecordingSink {
        async fn record(&self, event: &AuditEvent) -> anyhow::Result<()> {
            if self.fail_first_n.load(Ordering::SeqCst) > 0 {
                self.fail_first_n.fetch_sub(1, Ordering::SeqCst);
                anyhow::bail!("simulated write failure");
            }
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct AlwaysFailsSink;

    #[async_trait::async_trait]
    impl AuditSink for AlwaysFailsSink {
        async fn record(&self, _event: &AuditEvent) -> anyhow::Result<()> {
            anyhow::bail!("always fails")
        }
    }

    #[tokio::test]
    async fn successful_write_records_exactly_once() {
        let sink = RecordingSink::default();
        let event = build_event("create_distribution", None, None, "distribution:abc", None, None, true);
        emit(&sink, event).await;
        assert_eq!(sink.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transient_failure_is_recovered_by_the_retry() {
        let sink = RecordingSink {
            fail_first_n: AtomicUsize::new(1),
            ..Default::default()
        };
        let event = build_event("delete_distribution", None, None, "distribution:abc", None, None, true);
        emit(&sink, event).await;
        assert_eq!(sink.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn persistent_failure_is_swallowed_not_panicked() {
        let sink = AlwaysFailsSink;
        let event = build_event("reset_database", None, None, "system", None, None, false);
        emit(&sink, event).await;
    }

    #[test]
    fn build_event_copies_all_fields() {
        let user_id = Uuid::new_v4();
        let event = build_event(
            "update_settings",
            Some(user_id),
            Some("alice".to_string()),
            "settings:log.level",
            Some("127.0.0.1".to_string()),
            Some("changed to debug".to_string()),
            true,
        );
        assert_eq!(event.action, "update_settings");
        assert_eq!(event.user_id, Some(user_id));
        assert!(event.success);
    }
}
