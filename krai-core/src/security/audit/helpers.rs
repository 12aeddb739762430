// ============================================================================
// Audit Helper Functions
// ============================================================================
//!
//! Convenience functions for creating common audit entries.

use super::types::{AuditEntry, AuditEventType, AuditLogLevel, AuditResult};
use super::AuditContext;
use crate::types::Stage;
use uuid::Uuid;

/// Create an audit entry for a newly ingested document.
#[must_use]
pub fn document_ingested(
    context: &AuditContext,
    document_id: Uuid,
    filename: &str,
    file_hash: &str,
) -> AuditEntry {
    AuditEntry::new(AuditEventType::DocumentIngested, context.actor.clone())
        .with_level(AuditLogLevel::Info)
        .with_resource_id(document_id.to_string())
        .with_detail("filename", filename)
        .unwrap_or_else(|_| AuditEntry::new(AuditEventType::DocumentIngested, context.actor.clone()))
        .with_detail("file_hash", file_hash)
        .unwrap_or_else(|_| AuditEntry::new(AuditEventType::DocumentIngested, context.actor.clone()))
        .with_session_id(context.session_id.clone().unwrap_or_default())
}

/// Create an audit entry for a stage transitioning to `running`.
#[must_use]
pub fn stage_started(context: &AuditContext, document_id: Uuid, stage: Stage) -> AuditEntry {
    AuditEntry::new(AuditEventType::StageStarted, context.actor.clone())
        .with_level(AuditLogLevel::Debug)
        .with_resource_id(document_id.to_string())
        .with_detail("stage", stage.as_str())
        .unwrap_or_else(|_| AuditEntry::new(AuditEventType::StageStarted, context.actor.clone()))
        .with_session_id(context.session_id.clone().unwrap_or_default())
}

/// Create an audit entry for a stage that completed successfully.
#[must_use]
pub fn stage_completed(
    context: &AuditContext,
    document_id: Uuid,
    stage: Stage,
    duration_ms: u64,
) -> AuditEntry {
    AuditEntry::new(AuditEventType::StageCompleted, context.actor.clone())
        .with_level(AuditLogLevel::Info)
        .with_resource_id(document_id.to_string())
        .with_detail("stage", stage.as_str())
        .unwrap_or_else(|_| AuditEntry::new(AuditEventType::StageCompleted, context.actor.clone()))
        .with_detail("duration_ms", duration_ms)
        .unwrap_or_else(|_| AuditEntry::new(AuditEventType::StageCompleted, context.actor.clone()))
        .with_session_id(context.session_id.clone().unwrap_or_default())
}

/// Create an audit entry for a stage failure, including whether it will
/// be retried.
#[must_use]
pub fn stage_failed(
    context: &AuditContext,
    document_id: Uuid,
    stage: Stage,
    error_kind: &str,
    will_retry: bool,
) -> AuditEntry {
    let event_type = if will_retry {
        AuditEventType::StageRetried
    } else {
        AuditEventType::StageFailed
    };

    AuditEntry::new(event_type, context.actor.clone())
        .with_level(AuditLogLevel::Warn)
        .with_resource_id(document_id.to_string())
        .with_detail("stage", stage.as_str())
        .unwrap_or_else(|_| AuditEntry::new(event_type, context.actor.clone()))
        .with_detail("error_kind", error_kind)
        .unwrap_or_else(|_| AuditEntry::new(event_type, context.actor.clone()))
        .with_result(AuditResult::Failure {
            reason: error_kind.to_string(),
        })
        .with_session_id(context.session_id.clone().unwrap_or_default())
}

/// Create an audit entry for an operator-triggered manual requeue of a
/// stage that had exhausted its automatic retries.
#[must_use]
pub fn queue_item_requeued(
    context: &AuditContext,
    document_id: Uuid,
    stage: Stage,
    reason: &str,
) -> AuditEntry {
    AuditEntry::new(AuditEventType::QueueItemRequeued, context.actor.clone())
        .with_level(AuditLogLevel::Info)
        .with_resource_id(document_id.to_string())
        .with_detail("stage", stage.as_str())
        .unwrap_or_else(|_| {
            AuditEntry::new(AuditEventType::QueueItemRequeued, context.actor.clone())
        })
        .with_detail("reason", reason)
        .unwrap_or_else(|_| {
            AuditEntry::new(AuditEventType::QueueItemRequeued, context.actor.clone())
        })
        .with_session_id(context.session_id.clone().unwrap_or_default())
}

/// Create an audit entry for a manufacturer pattern file hot-reload.
#[must_use]
pub fn pattern_file_reloaded(context: &AuditContext, manufacturer_count: usize) -> AuditEntry {
    AuditEntry::new(AuditEventType::PatternFileReloaded, context.actor.clone())
        .with_level(AuditLogLevel::Info)
        .with_detail("manufacturer_count", manufacturer_count)
        .unwrap_or_else(|_| {
            AuditEntry::new(AuditEventType::PatternFileReloaded, context.actor.clone())
        })
        .with_session_id(context.session_id.clone().unwrap_or_default())
}

/// Create an audit entry for a pattern file reload rejected by schema
/// validation; the previous snapshot remains live.
#[must_use]
pub fn pattern_file_rejected(context: &AuditContext, reason: &str) -> AuditEntry {
    AuditEntry::new(AuditEventType::PatternFileRejected, context.actor.clone())
        .with_level(AuditLogLevel::Error)
        .with_detail("reason", reason)
        .unwrap_or_else(|_| {
            AuditEntry::new(AuditEventType::PatternFileRejected, context.actor.clone())
        })
        .with_result(AuditResult::Failure {
            reason: reason.to_string(),
        })
        .with_session_id(context.session_id.clone().unwrap_or_default())
}

/// Create an audit entry for access denial.
#[must_use]
pub fn access_denied(
    context: &AuditContext,
    resource: &str,
    action: &str,
    reason: &str,
) -> AuditEntry {
    AuditEntry::new(AuditEventType::AccessDenied, context.actor.clone())
        .with_level(AuditLogLevel::Critical)
        .with_resource_id(resource)
        .with_detail("action", action)
        .unwrap_or_else(|_| AuditEntry::new(AuditEventType::AccessDenied, context.actor.clone()))
        .with_detail("reason", reason)
        .unwrap_or_else(|_| AuditEntry::new(AuditEventType::AccessDenied, context.actor.clone()))
        .with_result(AuditResult::Denied {
            reason: reason.to_string(),
        })
        .with_session_id(context.session_id.clone().unwrap_or_default())
}

/// Create an audit entry for configuration changes.
#[must_use]
pub fn config_changed(
    context: &AuditContext,
    config_key: &str,
    old_value: &str,
    new_value: &str,
) -> AuditEntry {
    AuditEntry::new(AuditEventType::ConfigChanged, context.actor.clone())
        .with_level(AuditLogLevel::Warn)
        .with_resource_id(config_key)
        .with_detail("config_key", config_key)
        .unwrap_or_else(|_| AuditEntry::new(AuditEventType::ConfigChanged, context.actor.clone()))
        .with_detail("old_value", old_value)
        .unwrap_or_else(|_| AuditEntry::new(AuditEventType::ConfigChanged, context.actor.clone()))
        .with_detail("new_value", new_value)
        .unwrap_or_else(|_| AuditEntry::new(AuditEventType::ConfigChanged, context.actor.clone()))
        .with_session_id(context.session_id.clone().unwrap_or_default())
}
