//! Security-related functionality for the ingestion engine: audit logging
//! of ingest, reprocess, and stage-transition events (the `audit_log`
//! table in the data model). Access control and encryption are out of
//! scope for this engine (handled by the external collaborators named in
//! spec.md §1).

pub mod audit;

pub use audit::{
    ActorType, AuditConfig, AuditContext, AuditEntry, AuditEventType, AuditLogLevel, AuditLogger,
    AuditOutput, AuditResult,
};
