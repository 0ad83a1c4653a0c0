//! Audit trail writer.
//!
//! Entries are written off the request path once the outcome is known. A
//! failed write is logged and never reaches the caller.

use std::sync::Arc;

use serde_json::Value;

use z_ledger_core::AuditEntry;
use z_ledger_store::{AuditLog, RocksStore};

use crate::error::ApiError;

/// Records mutating operations into the store's audit log.
#[derive(Clone)]
pub struct Auditor {
    store: Arc<RocksStore>,
}

/// What is being audited.
#[derive(Debug, Clone, Copy)]
pub struct AuditAction<'a> {
    /// Caller: user id, admin id or service name.
    pub actor: &'a str,
    /// Action name, e.g. `credits.transfer`.
    pub action: &'static str,
    /// Resource type.
    pub resource: &'static str,
}

impl Auditor {
    /// Create an auditor writing to `store`.
    #[must_use]
    pub fn new(store: Arc<RocksStore>) -> Self {
        Self { store }
    }

    /// Record the outcome of an operation and pass it through unchanged.
    pub fn record<T>(
        &self,
        what: AuditAction<'_>,
        resource_id: Option<String>,
        payload: &Value,
        result: Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let error = result.as_ref().err().map(ToString::to_string);
        let entry = AuditEntry::new(what.actor, what.action, what.resource, resource_id, payload, error);
        self.spawn_write(entry);
        result
    }

    fn spawn_write(&self, entry: AuditEntry) {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = store.append_audit(&entry) {
                tracing::warn!(
                    error = %e,
                    action = %entry.action,
                    actor = %entry.actor,
                    "Failed to write audit entry"
                );
            }
        });
    }
}
