//! Append-only audit log, keyed by time-ordered entry id.

use z_ledger_core::AuditEntry;

use crate::error::Result;
use crate::keys;
use crate::rocks::RocksStore;
use crate::schema::cf;
use crate::AuditLog;

impl AuditLog for RocksStore {
    fn append_audit(&self, entry: &AuditEntry) -> Result<()> {
        self.run_in_transaction("append_audit", |tx| {
            tx.put(cf::AUDIT_LOG, &keys::ulid_key(entry.id.to_bytes()), entry)
        })
    }

    fn list_audit(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        self.scan_values_rev(cf::AUDIT_LOG, limit)
    }
}
