//! External data-sync jobs
//!
//! Thin pullers for the RMM and helpdesk platforms. Every sync is
//! idempotent: records upsert by their stable external key and re-running
//! a job converges to the same rows. Billing reads are never blocked;
//! operator-assigned billing categories are left untouched on refresh.

pub mod helpdesk;
pub mod rmm;
pub mod tickets;

/// Counts reported by one sync run.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncSummary {
    pub upserted: u32,
    pub skipped: u32,
}

impl std::fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} upserted, {} skipped", self.upserted, self.skipped)
    }
}
