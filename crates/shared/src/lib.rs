//! Shared types and database plumbing for OpsLedger.
//!
//! Holds the domain records synced from the RMM and helpdesk platforms,
//! the billing-category enumeration, and pool/migration helpers used by
//! every binary.

pub mod db;
pub mod types;

pub use db::{create_pool, run_migrations};
pub use types::{
    Asset, AssetOverride, BillingCategory, Company, CustomLineItem, EndUser, ManualAsset,
    ManualUser, TicketDetail, UserOverride,
};
