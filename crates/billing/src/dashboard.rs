//! Dashboard summary rows
//!
//! Shapes one list-view row per client from the assembler's outcome. A
//! client whose plan lookup misses gets a degraded, clearly labeled zero
//! row; it must never break or drop the rest of the list.

use serde::Serialize;
use time::{Date, OffsetDateTime};

use opsledger_shared::types::Company;

use crate::assemble::{contract_end, BillingOutcome, DEFAULT_TERM};

/// Plan label shown on a degraded row.
pub const UNCONFIGURED_PLAN_LABEL: &str = "Unconfigured";

/// One row of the billing dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct ClientSummaryRow {
    pub account_number: String,
    pub name: String,
    pub billing_plan: String,
    pub support_level: Option<String>,
    pub contract_end_date: Option<Date>,
    pub contract_expired: bool,
    pub workstations: u32,
    pub servers: u32,
    pub vms: u32,
    pub regular_users: u32,
    pub total_backup_bytes: f64,
    pub total_hours: f64,
    pub total_bill: f64,
}

/// Shape a summary row from one client's assembly outcome.
pub fn summary_row(company: &Company, outcome: &BillingOutcome, now: OffsetDateTime) -> ClientSummaryRow {
    match outcome {
        BillingOutcome::Ready(details) => ClientSummaryRow {
            account_number: details.company.account_number.clone(),
            name: details.company.name.clone(),
            billing_plan: details.effective_plan.clone(),
            support_level: details.support_level.clone(),
            contract_end_date: details.contract_end_date,
            contract_expired: details.contract_expired,
            workstations: details.quantities.workstations,
            servers: details.quantities.servers,
            vms: details.quantities.vms,
            regular_users: details.quantities.paid_users,
            total_backup_bytes: details.receipt.backup.total_bytes,
            total_hours: details.receipt.tickets.hours_for_period,
            total_bill: details.receipt.total,
        },
        BillingOutcome::PlanUnconfigured { .. } => degraded_row(company, now),
    }
}

/// Zeroed row for a client whose plan/term has no template. Contract data
/// still comes from the company record so the list stays informative.
pub fn degraded_row(company: &Company, now: OffsetDateTime) -> ClientSummaryRow {
    let term = company.contract_term_length.as_deref().unwrap_or(DEFAULT_TERM);
    let contract_end_date = company
        .contract_start_date
        .and_then(|start| contract_end(start.date(), term));
    ClientSummaryRow {
        account_number: company.account_number.clone(),
        name: company.name.clone(),
        billing_plan: UNCONFIGURED_PLAN_LABEL.to_string(),
        support_level: company.support_level.clone(),
        contract_end_date,
        contract_expired: contract_end_date
            .map(|end| end < now.date())
            .unwrap_or(false),
        workstations: 0,
        servers: 0,
        vms: 0,
        regular_users: 0,
        total_backup_bytes: 0.0,
        total_hours: 0.0,
        total_bill: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn company() -> Company {
        Company {
            account_number: "ACME-001".to_string(),
            name: "Acme Corp".to_string(),
            helpdesk_id: Some(7),
            rmm_site_uid: None,
            billing_plan: Some("Managed".to_string()),
            status: Some("Active".to_string()),
            contract_term_length: Some("1-Year".to_string()),
            contract_start_date: Some(datetime!(2022-04-15 00:00 UTC)),
            support_level: Some("All Inclusive".to_string()),
            phone_number: None,
            client_start_date: None,
        }
    }

    #[test]
    fn unconfigured_plan_yields_labeled_zero_row() {
        let outcome = BillingOutcome::PlanUnconfigured {
            plan: "Managed".to_string(),
            term: "1-Year".to_string(),
        };
        let row = summary_row(&company(), &outcome, datetime!(2024-06-01 00:00 UTC));
        assert_eq!(row.billing_plan, UNCONFIGURED_PLAN_LABEL);
        assert_eq!(row.total_bill, 0.0);
        assert_eq!(row.workstations, 0);
        assert_eq!(row.name, "Acme Corp");
        // Contract data still derives from the company record
        assert!(row.contract_end_date.is_some());
        assert!(row.contract_expired);
    }

    #[test]
    fn degraded_row_without_contract_dates_is_not_expired() {
        let mut unconfigured = company();
        unconfigured.contract_start_date = None;
        let row = degraded_row(&unconfigured, datetime!(2024-06-01 00:00 UTC));
        assert!(row.contract_end_date.is_none());
        assert!(!row.contract_expired);
    }
}
