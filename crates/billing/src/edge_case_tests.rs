// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Edge Case Tests for the Billing Engine
//!
//! Exercises boundary conditions across:
//! - Rate resolution (template/override merging)
//! - Entity classification and pricing
//! - Backup and ticket-hour metering
//! - Line-item recurrence
//! - Full assembly and receipt reconciliation
//! - Dashboard degradation

use std::collections::HashMap;

use time::macros::datetime;
use time::OffsetDateTime;

use opsledger_shared::types::{
    Asset, AssetOverride, Company, CustomLineItem, EndUser, ManualAsset, ManualUser, TicketDetail,
};

use crate::assemble::{assemble, BillingOutcome, BillingSnapshot};
use crate::dashboard::{summary_row, UNCONFIGURED_PLAN_LABEL};
use crate::rates::{ClientOverride, PlanRates, RateValue};
use crate::usage::BYTES_PER_TB;

fn company() -> Company {
    Company {
        account_number: "ACME-001".to_string(),
        name: "Acme Corp".to_string(),
        helpdesk_id: Some(7),
        rmm_site_uid: Some("site-acme".to_string()),
        billing_plan: Some("Managed".to_string()),
        status: Some("Active".to_string()),
        contract_term_length: Some("1-Year".to_string()),
        contract_start_date: Some(datetime!(2022-04-15 00:00 UTC)),
        support_level: Some("All Inclusive".to_string()),
        phone_number: None,
        client_start_date: None,
    }
}

fn plan() -> PlanRates {
    let mut plan = PlanRates::default();
    plan.set("billing_plan", RateValue::Text("Managed".to_string()));
    plan.set("term_length", RateValue::Text("1-Year".to_string()));
    plan.set("support_level", RateValue::Text("All Inclusive".to_string()));
    plan.set("per_workstation_cost", RateValue::Number(20.0));
    plan.set("per_server_cost", RateValue::Number(60.0));
    plan.set("per_vm_cost", RateValue::Number(30.0));
    plan.set("per_switch_cost", RateValue::Number(5.0));
    plan.set("per_firewall_cost", RateValue::Number(8.0));
    plan.set("per_user_cost", RateValue::Number(10.0));
    plan.set("per_hour_ticket_cost", RateValue::Number(100.0));
    plan.set("backup_base_fee_workstation", RateValue::Number(25.0));
    plan.set("backup_base_fee_server", RateValue::Number(50.0));
    plan.set("backup_included_tb", RateValue::Number(1.0));
    plan.set("backup_per_tb_fee", RateValue::Number(15.0));
    plan
}

fn asset(id: i64, hostname: &str, billing_type: Option<&str>, backup_bytes: f64) -> Asset {
    Asset {
        id,
        company_account_number: "ACME-001".to_string(),
        rmm_uid: format!("uid-{id}"),
        hostname: hostname.to_string(),
        friendly_name: None,
        device_type: None,
        billing_type: billing_type.map(str::to_string),
        status: Some("Active".to_string()),
        operating_system: None,
        backup_data_bytes: backup_bytes,
        last_seen: None,
    }
}

fn user(id: i64, name: &str, status: &str, billing_type: Option<&str>) -> EndUser {
    EndUser {
        id,
        company_account_number: "ACME-001".to_string(),
        helpdesk_id: id,
        full_name: name.to_string(),
        email: None,
        status: Some(status.to_string()),
        billing_type: billing_type.map(str::to_string),
    }
}

fn ticket(id: i64, closed: OffsetDateTime, hours: f64) -> TicketDetail {
    TicketDetail {
        ticket_id: id,
        company_account_number: Some("ACME-001".to_string()),
        subject: Some(format!("Ticket {id}")),
        last_updated_at: closed,
        total_hours_spent: hours,
    }
}

fn snapshot() -> BillingSnapshot {
    BillingSnapshot {
        company: company(),
        client_override: None,
        plan: Some(plan()),
        effective_plan: "Managed".to_string(),
        term: "1-Year".to_string(),
        assets: Vec::new(),
        manual_assets: Vec::new(),
        users: Vec::new(),
        manual_users: Vec::new(),
        asset_overrides: HashMap::new(),
        user_overrides: HashMap::new(),
        line_items: Vec::new(),
        tickets: Vec::new(),
    }
}

fn details(outcome: BillingOutcome) -> crate::assemble::BillingDetails {
    match outcome {
        BillingOutcome::Ready(details) => *details,
        BillingOutcome::PlanUnconfigured { plan, term } => {
            panic!("expected a bill, got unconfigured plan {plan}/{term}")
        }
    }
}

const NOW: OffsetDateTime = datetime!(2024-03-20 12:00 UTC);

mod assembly_tests {
    use super::*;

    // =========================================================================
    // Worked scenario: 2 backed-up workstations at 3 TB, 5 ticket hours
    // against a 2-hour monthly allowance => total 405
    // =========================================================================
    #[test]
    fn worked_scenario_totals_405() {
        let mut snap = snapshot();
        snap.assets = vec![
            asset(1, "ws-01", Some("Workstation"), BYTES_PER_TB * 1.5),
            asset(2, "ws-02", Some("Workstation"), BYTES_PER_TB * 1.5),
        ];
        snap.tickets = vec![
            ticket(100, datetime!(2024-03-05 09:00 UTC), 3.0),
            ticket(101, datetime!(2024-03-12 15:30 UTC), 2.0),
        ];
        let mut ov = ClientOverride::default();
        ov.set("prepaid_hours_monthly", RateValue::Number(2.0));
        ov.enable("prepaid_hours_monthly");
        snap.client_override = Some(ov);

        let bill = details(assemble(snap, 2024, 3, NOW));
        let receipt = &bill.receipt;

        assert_eq!(receipt.tickets.hours_for_period, 5.0);
        assert_eq!(receipt.tickets.billable_hours, 3.0);
        assert_eq!(receipt.ticket_charge, 300.0);

        assert_eq!(receipt.backup.included_tb, 2.0);
        assert_eq!(receipt.backup.overage_tb, 1.0);
        assert_eq!(receipt.backup_charge, 65.0);

        assert_eq!(receipt.total_asset_charges, 40.0);
        assert_eq!(receipt.total_user_charges, 0.0);
        assert_eq!(receipt.total_line_item_charges, 0.0);
        assert_eq!(receipt.total, 405.0);
    }

    // =========================================================================
    // total reconciles exactly against its five buckets
    // =========================================================================
    #[test]
    fn receipt_total_reconciles_exactly() {
        let mut snap = snapshot();
        snap.assets = vec![
            asset(1, "ws-01", Some("Workstation"), BYTES_PER_TB * 2.3),
            asset(2, "srv-01", Some("Server"), BYTES_PER_TB * 0.7),
            asset(3, "fw-01", Some("Firewall"), 0.0),
        ];
        snap.manual_assets = vec![ManualAsset {
            id: 1,
            company_account_number: "ACME-001".to_string(),
            name: "Spare switch".to_string(),
            billing_type: Some("Switch".to_string()),
        }];
        snap.users = vec![
            user(1, "Dana Fox", "Active", None),
            user(2, "Lee Ray", "Active", Some("Free")),
        ];
        snap.manual_users = vec![ManualUser {
            id: 1,
            company_account_number: "ACME-001".to_string(),
            full_name: "Shared Mailbox".to_string(),
            billing_type: Some("Paid".to_string()),
        }];
        snap.tickets = vec![ticket(100, datetime!(2024-03-05 09:00 UTC), 6.25)];
        snap.line_items = vec![CustomLineItem {
            id: 1,
            company_account_number: "ACME-001".to_string(),
            name: "Web hosting".to_string(),
            monthly_fee: Some(45.0),
            one_off_fee: None,
            one_off_month: None,
            one_off_year: None,
            yearly_fee: None,
            yearly_bill_month: None,
            yearly_bill_day: None,
        }];

        let bill = details(assemble(snap, 2024, 3, NOW));
        let receipt = &bill.receipt;
        let expected = receipt.total_asset_charges
            + receipt.total_user_charges
            + receipt.ticket_charge
            + receipt.backup_charge
            + receipt.total_line_item_charges;
        assert_eq!(receipt.total, expected);
        // Itemized entity lists agree with their buckets
        let asset_sum: f64 = receipt.billed_assets.iter().map(|e| e.unit_cost).sum();
        let user_sum: f64 = receipt.billed_users.iter().map(|e| e.unit_cost).sum();
        assert_eq!(receipt.total_asset_charges, asset_sum);
        assert_eq!(receipt.total_user_charges, user_sum);
    }

    // =========================================================================
    // Inactive users are excluded from billing entirely
    // =========================================================================
    #[test]
    fn inactive_users_are_not_billed() {
        let mut snap = snapshot();
        snap.users = vec![
            user(1, "Dana Fox", "Active", None),
            user(2, "Gone Person", "Inactive", None),
        ];
        let bill = details(assemble(snap, 2024, 3, NOW));
        assert_eq!(bill.receipt.total_user_charges, 10.0);
        assert_eq!(bill.quantities.paid_users, 1);
        assert_eq!(bill.receipt.billed_users.len(), 1);
        // The raw list still carries both for display
        assert_eq!(bill.users.len(), 2);
    }

    // =========================================================================
    // Manual assets bill but never contribute backup bytes
    // =========================================================================
    #[test]
    fn manual_assets_never_back_up() {
        let mut snap = snapshot();
        snap.manual_assets = vec![ManualAsset {
            id: 1,
            company_account_number: "ACME-001".to_string(),
            name: "Loaner laptop".to_string(),
            billing_type: Some("Workstation".to_string()),
        }];
        let bill = details(assemble(snap, 2024, 3, NOW));
        assert_eq!(bill.receipt.total_asset_charges, 20.0);
        assert_eq!(bill.receipt.backup.workstation_units, 0);
        assert_eq!(bill.receipt.backup_charge, 0.0);
    }

    // =========================================================================
    // Custom asset pricing ignores the rate table even when a
    // per_custom_cost column exists
    // =========================================================================
    #[test]
    fn custom_category_never_reads_rate_table() {
        let mut snap = snapshot();
        if let Some(plan) = snap.plan.as_mut() {
            plan.set("per_custom_cost", RateValue::Number(999.0));
        }
        snap.assets = vec![asset(1, "appliance", Some("Custom"), 0.0)];
        snap.asset_overrides.insert(
            1,
            AssetOverride {
                id: 1,
                asset_id: 1,
                billing_type: None,
                custom_cost: None,
            },
        );
        let bill = details(assemble(snap, 2024, 3, NOW));
        assert_eq!(bill.receipt.total_asset_charges, 0.0);
    }

    // =========================================================================
    // Per-asset override recategorizes and reprices
    // =========================================================================
    #[test]
    fn asset_override_recategorizes() {
        let mut snap = snapshot();
        snap.assets = vec![asset(1, "box-01", Some("Workstation"), 0.0)];
        snap.asset_overrides.insert(
            1,
            AssetOverride {
                id: 1,
                asset_id: 1,
                billing_type: Some("Server".to_string()),
                custom_cost: None,
            },
        );
        let bill = details(assemble(snap, 2024, 3, NOW));
        assert_eq!(bill.receipt.total_asset_charges, 60.0);
        assert_eq!(bill.quantities.servers, 1);
        assert_eq!(bill.quantities.workstations, 0);
    }

    // =========================================================================
    // Enabled per-rate client override flows through to pricing
    // =========================================================================
    #[test]
    fn client_rate_override_applies_to_charges() {
        let mut snap = snapshot();
        snap.assets = vec![asset(1, "ws-01", Some("Workstation"), 0.0)];
        let mut ov = ClientOverride::default();
        ov.set("per_workstation_cost", RateValue::Number(12.0));
        ov.enable("per_workstation_cost");
        snap.client_override = Some(ov);
        let bill = details(assemble(snap, 2024, 3, NOW));
        assert_eq!(bill.receipt.total_asset_charges, 12.0);
        assert_eq!(bill.effective_rates.amount("per_workstation_cost"), 12.0);
    }

    // =========================================================================
    // One-off line item appears only in its exact period
    // =========================================================================
    #[test]
    fn one_off_line_item_scoped_to_exact_period() {
        let item = CustomLineItem {
            id: 1,
            company_account_number: "ACME-001".to_string(),
            name: "Migration project".to_string(),
            monthly_fee: None,
            one_off_fee: Some(500.0),
            one_off_month: Some(3),
            one_off_year: Some(2024),
            yearly_fee: None,
            yearly_bill_month: None,
            yearly_bill_day: None,
        };

        for (year, month, expected) in [(2024, 3, 500.0), (2024, 4, 0.0), (2025, 3, 0.0)] {
            let mut snap = snapshot();
            snap.line_items = vec![item.clone()];
            let bill = details(assemble(snap, year, month, NOW));
            assert_eq!(
                bill.receipt.total_line_item_charges, expected,
                "period {year}-{month}"
            );
        }
    }

    // =========================================================================
    // Contract expiry is judged against the supplied clock
    // =========================================================================
    #[test]
    fn contract_expiry_follows_clock() {
        let snap = snapshot();
        // Start 2022-04-15, 1-Year term => ends 2023-04-14, expired by 2024
        let bill = details(assemble(snap, 2024, 3, NOW));
        assert!(bill.contract_expired);

        let mut snap = snapshot();
        snap.company.contract_term_length = Some("3-Year".to_string());
        snap.term = "3-Year".to_string();
        let bill = details(assemble(snap, 2024, 3, NOW));
        // Ends 2025-04-14, still running in March 2024
        assert!(!bill.contract_expired);
    }

    // =========================================================================
    // Month-to-month contracts have no end date and never expire
    // =========================================================================
    #[test]
    fn month_to_month_has_no_end_date() {
        let mut snap = snapshot();
        snap.company.contract_term_length = Some("Month to Month".to_string());
        snap.term = "Month to Month".to_string();
        let bill = details(assemble(snap, 2024, 3, NOW));
        assert!(bill.contract_end_date.is_none());
        assert!(!bill.contract_expired);
    }
}

mod dashboard_tests {
    use super::*;

    // =========================================================================
    // An unconfigured plan degrades to a labeled zero row
    // =========================================================================
    #[test]
    fn unconfigured_plan_degrades_row() {
        let mut snap = snapshot();
        snap.plan = None;
        let acme = company();
        let outcome = assemble(snap, 2024, 3, NOW);
        let row = summary_row(&acme, &outcome, NOW);
        assert_eq!(row.billing_plan, UNCONFIGURED_PLAN_LABEL);
        assert_eq!(row.total_bill, 0.0);
        assert_eq!(row.account_number, "ACME-001");
    }

    // =========================================================================
    // A configured client's row mirrors its receipt
    // =========================================================================
    #[test]
    fn configured_row_mirrors_receipt() {
        let mut snap = snapshot();
        snap.assets = vec![
            asset(1, "ws-01", Some("Workstation"), BYTES_PER_TB),
            asset(2, "srv-01", Some("Server"), 0.0),
            asset(3, "vm-01", Some("VM"), 0.0),
        ];
        snap.users = vec![user(1, "Dana Fox", "Active", None)];
        snap.tickets = vec![ticket(100, datetime!(2024-03-05 09:00 UTC), 1.5)];
        let acme = company();
        let outcome = assemble(snap, 2024, 3, NOW);
        let row = summary_row(&acme, &outcome, NOW);
        assert_eq!(row.billing_plan, "Managed");
        assert_eq!(row.workstations, 1);
        assert_eq!(row.servers, 1);
        assert_eq!(row.vms, 1);
        assert_eq!(row.regular_users, 1);
        assert_eq!(row.total_backup_bytes, BYTES_PER_TB);
        assert_eq!(row.total_hours, 1.5);
        assert!(row.total_bill > 0.0);
    }
}

mod precision_tests {
    use super::*;

    // =========================================================================
    // Fractional hours and bytes survive the full pipeline without drift
    // =========================================================================
    #[test]
    fn fractional_inputs_reconcile() {
        let mut snap = snapshot();
        snap.assets = vec![asset(1, "ws-01", Some("Workstation"), 123_456_789_012.0)];
        snap.tickets = vec![
            ticket(100, datetime!(2024-03-01 10:00 UTC), 0.25),
            ticket(101, datetime!(2024-03-02 10:00 UTC), 0.25),
            ticket(102, datetime!(2024-03-03 10:00 UTC), 1.75),
        ];
        let bill = details(assemble(snap, 2024, 3, NOW));
        let receipt = &bill.receipt;
        assert_eq!(receipt.tickets.hours_for_period, 2.25);
        assert_eq!(
            receipt.total,
            receipt.total_asset_charges
                + receipt.total_user_charges
                + receipt.ticket_charge
                + receipt.backup_charge
                + receipt.total_line_item_charges
        );
    }
}
