//! Metered usage aggregation
//!
//! Two independent meters feed the receipt: backup storage consumed by
//! protected devices, and support-ticket hours beyond prepaid allotments.

use serde::Serialize;

use opsledger_shared::types::TicketDetail;
use opsledger_shared::BillingCategory;

use crate::rates::EffectiveRates;

/// 1 TiB in bytes (1024^4). Backup volumes are reported in bytes and
/// billed in tebibytes.
pub const BYTES_PER_TB: f64 = 1_099_511_627_776.0;

/// Backup-storage usage and charges for one client.
///
/// A device counts as backed up when its resolved category is Workstation,
/// Server, or VM and it reports a positive backup volume. Manual assets
/// never report backup data.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BackupUsage {
    pub total_bytes: f64,
    /// Backed-up workstations.
    pub workstation_units: u32,
    /// Backed-up servers and VMs.
    pub server_units: u32,
    pub total_tb: f64,
    pub included_tb: f64,
    pub overage_tb: f64,
    pub base_fee: f64,
    pub overage_fee: f64,
    pub charge: f64,
}

impl BackupUsage {
    /// Tally one synced asset. Called during classification with the
    /// entity's resolved category.
    pub fn record(&mut self, category: &BillingCategory, backup_bytes: f64) {
        if backup_bytes <= 0.0 || !category.is_backup_eligible() {
            return;
        }
        self.total_bytes += backup_bytes;
        if *category == BillingCategory::Workstation {
            self.workstation_units += 1;
        } else {
            self.server_units += 1;
        }
    }

    /// Derive allowance, overage, and fees once every asset is tallied.
    pub fn finalize(mut self, rates: &EffectiveRates) -> Self {
        let units = (self.workstation_units + self.server_units) as f64;
        self.total_tb = self.total_bytes / BYTES_PER_TB;
        self.included_tb = units * rates.amount("backup_included_tb");
        self.overage_tb = (self.total_tb - self.included_tb).max(0.0);
        self.base_fee = self.workstation_units as f64
            * rates.amount("backup_base_fee_workstation")
            + self.server_units as f64 * rates.amount("backup_base_fee_server");
        self.overage_fee = self.overage_tb * rates.amount("backup_per_tb_fee");
        self.charge = self.base_fee + self.overage_fee;
        self
    }
}

/// Support-hour usage for one client and period.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TicketUsage {
    /// Hours on tickets closed in the requested month.
    pub hours_for_period: f64,
    /// Hours on tickets closed in months strictly before the requested
    /// month, same calendar year.
    pub hours_used_prior: f64,
    /// Prior plus current, i.e. year-to-date through the requested month.
    pub hours_year_to_date: f64,
    pub prepaid_monthly: f64,
    pub prepaid_yearly: f64,
    /// Yearly allowance left after prior months' consumption.
    pub remaining_yearly: f64,
    pub billable_hours: f64,
    pub charge: f64,
    /// Tickets closed in the requested month.
    pub ticket_count: u32,
}

/// Aggregate a client's closed tickets for (year, month).
///
/// Only tickets whose closure timestamp falls in the requested calendar
/// year participate; a ticket closed in another year never contributes to
/// either the prior rollup or the current month. The monthly allowance is
/// consumed first, then whatever yearly allowance survived prior months
/// offsets the remainder.
pub fn aggregate_tickets(
    tickets: &[TicketDetail],
    year: i32,
    month: u8,
    prepaid_monthly: f64,
    prepaid_yearly: f64,
    rates: &EffectiveRates,
) -> TicketUsage {
    let mut hours_for_period = 0.0;
    let mut hours_used_prior = 0.0;
    let mut ticket_count = 0;

    for ticket in tickets {
        let closed = ticket.last_updated_at;
        if closed.year() != year {
            continue;
        }
        let ticket_month = u8::from(closed.month());
        if ticket_month == month {
            hours_for_period += ticket.total_hours_spent;
            ticket_count += 1;
        } else if ticket_month < month {
            hours_used_prior += ticket.total_hours_spent;
        }
    }

    let remaining_yearly = (prepaid_yearly - hours_used_prior).max(0.0);
    let billable_hours = ((hours_for_period - prepaid_monthly).max(0.0) - remaining_yearly).max(0.0);

    TicketUsage {
        hours_for_period,
        hours_used_prior,
        hours_year_to_date: hours_for_period + hours_used_prior,
        prepaid_monthly,
        prepaid_yearly,
        remaining_yearly,
        billable_hours,
        charge: billable_hours * rates.amount("per_hour_ticket_cost"),
        ticket_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::{resolve_rates, PlanRates, RateValue};
    use time::macros::datetime;
    use time::OffsetDateTime;

    fn rates() -> EffectiveRates {
        let mut plan = PlanRates::default();
        plan.set("backup_included_tb", RateValue::Number(1.0));
        plan.set("backup_base_fee_workstation", RateValue::Number(25.0));
        plan.set("backup_base_fee_server", RateValue::Number(50.0));
        plan.set("backup_per_tb_fee", RateValue::Number(15.0));
        plan.set("per_hour_ticket_cost", RateValue::Number(100.0));
        resolve_rates(&plan, None)
    }

    fn ticket(account: &str, closed: OffsetDateTime, hours: f64) -> TicketDetail {
        TicketDetail {
            ticket_id: 0,
            company_account_number: Some(account.to_string()),
            subject: None,
            last_updated_at: closed,
            total_hours_spent: hours,
        }
    }

    #[test]
    fn backup_within_allowance_has_no_overage() {
        let mut usage = BackupUsage::default();
        usage.record(&BillingCategory::Workstation, BYTES_PER_TB * 0.5);
        usage.record(&BillingCategory::Server, BYTES_PER_TB * 0.5);
        let usage = usage.finalize(&rates());
        assert_eq!(usage.included_tb, 2.0);
        assert_eq!(usage.overage_tb, 0.0);
        assert_eq!(usage.charge, 25.0 + 50.0);
    }

    #[test]
    fn backup_overage_billed_per_tb() {
        let mut usage = BackupUsage::default();
        usage.record(&BillingCategory::Workstation, BYTES_PER_TB * 1.5);
        usage.record(&BillingCategory::Workstation, BYTES_PER_TB * 1.5);
        let usage = usage.finalize(&rates());
        assert_eq!(usage.workstation_units, 2);
        assert_eq!(usage.total_tb, 3.0);
        assert_eq!(usage.included_tb, 2.0);
        assert_eq!(usage.overage_tb, 1.0);
        assert_eq!(usage.base_fee, 50.0);
        assert_eq!(usage.overage_fee, 15.0);
        assert_eq!(usage.charge, 65.0);
    }

    #[test]
    fn vm_counts_as_server_unit() {
        let mut usage = BackupUsage::default();
        usage.record(&BillingCategory::Vm, BYTES_PER_TB);
        let usage = usage.finalize(&rates());
        assert_eq!(usage.server_units, 1);
        assert_eq!(usage.base_fee, 50.0);
    }

    #[test]
    fn zero_bytes_and_ineligible_categories_are_not_backed_up() {
        let mut usage = BackupUsage::default();
        usage.record(&BillingCategory::Workstation, 0.0);
        usage.record(&BillingCategory::Switch, BYTES_PER_TB);
        usage.record(&BillingCategory::Firewall, BYTES_PER_TB);
        let usage = usage.finalize(&rates());
        assert_eq!(usage.workstation_units, 0);
        assert_eq!(usage.server_units, 0);
        assert_eq!(usage.charge, 0.0);
    }

    #[test]
    fn hours_below_monthly_allowance_bill_nothing() {
        let tickets = vec![ticket("A", datetime!(2024-03-10 12:00 UTC), 1.5)];
        let usage = aggregate_tickets(&tickets, 2024, 3, 2.0, 0.0, &rates());
        assert_eq!(usage.hours_for_period, 1.5);
        assert_eq!(usage.billable_hours, 0.0);
        assert_eq!(usage.charge, 0.0);
    }

    #[test]
    fn monthly_allowance_consumed_before_yearly() {
        let tickets = vec![ticket("A", datetime!(2024-03-10 12:00 UTC), 5.0)];
        let usage = aggregate_tickets(&tickets, 2024, 3, 2.0, 2.0, &rates());
        // 5 - 2 monthly = 3, minus 2 remaining yearly = 1 billable
        assert_eq!(usage.billable_hours, 1.0);
        assert_eq!(usage.charge, 100.0);
    }

    #[test]
    fn prior_months_consume_yearly_allowance() {
        let tickets = vec![
            ticket("A", datetime!(2024-01-05 09:00 UTC), 3.0),
            ticket("A", datetime!(2024-02-05 09:00 UTC), 2.0),
            ticket("A", datetime!(2024-03-10 12:00 UTC), 4.0),
        ];
        let usage = aggregate_tickets(&tickets, 2024, 3, 0.0, 6.0, &rates());
        assert_eq!(usage.hours_used_prior, 5.0);
        assert_eq!(usage.remaining_yearly, 1.0);
        assert_eq!(usage.billable_hours, 3.0);
        assert_eq!(usage.hours_year_to_date, 9.0);
    }

    #[test]
    fn other_years_never_contribute() {
        let tickets = vec![
            ticket("A", datetime!(2023-12-31 23:00 UTC), 8.0),
            ticket("A", datetime!(2025-01-01 01:00 UTC), 8.0),
            ticket("A", datetime!(2024-03-10 12:00 UTC), 2.0),
        ];
        let usage = aggregate_tickets(&tickets, 2024, 3, 0.0, 0.0, &rates());
        assert_eq!(usage.hours_for_period, 2.0);
        assert_eq!(usage.hours_used_prior, 0.0);
        assert_eq!(usage.ticket_count, 1);
    }

    #[test]
    fn later_months_do_not_count_as_prior() {
        let tickets = vec![
            ticket("A", datetime!(2024-06-10 12:00 UTC), 4.0),
            ticket("A", datetime!(2024-03-10 12:00 UTC), 1.0),
        ];
        let usage = aggregate_tickets(&tickets, 2024, 3, 0.0, 0.0, &rates());
        assert_eq!(usage.hours_for_period, 1.0);
        assert_eq!(usage.hours_used_prior, 0.0);
    }

    #[test]
    fn billable_hours_monotonic_in_period_hours() {
        let mut previous = 0.0;
        for tenths in 0..80 {
            let hours = tenths as f64 / 10.0;
            let tickets = vec![ticket("A", datetime!(2024-03-10 12:00 UTC), hours)];
            let usage = aggregate_tickets(&tickets, 2024, 3, 2.0, 1.0, &rates());
            assert!(usage.billable_hours >= previous);
            previous = usage.billable_hours;
        }
    }
}
