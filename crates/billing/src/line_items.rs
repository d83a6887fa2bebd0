//! Custom line-item selection
//!
//! Decides which ad hoc charges apply to a billing period. Branch order is
//! load-bearing: a recurring monthly fee always wins, then a one-off tied
//! to the exact (year, month), then a yearly fee tied to the month alone.

use serde::Serialize;

use opsledger_shared::types::CustomLineItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LineItemKind {
    Recurring,
    OneOff,
    Yearly,
}

impl LineItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineItemKind::Recurring => "Recurring",
            LineItemKind::OneOff => "One-Off",
            LineItemKind::Yearly => "Yearly",
        }
    }
}

impl std::fmt::Display for LineItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A line item that applies to the requested period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedLineItem {
    pub id: i64,
    pub name: String,
    pub kind: LineItemKind,
    pub fee: f64,
}

/// At most one recurrence branch fires per item per period.
pub fn applies_to(item: &CustomLineItem, year: i32, month: u8) -> Option<AppliedLineItem> {
    let applied = |kind: LineItemKind, fee: f64| AppliedLineItem {
        id: item.id,
        name: item.name.clone(),
        kind,
        fee,
    };

    if let Some(fee) = item.monthly_fee {
        return Some(applied(LineItemKind::Recurring, fee));
    }
    if item.one_off_year == Some(year) && item.one_off_month == Some(i32::from(month)) {
        return Some(applied(LineItemKind::OneOff, item.one_off_fee.unwrap_or(0.0)));
    }
    if item.yearly_bill_month == Some(i32::from(month)) {
        return Some(applied(LineItemKind::Yearly, item.yearly_fee.unwrap_or(0.0)));
    }
    None
}

/// Select every applicable item and sum their fees.
pub fn select_line_items(
    items: &[CustomLineItem],
    year: i32,
    month: u8,
) -> (Vec<AppliedLineItem>, f64) {
    let applied: Vec<AppliedLineItem> = items
        .iter()
        .filter_map(|item| applies_to(item, year, month))
        .collect();
    let total = applied.iter().map(|item| item.fee).sum();
    (applied, total)
}
