//! Rate resolution
//!
//! Merges a billing-plan template with a client's override record into one
//! effective rate table. Plan tables carry an open-ended column set
//! (deployments add `feature_*` columns at configuration time), so rates
//! are modeled as a field-name map discovered from the fetched row rather
//! than a fixed struct.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo};

/// A single rate-table value. Plans mix numeric unit costs with text
/// labels (support level, feature inclusions).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RateValue {
    Number(f64),
    Text(String),
}

impl RateValue {
    /// Numeric view with the zero fallback applied at every rate read
    /// site: text that parses as a number counts, anything else is 0.
    pub fn as_amount(&self) -> f64 {
        match self {
            RateValue::Number(n) => *n,
            RateValue::Text(s) => s.trim().parse().unwrap_or(0.0),
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            RateValue::Text(s) => Some(s.as_str()),
            RateValue::Number(_) => None,
        }
    }
}

/// Decode one column of a plan or override row into a rate value.
///
/// The column set is whatever the table declares at call time; columns of
/// types the rate table never uses (timestamps, etc.) are skipped.
fn decode_rate_column(row: &PgRow, index: usize, type_name: &str) -> Option<RateValue> {
    match type_name {
        "FLOAT8" | "FLOAT4" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(RateValue::Number),
        "INT2" | "INT4" | "INT8" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(|n| RateValue::Number(n as f64)),
        "TEXT" | "VARCHAR" | "BPCHAR" => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(RateValue::Text),
        _ => None,
    }
}

/// A billing-plan template: every rate column of one `billing_plans` row,
/// keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlanRates {
    fields: BTreeMap<String, RateValue>,
}

impl PlanRates {
    /// Build from a `SELECT *` row, discovering the field set from the
    /// row's schema. The surrogate id is not a rate.
    pub fn from_pg_row(row: &PgRow) -> Self {
        let mut fields = BTreeMap::new();
        for (index, column) in row.columns().iter().enumerate() {
            let name = column.name();
            if name == "id" {
                continue;
            }
            if let Some(value) = decode_rate_column(row, index, column.type_info().name()) {
                fields.insert(name.to_string(), value);
            }
        }
        Self { fields }
    }

    pub fn set(&mut self, field: impl Into<String>, value: RateValue) {
        self.fields.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&RateValue> {
        self.fields.get(field)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// A client's override record: nullable mirrors of the plan's rate fields
/// plus a paired `override_<field>_enabled` flag per field. A value takes
/// effect iff its flag is set and the value is non-null.
#[derive(Debug, Clone, Default)]
pub struct ClientOverride {
    values: BTreeMap<String, RateValue>,
    enabled: BTreeSet<String>,
}

impl ClientOverride {
    /// Build from a `SELECT *` row of `client_billing_overrides`.
    /// Flag columns follow the `override_<field>_enabled` naming scheme;
    /// everything else (bar bookkeeping columns) is an override value.
    pub fn from_pg_row(row: &PgRow) -> Self {
        let mut values = BTreeMap::new();
        let mut enabled = BTreeSet::new();
        for (index, column) in row.columns().iter().enumerate() {
            let name = column.name();
            if name == "id" || name == "company_account_number" {
                continue;
            }
            if let Some(field) = name
                .strip_prefix("override_")
                .and_then(|rest| rest.strip_suffix("_enabled"))
            {
                if row.try_get::<Option<bool>, _>(index).ok().flatten() == Some(true) {
                    enabled.insert(field.to_string());
                }
                continue;
            }
            if let Some(value) = decode_rate_column(row, index, column.type_info().name()) {
                values.insert(name.to_string(), value);
            }
        }
        Self { values, enabled }
    }

    pub fn set(&mut self, field: impl Into<String>, value: RateValue) {
        self.values.insert(field.into(), value);
    }

    pub fn enable(&mut self, field: impl Into<String>) {
        self.enabled.insert(field.into());
    }

    /// The override value for a field, iff its enabled flag is set and a
    /// value is present.
    pub fn enabled_value(&self, field: &str) -> Option<&RateValue> {
        if self.enabled.contains(field) {
            self.values.get(field)
        } else {
            None
        }
    }

    /// Numeric override value with the zero fallback; 0 when not enabled.
    pub fn enabled_amount(&self, field: &str) -> f64 {
        self.enabled_value(field)
            .map(RateValue::as_amount)
            .unwrap_or(0.0)
    }

    pub fn enabled_label(&self, field: &str) -> Option<&str> {
        self.enabled_value(field).and_then(RateValue::as_label)
    }
}

/// The effective rate table for one client: template fields with enabled
/// overrides applied. Every downstream charge computation reads from this.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EffectiveRates {
    values: BTreeMap<String, RateValue>,
}

impl EffectiveRates {
    /// Numeric rate with the zero fallback: a missing field, a null, and
    /// an unparseable text value all read as 0.
    pub fn amount(&self, field: &str) -> f64 {
        self.values
            .get(field)
            .map(RateValue::as_amount)
            .unwrap_or(0.0)
    }

    pub fn label(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(RateValue::as_label)
    }

    pub fn get(&self, field: &str) -> Option<&RateValue> {
        self.values.get(field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Merge a plan template with an optional client override.
///
/// Starts from a copy of every template field, including dynamically
/// configured feature columns; each field is replaced when the override
/// carries an enabled, non-null value under the exact same name.
pub fn resolve_rates(template: &PlanRates, client_override: Option<&ClientOverride>) -> EffectiveRates {
    let mut values = template.fields.clone();
    if let Some(ov) = client_override {
        for field in template.fields.keys() {
            if let Some(value) = ov.enabled_value(field) {
                values.insert(field.clone(), value.clone());
            }
        }
    }
    EffectiveRates { values }
}
