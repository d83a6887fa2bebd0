//! Ticket-time sync
//!
//! Pulls recently closed tickets and their time entries from the helpdesk,
//! sums hours per ticket, and upserts `ticket_details`. A closed ticket
//! with no time entries bills the minimum floor.

use std::collections::HashMap;

use serde::Deserialize;
use sqlx::PgPool;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

use super::helpdesk::HelpdeskClient;
use super::SyncSummary;

/// Minimum hours billed for a closed ticket without time entries.
pub const MINIMUM_TICKET_HOURS: f64 = 0.25;

/// How far back the sync re-reads closed tickets on each run.
const LOOKBACK_DAYS: i64 = 90;

#[derive(Debug, Deserialize)]
struct TicketPage {
    #[serde(default)]
    tickets: Vec<TicketPayload>,
}

#[derive(Debug, Deserialize)]
pub struct TicketPayload {
    pub id: i64,
    pub subject: Option<String>,
    pub department_id: Option<i64>,
    pub updated_at: String,
}

impl TicketPayload {
    pub fn updated_at_parsed(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::parse(&self.updated_at, &Rfc3339).ok()
    }
}

#[derive(Debug, Deserialize)]
struct TimeEntryPage {
    #[serde(default)]
    time_entries: Vec<TimeEntryPayload>,
}

#[derive(Debug, Deserialize)]
pub struct TimeEntryPayload {
    pub time_spent: String,
}

/// Parse the helpdesk's `"HH:MM"` time-spent format into hours.
pub fn parse_time_spent(raw: &str) -> f64 {
    let mut parts = raw.split(':');
    let hours: f64 = parts.next().and_then(|h| h.trim().parse().ok()).unwrap_or(0.0);
    let minutes: f64 = parts.next().and_then(|m| m.trim().parse().ok()).unwrap_or(0.0);
    hours + minutes / 60.0
}

/// Total billed hours for a ticket, with the minimum floor applied when no
/// entries exist.
pub fn total_hours(entries: &[TimeEntryPayload]) -> f64 {
    if entries.is_empty() {
        return MINIMUM_TICKET_HOURS;
    }
    entries
        .iter()
        .map(|entry| parse_time_spent(&entry.time_spent))
        .sum()
}

/// Pull closed tickets updated within the lookback window and upsert their
/// billed hours.
pub async fn sync_ticket_details(
    client: &HelpdeskClient,
    pool: &PgPool,
) -> anyhow::Result<SyncSummary> {
    let department_map: HashMap<i64, String> = sqlx::query_as::<_, (i64, String)>(
        "SELECT helpdesk_id, account_number FROM companies WHERE helpdesk_id IS NOT NULL",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .collect();

    let since = OffsetDateTime::now_utc() - Duration::days(LOOKBACK_DAYS);
    let since = since.format(&Rfc3339)?;

    let mut summary = SyncSummary::default();
    let mut page = 1;
    loop {
        let batch: TicketPage = client
            .get_json(&format!(
                "/api/v2/tickets?filter=closed&updated_since={since}&per_page=100&page={page}"
            ))
            .await?;
        let count = batch.tickets.len();

        for ticket in &batch.tickets {
            let Some(updated_at) = ticket.updated_at_parsed() else {
                tracing::warn!(ticket_id = ticket.id, "Skipping ticket with unparseable timestamp");
                summary.skipped += 1;
                continue;
            };
            let account_number = ticket
                .department_id
                .and_then(|id| department_map.get(&id))
                .cloned();

            let entries: TimeEntryPage = client
                .get_json(&format!("/api/v2/tickets/{}/time_entries", ticket.id))
                .await?;
            let hours = total_hours(&entries.time_entries);

            sqlx::query(
                "INSERT INTO ticket_details (ticket_id, company_account_number, subject, \
                 last_updated_at, total_hours_spent) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (ticket_id) DO UPDATE SET \
                   company_account_number = EXCLUDED.company_account_number, \
                   subject = EXCLUDED.subject, \
                   last_updated_at = EXCLUDED.last_updated_at, \
                   total_hours_spent = EXCLUDED.total_hours_spent",
            )
            .bind(ticket.id)
            .bind(&account_number)
            .bind(&ticket.subject)
            .bind(updated_at)
            .bind(hours)
            .execute(pool)
            .await?;
            summary.upserted += 1;
        }

        if count < 100 {
            break;
        }
        page += 1;
    }

    Ok(summary)
}
