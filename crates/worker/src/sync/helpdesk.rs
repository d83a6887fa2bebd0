//! Helpdesk company and user sync
//!
//! Pulls departments and requesters from the helpdesk platform.
//! Departments carry the externally assigned account number in a custom
//! field; a department without one cannot be billed and is skipped.
//! Companies upsert by account number, users by their helpdesk id.

use std::collections::HashMap;

use serde::Deserialize;
use sqlx::PgPool;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;

use super::SyncSummary;

const PER_PAGE: usize = 100;

#[derive(Debug, Clone)]
pub struct HelpdeskClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct DepartmentPage {
    #[serde(default)]
    departments: Vec<DepartmentPayload>,
}

#[derive(Debug, Deserialize)]
pub struct DepartmentPayload {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub custom_fields: DepartmentCustomFields,
}

#[derive(Debug, Default, Deserialize)]
pub struct DepartmentCustomFields {
    pub account_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RequesterPage {
    #[serde(default)]
    requesters: Vec<RequesterPayload>,
}

#[derive(Debug, Deserialize)]
pub struct RequesterPayload {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub primary_email: Option<String>,
    pub active: bool,
    #[serde(default)]
    pub department_ids: Vec<i64>,
}

impl RequesterPayload {
    pub fn full_name(&self) -> String {
        match self.last_name.as_deref() {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }

    pub fn status(&self) -> &'static str {
        if self.active {
            "Active"
        } else {
            "Inactive"
        }
    }
}

fn retry_strategy() -> impl Iterator<Item = std::time::Duration> {
    ExponentialBackoff::from_millis(500).factor(2).take(3)
}

impl HelpdeskClient {
    pub fn from_env() -> anyhow::Result<Self> {
        let domain = std::env::var("HELPDESK_DOMAIN")
            .map_err(|_| anyhow::anyhow!("HELPDESK_DOMAIN must be set"))?;
        let api_key = std::env::var("HELPDESK_API_KEY")
            .map_err(|_| anyhow::anyhow!("HELPDESK_API_KEY must be set"))?;
        Ok(Self::new(format!("https://{domain}"), api_key))
    }

    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Authenticated GET with backoff. The helpdesk API takes the key as
    /// the basic-auth username.
    pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path_and_query: &str,
    ) -> anyhow::Result<T> {
        let url = format!("{}{}", self.base_url, path_and_query);
        Retry::spawn(retry_strategy(), || async {
            let response = self
                .http
                .get(&url)
                .basic_auth(&self.api_key, Some("X"))
                .send()
                .await?
                .error_for_status()?;
            Ok::<_, anyhow::Error>(response.json::<T>().await?)
        })
        .await
    }

    pub async fn fetch_departments(&self) -> anyhow::Result<Vec<DepartmentPayload>> {
        let mut departments = Vec::new();
        let mut page = 1;
        loop {
            let batch: DepartmentPage = self
                .get_json(&format!(
                    "/api/v2/departments?per_page={PER_PAGE}&page={page}"
                ))
                .await?;
            let count = batch.departments.len();
            departments.extend(batch.departments);
            if count < PER_PAGE {
                break;
            }
            page += 1;
        }
        Ok(departments)
    }

    pub async fn fetch_requesters(&self) -> anyhow::Result<Vec<RequesterPayload>> {
        let mut requesters = Vec::new();
        let mut page = 1;
        loop {
            let batch: RequesterPage = self
                .get_json(&format!(
                    "/api/v2/requesters?per_page={PER_PAGE}&page={page}"
                ))
                .await?;
            let count = batch.requesters.len();
            requesters.extend(batch.requesters);
            if count < PER_PAGE {
                break;
            }
            page += 1;
        }
        Ok(requesters)
    }

    /// Upsert companies from departments carrying an account number.
    pub async fn sync_companies(&self, pool: &PgPool) -> anyhow::Result<SyncSummary> {
        let mut summary = SyncSummary::default();
        for department in self.fetch_departments().await? {
            let Some(account_number) = department
                .custom_fields
                .account_number
                .as_deref()
                .filter(|account| !account.trim().is_empty())
            else {
                summary.skipped += 1;
                continue;
            };
            sqlx::query(
                "INSERT INTO companies (account_number, name, helpdesk_id) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT (account_number) DO UPDATE SET \
                   name = EXCLUDED.name, \
                   helpdesk_id = EXCLUDED.helpdesk_id",
            )
            .bind(account_number.trim())
            .bind(&department.name)
            .bind(department.id)
            .execute(pool)
            .await?;
            summary.upserted += 1;
        }
        Ok(summary)
    }

    /// Upsert end users from requesters, matched to a company through
    /// their first department. Billing categories survive the refresh.
    pub async fn sync_users(&self, pool: &PgPool) -> anyhow::Result<SyncSummary> {
        let department_map: HashMap<i64, String> = sqlx::query_as::<_, (i64, String)>(
            "SELECT helpdesk_id, account_number FROM companies WHERE helpdesk_id IS NOT NULL",
        )
        .fetch_all(pool)
        .await?
        .into_iter()
        .collect();

        let mut summary = SyncSummary::default();
        for requester in self.fetch_requesters().await? {
            let Some(account_number) = requester
                .department_ids
                .first()
                .and_then(|id| department_map.get(id))
            else {
                summary.skipped += 1;
                continue;
            };
            sqlx::query(
                "INSERT INTO end_users (company_account_number, helpdesk_id, full_name, email, \
                 status) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (helpdesk_id) DO UPDATE SET \
                   company_account_number = EXCLUDED.company_account_number, \
                   full_name = EXCLUDED.full_name, \
                   email = EXCLUDED.email, \
                   status = EXCLUDED.status",
            )
            .bind(account_number)
            .bind(requester.id)
            .bind(requester.full_name())
            .bind(&requester.primary_email)
            .bind(requester.status())
            .execute(pool)
            .await?;
            summary.upserted += 1;
        }
        Ok(summary)
    }
}
