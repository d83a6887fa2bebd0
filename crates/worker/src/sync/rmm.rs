//! RMM asset sync
//!
//! Pulls the device inventory from the remote-monitoring platform and
//! upserts assets keyed by the device uid. Devices are matched to clients
//! through the company's `rmm_site_uid`; devices at unmapped sites are
//! counted and skipped.

use std::collections::HashMap;

use serde::Deserialize;
use sqlx::PgPool;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;

use super::SyncSummary;

#[derive(Debug, Clone)]
pub struct RmmClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct DevicePage {
    #[serde(default)]
    pub devices: Vec<DevicePayload>,
    #[serde(rename = "pageDetails")]
    pub page_details: PageDetails,
}

#[derive(Debug, Deserialize)]
pub struct PageDetails {
    #[serde(rename = "nextPageUrl")]
    pub next_page_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DevicePayload {
    pub uid: String,
    #[serde(rename = "siteUid")]
    pub site_uid: String,
    pub hostname: String,
    pub description: Option<String>,
    #[serde(rename = "deviceType")]
    pub device_type: Option<String>,
    #[serde(rename = "operatingSystem")]
    pub operating_system: Option<String>,
    #[serde(rename = "backupDataBytes")]
    pub backup_data_bytes: Option<f64>,
    #[serde(rename = "lastSeen")]
    pub last_seen: Option<String>,
}

impl DevicePayload {
    pub fn last_seen_at(&self) -> Option<OffsetDateTime> {
        self.last_seen
            .as_deref()
            .and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok())
    }
}

fn retry_strategy() -> impl Iterator<Item = std::time::Duration> {
    ExponentialBackoff::from_millis(500).factor(2).take(3)
}

impl RmmClient {
    pub fn from_env() -> anyhow::Result<Self> {
        let endpoint = std::env::var("RMM_API_ENDPOINT")
            .map_err(|_| anyhow::anyhow!("RMM_API_ENDPOINT must be set"))?;
        let api_key = std::env::var("RMM_API_KEY")
            .map_err(|_| anyhow::anyhow!("RMM_API_KEY must be set"))?;
        let api_secret = std::env::var("RMM_API_SECRET")
            .map_err(|_| anyhow::anyhow!("RMM_API_SECRET must be set"))?;
        Ok(Self::new(endpoint, api_key, api_secret))
    }

    pub fn new(endpoint: String, api_key: String, api_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            api_secret,
        }
    }

    /// OAuth password-grant token exchange, the scheme the RMM vendor
    /// exposes for API integrations.
    pub async fn access_token(&self) -> anyhow::Result<String> {
        let url = format!("{}/auth/oauth/token", self.endpoint);
        let token: TokenResponse = Retry::spawn(retry_strategy(), || async {
            let response = self
                .http
                .post(&url)
                .basic_auth("public-client", Some("public"))
                .form(&[
                    ("grant_type", "password"),
                    ("username", self.api_key.as_str()),
                    ("password", self.api_secret.as_str()),
                ])
                .send()
                .await?
                .error_for_status()?;
            Ok::<_, anyhow::Error>(response.json::<TokenResponse>().await?)
        })
        .await?;
        Ok(token.access_token)
    }

    pub async fn fetch_device_page(&self, token: &str, url: &str) -> anyhow::Result<DevicePage> {
        Retry::spawn(retry_strategy(), || async {
            let response = self
                .http
                .get(url)
                .bearer_auth(token)
                .send()
                .await?
                .error_for_status()?;
            Ok::<_, anyhow::Error>(response.json::<DevicePage>().await?)
        })
        .await
    }

    pub fn first_page_url(&self) -> String {
        format!("{}/api/v2/account/devices", self.endpoint)
    }

    /// Pull every device page and upsert assets. Billing categories are
    /// operator-assigned and survive the refresh untouched.
    pub async fn sync_assets(&self, pool: &PgPool) -> anyhow::Result<SyncSummary> {
        let token = self.access_token().await?;

        let site_map: HashMap<String, String> = sqlx::query_as::<_, (String, String)>(
            "SELECT rmm_site_uid, account_number FROM companies WHERE rmm_site_uid IS NOT NULL",
        )
        .fetch_all(pool)
        .await?
        .into_iter()
        .collect();

        let mut summary = SyncSummary::default();
        let mut next_url = Some(self.first_page_url());

        while let Some(url) = next_url {
            let page = self.fetch_device_page(&token, &url).await?;
            for device in &page.devices {
                let Some(account_number) = site_map.get(&device.site_uid) else {
                    summary.skipped += 1;
                    continue;
                };
                sqlx::query(
                    "INSERT INTO assets (company_account_number, rmm_uid, hostname, \
                     friendly_name, device_type, status, operating_system, backup_data_bytes, \
                     last_seen) \
                     VALUES ($1, $2, $3, $4, $5, 'Active', $6, $7, $8) \
                     ON CONFLICT (rmm_uid) DO UPDATE SET \
                       company_account_number = EXCLUDED.company_account_number, \
                       hostname = EXCLUDED.hostname, \
                       friendly_name = EXCLUDED.friendly_name, \
                       device_type = EXCLUDED.device_type, \
                       status = EXCLUDED.status, \
                       operating_system = EXCLUDED.operating_system, \
                       backup_data_bytes = EXCLUDED.backup_data_bytes, \
                       last_seen = EXCLUDED.last_seen",
                )
                .bind(account_number)
                .bind(&device.uid)
                .bind(&device.hostname)
                .bind(&device.description)
                .bind(&device.device_type)
                .bind(&device.operating_system)
                .bind(device.backup_data_bytes.unwrap_or(0.0))
                .bind(device.last_seen_at())
                .execute(pool)
                .await?;
                summary.upserted += 1;
            }
            next_url = page.page_details.next_page_url;
        }

        Ok(summary)
    }
}
