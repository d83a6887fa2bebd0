//! OpsLedger Background Worker
//!
//! Runs the external data syncs on a schedule:
//! - RMM asset sync (hourly)
//! - Helpdesk company/user sync (every 4 hours)
//! - Ticket-time sync (hourly)
//!
//! Every sync upserts by stable external id, so overlapping or repeated
//! runs converge and never disturb concurrent billing reads.

mod sync;

use std::time::Duration;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::sync::helpdesk::HelpdeskClient;
use crate::sync::rmm::RmmClient;
use crate::sync::SyncSummary;

fn log_sync_result(job: &str, result: anyhow::Result<SyncSummary>) {
    match result {
        Ok(summary) => info!(job = job, %summary, "Sync complete"),
        Err(err) => error!(job = job, error = %err, "Sync failed"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    info!("Starting OpsLedger Worker");

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let pool = opsledger_shared::create_pool(&database_url).await?;

    let scheduler = JobScheduler::new().await?;

    // Job 1: RMM asset sync (hourly at :10)
    match RmmClient::from_env() {
        Ok(rmm) => {
            let pool_for_rmm = pool.clone();
            scheduler
                .add(Job::new_async("0 10 * * * *", move |_uuid, _l| {
                    let rmm = rmm.clone();
                    let pool = pool_for_rmm.clone();
                    Box::pin(async move {
                        info!("Running RMM asset sync");
                        log_sync_result("rmm_assets", rmm.sync_assets(&pool).await);
                    })
                })?)
                .await?;
            info!("Scheduled: RMM asset sync (hourly)");
        }
        Err(err) => warn!(error = %err, "RMM not configured - asset sync disabled"),
    }

    // Jobs 2+3: helpdesk syncs
    match HelpdeskClient::from_env() {
        Ok(helpdesk) => {
            // Job 2: company/user sync (every 4 hours)
            let client = helpdesk.clone();
            let pool_for_companies = pool.clone();
            scheduler
                .add(Job::new_async("0 0 */4 * * *", move |_uuid, _l| {
                    let client = client.clone();
                    let pool = pool_for_companies.clone();
                    Box::pin(async move {
                        info!("Running helpdesk company/user sync");
                        log_sync_result("helpdesk_companies", client.sync_companies(&pool).await);
                        log_sync_result("helpdesk_users", client.sync_users(&pool).await);
                    })
                })?)
                .await?;
            info!("Scheduled: Helpdesk company/user sync (every 4 hours)");

            // Job 3: ticket-time sync (hourly at :40)
            let client = helpdesk.clone();
            let pool_for_tickets = pool.clone();
            scheduler
                .add(Job::new_async("0 40 * * * *", move |_uuid, _l| {
                    let client = client.clone();
                    let pool = pool_for_tickets.clone();
                    Box::pin(async move {
                        info!("Running ticket-time sync");
                        log_sync_result(
                            "ticket_details",
                            sync::tickets::sync_ticket_details(&client, &pool).await,
                        );
                    })
                })?)
                .await?;
            info!("Scheduled: Ticket-time sync (hourly)");
        }
        Err(err) => warn!(error = %err, "Helpdesk not configured - company/user/ticket syncs disabled"),
    }

    // Heartbeat (every 5 minutes)
    scheduler
        .add(Job::new_async("0 */5 * * * *", |_uuid, _l| {
            Box::pin(async move {
                info!("Worker heartbeat - all systems operational");
            })
        })?)
        .await?;
    info!("Scheduled: Heartbeat (every 5 minutes)");

    scheduler.start().await?;
    info!("Scheduler started");

    // Keep the process alive; jobs run on the scheduler's tasks
    loop {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
}
