//! rebooker - watches a booking system for earlier appointment slots and
//! rebooks automatically.
//!
//! The orchestrator loop runs forever: one cycle per iteration, each with a
//! fresh browser session that is released on every exit path, with the health
//! monitor deciding what is worth waking an operator for.

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chrono::NaiveDate;
use rebooker::cdp::CdpSession;
use rebooker::{BrowserSession, Page};

mod config;
mod error;
mod monitor;
mod notify;
mod scanner;
#[cfg(test)]
mod testkit;
mod workflow;

use config::Config;
use error::BotError;
use monitor::HealthMonitor;
use notify::{Notifier, Pushover};
use scanner::{AcceptanceWindow, Scanner, SessionSlotSource};
use workflow::{CycleOutcome, RescheduleWorkflow};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    let notifier: Notifier = Arc::new(Pushover::new(
        config.pushover_user.clone(),
        config.pushover_app.clone(),
    ));
    let window = AcceptanceWindow::new(config.exclusions.clone());
    let mut monitor = HealthMonitor::new(notifier.clone(), config.outage_threshold_mins);
    let mut current_date = config.current_date;

    notifier
        .send(&format!(
            "started watching for appointment dates earlier than {current_date}"
        ))
        .await;

    loop {
        let result = run_cycle(&config, &window, notifier.clone(), current_date).await;

        if let Ok(CycleOutcome::Rescheduled(new_date)) = &result {
            current_date = *new_date;
            notifier
                .send(&format!("successfully rescheduled to {new_date}"))
                .await;
        }
        monitor.observe(&result).await;

        tokio::time::sleep(Duration::from_secs(config.poll_interval_secs)).await;
    }
}

/// One full scan-and-attempt-reschedule pass over a fresh session. The
/// session is closed before returning, whatever happened.
async fn run_cycle(
    config: &Config,
    window: &AcceptanceWindow,
    notifier: Notifier,
    current_date: NaiveDate,
) -> Result<CycleOutcome, BotError> {
    info!("attaching to the browser");
    let session: Arc<dyn BrowserSession> = Arc::new(CdpSession::connect(config.debug_port).await?);

    let page = Page::new(session.clone());
    // The listing endpoint only answers signed-in callers, so the fetch
    // goes through the page the workflow logs in
    let scanner = Scanner::new(
        Arc::new(SessionSlotSource::new(
            page.clone(),
            config.availability_url(),
        )),
        window.clone(),
    );
    let workflow = RescheduleWorkflow::new(page, scanner, notifier, config.clone());

    let result = workflow.run(current_date).await;
    if let Err(err) = session.close().await {
        warn!("failed to close the session: {err}");
    }
    result
}
