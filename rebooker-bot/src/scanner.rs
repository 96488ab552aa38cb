//! Availability scanning and the date-acceptance policy.
//!
//! The endpoint returns an ascending list of open slots; only the first entry
//! is treated as the candidate earliest date, nothing else about the ordering
//! is assumed. A candidate is worth pursuing only when it beats the held date
//! and falls outside every configured exclusion range.

use crate::error::BotError;
use chrono::NaiveDate;
use rebooker::Page;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};

/// One schedulable date as returned by the availability endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AppointmentSlot {
    pub date: NaiveDate,
}

/// An inclusive blackout range; candidates inside it are rejected no matter
/// how favorable they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExclusionRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ExclusionRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl FromStr for ExclusionRange {
    type Err = String;

    /// Parses `YYYY-MM-DD..YYYY-MM-DD` (inclusive on both ends)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once("..")
            .ok_or_else(|| format!("expected start..end, got {s:?}"))?;
        let start = NaiveDate::from_str(start.trim())
            .map_err(|e| format!("bad start date {start:?}: {e}"))?;
        let end =
            NaiveDate::from_str(end.trim()).map_err(|e| format!("bad end date {end:?}: {e}"))?;
        if end < start {
            return Err(format!("range {s:?} ends before it starts"));
        }
        Ok(Self { start, end })
    }
}

/// Operator-configured unavailability constraints
#[derive(Debug, Clone, Default)]
pub struct AcceptanceWindow {
    excluded: Vec<ExclusionRange>,
}

impl AcceptanceWindow {
    pub fn new(excluded: Vec<ExclusionRange>) -> Self {
        Self { excluded }
    }

    pub fn excludes(&self, date: NaiveDate) -> bool {
        self.excluded.iter().any(|range| range.contains(date))
    }
}

/// Outcome of one availability scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanResult {
    /// The endpoint listed no open slots
    NoSlots,
    /// The earliest open slot is no improvement over the held date
    NotBetter(NaiveDate),
    /// The earliest open slot is earlier but falls in an exclusion range
    Excluded(NaiveDate),
    /// The earliest open slot is earlier and acceptable
    Better(NaiveDate),
}

/// Where slot listings come from
#[async_trait::async_trait]
pub trait SlotSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<AppointmentSlot>, BotError>;
}

/// Fetches the JSON slot listing through the signed-in page, so the request
/// carries the session's cookies. The listing endpoint redirects
/// unauthenticated callers to the login page.
pub struct SessionSlotSource {
    page: Page,
    url: String,
}

impl SessionSlotSource {
    pub fn new(page: Page, url: String) -> Self {
        Self { page, url }
    }
}

#[async_trait::async_trait]
impl SlotSource for SessionSlotSource {
    async fn fetch(&self) -> Result<Vec<AppointmentSlot>, BotError> {
        // Synchronous request so the evaluate round-trip returns the body
        // directly; the XHR headers mark it as an API call, not a page load
        let script = format!(
            "(() => {{ const xhr = new XMLHttpRequest(); \
             xhr.open('GET', {url}, false); \
             xhr.setRequestHeader('Accept', 'application/json, text/javascript, */*; q=0.01'); \
             xhr.setRequestHeader('X-Requested-With', 'XMLHttpRequest'); \
             xhr.send(); \
             return xhr.status === 200 ? xhr.responseText : null; }})()",
            url = serde_json::Value::String(self.url.clone())
        );
        let body = self
            .page
            .evaluate(&script)
            .await
            .map_err(|e| BotError::Transport(format!("availability fetch failed: {e}")))?;

        let Some(text) = body.as_str() else {
            return Err(BotError::Transport(
                "availability endpoint returned no listing; is the session signed in?"
                    .to_string(),
            ));
        };
        let slots: Vec<AppointmentSlot> = serde_json::from_str(text)
            .map_err(|e| BotError::Transport(format!("availability listing unreadable: {e}")))?;
        debug!(slot_count = slots.len(), "fetched availability listing");
        Ok(slots)
    }
}

/// The pure acceptance policy, in decision order: no slots, no improvement,
/// excluded, better.
pub fn evaluate(
    slots: &[AppointmentSlot],
    window: &AcceptanceWindow,
    current_date: NaiveDate,
) -> ScanResult {
    let Some(first) = slots.first() else {
        return ScanResult::NoSlots;
    };
    let candidate = first.date;
    if candidate >= current_date {
        return ScanResult::NotBetter(candidate);
    }
    if window.excludes(candidate) {
        return ScanResult::Excluded(candidate);
    }
    ScanResult::Better(candidate)
}

/// Queries the slot listing and applies the acceptance policy
pub struct Scanner {
    source: Arc<dyn SlotSource>,
    window: AcceptanceWindow,
}

impl Scanner {
    pub fn new(source: Arc<dyn SlotSource>, window: AcceptanceWindow) -> Self {
        Self { source, window }
    }

    #[instrument(skip(self))]
    pub async fn scan(&self, current_date: NaiveDate) -> Result<ScanResult, BotError> {
        let slots = self.source.fetch().await?;
        Ok(evaluate(&slots, &self.window, current_date))
    }
}
