//! The reschedule workflow: a bounded sequence of interaction steps driven
//! through the locator and interaction primitives.
//!
//! Steps run strictly in order and any failure propagates unmodified to the
//! cycle boundary; the remote site has no resume concept, so nothing is
//! retried locally except the date-picker paging loop, which has a hard
//! attempt bound and no side effect to undo. The held date is committed by
//! the caller only after the final confirmation step returns.

use crate::config::Config;
use crate::error::BotError;
use crate::notify::Notifier;
use crate::scanner::{ScanResult, Scanner};
use chrono::{Datelike, NaiveDate};
use rebooker::{AutomationError, ElementHandle, Page, Selector, SelectorChain, WaitPolicy};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const STEP_TIMEOUT: Duration = Duration::from_secs(5);
/// Short probe for per-page day-cell lookups inside the picker loop
const PICKER_PROBE_TIMEOUT: Duration = Duration::from_millis(100);
/// Up to two years of month pages before the loop gives up
const MAX_DATE_PICKER_PAGES: u32 = 24;
/// Settle pause after form-mutating steps; the site re-renders in place
const SETTLE_DELAY: Duration = Duration::from_millis(1000);
const PICK_DELAY: Duration = Duration::from_millis(500);
/// The confirmation overlay needs longer before the session can go away
const CONFIRM_DELAY: Duration = Duration::from_secs(5);

/// Tagged outcome of one cycle. An unexpected failure is the `Err` arm of
/// the surrounding `Result`, not an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new, earlier date was booked and confirmed
    Rescheduled(NaiveDate),
    /// Nothing worth pursuing this cycle
    NoBetterDate,
    /// The workflow stopped itself before committing anything
    Aborted(AbortReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The target day never appeared within the paging bound
    DatePickerExhausted,
    /// The form no longer held the candidate date at readback; another
    /// claimant got there first
    DateNoLongerAvailable { wanted: NaiveDate, picked: String },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::DatePickerExhausted => write!(f, "date picker exhausted"),
            AbortReason::DateNoLongerAvailable { wanted, picked } => {
                write!(f, "date {wanted} no longer available, form shows {picked:?}")
            }
        }
    }
}

enum PickerOutcome {
    Picked,
    Exhausted,
}

enum DateCheck {
    Verified,
    Mismatch(String),
}

pub struct RescheduleWorkflow {
    page: Page,
    scanner: Scanner,
    notifier: Notifier,
    config: Config,
}

impl RescheduleWorkflow {
    pub fn new(page: Page, scanner: Scanner, notifier: Notifier, config: Config) -> Self {
        Self {
            page,
            scanner,
            notifier,
            config,
        }
    }

    /// Run one full pass: scan, and if a better date exists, claim it.
    #[instrument(skip(self))]
    pub async fn run(&self, current_date: NaiveDate) -> Result<CycleOutcome, BotError> {
        self.authenticate().await?;
        self.open_appointment_page().await?;

        let candidate = match self.fetch_availability(current_date).await? {
            ScanResult::NoSlots => {
                info!("no open slots listed at the facility");
                return Ok(CycleOutcome::NoBetterDate);
            }
            ScanResult::NotBetter(first) => {
                info!("no date earlier than {current_date}, first available is {first}");
                return Ok(CycleOutcome::NoBetterDate);
            }
            ScanResult::Excluded(candidate) => {
                info!("earlier date {candidate} falls in an excluded range, skipping");
                return Ok(CycleOutcome::NoBetterDate);
            }
            ScanResult::Better(candidate) => {
                self.notifier
                    .send(&format!("found an earlier date! {candidate}"))
                    .await;
                candidate
            }
        };

        self.open_schedule_form().await?;
        self.select_group_if_applicable().await?;
        self.select_facility().await?;
        self.open_date_picker().await?;

        match self.advance_to_target_date(candidate).await? {
            PickerOutcome::Picked => {}
            PickerOutcome::Exhausted => {
                warn!("cancelled date picking after {MAX_DATE_PICKER_PAGES} pages, something is off");
                return Ok(CycleOutcome::Aborted(AbortReason::DatePickerExhausted));
            }
        }

        if let DateCheck::Mismatch(picked) = self.verify_picked_date(candidate).await? {
            self.notifier
                .send(&format!(
                    "sorry, the date {candidate} is no longer available, the form shows {picked}. someone moved a bit faster."
                ))
                .await;
            return Ok(CycleOutcome::Aborted(AbortReason::DateNoLongerAvailable {
                wanted: candidate,
                picked,
            }));
        }

        self.select_earliest_time().await?;
        self.submit_reschedule().await?;
        self.confirm_submission().await?;

        info!("rescheduled to {candidate}");
        Ok(CycleOutcome::Rescheduled(candidate))
    }

    async fn resolve(&self, chain: impl Into<SelectorChain>) -> Result<ElementHandle, BotError> {
        let handle = self
            .page
            .locator(chain)
            .visible(true)
            .set_default_timeout(STEP_TIMEOUT)
            .resolve()
            .await?;
        handle.scroll_into_view_if_needed(STEP_TIMEOUT).await?;
        Ok(handle)
    }

    async fn settle(&self) {
        tokio::time::sleep(SETTLE_DELAY).await;
    }

    async fn authenticate(&self) -> Result<(), BotError> {
        info!("signing in");
        self.page
            .navigate(&self.config.sign_in_url(), WaitPolicy::DomContentLoaded)
            .await?;

        let email = self.resolve(["aria/Email *", "#user_email"]).await?;
        email.click().await?;
        email.set_value(&self.config.username).await?;
        self.page.press_tab().await?;

        let password = self.resolve(["aria/Password", "#user_password"]).await?;
        password.set_value(&self.config.password).await?;

        let agreement = self
            .resolve(["#sign_in_form > div.radio-checkbox-group > label > div"])
            .await?;
        agreement.click().await?;

        let submit = self
            .resolve(["[name=\"commit\"]", "#new_user input[type=\"submit\"]"])
            .await?;
        submit.click().await?;
        self.settle().await;
        Ok(())
    }

    async fn open_appointment_page(&self) -> Result<(), BotError> {
        info!("opening appointment page");
        self.page
            .navigate(&self.config.appointment_url(), WaitPolicy::DomContentLoaded)
            .await?;
        self.settle().await;
        Ok(())
    }

    async fn fetch_availability(&self, current_date: NaiveDate) -> Result<ScanResult, BotError> {
        info!("checking available dates");
        self.scanner.scan(current_date).await
    }

    /// Gate: the schedule form (or the group continue in front of it) must be
    /// on the page before the form steps start.
    async fn open_schedule_form(&self) -> Result<(), BotError> {
        let chain: SelectorChain = if self.config.group_appointment {
            ["aria/Continue", "#main form input[type=\"submit\"]"].into()
        } else {
            [
                "aria/Consular Section Appointment >> aria/[role=\"combobox\"]",
                "#appointments_consulate_appointment_facility_id",
            ]
            .into()
        };
        self.page
            .locator(chain)
            .visible(true)
            .set_default_timeout(STEP_TIMEOUT)
            .resolve()
            .await
            .map_err(|e| match e {
                AutomationError::Timeout(message) => {
                    AutomationError::UnexpectedPageState(format!(
                        "schedule form did not load: {message}"
                    ))
                }
                other => other,
            })?;
        Ok(())
    }

    async fn select_group_if_applicable(&self) -> Result<(), BotError> {
        if !self.config.group_appointment {
            return Ok(());
        }
        info!("continuing through the group appointment gate");
        let cont = self
            .resolve(["aria/Continue", "#main form input[type=\"submit\"]"])
            .await?;
        cont.click().await?;
        self.settle().await;
        Ok(())
    }

    async fn select_facility(&self) -> Result<(), BotError> {
        info!("selecting facility {}", self.config.facility_id);
        let facility = self
            .resolve([
                "aria/Consular Section Appointment >> aria/[role=\"combobox\"]",
                "#appointments_consulate_appointment_facility_id",
            ])
            .await?;
        facility.select_option(&self.config.facility_id).await?;
        self.settle().await;
        Ok(())
    }

    async fn open_date_picker(&self) -> Result<(), BotError> {
        info!("opening the date picker");
        let input = self
            .resolve([
                "aria/Date of Appointment *",
                "#appointments_consulate_appointment_date",
            ])
            .await?;
        input.click().await?;
        self.settle().await;
        Ok(())
    }

    /// Page forward through the picker until the target day's cell is
    /// clickable, bounded at [`MAX_DATE_PICKER_PAGES`] pages. The picker only
    /// exposes a forward control, so a missed target cannot be recovered
    /// within a cycle and the bound turns a stale listing into an abort
    /// instead of an infinite loop.
    async fn advance_to_target_date(
        &self,
        candidate: NaiveDate,
    ) -> Result<PickerOutcome, BotError> {
        info!("paging the picker to {candidate}");
        let day_chain = SelectorChain::new(vec![
            Selector::from(format!("aria/{}[role=\"link\"]", candidate.day()).as_str()),
            Selector::from("#ui-datepicker-div td[data-handler=\"selectDay\"] > a"),
        ]);

        for attempt in 1..=MAX_DATE_PICKER_PAGES {
            let probe = self
                .page
                .locator(day_chain.clone())
                .visible(true)
                .set_default_timeout(PICKER_PROBE_TIMEOUT)
                .resolve()
                .await;
            match probe {
                Ok(cell) => {
                    cell.scroll_into_view_if_needed(STEP_TIMEOUT).await?;
                    cell.click().await?;
                    tokio::time::sleep(PICK_DELAY).await;
                    debug!(attempt, "picked day {} of {candidate}", candidate.day());
                    return Ok(PickerOutcome::Picked);
                }
                Err(AutomationError::Timeout(_)) | Err(AutomationError::ElementNotFound(_)) => {
                    debug!(attempt, "target day not on this page, advancing");
                    let next = self
                        .resolve([
                            "aria/Next >> aria/[role=\"generic\"]",
                            "#ui-datepicker-div .ui-datepicker-group-last .ui-datepicker-next span",
                        ])
                        .await?;
                    next.click().await?;
                }
                Err(other) => return Err(other.into()),
            }
        }
        Ok(PickerOutcome::Exhausted)
    }

    /// Read the bound input back and make sure the form still holds the
    /// candidate. A mismatch means the slot was claimed between the scan and
    /// the pick; submitting would book the wrong date.
    async fn verify_picked_date(&self, candidate: NaiveDate) -> Result<DateCheck, BotError> {
        let input = self
            .page
            .locator("#appointments_consulate_appointment_date")
            .visible(true)
            .set_default_timeout(STEP_TIMEOUT)
            .resolve()
            .await?;
        let picked = input.read_value().await?;
        let wanted = candidate.format("%Y-%m-%d").to_string();
        if picked == wanted {
            Ok(DateCheck::Verified)
        } else {
            Ok(DateCheck::Mismatch(picked))
        }
    }

    async fn select_earliest_time(&self) -> Result<(), BotError> {
        let select = self
            .resolve(["#appointments_consulate_appointment_time"])
            .await?;
        let time = select.select_first_option().await?;
        info!("selected the earliest time {time}");
        self.settle().await;
        Ok(())
    }

    async fn submit_reschedule(&self) -> Result<(), BotError> {
        info!("submitting the reschedule");
        let submit = self.resolve(["aria/Reschedule", "#appointments_submit"]).await?;
        submit.click().await?;
        self.settle().await;
        Ok(())
    }

    async fn confirm_submission(&self) -> Result<(), BotError> {
        info!("confirming on the popup");
        let confirm = self
            .resolve([
                "aria/Confirm",
                "body > div.reveal-overlay > div > div > a.button.alert",
            ])
            .await?;
        confirm.click().await?;
        tokio::time::sleep(CONFIRM_DELAY).await;
        Ok(())
    }
}
