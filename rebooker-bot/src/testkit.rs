//! Shared test doubles: a scripted fake of the booking site, a recording
//! notifier, and a canned slot source.

use crate::config::Config;
use crate::error::BotError;
use crate::notify::Notify;
use crate::scanner::{AppointmentSlot, SlotSource};
use rebooker::{AutomationError, BrowserSession, NodeRef, Scope, Selector, WaitPolicy};
use serde_json::Value;
use std::sync::Mutex;

pub fn test_config() -> Config {
    Config {
        username: "user@example.com".to_string(),
        password: "hunter2".to_string(),
        appointment_id: "12345".to_string(),
        facility_id: "94".to_string(),
        locale: "en-ca".to_string(),
        base_url: "https://booking.example".to_string(),
        current_date: "2024-06-01".parse().unwrap(),
        poll_interval_secs: 1,
        exclusions: Vec::new(),
        group_appointment: false,
        debug_port: 9222,
        pushover_user: None,
        pushover_app: None,
        outage_threshold_mins: 60,
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notify for RecordingNotifier {
    async fn send(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

pub struct StaticSlots(Vec<AppointmentSlot>);

impl StaticSlots {
    pub fn from_dates(dates: &[&str]) -> Self {
        Self(
            dates
                .iter()
                .map(|s| AppointmentSlot {
                    date: s.parse().unwrap(),
                })
                .collect(),
        )
    }
}

#[async_trait::async_trait]
impl SlotSource for StaticSlots {
    async fn fetch(&self) -> Result<Vec<AppointmentSlot>, BotError> {
        Ok(self.0.clone())
    }
}

const EMAIL: u64 = 1;
const PASSWORD: u64 = 2;
const AGREEMENT: u64 = 3;
const COMMIT: u64 = 4;
const FACILITY: u64 = 6;
const DATE_INPUT: u64 = 7;
const DAY_CELL: u64 = 8;
const NEXT: u64 = 9;
const TIME_SELECT: u64 = 10;
const SUBMIT: u64 = 11;
const CONFIRM: u64 = 12;

fn label(node: u64) -> &'static str {
    match node {
        EMAIL => "email",
        PASSWORD => "password",
        AGREEMENT => "agreement",
        COMMIT => "commit",
        FACILITY => "facility",
        DATE_INPUT => "date_input",
        DAY_CELL => "day_cell",
        NEXT => "next",
        TIME_SELECT => "time",
        SUBMIT => "submit",
        CONFIRM => "confirm",
        _ => "unknown",
    }
}

/// A scripted stand-in for the booking site. The date picker starts on page
/// zero; the target day's cell exists only on `day_on_page`, and clicking the
/// forward control advances one page.
pub struct FakeSite {
    day_on_page: u32,
    picked_value: String,
    availability_json: Option<String>,
    picker_page: Mutex<u32>,
    clicks: Mutex<Vec<String>>,
    typed: Mutex<Vec<(String, String)>>,
    selections: Mutex<Vec<(String, String)>>,
    navigations: Mutex<Vec<String>>,
    evaluations: Mutex<Vec<String>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self {
            day_on_page: 0,
            picked_value: String::new(),
            availability_json: None,
            picker_page: Mutex::new(0),
            clicks: Mutex::new(Vec::new()),
            typed: Mutex::new(Vec::new()),
            selections: Mutex::new(Vec::new()),
            navigations: Mutex::new(Vec::new()),
            evaluations: Mutex::new(Vec::new()),
        }
    }

    pub fn with_day_on_page(mut self, page: u32) -> Self {
        self.day_on_page = page;
        self
    }

    /// What the bound date input reads back after a pick
    pub fn with_picked_value(mut self, value: &str) -> Self {
        self.picked_value = value.to_string();
        self
    }

    /// Body the in-page availability request returns; unset means the
    /// request came back with no listing
    pub fn with_availability_json(mut self, json: &str) -> Self {
        self.availability_json = Some(json.to_string());
        self
    }

    pub fn clicks(&self) -> Vec<String> {
        self.clicks.lock().unwrap().clone()
    }

    pub fn next_clicks(&self) -> u32 {
        self.clicks
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == "next")
            .count() as u32
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.typed.lock().unwrap().clone()
    }

    pub fn selections(&self) -> Vec<(String, String)> {
        self.selections.lock().unwrap().clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn evaluations(&self) -> Vec<String> {
        self.evaluations.lock().unwrap().clone()
    }

    fn node_for(&self, selector: &Selector) -> Option<u64> {
        match selector {
            Selector::Id(id) => match id.as_str() {
                "user_email" => Some(EMAIL),
                "user_password" => Some(PASSWORD),
                "appointments_consulate_appointment_facility_id" => Some(FACILITY),
                "appointments_consulate_appointment_date" => Some(DATE_INPUT),
                "appointments_consulate_appointment_time" => Some(TIME_SELECT),
                "appointments_submit" => Some(SUBMIT),
                _ => None,
            },
            Selector::Css(css) => {
                if css.contains("radio-checkbox-group") {
                    Some(AGREEMENT)
                } else if css == "[name=\"commit\"]" {
                    Some(COMMIT)
                } else if css.contains("selectDay") {
                    self.day_cell_if_present()
                } else if css.contains("ui-datepicker-next") {
                    Some(NEXT)
                } else if css.contains("reveal-overlay") {
                    Some(CONFIRM)
                } else {
                    None
                }
            }
            // Accessibility lookups miss so chains exercise the CSS fallback,
            // except the day cell which the picker probes by day number
            Selector::Aria { role, .. } if role.as_deref() == Some("link") => {
                self.day_cell_if_present()
            }
            _ => None,
        }
    }

    fn day_cell_if_present(&self) -> Option<u64> {
        if *self.picker_page.lock().unwrap() == self.day_on_page {
            Some(DAY_CELL)
        } else {
            None
        }
    }
}

#[async_trait::async_trait]
impl BrowserSession for FakeSite {
    async fn navigate(&self, url: &str, _wait: WaitPolicy) -> Result<(), AutomationError> {
        self.navigations.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn query(
        &self,
        selector: &Selector,
        _scope: &Scope,
    ) -> Result<Option<NodeRef>, AutomationError> {
        Ok(self.node_for(selector).map(NodeRef::new))
    }

    async fn nested_root(&self, _node: &NodeRef) -> Result<Option<Scope>, AutomationError> {
        Ok(None)
    }

    async fn click(&self, node: &NodeRef) -> Result<(), AutomationError> {
        if node.raw() == NEXT {
            *self.picker_page.lock().unwrap() += 1;
        }
        self.clicks
            .lock()
            .unwrap()
            .push(label(node.raw()).to_string());
        Ok(())
    }

    async fn type_text(&self, node: &NodeRef, text: &str) -> Result<(), AutomationError> {
        self.typed
            .lock()
            .unwrap()
            .push((label(node.raw()).to_string(), text.to_string()));
        Ok(())
    }

    async fn assign_value(&self, node: &NodeRef, value: &str) -> Result<(), AutomationError> {
        self.typed
            .lock()
            .unwrap()
            .push((label(node.raw()).to_string(), value.to_string()));
        Ok(())
    }

    async fn select_value(&self, node: &NodeRef, value: &str) -> Result<(), AutomationError> {
        self.selections
            .lock()
            .unwrap()
            .push((label(node.raw()).to_string(), value.to_string()));
        Ok(())
    }

    async fn select_first_option(&self, node: &NodeRef) -> Result<String, AutomationError> {
        self.selections
            .lock()
            .unwrap()
            .push((label(node.raw()).to_string(), "09:00".to_string()));
        Ok("09:00".to_string())
    }

    async fn read_property(
        &self,
        node: &NodeRef,
        name: &str,
    ) -> Result<Value, AutomationError> {
        let value = match (node.raw(), name) {
            (EMAIL, "type") => Value::String("email".to_string()),
            (PASSWORD, "type") => Value::String("password".to_string()),
            (DATE_INPUT, "value") => Value::String(self.picked_value.clone()),
            _ => Value::Null,
        };
        Ok(value)
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, AutomationError> {
        self.evaluations.lock().unwrap().push(expression.to_string());
        Ok(match &self.availability_json {
            Some(json) => Value::String(json.clone()),
            None => Value::Null,
        })
    }

    async fn is_connected(&self, _node: &NodeRef) -> Result<bool, AutomationError> {
        Ok(true)
    }

    async fn is_visible(&self, _node: &NodeRef) -> Result<bool, AutomationError> {
        Ok(true)
    }

    async fn is_in_viewport(&self, _node: &NodeRef) -> Result<bool, AutomationError> {
        Ok(true)
    }

    async fn scroll_into_view(&self, _node: &NodeRef) -> Result<(), AutomationError> {
        Ok(())
    }

    async fn press_tab(&self) -> Result<(), AutomationError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), AutomationError> {
        Ok(())
    }
}
