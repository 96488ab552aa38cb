use crate::scanner::ExclusionRange;
use chrono::NaiveDate;
use clap::Parser;

/// Runtime configuration, from flags or environment (a `.env` file is loaded
/// first when present). Exclusion windows are configuration, never code.
#[derive(Parser, Debug, Clone)]
#[command(name = "rebooker")]
#[command(about = "Watches a booking system for earlier appointment slots and rebooks automatically")]
pub struct Config {
    /// Account email for the booking site
    #[arg(long, env = "REBOOKER_USERNAME")]
    pub username: String,

    /// Account password for the booking site
    #[arg(long, env = "REBOOKER_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Schedule id of the appointment being watched
    #[arg(long, env = "REBOOKER_APPOINTMENT_ID")]
    pub appointment_id: String,

    /// Facility id to rebook at
    #[arg(long, env = "REBOOKER_FACILITY_ID")]
    pub facility_id: String,

    /// Locale path segment of the booking site, e.g. en-ca
    #[arg(long, env = "REBOOKER_LOCALE", default_value = "en-ca")]
    pub locale: String,

    /// Base URL of the booking site
    #[arg(
        long,
        env = "REBOOKER_BASE_URL",
        default_value = "https://ais.usvisa-info.com"
    )]
    pub base_url: String,

    /// Currently held appointment date (YYYY-MM-DD)
    #[arg(long, env = "REBOOKER_CURRENT_DATE")]
    pub current_date: NaiveDate,

    /// Seconds to sleep between cycles
    #[arg(long, env = "REBOOKER_POLL_INTERVAL", default_value_t = 300)]
    pub poll_interval_secs: u64,

    /// Inclusive date range to never book into, as start..end (repeatable)
    #[arg(long = "exclude", env = "REBOOKER_EXCLUDE", value_delimiter = ',')]
    pub exclusions: Vec<ExclusionRange>,

    /// Group appointment requiring the extra continue step
    #[arg(long, env = "REBOOKER_GROUP", default_value_t = false)]
    pub group_appointment: bool,

    /// Remote-debugging port of the browser the session driver attaches to
    #[arg(long, env = "REBOOKER_DEBUG_PORT", default_value_t = 9222)]
    pub debug_port: u16,

    /// Pushover user token (omit to log notifications only)
    #[arg(long, env = "PUSHOVER_USER_TOKEN")]
    pub pushover_user: Option<String>,

    /// Pushover application token (omit to log notifications only)
    #[arg(long, env = "PUSHOVER_APP_TOKEN")]
    pub pushover_app: Option<String>,

    /// Minutes of continuous failure before the outage escalation is pushed
    #[arg(long, env = "REBOOKER_OUTAGE_THRESHOLD", default_value_t = 60)]
    pub outage_threshold_mins: i64,
}

impl Config {
    pub fn sign_in_url(&self) -> String {
        format!("{}/{}/niv/users/sign_in", self.base_url, self.locale)
    }

    pub fn appointment_url(&self) -> String {
        format!(
            "{}/{}/niv/schedule/{}/appointment",
            self.base_url, self.locale, self.appointment_id
        )
    }

    pub fn availability_url(&self) -> String {
        format!(
            "{}/{}/niv/schedule/{}/appointment/days/{}.json?appointments[expedite]=false",
            self.base_url, self.locale, self.appointment_id, self.facility_id
        )
    }
}
