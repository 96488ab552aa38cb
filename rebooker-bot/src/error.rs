use rebooker::AutomationError;
use thiserror::Error;

/// Errors that can fail a cycle
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Automation(#[from] AutomationError),

    /// The availability endpoint could not be fetched or parsed
    #[error("transport error: {0}")]
    Transport(String),
}
