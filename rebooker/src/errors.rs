use thiserror::Error;

/// Errors produced by the automation core
#[derive(Debug, Error)]
pub enum AutomationError {
    /// No alternative in a selector chain resolved to an element
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// A bounded wait elapsed before its condition held
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// A selector string could not be parsed
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// The underlying browser session failed (transport, protocol, script)
    #[error("session error: {0}")]
    SessionError(String),

    /// A page assumption was violated mid-step
    #[error("unexpected page state: {0}")]
    UnexpectedPageState(String),
}
