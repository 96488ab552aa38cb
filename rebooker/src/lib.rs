//! Resilient automation over a browser-like interactive session
//!
//! This crate provides the core primitives for driving a stateful web
//! workflow that has no API contract: fallback selector chains, shadow-root
//! piercing resolution, and cooperative polling waits with hard deadlines,
//! inspired by Playwright's web automation model. The concrete browser engine
//! sits behind the [`BrowserSession`] trait; [`cdp::CdpSession`] is the
//! default driver.

use std::sync::Arc;
use tracing::instrument;

pub mod cdp;
pub mod element;
pub mod errors;
pub mod locator;
pub mod selector;
pub mod session;
#[cfg(test)]
mod tests;

pub use element::{wait_until, ElementHandle};
pub use errors::AutomationError;
pub use locator::Locator;
pub use selector::{Selector, SelectorChain};
pub use session::{BrowserSession, NodeRef, Scope, WaitPolicy};

/// The main entry point, bound to one live browser session.
///
/// One page drives one workflow at a time; it is acquired at the start of a
/// cycle and must be closed on every exit path before the next cycle begins.
pub struct Page {
    session: Arc<dyn BrowserSession>,
}

impl Page {
    pub fn new(session: Arc<dyn BrowserSession>) -> Self {
        Self { session }
    }

    /// The underlying session, for collaborators that need raw access
    pub fn session(&self) -> Arc<dyn BrowserSession> {
        self.session.clone()
    }

    /// Build a locator over a fallback selector chain
    #[instrument(skip(self, chain))]
    pub fn locator(&self, chain: impl Into<SelectorChain>) -> Locator {
        Locator::new(self.session.clone(), chain.into())
    }

    #[instrument(skip(self))]
    pub async fn navigate(&self, url: &str, wait: WaitPolicy) -> Result<(), AutomationError> {
        self.session.navigate(url, wait).await
    }

    /// Evaluate an expression in the page
    pub async fn evaluate(&self, expression: &str) -> Result<serde_json::Value, AutomationError> {
        self.session.evaluate(expression).await
    }

    /// Move keyboard focus to the next field
    pub async fn press_tab(&self) -> Result<(), AutomationError> {
        self.session.press_tab().await
    }

    #[instrument(skip(self))]
    pub async fn close(&self) -> Result<(), AutomationError> {
        self.session.close().await
    }
}

impl Clone for Page {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
        }
    }
}
