use tracing::{debug, instrument};

use crate::element::ElementHandle;
use crate::errors::AutomationError;
use crate::selector::{Selector, SelectorChain};
use crate::session::{BrowserSession, NodeRef, Scope};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

// Default timeout if none is specified on the locator itself
const DEFAULT_LOCATOR_TIMEOUT: Duration = Duration::from_secs(5);

/// Fixed tick for all cooperative polling waits
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A high-level API for finding elements through a fallback selector chain.
///
/// Alternatives are tried in order on every poll tick; the first one that
/// resolves wins. A `Chain` alternative is walked segment by segment, and
/// every non-final segment that exposes a nested root (a shadow root) shifts
/// resolution into that root instead of the top-level document.
#[derive(Clone)]
pub struct Locator {
    session: Arc<dyn BrowserSession>,
    chain: SelectorChain,
    scope: Scope,
    timeout: Duration, // Default timeout for this locator instance
    must_be_visible: bool,
}

impl Locator {
    /// Create a new locator over the given fallback chain
    pub(crate) fn new(session: Arc<dyn BrowserSession>, chain: SelectorChain) -> Self {
        Self {
            session,
            chain,
            scope: Scope::Document,
            timeout: DEFAULT_LOCATOR_TIMEOUT, // Use default
            must_be_visible: false,
        }
    }

    /// Set a default timeout for waiting operations on this locator instance.
    pub fn set_default_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the root scope for this locator
    pub fn within(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Require matched elements to be visible on screen
    pub fn visible(mut self, is_visible: bool) -> Self {
        self.must_be_visible = is_visible;
        self
    }

    /// Wait for any alternative in the chain to resolve, up to the locator's
    /// timeout, polling at [`POLL_INTERVAL`].
    #[instrument(level = "debug", skip(self))]
    pub async fn resolve(&self) -> Result<ElementHandle, AutomationError> {
        if self.chain.is_empty() {
            return Err(AutomationError::InvalidSelector(
                "empty selector chain".to_string(),
            ));
        }
        debug!("waiting for element matching chain: {}", self.chain);

        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(node) = self.try_once().await? {
                return Ok(ElementHandle::new(self.session.clone(), node));
            }
            if Instant::now() >= deadline {
                return Err(AutomationError::Timeout(format!(
                    "timed out after {:?} waiting for any of {}",
                    self.timeout, self.chain
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// A single non-waiting pass over every alternative.
    pub async fn resolve_now(&self) -> Result<ElementHandle, AutomationError> {
        match self.try_once().await? {
            Some(node) => Ok(ElementHandle::new(self.session.clone(), node)),
            None => Err(AutomationError::ElementNotFound(format!(
                "no alternative resolved for {}",
                self.chain
            ))),
        }
    }

    async fn try_once(&self) -> Result<Option<NodeRef>, AutomationError> {
        for alternative in self.chain.alternatives() {
            if let Some(node) = self.try_alternative(alternative).await? {
                return Ok(Some(node));
            }
        }
        Ok(None)
    }

    /// Attempt one alternative, walking chain segments through nested roots.
    async fn try_alternative(
        &self,
        alternative: &Selector,
    ) -> Result<Option<NodeRef>, AutomationError> {
        let segments: &[Selector] = match alternative {
            Selector::Chain(parts) => parts.as_slice(),
            single => std::slice::from_ref(single),
        };
        if segments.is_empty() {
            return Err(AutomationError::InvalidSelector(
                "empty selector path".to_string(),
            ));
        }

        let mut scope = self.scope.clone();
        let mut resolved: Option<NodeRef> = None;
        for (index, segment) in segments.iter().enumerate() {
            if let Selector::Invalid(reason) = segment {
                return Err(AutomationError::InvalidSelector(reason.clone()));
            }
            let Some(node) = self.session.query(segment, &scope).await? else {
                return Ok(None);
            };
            if index + 1 < segments.len() {
                // Pierce into a shadow root when the segment exposes one,
                // otherwise keep searching under the node itself.
                scope = match self.session.nested_root(&node).await? {
                    Some(root) => root,
                    None => Scope::Node(node.clone()),
                };
            }
            resolved = Some(node);
        }

        if self.must_be_visible {
            if let Some(node) = &resolved {
                if !self.session.is_visible(node).await? {
                    return Ok(None);
                }
            }
        }
        Ok(resolved)
    }
}
