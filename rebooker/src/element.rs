use crate::errors::AutomationError;
use crate::locator::POLL_INTERVAL;
use crate::session::{BrowserSession, NodeRef};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};

/// Input kinds that accept direct key-by-key text entry. Everything else gets
/// a programmatic assignment plus synthesized `input`/`change` events, since
/// a stale listener may otherwise ignore a raw value write.
const DIRECT_ENTRY_KINDS: [&str; 9] = [
    "textarea",
    "select-one",
    "text",
    "url",
    "tel",
    "search",
    "password",
    "number",
    "email",
];

/// A resolved interactive element inside a live browser session.
///
/// Handles are transient: acquired from a [`crate::Locator`], used for one
/// step, then discarded. A handle goes stale once its node disconnects from
/// the document.
#[derive(Clone)]
pub struct ElementHandle {
    session: Arc<dyn BrowserSession>,
    node: NodeRef,
}

impl std::fmt::Debug for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementHandle")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

impl ElementHandle {
    pub(crate) fn new(session: Arc<dyn BrowserSession>, node: NodeRef) -> Self {
        Self { session, node }
    }

    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    pub async fn click(&self) -> Result<(), AutomationError> {
        self.session.click(&self.node).await
    }

    /// The element's semantic input kind (the `type` property)
    pub async fn input_kind(&self) -> Result<String, AutomationError> {
        let value = self.session.read_property(&self.node, "type").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Read back the element's current `value` property
    pub async fn read_value(&self) -> Result<String, AutomationError> {
        let value = self.session.read_property(&self.node, "value").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Enter a value into the element, picking the entry path by input kind:
    /// direct-entry kinds are typed key-by-key so validation listeners fire,
    /// everything else is assigned programmatically with synthetic events.
    #[instrument(level = "debug", skip(self, value))]
    pub async fn set_value(&self, value: &str) -> Result<(), AutomationError> {
        let kind = self.input_kind().await?;
        if DIRECT_ENTRY_KINDS.contains(&kind.as_str()) {
            debug!(%kind, "typing value key-by-key");
            self.session.type_text(&self.node, value).await
        } else {
            debug!(%kind, "assigning value programmatically");
            self.session.assign_value(&self.node, value).await
        }
    }

    pub async fn select_option(&self, value: &str) -> Result<(), AutomationError> {
        self.session.select_value(&self.node, value).await
    }

    /// Select the first selectable option, returning the chosen value
    pub async fn select_first_option(&self) -> Result<String, AutomationError> {
        self.session.select_first_option(&self.node).await
    }

    /// Scroll the element into the viewport center if it is not already
    /// intersecting it, then wait until it is.
    #[instrument(level = "debug", skip(self))]
    pub async fn scroll_into_view_if_needed(
        &self,
        timeout: Duration,
    ) -> Result<(), AutomationError> {
        self.wait_for_connected(timeout).await?;
        if self.session.is_in_viewport(&self.node).await? {
            return Ok(());
        }
        self.session.scroll_into_view(&self.node).await?;
        wait_until(timeout, "element to intersect viewport", || {
            self.session.is_in_viewport(&self.node)
        })
        .await
    }

    /// Wait until the node is connected to the document
    pub async fn wait_for_connected(&self, timeout: Duration) -> Result<(), AutomationError> {
        wait_until(timeout, "element to be connected", || {
            self.session.is_connected(&self.node)
        })
        .await
    }
}

/// Cooperative polling wait: probe at [`POLL_INTERVAL`] until the predicate
/// holds or the deadline elapses, then fail with `Timeout`.
pub async fn wait_until<F, Fut>(
    timeout: Duration,
    what: &str,
    mut probe: F,
) -> Result<(), AutomationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, AutomationError>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if probe().await? {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(AutomationError::Timeout(format!(
                "timed out after {timeout:?} waiting for {what}"
            )));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
