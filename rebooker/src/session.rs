//! The seam between the automation core and a concrete browser engine.
//!
//! Everything above this trait works against logical selectors, opaque node
//! keys and explicit scopes; everything below it speaks whatever protocol the
//! engine needs. The default implementation lives in [`crate::cdp`].

use crate::errors::AutomationError;
use crate::selector::Selector;
use serde_json::Value;

/// Opaque key of a node held alive inside the remote session.
///
/// Only valid while the node stays connected to its document; acquired, used
/// and discarded within one workflow step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef(u64);

impl NodeRef {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A resolution scope: the top-level document, or a nested root (e.g. a
/// shadow root) reachable from a previously resolved node.
///
/// Chain resolution descends scopes explicitly rather than probing runtime
/// object shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Document,
    Node(NodeRef),
}

/// How long navigation should wait before returning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Return once the DOM is parsed
    #[default]
    DomContentLoaded,
    /// Return once the load event fired
    Load,
    /// Return as soon as navigation was issued
    None,
}

/// The common trait a browser session driver must implement.
///
/// All queries are single-shot and non-waiting; polling and deadlines are the
/// locator's job. Every method failure is a [`AutomationError::SessionError`]
/// unless the driver can say something more specific.
#[async_trait::async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate the session's page to a URL
    async fn navigate(&self, url: &str, wait: WaitPolicy) -> Result<(), AutomationError>;

    /// Look up a single selector inside a scope. Returns `Ok(None)` when the
    /// selector is well-formed but matches nothing right now.
    async fn query(
        &self,
        selector: &Selector,
        scope: &Scope,
    ) -> Result<Option<NodeRef>, AutomationError>;

    /// The nested root under a node, if the node exposes one
    async fn nested_root(&self, node: &NodeRef) -> Result<Option<Scope>, AutomationError>;

    async fn click(&self, node: &NodeRef) -> Result<(), AutomationError>;

    /// Enter text key-by-key so input-validation listeners fire per character
    async fn type_text(&self, node: &NodeRef, text: &str) -> Result<(), AutomationError>;

    /// Assign a value programmatically and synthesize `input`/`change` events
    async fn assign_value(&self, node: &NodeRef, value: &str) -> Result<(), AutomationError>;

    /// Select an option of a select-like element by value
    async fn select_value(&self, node: &NodeRef, value: &str) -> Result<(), AutomationError>;

    /// Select the first selectable option of a select-like element, returning
    /// the value that was chosen
    async fn select_first_option(&self, node: &NodeRef) -> Result<String, AutomationError>;

    /// Read a named property off a node
    async fn read_property(&self, node: &NodeRef, name: &str)
        -> Result<Value, AutomationError>;

    /// Evaluate an expression in the page, returning its value
    async fn evaluate(&self, expression: &str) -> Result<Value, AutomationError>;

    async fn is_connected(&self, node: &NodeRef) -> Result<bool, AutomationError>;

    async fn is_visible(&self, node: &NodeRef) -> Result<bool, AutomationError>;

    async fn is_in_viewport(&self, node: &NodeRef) -> Result<bool, AutomationError>;

    /// Ask the page to scroll the node to the viewport center
    async fn scroll_into_view(&self, node: &NodeRef) -> Result<(), AutomationError>;

    /// Move keyboard focus to the next field
    async fn press_tab(&self) -> Result<(), AutomationError>;

    /// Release the session. Must be safe to call on every exit path.
    async fn close(&self) -> Result<(), AutomationError>;
}
