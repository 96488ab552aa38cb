//! Lightweight Chrome DevTools Protocol driver for the session trait.
//!
//! Connects to an already-running Chromium with remote debugging enabled and
//! drives the page purely through `Runtime.evaluate`. Resolved nodes are kept
//! alive in a page-side registry array so a [`NodeRef`] is a stable index into
//! it for the lifetime of the document.

use crate::errors::AutomationError;
use crate::selector::Selector;
use crate::session::{BrowserSession, NodeRef, Scope, WaitPolicy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Installed once per document; idempotent. Holds the node registry plus the
/// accessible-name/role matcher used by `aria/` selectors.
const PAGE_BOOTSTRAP: &str = r#"
(() => {
  if (window.__rb) { return true; }
  const rb = { nodes: [] };
  rb.keep = (el) => { rb.nodes.push(el); return rb.nodes.length - 1; };
  rb.role = (el) => {
    const explicit = el.getAttribute && el.getAttribute('role');
    if (explicit) { return explicit; }
    const tag = el.tagName ? el.tagName.toLowerCase() : '';
    if (tag === 'a') { return el.hasAttribute('href') ? 'link' : 'generic'; }
    if (tag === 'button') { return 'button'; }
    if (tag === 'select') { return 'combobox'; }
    if (tag === 'textarea') { return 'textbox'; }
    if (tag === 'input') {
      const type = (el.getAttribute('type') || 'text').toLowerCase();
      if (type === 'checkbox') { return 'checkbox'; }
      if (type === 'radio') { return 'radio'; }
      if (type === 'button' || type === 'submit' || type === 'reset') { return 'button'; }
      return 'textbox';
    }
    if (tag === 'span' || tag === 'div') { return 'generic'; }
    return tag;
  };
  rb.name = (el) => {
    const label = el.getAttribute && el.getAttribute('aria-label');
    if (label) { return label.trim(); }
    if (el.labels && el.labels.length) { return el.labels[0].textContent.trim(); }
    const text = el.textContent ? el.textContent.trim() : '';
    if (text) { return text; }
    if (!el.getAttribute) { return ''; }
    return (el.getAttribute('placeholder') || el.getAttribute('alt') || el.getAttribute('title') || '').trim();
  };
  rb.aria = (root, name, role) => {
    if (!name && !role) { return null; }
    for (const el of root.querySelectorAll('*')) {
      if (role && rb.role(el) !== role) { continue; }
      if (name && rb.name(el) !== name) { continue; }
      return el;
    }
    return null;
  };
  window.__rb = rb;
  return true;
})()
"#;

/// CDP session driver over an existing browser's debugging endpoint
#[derive(Debug, Clone)]
pub struct CdpSession {
    base_url: String,
    client: reqwest::Client,
    tab_id: String,
}

#[derive(Debug, Deserialize)]
struct TabInfo {
    id: String,
}

#[derive(Debug, Serialize)]
struct CdpRequest {
    id: u32,
    method: String,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct CdpResponse {
    #[serde(default)]
    #[allow(dead_code)]
    id: u32,
    result: Option<Value>,
    error: Option<Value>,
}

impl CdpSession {
    /// Connect to a browser on the given debugging port and open a fresh tab
    pub async fn connect(debug_port: u16) -> Result<Self, AutomationError> {
        let base_url = format!("http://localhost:{debug_port}");
        let client = reqwest::Client::new();

        let available = client
            .get(format!("{base_url}/json/version"))
            .send()
            .await
            .map(|response| response.status().is_success())
            .unwrap_or(false);
        if !available {
            return Err(AutomationError::SessionError(format!(
                "no browser with remote debugging on port {debug_port}; launch with --remote-debugging-port={debug_port}"
            )));
        }

        let tab: TabInfo = client
            .get(format!("{base_url}/json/new?about:blank"))
            .send()
            .await
            .map_err(|e| AutomationError::SessionError(format!("failed to open tab: {e}")))?
            .json()
            .await
            .map_err(|e| AutomationError::SessionError(format!("failed to parse tab: {e}")))?;
        debug!(tab_id = %tab.id, "opened browser tab");

        Ok(Self {
            base_url,
            client,
            tab_id: tab.id,
        })
    }

    /// Execute JavaScript in the session's tab
    async fn execute_script(&self, script: &str) -> Result<Value, AutomationError> {
        let mut params = serde_json::Map::new();
        params.insert("expression".to_string(), Value::String(script.to_string()));
        params.insert("returnByValue".to_string(), Value::Bool(true));
        params.insert("targetId".to_string(), Value::String(self.tab_id.clone()));

        let request = CdpRequest {
            id: 1,
            method: "Runtime.evaluate".to_string(),
            params: Value::Object(params),
        };

        let response = self
            .client
            .post(format!("{}/json/runtime/evaluate", self.base_url))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AutomationError::SessionError(format!("CDP request failed: {e}")))?;

        let cdp_response: CdpResponse = response
            .json()
            .await
            .map_err(|e| AutomationError::SessionError(format!("failed to parse CDP response: {e}")))?;

        if let Some(error) = cdp_response.error {
            return Err(AutomationError::SessionError(format!("CDP error: {error}")));
        }

        if let Some(result) = cdp_response.result {
            if let Some(value) = result.get("value") {
                return Ok(value.clone());
            }
        }

        warn!("script returned no result");
        Ok(Value::Null)
    }

    async fn ensure_bootstrap(&self) -> Result<(), AutomationError> {
        self.execute_script(PAGE_BOOTSTRAP).await.map(|_| ())
    }

    /// Expression for the registry slot of a node
    fn node_expr(node: &NodeRef) -> String {
        format!("window.__rb.nodes[{}]", node.raw())
    }

    fn scope_expr(scope: &Scope) -> String {
        match scope {
            Scope::Document => "document".to_string(),
            Scope::Node(node) => Self::node_expr(node),
        }
    }

    /// Run a snippet against one node, with `el` bound to it. A missing node
    /// means the handle went stale, which is a page-state violation.
    async fn with_node(&self, node: &NodeRef, body: &str) -> Result<Value, AutomationError> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) {{ return '__rb_stale'; }} {body} }})()",
            Self::node_expr(node)
        );
        let value = self.execute_script(&script).await?;
        if value.as_str() == Some("__rb_stale") {
            return Err(AutomationError::UnexpectedPageState(format!(
                "node {} is no longer held by the page",
                node.raw()
            )));
        }
        Ok(value)
    }
}

#[async_trait::async_trait]
impl BrowserSession for CdpSession {
    async fn navigate(&self, url: &str, wait: WaitPolicy) -> Result<(), AutomationError> {
        debug!(%url, "navigating");
        let assignment = format!("window.location.href = {}", js_string(url));
        self.execute_script(&assignment).await?;
        if matches!(wait, WaitPolicy::None) {
            return Ok(());
        }

        // Give the old document a moment to tear down before readiness polling
        tokio::time::sleep(Duration::from_millis(200)).await;
        let deadline = Instant::now() + NAVIGATION_TIMEOUT;
        loop {
            // evaluate can fail mid-navigation; treat that as "not ready yet"
            let state = self
                .execute_script("document.readyState")
                .await
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            let ready = match wait {
                WaitPolicy::Load => state == "complete",
                _ => state == "interactive" || state == "complete",
            };
            if ready {
                self.ensure_bootstrap().await?;
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AutomationError::Timeout(format!(
                    "timed out after {NAVIGATION_TIMEOUT:?} waiting for navigation to {url}"
                )));
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    async fn query(
        &self,
        selector: &Selector,
        scope: &Scope,
    ) -> Result<Option<NodeRef>, AutomationError> {
        self.ensure_bootstrap().await?;
        let root = Self::scope_expr(scope);
        let lookup = match selector {
            Selector::Css(css) => format!("root.querySelector({})", js_string(css)),
            Selector::Id(id) => format!("root.querySelector({})", js_string(&format!("[id=\"{id}\"]"))),
            Selector::Aria { name, role } => {
                let name_arg = if name.is_empty() {
                    "null".to_string()
                } else {
                    js_string(name)
                };
                let role_arg = match role {
                    Some(role) => js_string(role),
                    None => "null".to_string(),
                };
                format!("window.__rb.aria(root, {name_arg}, {role_arg})")
            }
            Selector::Chain(_) => {
                return Err(AutomationError::InvalidSelector(
                    "selector paths are walked by the locator, not the driver".to_string(),
                ))
            }
            Selector::Invalid(reason) => {
                return Err(AutomationError::InvalidSelector(reason.clone()))
            }
        };
        let script = format!(
            "(() => {{ const root = {root}; if (!root) {{ return null; }} const el = {lookup}; return el ? window.__rb.keep(el) : null; }})()"
        );
        let value = self.execute_script(&script).await?;
        Ok(value.as_u64().map(NodeRef::new))
    }

    async fn nested_root(&self, node: &NodeRef) -> Result<Option<Scope>, AutomationError> {
        let value = self
            .with_node(
                node,
                "return el.shadowRoot ? window.__rb.keep(el.shadowRoot) : null;",
            )
            .await?;
        Ok(value.as_u64().map(|raw| Scope::Node(NodeRef::new(raw))))
    }

    async fn click(&self, node: &NodeRef) -> Result<(), AutomationError> {
        self.with_node(node, "el.click(); return true;").await?;
        Ok(())
    }

    async fn type_text(&self, node: &NodeRef, text: &str) -> Result<(), AutomationError> {
        // Per-character value growth with an input event each keystroke, so
        // validation listeners see the same stream a typist produces
        let body = format!(
            "el.focus(); for (const ch of {}) {{ el.value = (el.value || '') + ch; \
             el.dispatchEvent(new InputEvent('input', {{ bubbles: true, data: ch }})); }} \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); return true;",
            js_string(text)
        );
        self.with_node(node, &body).await?;
        Ok(())
    }

    async fn assign_value(&self, node: &NodeRef, value: &str) -> Result<(), AutomationError> {
        let body = format!(
            "el.focus(); el.value = {}; \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); return true;",
            js_string(value)
        );
        self.with_node(node, &body).await?;
        Ok(())
    }

    async fn select_value(&self, node: &NodeRef, value: &str) -> Result<(), AutomationError> {
        let body = format!(
            "el.value = {}; el.dispatchEvent(new Event('change', {{ bubbles: true }})); return el.value;",
            js_string(value)
        );
        let chosen = self.with_node(node, &body).await?;
        if chosen.as_str() != Some(value) {
            return Err(AutomationError::UnexpectedPageState(format!(
                "select did not accept value {value:?}"
            )));
        }
        Ok(())
    }

    async fn select_first_option(&self, node: &NodeRef) -> Result<String, AutomationError> {
        let value = self
            .with_node(
                node,
                "if (!el.options) { return null; } \
                 for (const opt of el.options) { if (opt.value) { opt.selected = true; \
                 el.dispatchEvent(new Event('change', { bubbles: true })); return opt.value; } } \
                 return null;",
            )
            .await?;
        match value.as_str() {
            Some(chosen) => Ok(chosen.to_string()),
            None => Err(AutomationError::UnexpectedPageState(
                "select has no selectable option".to_string(),
            )),
        }
    }

    async fn read_property(
        &self,
        node: &NodeRef,
        name: &str,
    ) -> Result<Value, AutomationError> {
        let body = format!(
            "const v = el[{}]; return v === undefined ? null : v;",
            js_string(name)
        );
        self.with_node(node, &body).await
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, AutomationError> {
        self.execute_script(expression).await
    }

    async fn is_connected(&self, node: &NodeRef) -> Result<bool, AutomationError> {
        let script = format!(
            "(() => {{ const el = {}; return !!(el && el.isConnected); }})()",
            Self::node_expr(node)
        );
        Ok(self.execute_script(&script).await?.as_bool().unwrap_or(false))
    }

    async fn is_visible(&self, node: &NodeRef) -> Result<bool, AutomationError> {
        let script = format!(
            "(() => {{ const el = {}; return !!(el && el.getClientRects && el.getClientRects().length > 0); }})()",
            Self::node_expr(node)
        );
        Ok(self.execute_script(&script).await?.as_bool().unwrap_or(false))
    }

    async fn is_in_viewport(&self, node: &NodeRef) -> Result<bool, AutomationError> {
        let script = format!(
            "(() => {{ const el = {}; if (!el || !el.getBoundingClientRect) {{ return false; }} \
             const r = el.getBoundingClientRect(); \
             return r.bottom > 0 && r.right > 0 && r.top < window.innerHeight && r.left < window.innerWidth; }})()",
            Self::node_expr(node)
        );
        Ok(self.execute_script(&script).await?.as_bool().unwrap_or(false))
    }

    async fn scroll_into_view(&self, node: &NodeRef) -> Result<(), AutomationError> {
        self.with_node(
            node,
            "el.scrollIntoView({ block: 'center', inline: 'center', behavior: 'auto' }); return true;",
        )
        .await?;
        Ok(())
    }

    async fn press_tab(&self) -> Result<(), AutomationError> {
        self.execute_script(
            "(() => { const target = document.activeElement || document.body; \
             const opts = { key: 'Tab', code: 'Tab', bubbles: true }; \
             target.dispatchEvent(new KeyboardEvent('keydown', opts)); \
             target.dispatchEvent(new KeyboardEvent('keyup', opts)); return true; })()",
        )
        .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), AutomationError> {
        self.client
            .get(format!("{}/json/close/{}", self.base_url, self.tab_id))
            .send()
            .await
            .map_err(|e| AutomationError::SessionError(format!("failed to close tab: {e}")))?;
        debug!(tab_id = %self.tab_id, "closed browser tab");
        Ok(())
    }
}

/// JSON-escape a string for embedding in a script
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}
