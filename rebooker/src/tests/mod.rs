
use crate::errors::AutomationError;
use crate::selector::Selector;
use crate::session::{BrowserSession, NodeRef, Scope, WaitPolicy};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Everything a test may want to assert the session was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Navigated(String),
    Clicked(u64),
    Typed(u64, String),
    Assigned(u64, String),
    Selected(u64, String),
    Scrolled(u64),
    TabPressed,
    Closed,
}

#[derive(Debug, Clone)]
pub struct MockElement {
    pub id: u64,
    pub selector: Selector,
    pub scope: Scope,
    pub visible: bool,
    pub connected: bool,
    pub in_viewport: bool,
    pub shadow_root: Option<u64>,
    pub properties: HashMap<String, Value>,
    /// Number of query polls that miss before the element "appears"
    pub appears_after_polls: u32,
}

impl MockElement {
    pub fn new(id: u64, selector: impl Into<Selector>) -> Self {
        Self {
            id,
            selector: selector.into(),
            scope: Scope::Document,
            visible: true,
            connected: true,
            in_viewport: true,
            shadow_root: None,
            properties: HashMap::new(),
            appears_after_polls: 0,
        }
    }

    pub fn in_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn invisible(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn off_screen(mut self) -> Self {
        self.in_viewport = false;
        self
    }

    pub fn with_shadow_root(mut self, root_id: u64) -> Self {
        self.shadow_root = Some(root_id);
        self
    }

    pub fn with_property(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    pub fn appearing_after(mut self, polls: u32) -> Self {
        self.appears_after_polls = polls;
        self
    }
}

/// In-memory session fake: elements are registered up front and queries match
/// on exact (selector, scope) pairs.
#[derive(Default)]
pub struct MockSession {
    elements: Mutex<Vec<MockElement>>,
    events: Mutex<Vec<SessionEvent>>,
    misses_left: Mutex<HashMap<u64, u32>>,
}

impl MockSession {
    pub fn new(elements: Vec<MockElement>) -> Self {
        let misses = elements
            .iter()
            .filter(|e| e.appears_after_polls > 0)
            .map(|e| (e.id, e.appears_after_polls))
            .collect();
        Self {
            elements: Mutex::new(elements),
            events: Mutex::new(Vec::new()),
            misses_left: Mutex::new(misses),
        }
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: SessionEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn find(&self, selector: &Selector, scope: &Scope) -> Option<MockElement> {
        let elements = self.elements.lock().unwrap();
        elements
            .iter()
            .find(|e| &e.selector == selector && &e.scope == scope)
            .cloned()
    }

    fn by_id(&self, id: u64) -> Option<MockElement> {
        let elements = self.elements.lock().unwrap();
        elements.iter().find(|e| e.id == id).cloned()
    }

    fn update<F: FnOnce(&mut MockElement)>(&self, id: u64, apply: F) {
        let mut elements = self.elements.lock().unwrap();
        if let Some(element) = elements.iter_mut().find(|e| e.id == id) {
            apply(element);
        }
    }
}

#[async_trait::async_trait]
impl BrowserSession for MockSession {
    async fn navigate(&self, url: &str, _wait: WaitPolicy) -> Result<(), AutomationError> {
        self.record(SessionEvent::Navigated(url.to_string()));
        Ok(())
    }

    async fn query(
        &self,
        selector: &Selector,
        scope: &Scope,
    ) -> Result<Option<NodeRef>, AutomationError> {
        let Some(element) = self.find(selector, scope) else {
            return Ok(None);
        };
        let mut misses = self.misses_left.lock().unwrap();
        if let Some(left) = misses.get_mut(&element.id) {
            if *left > 0 {
                *left -= 1;
                return Ok(None);
            }
        }
        Ok(Some(NodeRef::new(element.id)))
    }

    async fn nested_root(&self, node: &NodeRef) -> Result<Option<Scope>, AutomationError> {
        Ok(self
            .by_id(node.raw())
            .and_then(|e| e.shadow_root)
            .map(|root_id| Scope::Node(NodeRef::new(root_id))))
    }

    async fn click(&self, node: &NodeRef) -> Result<(), AutomationError> {
        self.record(SessionEvent::Clicked(node.raw()));
        Ok(())
    }

    async fn type_text(&self, node: &NodeRef, text: &str) -> Result<(), AutomationError> {
        self.update(node.raw(), |e| {
            e.properties
                .insert("value".to_string(), Value::String(text.to_string()));
        });
        self.record(SessionEvent::Typed(node.raw(), text.to_string()));
        Ok(())
    }

    async fn assign_value(&self, node: &NodeRef, value: &str) -> Result<(), AutomationError> {
        self.update(node.raw(), |e| {
            e.properties
                .insert("value".to_string(), Value::String(value.to_string()));
        });
        self.record(SessionEvent::Assigned(node.raw(), value.to_string()));
        Ok(())
    }

    async fn select_value(&self, node: &NodeRef, value: &str) -> Result<(), AutomationError> {
        self.record(SessionEvent::Selected(node.raw(), value.to_string()));
        Ok(())
    }

    async fn select_first_option(&self, node: &NodeRef) -> Result<String, AutomationError> {
        let value = self
            .by_id(node.raw())
            .and_then(|e| e.properties.get("first_option").cloned())
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| {
                AutomationError::UnexpectedPageState(
                    "select has no selectable option".to_string(),
                )
            })?;
        self.record(SessionEvent::Selected(node.raw(), value.clone()));
        Ok(value)
    }

    async fn read_property(
        &self,
        node: &NodeRef,
        name: &str,
    ) -> Result<Value, AutomationError> {
        Ok(self
            .by_id(node.raw())
            .and_then(|e| e.properties.get(name).cloned())
            .unwrap_or(Value::Null))
    }

    async fn evaluate(&self, _expression: &str) -> Result<Value, AutomationError> {
        Ok(Value::Null)
    }

    async fn is_connected(&self, node: &NodeRef) -> Result<bool, AutomationError> {
        Ok(self.by_id(node.raw()).map(|e| e.connected).unwrap_or(false))
    }

    async fn is_visible(&self, node: &NodeRef) -> Result<bool, AutomationError> {
        Ok(self.by_id(node.raw()).map(|e| e.visible).unwrap_or(false))
    }

    async fn is_in_viewport(&self, node: &NodeRef) -> Result<bool, AutomationError> {
        Ok(self
            .by_id(node.raw())
            .map(|e| e.in_viewport)
            .unwrap_or(false))
    }

    async fn scroll_into_view(&self, node: &NodeRef) -> Result<(), AutomationError> {
        // Scrolling brings the element into the viewport
        self.update(node.raw(), |e| e.in_viewport = true);
        self.record(SessionEvent::Scrolled(node.raw()));
        Ok(())
    }

    async fn press_tab(&self) -> Result<(), AutomationError> {
        self.record(SessionEvent::TabPressed);
        Ok(())
    }

    async fn close(&self) -> Result<(), AutomationError> {
        self.record(SessionEvent::Closed);
        Ok(())
    }
}
