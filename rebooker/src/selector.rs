/// Represents ways to locate an element within a page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Select by accessible name, with an optional role hint
    Aria { name: String, role: Option<String> },
    /// Select by element id
    Id(String),
    /// Select using a CSS path
    Css(String),
    /// A path of selectors; resolution descends into a nested (shadow) root
    /// after every non-final segment that exposes one
    Chain(Vec<Selector>),
    /// Represents an invalid selector string, with a reason.
    Invalid(String),
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Parses an `aria/` descriptor body into name and optional `[role="..."]` hint.
fn parse_aria(body: &str) -> Selector {
    if let Some(open) = body.rfind("[role=\"") {
        if let Some(close) = body[open..].find("\"]") {
            let role = &body[open + 7..open + close];
            return Selector::Aria {
                name: body[..open].trim().to_string(),
                role: Some(role.to_string()),
            };
        }
    }
    Selector::Aria {
        name: body.trim().to_string(),
        role: None,
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        // Handle chained selectors first
        let parts: Vec<&str> = s.split(">>").map(|p| p.trim()).collect();
        if parts.len() > 1 {
            return Selector::Chain(parts.into_iter().map(Selector::from).collect());
        }

        let s = s.trim();
        match s {
            "" => Selector::Invalid("empty selector".to_string()),
            _ if s.starts_with("aria/") => parse_aria(&s["aria/".len()..]),
            _ if s.starts_with("css:") => Selector::Css(s["css:".len()..].to_string()),
            // "#user_email" is an id lookup only when it names a bare id;
            // anything with combinators or extra simple selectors is a CSS path
            _ if s.starts_with('#')
                && !s.contains(' ')
                && !s.contains('>')
                && !s.contains('.')
                && !s.contains('[') =>
            {
                Selector::Id(s[1..].to_string())
            }
            _ => Selector::Css(s.to_string()),
        }
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::from(s.as_str())
    }
}

/// An ordered fallback list of alternative selectors.
///
/// Alternatives are tried in order until one resolves; resolution fails only
/// when every alternative fails. This is the unit of resilience against
/// structural drift: pair a semantic descriptor (`aria/...`) with a concrete
/// CSS path so either may break without breaking the lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorChain(Vec<Selector>);

impl SelectorChain {
    pub fn new(alternatives: Vec<Selector>) -> Self {
        Self(alternatives)
    }

    pub fn alternatives(&self) -> &[Selector] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, selector: impl Into<Selector>) {
        self.0.push(selector.into());
    }
}

impl std::fmt::Display for SelectorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let descriptions: Vec<String> = self.0.iter().map(|s| s.to_string()).collect();
        write!(f, "[{}]", descriptions.join(", "))
    }
}

impl From<Selector> for SelectorChain {
    fn from(selector: Selector) -> Self {
        Self(vec![selector])
    }
}

impl From<&str> for SelectorChain {
    fn from(s: &str) -> Self {
        Self(vec![Selector::from(s)])
    }
}

impl<const N: usize> From<[&str; N]> for SelectorChain {
    fn from(alternatives: [&str; N]) -> Self {
        Self(alternatives.into_iter().map(Selector::from).collect())
    }
}

impl From<Vec<Selector>> for SelectorChain {
    fn from(alternatives: Vec<Selector>) -> Self {
        Self(alternatives)
    }
}
