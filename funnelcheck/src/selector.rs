use std::fmt;

/// Represents ways to locate an element in the currently active document or
/// frame.
///
/// Selectors are opaque descriptors: the engine decides how each variant is
/// resolved against the live DOM. `Nth` is an ordinal pick among all matches
/// of the inner selector, 1-based to mirror XPath positional predicates like
/// `(//div[...])[2]` -- a deliberately preserved fragility of the funnel
/// under test, where repeated structures exist and only one copy per
/// rendering context is the intended target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Select by CSS expression
    Css(String),
    /// Select using an XPath query
    XPath(String),
    /// Select by element id
    Id(String),
    /// Select by the `name` attribute (form fields)
    Name(String),
    /// Select by exact visible text content
    Text(String),
    /// Select the n-th match (1-based) of the inner selector
    Nth { inner: Box<Selector>, index: usize },
    /// Represents an invalid selector string, with a reason.
    Invalid(String),
}

impl Selector {
    /// Wrap this selector in an ordinal pick. `index` is 1-based.
    pub fn nth(self, index: usize) -> Selector {
        Selector::Nth {
            inner: Box::new(self),
            index,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css(s) => write!(f, "css:{s}"),
            Selector::XPath(s) => write!(f, "xpath:{s}"),
            Selector::Id(s) => write!(f, "id:{s}"),
            Selector::Name(s) => write!(f, "name:{s}"),
            Selector::Text(s) => write!(f, "text:{s}"),
            Selector::Nth { inner, index } => write!(f, "({inner})[{index}]"),
            Selector::Invalid(reason) => write!(f, "invalid:{reason}"),
        }
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        match s {
            _ if s.starts_with("css:") => Selector::Css(s[4..].to_string()),
            _ if s.starts_with("xpath:") => Selector::XPath(s[6..].to_string()),
            _ if s.starts_with("id:") => Selector::Id(s[3..].to_string()),
            _ if s.starts_with("name:") => Selector::Name(s[5..].to_string()),
            _ if s.starts_with("text:") => Selector::Text(s[5..].to_string()),
            _ if s.starts_with('#') => Selector::Id(s[1..].to_string()),
            // XPath queries start with an axis or a parenthesized group
            _ if s.starts_with('/') || s.starts_with('(') => Selector::XPath(s.to_string()),
            _ if s.contains(':') => Selector::Invalid(format!(
                "Unknown selector format: \"{s}\". Use prefixes like 'css:', 'xpath:', 'id:', 'name:' or 'text:' to specify the selector type."
            )),
            // Bare strings are treated as exact text content
            _ => Selector::Text(s.to_string()),
        }
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::from(s.as_str())
    }
}
