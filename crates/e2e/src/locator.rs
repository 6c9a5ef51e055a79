//! Element locators, expectations and response matchers
//!
//! These are descriptions handed to the browser engine; nothing here
//! queries a DOM. The serialized form is the wire format of the Playwright
//! bridge.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the base element of a locator is found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum By {
    /// ARIA role plus accessible name
    Role {
        role: String,
        name: String,
        #[serde(default)]
        exact: bool,
    },
    /// Form control by its label text
    Label { text: String },
    /// Element by its text content
    Text {
        text: String,
        #[serde(default)]
        exact: bool,
    },
    /// Element by its `data-testid` attribute
    TestId { id: String },
}

/// A chainable element query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub by: By,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<Locator>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nth: Option<usize>,
}

impl Locator {
    pub fn new(by: By) -> Self {
        Self {
            by,
            has_text: None,
            parent: None,
            nth: None,
        }
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(By::Role {
            role: role.into(),
            name: name.into(),
            exact: false,
        })
    }

    pub fn button(name: impl Into<String>) -> Self {
        Self::role("button", name)
    }

    pub fn label(text: impl Into<String>) -> Self {
        Self::new(By::Label { text: text.into() })
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(By::Text {
            text: text.into(),
            exact: false,
        })
    }

    pub fn exact_text(text: impl Into<String>) -> Self {
        Self::new(By::Text {
            text: text.into(),
            exact: true,
        })
    }

    pub fn test_id(id: impl Into<String>) -> Self {
        Self::new(By::TestId { id: id.into() })
    }

    /// Keep only matches whose text contains `text`
    pub fn filter_text(mut self, text: impl Into<String>) -> Self {
        self.has_text = Some(text.into());
        self
    }

    /// Search inside the elements matched by `parent`
    pub fn within(mut self, parent: Locator) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    pub fn nth(mut self, index: usize) -> Self {
        self.nth = Some(index);
        self
    }

    pub fn first(self) -> Self {
        self.nth(0)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = &self.parent {
            write!(f, "{} >> ", parent)?;
        }
        match &self.by {
            By::Role { role, name, .. } => write!(f, "{}[name=\"{}\"]", role, name)?,
            By::Label { text } => write!(f, "label=\"{}\"", text)?,
            By::Text { text, .. } => write!(f, "text=\"{}\"", text)?,
            By::TestId { id } => write!(f, "testid={}", id)?,
        }
        if let Some(text) = &self.has_text {
            write!(f, " has-text=\"{}\"", text)?;
        }
        if let Some(n) = self.nth {
            write!(f, " nth={}", n)?;
        }
        Ok(())
    }
}

/// A condition delegated to the engine's auto-retrying `expect`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Expectation {
    Visible,
    Hidden,
    Text(String),
    ContainsText(String),
    /// Text matching a regular expression
    MatchesText(String),
    Count(usize),
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Visible => f.write_str("to be visible"),
            Expectation::Hidden => f.write_str("to be hidden"),
            Expectation::Text(t) => write!(f, "to have text \"{}\"", t),
            Expectation::ContainsText(t) => write!(f, "to contain text \"{}\"", t),
            Expectation::MatchesText(re) => write!(f, "to match /{}/", re),
            Expectation::Count(n) => write!(f, "to have count {}", n),
        }
    }
}

/// Element state awaited by `Page::wait_for`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitState {
    Visible,
    Hidden,
}

impl fmt::Display for WaitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitState::Visible => f.write_str("visible"),
            WaitState::Hidden => f.write_str("hidden"),
        }
    }
}

/// Predicate selecting the network response an action triggers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMatcher {
    pub url_contains: String,
    pub method: String,
}

impl ResponseMatcher {
    pub fn new(url_contains: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            url_contains: url_contains.into(),
            method: method.into().to_ascii_uppercase(),
        }
    }

    pub fn post(url_contains: impl Into<String>) -> Self {
        Self::new(url_contains, "POST")
    }

    pub fn matches(&self, url: &str, method: &str) -> bool {
        url.contains(&self.url_contains) && method.eq_ignore_ascii_case(&self.method)
    }
}

impl fmt::Display for ResponseMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} *{}*", self.method, self.url_contains)
    }
}

/// Native dialog types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogKind {
    Alert,
    Confirm,
    Prompt,
    #[serde(rename = "beforeunload")]
    BeforeUnload,
}

/// What the page does when a native dialog opens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DialogPolicy {
    /// No handler; an opening dialog is reported as unhandled
    #[default]
    Unset,
    Accept {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expect: Option<DialogKind>,
    },
    Dismiss,
}
