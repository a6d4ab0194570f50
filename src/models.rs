use serde::{Deserialize, Serialize};
use std::fmt;

/// Gmail's system label marking inbox membership. Removing it archives a message.
pub const INBOX_LABEL: &str = "INBOX";

/// A single raw message header as returned by the metadata fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Message id plus its headers, in the order Gmail returned them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub id: String,
    pub headers: Vec<Header>,
}

impl MessageMetadata {
    pub fn new(id: impl Into<String>, headers: Vec<Header>) -> Self {
        Self {
            id: id.into(),
            headers,
        }
    }

    /// Case-insensitive header lookup. Returns the first match, or "" if absent.
    pub fn header(&self, name: &str) -> &str {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
            .unwrap_or("")
    }
}

/// Classification bucket. Unrecognized names are carried in `Other` so a
/// collaborator can hand back categories this build does not know about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Newsletters,
    Promotions,
    Receipts,
    Social,
    Other(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::Newsletters => "Newsletters",
            Category::Promotions => "Promotions",
            Category::Receipts => "Receipts",
            Category::Social => "Social",
            Category::Other(name) => name,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Category {
    fn from(name: &str) -> Self {
        match name {
            "Newsletters" => Category::Newsletters,
            "Promotions" => Category::Promotions,
            "Receipts" => Category::Receipts,
            "Social" => Category::Social,
            other => Category::Other(other.to_string()),
        }
    }
}

impl From<String> for Category {
    fn from(name: String) -> Self {
        Category::from(name.as_str())
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    pub reason: String,
}

/// What to do with a classified message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub label_name: String,
    pub archive: bool,
    /// Reserved. Always false in the current policy.
    pub trash: bool,
}

/// Whether mutating calls are issued or only simulated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Preview,
    Apply,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Preview => f.write_str("preview"),
            RunMode::Apply => f.write_str("apply"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedAction {
    pub label: String,
    pub archive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResult {
    pub message_id: String,
    pub category: Category,
    pub reason: String,
    pub summary: String,
    pub action: PlannedAction,
}

/// Aggregate counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub found: usize,
    pub classified: usize,
    pub skipped: usize,
    pub applied: usize,
}

/// Outcome of a single pipeline pass. `results` is in input id order and
/// holds one entry per classified message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub found: usize,
    pub classified: usize,
    pub skipped: usize,
    pub applied: usize,
    pub results: Vec<MessageResult>,
}

impl RunResult {
    pub fn stats(&self) -> RunStats {
        RunStats {
            found: self.found,
            classified: self.classified,
            skipped: self.skipped,
            applied: self.applied,
        }
    }

    /// Number of recorded results whose plan archives the message
    pub fn archived_count(&self) -> usize {
        self.results.iter().filter(|r| r.action.archive).count()
    }
}
