//! Sibling-list ordering policy.
//!
//! One configuration value selects how task sibling lists are ordered.
//! Projects and sections always order by their manual `order` value; the
//! policy only governs tasks. All sorts are stable: equal keys keep their
//! input order.

use crate::entities::Task;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortBy {
    /// Ascending manual order (the default).
    #[default]
    Order,
    /// Descending priority, more urgent first.
    Priority,
    /// Ascending case-sensitive compare on task content.
    Alphabetical,
}

impl SortBy {
    /// Parse a configuration string. Unknown or unset values fall back to
    /// manual order.
    pub fn parse(value: &str) -> Self {
        match value {
            "Priority" => SortBy::Priority,
            "Alphabetical" => SortBy::Alphabetical,
            _ => SortBy::Order,
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortBy::Order => "Order",
            SortBy::Priority => "Priority",
            SortBy::Alphabetical => "Alphabetical",
        };
        f.write_str(name)
    }
}

/// Orders a task sibling list in place according to `policy`.
pub fn sort_tasks(tasks: &mut [&Task], policy: SortBy) {
    match policy {
        SortBy::Order => tasks.sort_by_key(|t| t.order),
        SortBy::Priority => tasks.sort_by(|a, b| b.priority.cmp(&a.priority)),
        SortBy::Alphabetical => tasks.sort_by(|a, b| a.content.cmp(&b.content)),
    }
}

/// Shared handle to the user's sort preference.
///
/// Read once per sibling-list construction, so a policy change takes effect
/// on the next rebuild without any comparator caching.
#[derive(Clone, Default)]
pub struct SortSetting(Arc<RwLock<SortBy>>);

impl SortSetting {
    pub fn new(policy: SortBy) -> Self {
        Self(Arc::new(RwLock::new(policy)))
    }

    pub fn get(&self) -> SortBy {
        *self.0.read().unwrap()
    }

    pub fn set(&self, policy: SortBy) {
        *self.0.write().unwrap() = policy;
    }
}
