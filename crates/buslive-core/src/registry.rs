//! Fixed set of bus identifiers served by this process.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a single tracked bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(String);

impl BusId {
    /// View the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BusId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BusId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Closed registry of valid bus ids, fixed for the process lifetime.
///
/// Everything downstream (cache slots, subscription sets, refresh loops) is
/// keyed by this set; ids outside it are rejected before they reach any of
/// those components.
#[derive(Debug, Clone)]
pub struct BusRegistry {
    ids: Vec<BusId>,
}

impl BusRegistry {
    /// Build a registry from an explicit id list. Duplicates are dropped.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<BusId> = Vec::new();
        for id in ids {
            let id = BusId(id.into());
            if !out.contains(&id) {
                out.push(id);
            }
        }
        Self { ids: out }
    }

    /// The conventional `Bus1`..`BusN` fleet.
    #[must_use]
    pub fn numbered(count: usize) -> Self {
        Self::new((1..=count).map(|i| format!("Bus{i}")))
    }

    /// Validate a raw id, returning the registry's canonical `BusId` if known.
    #[must_use]
    pub fn resolve(&self, id: &str) -> Option<BusId> {
        self.ids.iter().find(|b| b.as_str() == id).cloned()
    }

    /// Whether the id is in the registry.
    #[must_use]
    pub fn contains(&self, id: &BusId) -> bool {
        self.ids.contains(id)
    }

    /// Iterate over all registered ids.
    pub fn iter(&self) -> impl Iterator<Item = &BusId> {
        self.ids.iter()
    }

    /// Number of registered buses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
