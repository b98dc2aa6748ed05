//! Stable identifier assignment for accordion items.
//!
//! Titles are slugified and suffixed until unique. Uniqueness is checked
//! against an explicit [`IdRegistry`] owned by the page lifecycle, so ids
//! never collide across instances sharing a document.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref NON_SLUG: Regex = Regex::new("[^a-z0-9-]+").expect("static pattern");
}

/// Fallback base for titles with no usable characters.
const EMPTY_FALLBACK: &str = "item";

/// Page-wide set of assigned item ids.
#[derive(Debug, Default, Clone)]
pub struct IdRegistry {
    ids: HashSet<String>,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Record an id assigned elsewhere (e.g. markup that already carries one).
    pub fn reserve(&mut self, id: &str) -> bool {
        self.ids.insert(id.to_string())
    }

    /// Slugify a title into a unique id and record it.
    ///
    /// Lower-cases, collapses every run of characters outside `[a-z0-9-]`
    /// into a single `-`, trims leading/trailing `-`, then appends `-1`,
    /// `-2`, ... until the id is not already registered. An empty slug falls
    /// back to `"item"`.
    pub fn assign(&mut self, title: &str) -> String {
        let lowered = title.to_lowercase();
        let collapsed = NON_SLUG.replace_all(&lowered, "-");
        let base = collapsed.trim_matches('-');
        let base = if base.is_empty() { EMPTY_FALLBACK } else { base };

        let mut id = base.to_string();
        let mut counter = 1;
        while self.ids.contains(&id) {
            id = format!("{}-{}", base, counter);
            counter += 1;
        }
        self.ids.insert(id.clone());
        id
    }
}
