//! URL-fragment synchronization.
//!
//! Keeps the page fragment and the open item consistent in both directions.
//! A user-originated open writes the fragment (when it differs) after
//! setting a suppress-next flag; the echoed navigation event consumes the
//! flag exactly once and does nothing else, so a self-caused change never
//! feeds back into a second write.

/// The engine's view of the browsing context: fragment read/write plus
/// scroll requests.
///
/// `scroll_into_view` is requested right after a fragment-driven open is
/// initiated; implementations should defer the actual scroll until the open
/// transition has begun.
pub trait Navigator {
    fn fragment(&self) -> Option<String>;
    fn set_fragment(&mut self, fragment: &str);
    fn scroll_into_view(&mut self, id: &str);
}

/// In-memory navigator used by tests and the preview surfaces.
#[derive(Debug, Default)]
pub struct MemoryNavigator {
    fragment: Option<String>,
    /// Every programmatic fragment write, in order.
    pub writes: Vec<String>,
    /// Every scroll request, in order.
    pub scrolls: Vec<String>,
}

impl MemoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the user editing the address bar (no write recorded).
    pub fn navigate_to(&mut self, fragment: &str) {
        self.fragment = Some(fragment.to_string());
    }
}

impl Navigator for MemoryNavigator {
    fn fragment(&self) -> Option<String> {
        self.fragment.clone()
    }

    fn set_fragment(&mut self, fragment: &str) {
        self.fragment = Some(fragment.to_string());
        self.writes.push(fragment.to_string());
    }

    fn scroll_into_view(&mut self, id: &str) {
        self.scrolls.push(id.to_string());
    }
}

/// Bidirectional fragment-sync state for one instance.
#[derive(Debug)]
pub struct HashSync {
    enabled: bool,
    suppress_next: bool,
}

impl HashSync {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            suppress_next: false,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Instance-to-URL direction: an item was opened by direct user
    /// interaction. Writes the fragment only when it differs from the
    /// current one, marking the write so the echoed navigation event is
    /// ignored.
    pub fn reflect_user_open(&mut self, nav: &mut dyn Navigator, id: &str) {
        if !self.enabled {
            return;
        }
        if nav.fragment().as_deref() == Some(id) {
            return;
        }
        self.suppress_next = true;
        nav.set_fragment(id);
    }

    /// URL-to-instance direction: a navigation event fired. Returns the item
    /// id to open, or `None` when the change was self-caused (flag consumed)
    /// or the fragment doesn't name an item of this instance.
    pub fn resolve_navigation<F>(&mut self, fragment: Option<&str>, mut is_known: F) -> Option<String>
    where
        F: FnMut(&str) -> bool,
    {
        if self.suppress_next {
            self.suppress_next = false;
            return None;
        }
        let fragment = fragment?;
        if fragment.is_empty() || !is_known(fragment) {
            return None;
        }
        Some(fragment.to_string())
    }
}
