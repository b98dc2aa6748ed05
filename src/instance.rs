//! Instance lifecycle: mount, trigger paths, events, teardown.
//!
//! `mount` detects the input mode, resolves layered configuration,
//! normalizes items, builds the tree, and returns the live [`Accordion`].
//! All three runtime triggers go through it: user input via
//! [`Accordion::user_toggle`], navigation via
//! [`Accordion::handle_navigation`], and the initial render via the
//! initial-open set. Open/close/toggle never error; invalid ids are a
//! documented no-op.

use crate::build::{self, BuiltAccordion};
use crate::config::{Config, ConfigOverlay};
use crate::dom::{Document, NodeId};
use crate::hash::{HashSync, Navigator};
use crate::initial;
use crate::item::Item;
use crate::slug::IdRegistry;
use crate::source::{self, CollectionSource};
use crate::state::{ItemState, StateChange, StateMachine};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::mpsc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Marks an element an accordion root (used for recursion detection).
pub const ROOT_ATTR: &str = "data-accordion";
/// External collection reference.
pub const SOURCE_ATTR: &str = "data-source";
/// Build-state marker; present from mount until teardown.
pub const LOADING_STATE_ATTR: &str = "data-loading-state";

/// Construction failures surfaced to the host. Everything else (fetch
/// errors, nothing to do) resolves to an unbuilt instance instead.
#[derive(Debug)]
pub enum MountError {
    /// The element already carries a build-state marker.
    AlreadyMounted { state: String },
    /// The element is nested inside another instance with the same source.
    RecursiveSource { source: String },
}

impl std::fmt::Display for MountError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MountError::AlreadyMounted { state } => {
                write!(f, "element is already mounted (build state: {})", state)
            }
            MountError::RecursiveSource { source } => {
                write!(
                    f,
                    "refusing recursive accordion: element is nested inside an instance with the same source '{}'",
                    source
                )
            }
        }
    }
}

impl std::error::Error for MountError {}

/// Runtime events for host integration, fired once after the first
/// successful render.
#[derive(Debug, Clone)]
pub enum InstanceEvent {
    BuildComplete {
        instance: Uuid,
        items: usize,
        at: DateTime<Utc>,
    },
    Ready {
        instance: Uuid,
        at: DateTime<Utc>,
    },
}

/// Host mode-change stream. The host registers a one-time callback that
/// runs when it enters edit mode; the callback is expected to call
/// [`Accordion::teardown`].
pub trait HostModeObserver {
    fn on_host_mode_change(&mut self, callback: Box<dyn FnOnce() + Send>);
}

/// Optional mount knobs.
#[derive(Default)]
pub struct MountOptions {
    /// Page-level overrides (below instance attributes, above defaults).
    pub global_config: Option<ConfigOverlay>,
    /// Where to deliver runtime events.
    pub events: Option<mpsc::Sender<InstanceEvent>>,
    /// Override for the transition fallback deadline.
    pub transition_fallback: Option<Duration>,
}

/// One accordion widget: items, open state, fragment sync.
#[derive(Debug)]
pub struct Accordion {
    id: Uuid,
    el: NodeId,
    config: Config,
    items: Vec<Item>,
    machine: StateMachine,
    hash: HashSync,
    built: BuiltAccordion,
    events: Option<mpsc::Sender<InstanceEvent>>,
    torn_down: bool,
}

/// Construct an instance on `el`.
///
/// Returns `Ok(None)` when there is nothing to do: no source reference and
/// no trigger elements, or a source fetch that failed (logged, never
/// propagated). Duplicate construction and recursive nesting are refused
/// with a diagnostic.
pub async fn mount(
    doc: &mut Document,
    el: NodeId,
    registry: &mut IdRegistry,
    fetcher: &dyn CollectionSource,
    options: MountOptions,
) -> Result<Option<Accordion>, MountError> {
    if let Some(state) = doc.attr(el, LOADING_STATE_ATTR) {
        let state = state.to_string();
        tracing::warn!(state = %state, "mount short-circuited: element already mid-build");
        return Err(MountError::AlreadyMounted { state });
    }
    doc.set_attr(el, LOADING_STATE_ATTR, "loading");
    if doc.attr(el, ROOT_ATTR).is_none() {
        doc.set_attr(el, ROOT_ATTR, "");
    }

    let source_ref = doc.attr(el, SOURCE_ATTR).map(str::to_string);
    if let Some(src) = &source_ref {
        if let Some(ancestor) = enclosing_instance_with_source(doc, el, src) {
            tracing::error!(source = %src, ?ancestor, "recursive accordion detected");
            return Err(MountError::RecursiveSource {
                source: src.clone(),
            });
        }
    }

    let instance_overlay = overlay_from_element(doc, el);
    let config = Config::layered(options.global_config.as_ref(), &instance_overlay);

    let items = if let Some(src) = &source_ref {
        match fetcher.fetch(src).await {
            Ok(collection) => {
                source::items_from_collection(collection, config.limit.as_option(), registry)
            }
            Err(e) => {
                tracing::error!(source = %src, error = %e, "collection fetch failed, leaving instance unbuilt");
                doc.remove_attr(el, LOADING_STATE_ATTR);
                return Ok(None);
            }
        }
    } else {
        source::items_from_triggers(doc, el, registry)
    };

    if items.is_empty() && source_ref.is_none() {
        // Neither mode applies: nothing to do.
        doc.remove_attr(el, LOADING_STATE_ATTR);
        return Ok(None);
    }

    doc.set_attr(el, LOADING_STATE_ATTR, "building");

    let initially_open = initial::resolve(&config.initial_open, &items, config.mode);
    let mut machine = StateMachine::new(
        config.mode,
        items.iter().map(|item| item.id.clone()),
        &initially_open,
    );
    if let Some(fallback) = options.transition_fallback {
        machine = machine.with_fallback(fallback);
    }
    let built = build::build(doc, el, &items, &config, &initially_open);

    doc.set_attr(el, LOADING_STATE_ATTR, "loaded");

    let accordion = Accordion {
        id: Uuid::new_v4(),
        el,
        hash: HashSync::new(config.url_sync),
        config,
        items,
        machine,
        built,
        events: options.events,
        torn_down: false,
    };
    accordion.emit(InstanceEvent::BuildComplete {
        instance: accordion.id,
        items: accordion.items.len(),
        at: Utc::now(),
    });

    doc.set_attr(el, LOADING_STATE_ATTR, "complete");
    accordion.emit(InstanceEvent::Ready {
        instance: accordion.id,
        at: Utc::now(),
    });
    tracing::debug!(instance = %accordion.id, items = accordion.items.len(), "instance ready");

    Ok(Some(accordion))
}

/// Convenience for hosts: build a collection-mode instance from a JSON file,
/// with extra declarative attributes applied to the instance element.
pub fn mount_collection_file(
    path: &std::path::Path,
    attrs: &[(String, String)],
    options: MountOptions,
) -> anyhow::Result<(Document, Accordion)> {
    use anyhow::Context as _;

    let mut doc = Document::new("body");
    let el = doc.create_element("div");
    doc.set_attr(el, SOURCE_ATTR, &path.to_string_lossy());
    for (name, value) in attrs {
        doc.set_attr(el, name, value);
    }
    doc.append_child(doc.root(), el);

    let mut registry = IdRegistry::new();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let accordion = runtime
        .block_on(mount(
            &mut doc,
            el,
            &mut registry,
            &crate::source::FsCollectionSource,
            options,
        ))?
        .with_context(|| format!("nothing to build from {}", path.display()))?;
    Ok((doc, accordion))
}

fn enclosing_instance_with_source(doc: &Document, el: NodeId, source: &str) -> Option<NodeId> {
    let mut current = doc.parent(el);
    while let Some(node) = current {
        if doc.attr(node, ROOT_ATTR).is_some() && doc.attr(node, SOURCE_ATTR) == Some(source) {
            return Some(node);
        }
        current = doc.parent(node);
    }
    None
}

/// Collect `data-*` attributes into a config overlay, skipping the
/// attributes the engine itself owns.
fn overlay_from_element(doc: &Document, el: NodeId) -> ConfigOverlay {
    let mut attrs = BTreeMap::new();
    for (name, value) in doc.attrs(el) {
        let Some(key) = name.strip_prefix("data-") else {
            continue;
        };
        if matches!(key, "source" | "loading-state" | "accordion" | "custom-icon") {
            continue;
        }
        attrs.insert(key.to_string(), value.to_string());
    }
    ConfigOverlay::from_attrs(&attrs)
}

impl Accordion {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn element(&self) -> NodeId {
        self.el
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn has_item(&self, id: &str) -> bool {
        self.machine.state(id).is_some()
    }

    pub fn state(&self, id: &str) -> Option<ItemState> {
        self.machine.state(id)
    }

    /// Item ids and states, in item order.
    pub fn states(&self) -> Vec<(String, ItemState)> {
        self.machine
            .states()
            .map(|(id, state)| (id.to_string(), state))
            .collect()
    }

    pub fn open_ids(&self) -> Vec<String> {
        self.machine.open_ids()
    }

    /// Programmatic open; does not touch the URL.
    pub fn open(&mut self, doc: &mut Document, id: &str, now: Instant) -> Vec<StateChange> {
        let changes = self.machine.open(id, now);
        self.apply(doc, &changes);
        changes
    }

    /// Programmatic close; does not touch the URL.
    pub fn close(&mut self, doc: &mut Document, id: &str, now: Instant) -> Vec<StateChange> {
        let changes = self.machine.close(id, now);
        self.apply(doc, &changes);
        changes
    }

    /// The user-interaction trigger path. When the interaction results in an
    /// open and URL sync is configured, the fragment is updated (suppressing
    /// the echoed navigation event).
    pub fn user_toggle(
        &mut self,
        doc: &mut Document,
        nav: &mut dyn Navigator,
        id: &str,
        now: Instant,
    ) -> Vec<StateChange> {
        let changes = self.machine.toggle(id, now);
        self.apply(doc, &changes);
        let opened = changes
            .iter()
            .any(|c| matches!(c, StateChange::OpenStarted { id: opened } if opened == id));
        if opened {
            self.hash.reflect_user_open(nav, id);
        }
        changes
    }

    /// The navigation trigger path: call on initial load and on every
    /// fragment change. Opens the matching item (closing siblings under
    /// single mode) and requests a scroll; fragments owned by other page
    /// components are ignored.
    pub fn handle_navigation(
        &mut self,
        doc: &mut Document,
        nav: &mut dyn Navigator,
        now: Instant,
    ) -> Vec<StateChange> {
        let fragment = nav.fragment();
        let Self { hash, machine, .. } = self;
        let target =
            hash.resolve_navigation(fragment.as_deref(), |id| machine.state(id).is_some());
        let Some(id) = target else {
            return Vec::new();
        };

        let changes = self.machine.open(&id, now);
        self.apply(doc, &changes);
        nav.scroll_into_view(&id);
        changes
    }

    /// Host-reported transition end for one item.
    pub fn transition_complete(&mut self, doc: &mut Document, id: &str) -> Option<StateChange> {
        let change = self.machine.transition_complete(id)?;
        build::apply_change(doc, &self.built, &change);
        Some(change)
    }

    /// Settle overdue transitions; surfaces call this from their tick loop.
    pub fn tick(&mut self, doc: &mut Document, now: Instant) -> Vec<StateChange> {
        let changes = self.machine.poll_deadlines(now);
        self.apply(doc, &changes);
        changes
    }

    /// Every relocated content node currently held by the instance.
    pub fn held_nodes(&self) -> Vec<NodeId> {
        self.built.relocated.iter().map(|r| r.node).collect()
    }

    /// Hand relocated content back to its original context and clear the
    /// build marker. Idempotent; meant to be driven by the host's
    /// mode-change stream (see [`HostModeObserver`]).
    pub fn teardown(&mut self, doc: &mut Document) {
        if self.torn_down {
            return;
        }
        for relocated in &self.built.relocated {
            doc.detach(relocated.node);
            if let Some(parent) = relocated.original_parent {
                doc.append_child(parent, relocated.node);
            }
        }
        doc.remove_attr(self.el, LOADING_STATE_ATTR);
        self.torn_down = true;
        tracing::debug!(instance = %self.id, "instance torn down");
    }

    /// Render the instance subtree as HTML.
    pub fn render(&self, doc: &Document) -> String {
        doc.render(self.el)
    }

    fn apply(&self, doc: &mut Document, changes: &[StateChange]) {
        for change in changes {
            build::apply_change(doc, &self.built, change);
        }
    }

    fn emit(&self, event: InstanceEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}
