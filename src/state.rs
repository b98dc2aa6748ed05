//! Per-item open/close state machine.
//!
//! Each item is `Closed`, `Opening`, `Open`, or `Closing`. Requests against
//! an animating item are dropped, never queued. Under single-open mode the
//! machine closes the currently-open sibling before starting an open, and at
//! any instant at most one item is in `{Opening, Open}`.
//!
//! Transition completion normally arrives from the host (a transition-end
//! notification); every animating item also carries a deadline so that
//! [`StateMachine::poll_deadlines`] reaches the terminal state even if that
//! notification never fires.

use crate::config::Mode;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Applied when the host never reports a transition end.
pub const TRANSITION_FALLBACK: Duration = Duration::from_millis(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    Closed,
    Opening,
    Open,
    Closing,
}

impl ItemState {
    pub fn is_animating(self) -> bool {
        matches!(self, ItemState::Opening | ItemState::Closing)
    }

    /// Open or on the way there. This is what `openIds` membership means:
    /// the open set is updated when a transition starts, not when it lands.
    pub fn is_open(self) -> bool {
        matches!(self, ItemState::Opening | ItemState::Open)
    }
}

/// Notification for listeners (the builder applies these to the document,
/// fragment sync watches for `OpenStarted`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    OpenStarted { id: String },
    CloseStarted { id: String },
    OpenSettled { id: String },
    CloseSettled { id: String },
}

impl StateChange {
    pub fn id(&self) -> &str {
        match self {
            StateChange::OpenStarted { id }
            | StateChange::CloseStarted { id }
            | StateChange::OpenSettled { id }
            | StateChange::CloseSettled { id } => id,
        }
    }
}

#[derive(Debug)]
struct Entry {
    id: String,
    state: ItemState,
    deadline: Option<Instant>,
}

/// The per-instance open/close coordinator. The open set is mutated only
/// through [`StateMachine::open`], [`StateMachine::close`], and
/// [`StateMachine::toggle`]; invalid ids are a documented no-op.
#[derive(Debug)]
pub struct StateMachine {
    mode: Mode,
    fallback: Duration,
    entries: Vec<Entry>,
}

impl StateMachine {
    /// Build the machine with the given items, in order. Ids named in
    /// `initially_open` start out settled `Open` with no animation; under
    /// single-open mode only the first of them is honored.
    pub fn new<I>(mode: Mode, ids: I, initially_open: &[String]) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut machine = Self {
            mode,
            fallback: TRANSITION_FALLBACK,
            entries: ids
                .into_iter()
                .map(|id| Entry {
                    id,
                    state: ItemState::Closed,
                    deadline: None,
                })
                .collect(),
        };
        for id in initially_open {
            if machine.mode == Mode::Single && machine.entries.iter().any(|e| e.state.is_open()) {
                tracing::debug!(id, "initial open ignored: single mode already has one");
                continue;
            }
            if let Some(entry) = machine.entries.iter_mut().find(|e| e.id == *id) {
                entry.state = ItemState::Open;
            }
        }
        machine
    }

    pub fn with_fallback(mut self, fallback: Duration) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self, id: &str) -> Option<ItemState> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.state)
    }

    /// Item ids and states, in item order.
    pub fn states(&self) -> impl Iterator<Item = (&str, ItemState)> {
        self.entries.iter().map(|e| (e.id.as_str(), e.state))
    }

    /// Ids currently in the open set (`Opening` or `Open`), in item order.
    pub fn open_ids(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.state.is_open())
            .map(|e| e.id.clone())
            .collect()
    }

    fn index(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    /// Begin opening an item. No-op for unknown ids, items already open, and
    /// items mid-animation. Under single-open mode the open sibling is
    /// transitioned through close first; if the sibling is itself still
    /// `Opening` the request is dropped, since closing an animating item is
    /// rejected and a second open would break exclusivity.
    pub fn open(&mut self, id: &str, now: Instant) -> Vec<StateChange> {
        let Some(idx) = self.index(id) else {
            tracing::debug!(id, "open: unknown id");
            return Vec::new();
        };
        if self.entries[idx].state != ItemState::Closed {
            tracing::debug!(id, state = ?self.entries[idx].state, "open: dropped");
            return Vec::new();
        }

        let mut changes = Vec::new();
        if self.mode == Mode::Single {
            if let Some(other) = self.entries.iter().position(|e| e.state.is_open()) {
                if self.entries[other].state != ItemState::Open {
                    tracing::debug!(id, "open: dropped, sibling still animating");
                    return Vec::new();
                }
                self.entries[other].state = ItemState::Closing;
                self.entries[other].deadline = Some(now + self.fallback);
                changes.push(StateChange::CloseStarted {
                    id: self.entries[other].id.clone(),
                });
            }
        }

        self.entries[idx].state = ItemState::Opening;
        self.entries[idx].deadline = Some(now + self.fallback);
        changes.push(StateChange::OpenStarted {
            id: self.entries[idx].id.clone(),
        });
        changes
    }

    /// Begin closing an item. No-op for unknown ids, items already closed,
    /// and items mid-animation.
    pub fn close(&mut self, id: &str, now: Instant) -> Vec<StateChange> {
        let Some(idx) = self.index(id) else {
            tracing::debug!(id, "close: unknown id");
            return Vec::new();
        };
        if self.entries[idx].state != ItemState::Open {
            tracing::debug!(id, state = ?self.entries[idx].state, "close: dropped");
            return Vec::new();
        }

        self.entries[idx].state = ItemState::Closing;
        self.entries[idx].deadline = Some(now + self.fallback);
        vec![StateChange::CloseStarted {
            id: self.entries[idx].id.clone(),
        }]
    }

    /// Close if settled open, open if settled closed, drop mid-animation.
    pub fn toggle(&mut self, id: &str, now: Instant) -> Vec<StateChange> {
        match self.state(id) {
            Some(ItemState::Open) => self.close(id, now),
            Some(ItemState::Closed) => self.open(id, now),
            _ => Vec::new(),
        }
    }

    /// Host-reported transition end for one item. Spurious or duplicate
    /// completions are ignored.
    pub fn transition_complete(&mut self, id: &str) -> Option<StateChange> {
        let idx = self.index(id)?;
        self.settle(idx)
    }

    /// Settle every animating item whose fallback deadline has passed.
    /// Guarantees terminal-state convergence when the host notification is
    /// dropped (e.g. zero-duration transitions).
    pub fn poll_deadlines(&mut self, now: Instant) -> Vec<StateChange> {
        let overdue: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.deadline.is_some_and(|d| d <= now))
            .map(|(idx, _)| idx)
            .collect();
        overdue
            .into_iter()
            .filter_map(|idx| self.settle(idx))
            .collect()
    }

    fn settle(&mut self, idx: usize) -> Option<StateChange> {
        let entry = &mut self.entries[idx];
        let change = match entry.state {
            ItemState::Opening => {
                entry.state = ItemState::Open;
                StateChange::OpenSettled {
                    id: entry.id.clone(),
                }
            }
            ItemState::Closing => {
                entry.state = ItemState::Closed;
                StateChange::CloseSettled {
                    id: entry.id.clone(),
                }
            }
            _ => return None,
        };
        entry.deadline = None;
        tracing::debug!(id = %entry.id, state = ?entry.state, "transition settled");
        Some(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn machine(mode: Mode, ids: &[&str]) -> StateMachine {
        StateMachine::new(mode, ids.iter().map(|s| s.to_string()), &[])
    }

    fn settle_all(m: &mut StateMachine, now: Instant) {
        m.poll_deadlines(now + TRANSITION_FALLBACK * 2);
    }

    #[test]
    fn test_open_close_cycle() {
        let now = Instant::now();
        let mut m = machine(Mode::Single, &["a", "b"]);

        let changes = m.open("a", now);
        assert_eq!(
            changes,
            vec![StateChange::OpenStarted {
                id: "a".to_string()
            }]
        );
        assert_eq!(m.state("a"), Some(ItemState::Opening));

        assert_eq!(
            m.transition_complete("a"),
            Some(StateChange::OpenSettled {
                id: "a".to_string()
            })
        );
        assert_eq!(m.state("a"), Some(ItemState::Open));

        m.close("a", now);
        assert_eq!(m.state("a"), Some(ItemState::Closing));
        m.transition_complete("a");
        assert_eq!(m.state("a"), Some(ItemState::Closed));
    }

    #[test]
    fn test_single_mode_closes_open_sibling() {
        let now = Instant::now();
        let mut m = machine(Mode::Single, &["a", "b"]);
        m.open("a", now);
        m.transition_complete("a");

        let changes = m.open("b", now);
        assert_eq!(
            changes,
            vec![
                StateChange::CloseStarted {
                    id: "a".to_string()
                },
                StateChange::OpenStarted {
                    id: "b".to_string()
                },
            ]
        );
        assert_eq!(m.state("a"), Some(ItemState::Closing));
        assert_eq!(m.state("b"), Some(ItemState::Opening));
    }

    #[test]
    fn test_single_mode_drops_open_while_sibling_opening() {
        let now = Instant::now();
        let mut m = machine(Mode::Single, &["a", "b"]);
        m.open("a", now);
        assert!(m.open("b", now).is_empty());
        assert_eq!(m.state("b"), Some(ItemState::Closed));
        assert_eq!(m.open_ids(), vec!["a"]);
    }

    #[test]
    fn test_multiple_mode_allows_concurrent_opens() {
        let now = Instant::now();
        let mut m = machine(Mode::Multiple, &["a", "b"]);
        m.open("a", now);
        m.open("b", now);
        assert_eq!(m.open_ids(), vec!["a", "b"]);
    }

    #[test]
    fn test_open_is_idempotent() {
        let now = Instant::now();
        let mut m = machine(Mode::Single, &["a"]);
        m.open("a", now);
        // Second call mid-animation is dropped.
        assert!(m.open("a", now).is_empty());
        m.transition_complete("a");
        // And again once settled open.
        assert!(m.open("a", now).is_empty());
        assert_eq!(m.state("a"), Some(ItemState::Open));
    }

    #[test]
    fn test_unknown_id_is_a_no_op() {
        let now = Instant::now();
        let mut m = machine(Mode::Single, &["a"]);
        assert!(m.open("zzz", now).is_empty());
        assert!(m.close("zzz", now).is_empty());
        assert!(m.toggle("zzz", now).is_empty());
        assert!(m.transition_complete("zzz").is_none());
    }

    #[test]
    fn test_toggle_dispatches_on_settled_state() {
        let now = Instant::now();
        let mut m = machine(Mode::Single, &["a"]);
        m.toggle("a", now);
        assert_eq!(m.state("a"), Some(ItemState::Opening));
        // Mid-animation toggle is dropped.
        assert!(m.toggle("a", now).is_empty());
        m.transition_complete("a");
        m.toggle("a", now);
        assert_eq!(m.state("a"), Some(ItemState::Closing));
    }

    #[test]
    fn test_deadline_fallback_settles_without_notification() {
        let now = Instant::now();
        let mut m = machine(Mode::Single, &["a"]);
        m.open("a", now);
        assert!(m.poll_deadlines(now).is_empty());

        let changes = m.poll_deadlines(now + TRANSITION_FALLBACK);
        assert_eq!(
            changes,
            vec![StateChange::OpenSettled {
                id: "a".to_string()
            }]
        );
        assert_eq!(m.state("a"), Some(ItemState::Open));
    }

    #[test]
    fn test_initially_open_truncated_under_single() {
        let m = StateMachine::new(
            Mode::Single,
            ["a", "b"].iter().map(|s| s.to_string()),
            &["a".to_string(), "b".to_string()],
        );
        assert_eq!(m.open_ids(), vec!["a"]);
    }

    proptest! {
        /// Under single mode, no interleaving of operations ever puts two
        /// items in the open set.
        #[test]
        fn prop_single_mode_exclusivity(ops in proptest::collection::vec((0u8..4, 0usize..4), 1..60)) {
            let base = Instant::now();
            let ids = ["a", "b", "c", "d"];
            let mut m = machine(Mode::Single, &ids);
            for (op, target) in ops {
                let id = ids[target];
                match op {
                    0 => { m.open(id, base); }
                    1 => { m.close(id, base); }
                    2 => { m.toggle(id, base); }
                    _ => { m.transition_complete(id); }
                }
                prop_assert!(m.open_ids().len() <= 1);
            }
            settle_all(&mut m, base);
            prop_assert!(m.open_ids().len() <= 1);
        }

        /// Every animating item eventually reaches a terminal state once the
        /// fallback deadline passes, regardless of the operation history.
        #[test]
        fn prop_deadlines_guarantee_terminal_states(ops in proptest::collection::vec((0u8..3, 0usize..3), 1..40)) {
            let base = Instant::now();
            let ids = ["a", "b", "c"];
            let mut m = machine(Mode::Multiple, &ids);
            for (op, target) in ops {
                let id = ids[target];
                match op {
                    0 => { m.open(id, base); }
                    1 => { m.close(id, base); }
                    _ => { m.toggle(id, base); }
                }
            }
            settle_all(&mut m, base);
            for (_, state) in m.states() {
                prop_assert!(!state.is_animating());
            }
        }
    }
}
