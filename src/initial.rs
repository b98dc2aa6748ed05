//! Initial-open resolution.
//!
//! Computes which item ids start open at build time from the configured
//! `initial-open` value, honoring the single/multiple-open constraint.

use crate::config::{InitialOpen, Mode};
use crate::item::Item;

/// Resolve the configured initial-open value against the item list.
///
/// Returns ids in item order. Under [`Mode::Single`] the result is truncated
/// to at most one id, keeping the first candidate by item order. Values that
/// name nothing (an out-of-range index, an unknown id) resolve to an empty
/// set rather than an error.
pub fn resolve(initial: &InitialOpen, items: &[Item], mode: Mode) -> Vec<String> {
    warn_on_shadowed_ids(initial, items);

    let mut ids: Vec<String> = match initial {
        InitialOpen::All if mode == Mode::Multiple => {
            items.iter().map(|item| item.id.clone()).collect()
        }
        // "all" without multiple-open degrades to the first item, as does
        // "first" itself.
        InitialOpen::All | InitialOpen::First => items
            .iter()
            .find(|item| item.order == 0)
            .map(|item| item.id.clone())
            .into_iter()
            .collect(),
        InitialOpen::Index(n) => n
            .checked_sub(1)
            .and_then(|index| items.get(index))
            .map(|item| item.id.clone())
            .into_iter()
            .collect(),
        InitialOpen::Id(id) => items
            .iter()
            .find(|item| item.id == *id)
            .map(|item| item.id.clone())
            .into_iter()
            .collect(),
        InitialOpen::None => Vec::new(),
    };

    if mode == Mode::Single {
        ids.truncate(1);
    }
    ids
}

/// The reserved words win over items that happen to carry the same literal
/// id; tell the user instead of resolving the ambiguity silently.
fn warn_on_shadowed_ids(initial: &InitialOpen, items: &[Item]) {
    let reserved = match initial {
        InitialOpen::First => "first",
        InitialOpen::All => "all",
        _ => return,
    };
    if items.iter().any(|item| item.id == reserved) {
        tracing::warn!(
            id = reserved,
            "initial-open resolves as the reserved word, shadowing the item with that literal id"
        );
    }
}
