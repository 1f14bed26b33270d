use crate::models::{ActionLogEntry, Item};
use std::collections::HashMap;

/// Derives the checked state of every item from one user's log for one day.
///
/// Items without entries are unchecked. Otherwise the entry with the latest
/// `created_at` wins, and equal timestamps fall back to the store sequence.
pub fn reconstruct(items: &[Item], entries: &[ActionLogEntry]) -> HashMap<String, bool> {
    let mut latest: HashMap<&str, &ActionLogEntry> = HashMap::new();
    for entry in entries {
        latest
            .entry(entry.item_id.as_str())
            .and_modify(|current| {
                if (entry.created_at, entry.seq) > (current.created_at, current.seq) {
                    *current = entry;
                }
            })
            .or_insert(entry);
    }

    items
        .iter()
        .map(|item| {
            let checked = latest.get(item.id.as_str()).map(|entry| entry.value).unwrap_or(false);
            (item.id.clone(), checked)
        })
        .collect()
}

/// True when the card has items and every one of them is checked.
pub fn all_checked(items: &[Item], state: &HashMap<String, bool>) -> bool {
    !items.is_empty()
        && items
            .iter()
            .all(|item| state.get(&item.id).copied().unwrap_or(false))
}
