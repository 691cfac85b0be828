// crates/conff-eval/src/evaluator/merge.rs

use crate::types::{Mapping, Value};

/// Combine `overlay` onto `base`: mappings merge key-wise and recursively,
/// anything else (sequences included) is replaced by the overlay.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Map(mut base), Value::Map(overlay)) => {
            merge_into(&mut base, overlay);
            Value::Map(base)
        }
        (_, overlay) => overlay,
    }
}

/// In-place [`deep_merge`] of two mappings. Keys already in `target` keep
/// their position; new keys are appended.
pub fn merge_into(target: &mut Mapping, overlay: Mapping) {
    for (key, value) in overlay {
        match target.get_mut(&key) {
            Some(slot) => {
                let existing = std::mem::take(slot);
                *slot = deep_merge(existing, value);
            }
            None => {
                target.insert(key, value);
            }
        }
    }
}

/// Apply one `update` entry. `key` may be dotted (`a.b.c`); missing or
/// non-mapping intermediates become empty mappings.
pub fn apply_update(target: &mut Mapping, key: &str, value: Value) {
    let mut parts = key.split('.').peekable();
    let mut current = target;
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            match current.get_mut(part) {
                Some(slot) => {
                    let existing = std::mem::take(slot);
                    *slot = deep_merge(existing, value);
                }
                None => {
                    current.insert(part.to_string(), value);
                }
            }
            return;
        }
        let slot = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Map(Mapping::new()));
        if !matches!(slot, Value::Map(_)) {
            *slot = Value::Map(Mapping::new());
        }
        current = match slot {
            Value::Map(m) => m,
            _ => return,
        };
    }
}
