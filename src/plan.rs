//! Schema-driven diffing of prior and proposed resource state.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::hashcode::Fingerprint;
use crate::schema::{BlockNestingMode, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Compute the plan for a resource from its prior and proposed state.
///
/// `set_fingerprint` returns the element keys of a set-typed block so that
/// reordering a set is not reported as a change while a change to any field
/// of an element is. Returning `None` falls back to comparing the JSON values.
///
/// Computed-only attributes are carried over from the prior state and never
/// reported as changes. A change to a `force_new` attribute marks the plan as
/// requiring replacement.
pub fn plan_resource<F>(
    schema: &Schema,
    prior: Option<&Value>,
    proposed: Value,
    set_fingerprint: F,
) -> PlanResult
where
    F: Fn(&str, &Value) -> Option<Fingerprint>,
{
    let empty = Map::new();
    let prior_obj = prior.and_then(Value::as_object);

    if proposed.is_null() {
        let changes = prior_obj
            .unwrap_or(&empty)
            .iter()
            .filter(|(_, v)| !is_empty(v))
            .map(|(k, v)| AttributeChange::removed(k.clone(), v.clone()))
            .collect();
        return PlanResult::with_changes(Value::Null, changes, false);
    }

    let mut planned = match proposed {
        Value::Object(map) => map,
        other => return PlanResult::no_change(other),
    };

    let mut kinds: HashMap<&str, bool> = HashMap::new();
    for (name, attr) in &schema.block.attributes {
        if attr.flags.is_computed_only() {
            if let Some(value) = prior_obj.and_then(|p| p.get(name)) {
                planned.insert(name.clone(), value.clone());
            }
            continue;
        }
        kinds.insert(name.as_str(), false);
    }
    for (name, nested) in &schema.block.blocks {
        kinds.insert(name.as_str(), nested.nesting_mode == BlockNestingMode::Set);
    }

    let force_new = schema.force_new_attributes();
    let mut paths: Vec<&str> = kinds.keys().copied().collect();
    paths.sort_unstable();

    let mut changes = Vec::new();
    let mut requires_replace = false;

    for path in paths {
        let before = prior_obj.and_then(|p| p.get(path)).filter(|v| !is_empty(v));
        let after = planned.get(path).filter(|v| !is_empty(v));

        let change = match (before, after) {
            (None, None) => None,
            (None, Some(a)) => Some(AttributeChange::added(path, a.clone())),
            (Some(b), None) => Some(AttributeChange::removed(path, b.clone())),
            (Some(b), Some(a)) => {
                let same = match (kinds[path], set_fingerprint(path, b), set_fingerprint(path, a)) {
                    (true, Some(left), Some(right)) => left == right,
                    _ => b == a,
                };
                (!same).then(|| AttributeChange::modified(path, b.clone(), a.clone()))
            },
        };

        if let Some(change) = change {
            if prior_obj.is_some() && force_new.contains(&path) {
                requires_replace = true;
            }
            changes.push(change);
        }
    }

    PlanResult::with_changes(Value::Object(planned), changes, requires_replace)
}

/// Absent, null, empty string, empty list and empty map are all "unset".
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
