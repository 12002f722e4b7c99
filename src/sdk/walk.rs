//! Reference Resolver
//!
//! A depth-first walker over JSON trees that lets a visitor replace any
//! child node, plus the visitor that inlines saved-group memberships.

use std::collections::HashSet;

use serde_json::{Map, Value};

use super::definitions::IdLists;

/// Replacement returned by a visitor: the new key and the new value.
pub type Replacement = (String, Value);

/// Condition operator meaning "attribute is a member of the saved group".
pub const IN_GROUP: &str = "$ingroup";
/// Condition operator meaning "attribute is not a member of the saved group".
pub const NOT_IN_GROUP: &str = "$ningroup";

// == Walk ==
/// Walks `node` depth-first, offering every child of every object or array
/// to `visit` as `(key, value)`.
///
/// When `visit` returns a replacement for an object member, the member is
/// removed and the replacement inserted under its new key. For array
/// elements the key is the decimal index and the replacement takes the
/// element's position; the returned key is ignored. The walk then descends
/// into whichever value now occupies the slot. Members inserted by a
/// replacement are never offered to `visit` themselves.
pub fn walk<F>(node: &mut Value, visit: &mut F)
where
    F: FnMut(&str, &Value) -> Option<Replacement>,
{
    match node {
        Value::Object(map) => walk_object(map, visit),
        Value::Array(items) => walk_array(items, visit),
        _ => {}
    }
}

/// Same as [`walk`], for an object that is not wrapped in a [`Value`].
pub fn walk_object<F>(map: &mut Map<String, Value>, visit: &mut F)
where
    F: FnMut(&str, &Value) -> Option<Replacement>,
{
    let keys: Vec<String> = map.keys().cloned().collect();
    let mut inserted: HashSet<String> = HashSet::new();

    for key in keys {
        if inserted.contains(&key) {
            continue;
        }
        let Some(child) = map.get(&key) else {
            continue;
        };

        let slot = match visit(&key, child) {
            Some((new_key, new_value)) => {
                map.remove(&key);
                map.insert(new_key.clone(), new_value);
                inserted.insert(new_key.clone());
                new_key
            }
            None => key,
        };

        if let Some(child) = map.get_mut(&slot) {
            walk(child, visit);
        }
    }
}

fn walk_array<F>(items: &mut [Value], visit: &mut F)
where
    F: FnMut(&str, &Value) -> Option<Replacement>,
{
    for (index, item) in items.iter_mut().enumerate() {
        if let Some((_, replacement)) = visit(&index.to_string(), item) {
            *item = replacement;
        }
        walk(item, visit);
    }
}

// == Saved Group Resolution ==
/// Returns a visitor that rewrites `{"$ingroup": id}` to `{"$in": [members]}`
/// and `{"$ningroup": id}` to `{"$nin": [members]}`.
///
/// Unknown group ids, and ids that are not strings, resolve to an empty list.
pub fn saved_group_resolver(
    id_lists: &IdLists,
) -> impl FnMut(&str, &Value) -> Option<Replacement> + '_ {
    move |key: &str, value: &Value| {
        let operator = match key {
            IN_GROUP => "$in",
            NOT_IN_GROUP => "$nin",
            _ => return None,
        };
        let members: Vec<Value> = value
            .as_str()
            .and_then(|group_id| id_lists.get(group_id))
            .map(|ids| ids.iter().cloned().map(Value::String).collect())
            .unwrap_or_default();
        Some((operator.to_string(), Value::Array(members)))
    }
}

/// Inlines saved-group memberships anywhere inside `node`.
pub fn resolve_saved_groups(node: &mut Value, id_lists: &IdLists) {
    walk(node, &mut saved_group_resolver(id_lists));
}

/// Inlines saved-group memberships anywhere inside `map`.
pub fn resolve_saved_groups_in(map: &mut Map<String, Value>, id_lists: &IdLists) {
    walk_object(map, &mut saved_group_resolver(id_lists));
}
