//! Dot-delimited state paths.
//!
//! A path like `"ui.theme.accent"` addresses a value by sequential key
//! descent. Segments that parse as integers index into arrays.

use serde_json::{Map, Value};
use smallvec::SmallVec;

use crate::error::StoreError;

pub(crate) type Segments<'a> = SmallVec<[&'a str; 8]>;

/// Split and validate a path.
pub(crate) fn parse(path: &str) -> Result<Segments<'_>, StoreError> {
    if path.is_empty() {
        return Err(StoreError::InvalidPath {
            path: path.to_string(),
            reason: "path is empty",
        });
    }
    let segments: Segments<'_> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(StoreError::InvalidPath {
            path: path.to_string(),
            reason: "path contains an empty or parent-escape segment",
        });
    }
    Ok(segments)
}

/// Whether `path` lies strictly below `ancestor`.
pub(crate) fn is_descendant(path: &str, ancestor: &str) -> bool {
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'.'
}

/// Proper ancestors of `path`, nearest first: `a.b.c` yields `a.b`, `a`.
pub(crate) fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.char_indices()
        .rev()
        .filter(|(_, c)| *c == '.')
        .map(move |(i, _)| &path[..i])
}

pub(crate) fn lookup<'v>(root: &'v Value, segments: &[&str]) -> Option<&'v Value> {
    segments.iter().try_fold(root, |value, segment| match value {
        Value::Object(map) => map.get(*segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Store `value` at `segments`, creating empty objects for absent or
/// non-container intermediate levels.
pub(crate) fn assign(root: &mut Value, segments: &[&str], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut cursor = root;
    for segment in parents {
        cursor = descend_or_create(cursor, segment);
    }
    match cursor {
        Value::Array(items) => match last.parse::<usize>() {
            Ok(i) if i < items.len() => items[i] = value,
            Ok(i) if i == items.len() => items.push(value),
            _ => {
                let mut map = Map::new();
                map.insert((*last).to_string(), value);
                *cursor = Value::Object(map);
            }
        },
        Value::Object(map) => {
            map.insert((*last).to_string(), value);
        }
        other => {
            let mut map = Map::new();
            map.insert((*last).to_string(), value);
            *other = Value::Object(map);
        }
    }
}

fn descend_or_create<'v>(value: &'v mut Value, segment: &str) -> &'v mut Value {
    let index = segment.parse::<usize>().ok();
    let in_array = matches!((&*value, index), (Value::Array(items), Some(i)) if i < items.len());
    if in_array {
        if let (Value::Array(items), Some(i)) = (value, index) {
            return &mut items[i];
        }
        unreachable!("checked above");
    }
    if !matches!(value, Value::Object(_)) {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => {
            let slot = map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !matches!(slot, Value::Object(_) | Value::Array(_)) {
                *slot = Value::Object(Map::new());
            }
            slot
        }
        _ => unreachable!("replaced with an object above"),
    }
}

/// Remove the value at `segments`, returning it.
pub(crate) fn remove(root: &mut Value, segments: &[&str]) -> Option<Value> {
    let (last, parents) = segments.split_last()?;
    let mut cursor = root;
    for segment in parents {
        cursor = match cursor {
            Value::Object(map) => map.get_mut(*segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match cursor {
        Value::Object(map) => map.remove(*last),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_empty_segments() {
        assert!(parse("").is_err());
        assert!(parse("a..b").is_err());
        assert!(parse(".a").is_err());
        assert!(parse("a.").is_err());
        assert_eq!(parse("a.b").unwrap().as_slice(), &["a", "b"]);
    }

    #[test]
    fn descendant_requires_segment_boundary() {
        assert!(is_descendant("a.b", "a"));
        assert!(is_descendant("a.b.c", "a.b"));
        assert!(!is_descendant("ab", "a"));
        assert!(!is_descendant("a", "a"));
    }

    #[test]
    fn ancestors_nearest_first() {
        let found: Vec<_> = ancestors("a.b.c").collect();
        assert_eq!(found, vec!["a.b", "a"]);
        assert_eq!(ancestors("a").count(), 0);
    }

    #[test]
    fn assign_creates_missing_levels() {
        let mut root = json!({});
        assign(&mut root, &["ui", "theme"], json!("dark"));
        assert_eq!(root, json!({"ui": {"theme": "dark"}}));

        // A scalar in the way is replaced by an object.
        assign(&mut root, &["ui", "theme", "accent"], json!("red"));
        assert_eq!(root, json!({"ui": {"theme": {"accent": "red"}}}));
    }

    #[test]
    fn lookup_and_assign_through_arrays() {
        let mut root = json!({"todos": [{"done": false}]});
        assert_eq!(lookup(&root, &["todos", "0", "done"]), Some(&json!(false)));
        assign(&mut root, &["todos", "0", "done"], json!(true));
        assert_eq!(lookup(&root, &["todos", "0", "done"]), Some(&json!(true)));
        assert_eq!(lookup(&root, &["todos", "7", "done"]), None);
    }

    #[test]
    fn remove_returns_previous_value() {
        let mut root = json!({"a": {"b": 1, "c": 2}});
        assert_eq!(remove(&mut root, &["a", "b"]), Some(json!(1)));
        assert_eq!(root, json!({"a": {"c": 2}}));
        assert_eq!(remove(&mut root, &["x", "y"]), None);
    }
}
