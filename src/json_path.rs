//! JSON path navigation and document rewriting.
//!
//! Payload transforms address nodes with a small JSON-path dialect: `$` for
//! the root, dot segments (`$.path.to.object`), bracket segments
//! (`$['path']['to']['object']`), bare keys (`object`), and numeric array
//! indices (`$.items[0]`) during selection. Only "definite" paths — paths
//! that can never match more than one node — are accepted by the
//! configuration builders; see [`is_path_definite`].
//!
//! The document is an owned [`serde_json::Value`] tree. Mutation resolves a
//! parent path plus leaf key instead of keeping parent back-pointers.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// One resolved step of a JSON path.
enum Segment {
    Key(String),
    Index(usize),
}

/// Parses a path into segments, or `None` if the path is malformed.
fn parse_segments(json_path: &str) -> Option<Vec<Segment>> {
    let mut rest = json_path.trim();
    if let Some(stripped) = rest.strip_prefix('$') {
        rest = stripped;
    }
    let mut segments = Vec::new();
    while !rest.is_empty() {
        if let Some(stripped) = rest.strip_prefix('.') {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix("['") {
            let end = stripped.find("']")?;
            segments.push(Segment::Key(stripped[..end].to_string()));
            rest = &stripped[end + 2..];
        } else if let Some(stripped) = rest.strip_prefix('[') {
            let end = stripped.find(']')?;
            let index = stripped[..end].trim().parse().ok()?;
            segments.push(Segment::Index(index));
            rest = &stripped[end + 1..];
        } else {
            let end = rest.find(['.', '[']).unwrap_or(rest.len());
            segments.push(Segment::Key(rest[..end].to_string()));
            rest = &rest[end..];
        }
    }
    Some(segments)
}

/// Gets the JSON path to the parent of the object at the given path.
///
/// Fails with [`Error::InvalidPath`] for the root path `$`, which has no
/// parent.
pub fn get_parent_json_path(json_path: &str) -> Result<String> {
    if json_path.is_empty() || json_path == "$" {
        return Err(Error::InvalidPath(format!(
            "unable to find parent for '{json_path}'"
        )));
    }
    if let Some(pos) = json_path.rfind("['") {
        if json_path.ends_with("']") {
            let parent = &json_path[..pos];
            return Ok(if parent.is_empty() {
                "$".to_string()
            } else {
                parent.to_string()
            });
        }
    }
    if let Some(pos) = json_path.rfind('.') {
        return Ok(json_path[..pos].to_string());
    }
    Ok("$".to_string())
}

/// Gets the object key at the given JSON path.
///
/// Fails with [`Error::InvalidPath`] for the root path `$`.
pub fn get_json_element_key(json_path: &str) -> Result<String> {
    if json_path.is_empty() || json_path == "$" {
        return Err(Error::InvalidPath(format!(
            "unable to find object key for '{json_path}'"
        )));
    }
    if let Some(pos) = json_path.rfind("['") {
        if json_path.ends_with("']") {
            return Ok(json_path[pos + 2..json_path.len() - 2].to_string());
        }
    }
    if let Some(pos) = json_path.rfind('.') {
        return Ok(json_path[pos + 1..].to_string());
    }
    Ok(json_path.to_string())
}

/// Checks if a JSON path points to a single item or if it potentially
/// matches multiple items (wildcards, recursive descent, filters, unions).
pub fn is_path_definite(json_path: &str) -> bool {
    !json_path.contains('*')
        && !json_path.contains("..")
        && !json_path.contains('@')
        && !json_path.contains(',')
}

/// Returns the node at the given path, or `None` when nothing is there.
///
/// Absence is a normal outcome ("nothing to encrypt/decrypt here"), not an
/// error.
pub fn select<'a>(doc: &'a Value, json_path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in parse_segments(json_path)? {
        current = match (segment, current) {
            (Segment::Key(key), Value::Object(map)) => map.get(&key)?,
            (Segment::Index(index), Value::Array(items)) => items.get(index)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Mutable variant of [`select`].
pub fn select_mut<'a>(doc: &'a mut Value, json_path: &str) -> Option<&'a mut Value> {
    let mut current = doc;
    for segment in parse_segments(json_path)? {
        current = match (segment, current) {
            (Segment::Key(key), Value::Object(map)) => map.get_mut(&key)?,
            (Segment::Index(index), Value::Array(items)) => items.get_mut(index)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Ensures an object exists at the given output path.
///
/// If a node already exists it must be an object ([`Error::TypeMismatch`]
/// otherwise). If it does not exist, the parent must exist
/// ([`Error::PathNotFound`] otherwise) and a fresh empty object is inserted
/// under it at the computed key.
pub fn check_or_create_out_object(doc: &mut Value, json_path_out: &str) -> Result<()> {
    if let Some(existing) = select(doc, json_path_out) {
        if !existing.is_object() {
            return Err(Error::TypeMismatch(json_path_out.to_string()));
        }
        return Ok(());
    }
    let parent_json_path = get_parent_json_path(json_path_out)?;
    let element_key = get_json_element_key(json_path_out)?;
    let Some(parent) = select_mut(doc, &parent_json_path) else {
        return Err(Error::PathNotFound(parent_json_path));
    };
    if let Value::Object(map) = parent {
        map.insert(element_key, Value::Object(Map::new()));
    }
    Ok(())
}

/// Removes the key from the object at the given node and returns its value.
///
/// Does nothing when the key is unset or the node is not an object.
pub fn read_and_delete_key(node: &mut Value, key: Option<&str>) -> Option<Value> {
    let key = key.filter(|k| !k.is_empty())?;
    match node {
        Value::Object(map) => map.remove(key),
        _ => None,
    }
}

/// Removes the node at the given path from its parent, whether the leaf
/// segment is an object key or an array index. A missing node is a no-op;
/// the root path fails with [`Error::InvalidPath`].
pub fn remove_node(doc: &mut Value, json_path: &str) -> Result<()> {
    let Some(mut segments) = parse_segments(json_path) else {
        return Ok(());
    };
    let Some(leaf) = segments.pop() else {
        return Err(Error::InvalidPath(format!(
            "unable to remove the root node '{json_path}'"
        )));
    };
    let mut parent = doc;
    for segment in segments {
        parent = match (segment, parent) {
            (Segment::Key(key), Value::Object(map)) => match map.get_mut(&key) {
                Some(child) => child,
                None => return Ok(()),
            },
            (Segment::Index(index), Value::Array(items)) => match items.get_mut(index) {
                Some(child) => child,
                None => return Ok(()),
            },
            _ => return Ok(()),
        };
    }
    match (leaf, parent) {
        (Segment::Key(key), Value::Object(map)) => {
            map.remove(&key);
        }
        (Segment::Index(index), Value::Array(items)) => {
            if index < items.len() {
                items.remove(index);
            }
        }
        _ => {}
    }
    Ok(())
}

/// Deletes the node at the given path if it is an object with no remaining
/// children.
pub fn remove_if_empty(doc: &mut Value, json_path: &str) -> Result<()> {
    if json_path == "$" {
        return Ok(());
    }
    if matches!(select(doc, json_path), Some(Value::Object(map)) if map.is_empty()) {
        remove_node(doc, json_path)?;
    }
    Ok(())
}

/// True for `null`, empty objects/arrays and empty strings.
pub fn is_null_or_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Renders a node as the cleartext to encrypt: strings are taken verbatim
/// (unquoted), everything else is compact JSON.
pub fn node_to_cleartext(node: &Value) -> String {
    match node {
        Value::String(s) => s.clone(),
        _ => node.to_string(),
    }
}

/// Coerces an owned value to a non-empty string, or `None` when there is
/// nothing usable in it.
pub fn value_to_non_empty_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Parses decrypted cleartext back into a JSON value.
///
/// Valid JSON objects and arrays are taken as-is; anything else goes through
/// the primitive coercion rules of [`add_decrypted_data`].
pub fn parse_cleartext(cleartext: &str) -> Value {
    match serde_json::from_str::<Value>(cleartext) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
        _ => as_primitive(cleartext),
    }
}

/// Writes decrypted cleartext at the given output path.
///
/// An object merges into the existing object (decrypted keys win on
/// collision, non-conflicting keys from both sides are preserved); an array
/// replaces the node wholesale; anything else replaces the node as a
/// primitive: case-insensitive boolean literal, else integer if fully
/// numeric, else string.
pub fn add_decrypted_data(doc: &mut Value, json_path_out: &str, cleartext: &str) -> Result<()> {
    match serde_json::from_str::<Value>(cleartext) {
        Ok(Value::Object(new_fields)) => {
            if let Some(Value::Object(existing)) = select_mut(doc, json_path_out) {
                for (key, value) in new_fields {
                    existing.insert(key, value);
                }
            }
            Ok(())
        }
        Ok(Value::Array(items)) => replace_node(doc, json_path_out, Value::Array(items)),
        _ => replace_node(doc, json_path_out, as_primitive(cleartext)),
    }
}

fn replace_node(doc: &mut Value, json_path: &str, value: Value) -> Result<()> {
    if json_path == "$" {
        *doc = value;
        return Ok(());
    }
    let Some(node) = select_mut(doc, json_path) else {
        return Err(Error::PathNotFound(json_path.to_string()));
    };
    *node = value;
    Ok(())
}

fn as_primitive(value: &str) -> Value {
    if value.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if value.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(number) = value.parse::<i64>() {
        return Value::Number(number.into());
    }
    Value::String(value.to_string())
}
