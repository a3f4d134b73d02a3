use anyhow::{Context, Result};
use serde_json::{Map, Value};

/// Get the string at `field`, None when the field is missing. Non-string values are rendered
/// through their JSON representation so they can still be shown in a FROM/TO line.
pub(crate) fn read_string_field(value: &Value, field: &str) -> Option<String> {
    match value.as_object()?.get(field)? {
        Value::String(string) => Some(string.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Get the mapping at `key`, inserting an empty one when the key is missing or null
pub(crate) fn ensure_object<'a>(parent: &'a mut Map<String, Value>, key: &str) -> Result<&'a mut Map<String, Value>> {
    let child = parent.entry(key.to_string()).or_insert_with(|| Value::Object(Map::new()));

    if child.is_null() {
        *child = Value::Object(Map::new());
    }

    child.as_object_mut().with_context(|| format!("{key} not an object"))
}

/// metadata.annotations, created on demand
pub(crate) fn annotations_mut(document: &mut Value) -> Result<&mut Map<String, Value>> {
    let root = document.as_object_mut().context("document root not an object")?;
    let metadata = ensure_object(root, "metadata")?;
    ensure_object(metadata, "annotations")
}

/// Set a string annotation, returning the previous value
pub(crate) fn set_annotation(document: &mut Value, key: &str, value: &str) -> Result<Option<Value>> {
    Ok(annotations_mut(document)?.insert(key.to_string(), Value::String(value.to_string())))
}

pub(crate) fn display_previous(previous: Option<&Value>) -> String {
    match previous {
        Some(Value::String(string)) => string.clone(),
        Some(Value::Null) | None => "None".to_string(),
        Some(other) => other.to_string(),
    }
}
