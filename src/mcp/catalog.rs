//! Maps `tools/list` results to [`ToolDescriptor`]s.
//!
//! Servers disagree on casing: the protocol documents `name`, `description`,
//! `scope` and `inputSchema`, but some emit `Name`, `Description` or
//! `Namespace`. Both are accepted and the documented lowercase form wins when
//! both are present.

use serde_json::{Map, Value};
use std::collections::HashSet;
use uuid::Uuid;

use super::error::McpError;
use super::types::{ServerId, ToolDescriptor, GLOBAL_SCOPE};

/// Namespace for descriptor ids, so the same `(server, name)` always maps to
/// the same id across discoveries.
const TOOL_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6d63_7067_6174_4e5f_a1c0_7f2b_9e41_d35c);

const NAME_KEYS: &[&str] = &["name", "Name"];
const DESCRIPTION_KEYS: &[&str] = &["description", "Description"];
const SCOPE_KEYS: &[&str] = &["scope", "namespace", "Scope", "Namespace"];
const SCHEMA_KEYS: &[&str] = &["inputSchema", "input_schema", "InputSchema"];

/// Maps the `result` of a `tools/list` reply.
///
/// Accepts `{"tools": [...]}` (or `Tools`) as well as a bare array. Anything
/// else is a protocol error; individual bad entries are only skipped.
pub fn map_tools_result(server_id: &ServerId, result: &Value) -> Result<Vec<ToolDescriptor>, McpError> {
    let entries = match result {
        Value::Array(entries) => entries,
        Value::Object(obj) => match lookup(obj, &["tools", "Tools"]) {
            Some(Value::Array(entries)) => entries,
            _ => return Err(McpError::protocol("tools/list result has no tools array")),
        },
        _ => return Err(McpError::protocol("tools/list result is not an object")),
    };
    Ok(map_tools(server_id, entries))
}

/// Maps raw tool entries, skipping (and logging) the ones that cannot be used.
pub fn map_tools(server_id: &ServerId, entries: &[Value]) -> Vec<ToolDescriptor> {
    let mut seen = HashSet::new();
    let mut tools = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let descriptor = match map_entry(server_id, entry) {
            Ok(descriptor) => descriptor,
            Err(reason) => {
                tracing::warn!(server = %server_id, index, "Skipping tool entry: {}", reason);
                continue;
            }
        };
        if !seen.insert(descriptor.name.clone()) {
            tracing::warn!(
                server = %server_id,
                tool = %descriptor.name,
                "Skipping duplicate tool name"
            );
            continue;
        }
        tools.push(descriptor);
    }

    tools
}

fn map_entry(server_id: &ServerId, entry: &Value) -> Result<ToolDescriptor, String> {
    let obj = entry.as_object().ok_or("entry is not an object")?;

    // kept exactly as declared; the server matches it byte for byte
    let name = lookup_str(obj, NAME_KEYS)
        .filter(|name| !name.trim().is_empty())
        .ok_or("missing or empty name")?;

    let description = lookup_str(obj, DESCRIPTION_KEYS).map(str::to_string);

    let scope = lookup_str(obj, SCOPE_KEYS)
        .map(str::trim)
        .filter(|scope| !scope.is_empty())
        .unwrap_or(GLOBAL_SCOPE)
        .to_string();

    let input_schema = lookup(obj, SCHEMA_KEYS).cloned();

    Ok(ToolDescriptor {
        id: descriptor_id(server_id, name),
        server_id: server_id.clone(),
        name: name.to_string(),
        description,
        scope,
        input_schema,
    })
}

/// First non-null value among `keys`, in order.
fn lookup<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

/// First string value among `keys`, in order. Keys holding other types are
/// passed over.
fn lookup_str<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| obj.get(*key).and_then(Value::as_str))
}

pub fn descriptor_id(server_id: &ServerId, name: &str) -> Uuid {
    let key = format!("{}\u{0}{}", server_id, name);
    Uuid::new_v5(&TOOL_ID_NAMESPACE, key.as_bytes())
}
