use log::{info, warn};
use serde_json::{json, Value};
use super::store::PersistenceStore;
use super::{DRAFT_KEY_PREFIX, DRAFT_SCHEMA_VERSION};
use crate::error::DoseResult;

/// One-time startup pass over every stored draft: normalize legacy field
/// shapes in place and stamp the schema version. Returns how many records
/// were rewritten.
pub fn migrate_drafts<S: PersistenceStore>(store: &mut S) -> DoseResult<usize> {
    let keys = store.keys_with_prefix(DRAFT_KEY_PREFIX)?;
    let mut migrated = 0;

    for key in keys {
        let Some(raw) = store.get(&key)? else {
            continue;
        };

        let mut value: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!("Skipping unparsable draft {} during migration: {}", key, err);
                continue;
            }
        };

        let before = value.clone();
        normalize_draft_value(&mut value);

        if value != before {
            store.set(&key, &serde_json::to_string(&value)?)?;
            migrated += 1;
        }
    }

    if migrated > 0 {
        info!("Migrated {} legacy draft(s)", migrated);
    }
    Ok(migrated)
}

/// Legacy drafts predate the schema version field and stored `solvent`,
/// `administrationDuration` and `notes` with loose types.
fn normalize_draft_value(value: &mut Value) {
    let Some(root) = value.as_object_mut() else {
        return;
    };

    root.entry("schemaVersion")
        .or_insert_with(|| json!(DRAFT_SCHEMA_VERSION));

    let Some(states) = root.get_mut("doseStates").and_then(Value::as_array_mut) else {
        return;
    };

    for entry in states {
        let Some(state) = entry.as_object_mut() else {
            continue;
        };

        for field in ["solvent", "administrationDuration"] {
            normalize_string_or_absent(state, field);
        }

        let notes = match state.get("notes") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        state.insert("notes".to_string(), json!(notes));
    }
}

/// Keep strings, stringify numbers, drop anything else entirely.
fn normalize_string_or_absent(state: &mut serde_json::Map<String, Value>, field: &str) {
    match state.get(field) {
        Some(Value::String(_)) | None => {}
        Some(Value::Number(n)) => {
            let n = n.to_string();
            state.insert(field.to_string(), json!(n));
        }
        Some(_) => {
            state.remove(field);
        }
    }
}
