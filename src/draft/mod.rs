pub mod migrate;
pub mod store;

pub use migrate::migrate_drafts;
pub use store::{FileStore, MemoryStore, PersistenceStore};

use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use crate::patient::PatientParameters;
use crate::state::EditableDoseState;

pub const DRAFT_KEY_PREFIX: &str = "draft:doseCalc:";
pub const DRAFT_SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

pub fn draft_key(regimen_id: &str) -> String {
    format!("{}{}", DRAFT_KEY_PREFIX, regimen_id)
}

/// The persisted working state for one regimen session.
///
/// The patient identifier is deliberately not part of this type: a draft can
/// never carry it to storage, whatever the clinician typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRecord {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub patient: PatientParameters,
    #[serde(default = "default_cycle_number")]
    pub cycle_number: u32,
    #[serde(default)]
    pub treatment_date: Option<NaiveDate>,
    #[serde(default)]
    pub clinical_notes: String,
    #[serde(default)]
    pub selected_premedications: Vec<String>,
    #[serde(default)]
    pub selected_antiemetics: Vec<String>,
    #[serde(default)]
    pub dose_states: Vec<EditableDoseState>,
}

fn default_schema_version() -> u32 {
    DRAFT_SCHEMA_VERSION
}

fn default_cycle_number() -> u32 {
    1
}

struct PendingWrite {
    key: String,
    payload: String,
    due: Instant,
}

/// Debounced draft writer over an injected [`PersistenceStore`].
///
/// Every failure at the storage boundary is logged and swallowed; in-memory
/// session state stays authoritative.
pub struct DraftPersistenceGateway<S: PersistenceStore> {
    store: S,
    debounce: Duration,
    pending: Option<PendingWrite>,
}

impl<S: PersistenceStore> DraftPersistenceGateway<S> {
    pub fn new(store: S, debounce: Duration) -> Self {
        Self {
            store,
            debounce,
            pending: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Schedule a debounced write. The storage key is captured here, so a
    /// regimen switch before the delay elapses cannot redirect the payload.
    /// A pending write for a different regimen is flushed first rather than
    /// silently replaced.
    pub fn schedule_save(&mut self, regimen_id: &str, draft: &DraftRecord, now: Instant) {
        let key = draft_key(regimen_id);

        if self.pending.as_ref().is_some_and(|p| p.key != key) {
            self.flush();
        }

        match serde_json::to_string(draft) {
            Ok(payload) => {
                self.pending = Some(PendingWrite {
                    key,
                    payload,
                    due: now + self.debounce,
                });
            }
            Err(err) => warn!("Draft serialization failed for {}: {}", key, err),
        }
    }

    /// Fire the pending write once its debounce delay has elapsed.
    pub fn poll(&mut self, now: Instant) {
        if self.pending.as_ref().is_some_and(|p| now >= p.due) {
            self.flush();
        }
    }

    /// Write any pending draft immediately.
    pub fn flush(&mut self) {
        if let Some(pending) = self.pending.take() {
            if let Err(err) = self.store.set(&pending.key, &pending.payload) {
                warn!("Draft write failed for {}: {}", pending.key, err);
            }
        }
    }

    /// Load the draft for a regimen, sanitizing legacy field shapes. The
    /// sanitized form is re-persisted immediately so the next read is clean.
    /// A corrupted draft is treated as absent, never as a failure.
    pub fn load(&mut self, regimen_id: &str) -> Option<DraftRecord> {
        let key = draft_key(regimen_id);

        let raw = match self.store.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!("Draft read failed for {}: {}", key, err);
                return None;
            }
        };

        let value: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!("Discarding unparsable draft {}: {}", key, err);
                return None;
            }
        };

        let record: DraftRecord = match serde_json::from_value(sanitize_draft_value(value)) {
            Ok(record) => record,
            Err(err) => {
                warn!("Discarding unusable draft {}: {}", key, err);
                return None;
            }
        };

        match serde_json::to_string(&record) {
            Ok(payload) => {
                if let Err(err) = self.store.set(&key, &payload) {
                    warn!("Re-persisting sanitized draft {} failed: {}", key, err);
                }
            }
            Err(err) => warn!("Sanitized draft {} did not serialize: {}", key, err),
        }

        Some(record)
    }

    pub fn remove(&mut self, regimen_id: &str) {
        let key = draft_key(regimen_id);
        if let Err(err) = self.store.remove(&key) {
            warn!("Draft removal failed for {}: {}", key, err);
        }
    }
}

/// Coerce the fields legacy drafts are known to corrupt: doses to numbers
/// (default 0) and notes to a string (default "").
fn sanitize_draft_value(mut value: Value) -> Value {
    let Some(root) = value.as_object_mut() else {
        return value;
    };

    root.entry("schemaVersion")
        .or_insert_with(|| json!(DRAFT_SCHEMA_VERSION));

    if let Some(states) = root.get_mut("doseStates").and_then(Value::as_array_mut) {
        for entry in states {
            let Some(state) = entry.as_object_mut() else {
                continue;
            };
            for field in ["adjustedDose", "finalDose"] {
                let coerced = coerce_f64(state.get(field));
                state.insert(field.to_string(), json!(coerced));
            }
            let notes = coerce_string(state.get("notes"));
            state.insert("notes".to_string(), json!(notes));
        }
    }

    value
}

fn coerce_f64(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn coerce_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
