//! Parameter merging for dispatch.

use serde_json::Value;

use super::serde::{RequestOptions, ADAPTER_FIELD};

/// Merge `overrides` over `base`. Nested objects merge key by key; any other
/// value in `overrides` replaces the base value.
pub fn merge_params(base: &RequestOptions, overrides: &RequestOptions) -> RequestOptions {
    let mut merged = base.clone();
    for (key, value) in overrides {
        match (merged.get_mut(key), value) {
            (Some(Value::Object(into)), Value::Object(from)) => {
                let nested = merge_params(into, from);
                *into = nested;
            }
            _ => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}

/// Remove the executor-selector field, returning its name if it was a string.
pub fn strip_adapter(params: &mut RequestOptions) -> Option<String> {
    match params.remove(ADAPTER_FIELD) {
        Some(Value::String(name)) => Some(name),
        _ => None,
    }
}
