//! Shared identifiers and request parameter types.

/// Identifier of a placeholder, unique per process.
pub type PlaceholderId = u64;

/// Request parameters: a JSON object merged over the spawner's base.
pub type RequestOptions = serde_json::Map<String, serde_json::Value>;

/// Name of the field that selects the executor on the generic dispatch path.
pub const ADAPTER_FIELD: &str = "adapter";

