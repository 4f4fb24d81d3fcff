//! JSON output for scripting and piping.

use serde::Serialize;

/// Pretty-printed JSON for any report value.
pub fn render<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}
