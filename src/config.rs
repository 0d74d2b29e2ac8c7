/*
Encoder-facing configuration knobs.

The core store (`cnf::Cnf`) only stores and bounds-checks these; it has no
opinion on why a caller picked a given arity. Mirrors the teacher's
`parse_config.rs` style of reading a `serde_json::Value` by hand and falling
back to defaults field-by-field rather than deriving `Deserialize`, so a
config file that only overrides one knob doesn't have to spell out the rest.
*/

use std::fs;
use std::path::Path;

use serde_json::Value;

pub const ADD_MAX_ARGS_DEFAULT: u32 = 3;
pub const ADD_MAX_ARGS_MIN: u32 = 2;
pub const ADD_MAX_ARGS_MAX: u32 = 6;

pub const XOR_MAX_ARGS_DEFAULT: u32 = 3;
pub const XOR_MAX_ARGS_MIN: u32 = 2;
pub const XOR_MAX_ARGS_MAX: u32 = 10;

pub const ADD_NAIVE_DEFAULT: bool = false;

/// Bounds-checked encoder knobs carried alongside a `Cnf` store. Values are
/// clamped to their documented range by the setters, never by the getters.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    add_max_args: u32,
    xor_max_args: u32,
    add_naive: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            add_max_args: ADD_MAX_ARGS_DEFAULT,
            xor_max_args: XOR_MAX_ARGS_DEFAULT,
            add_naive: ADD_NAIVE_DEFAULT,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_max_args(&self) -> u32 {
        self.add_max_args
    }

    pub fn set_add_max_args(&mut self, value: u32) {
        assert!(
            (ADD_MAX_ARGS_MIN..=ADD_MAX_ARGS_MAX).contains(&value),
            "add_max_args out of range [{ADD_MAX_ARGS_MIN}, {ADD_MAX_ARGS_MAX}]: {value}"
        );
        self.add_max_args = value;
    }

    pub fn xor_max_args(&self) -> u32 {
        self.xor_max_args
    }

    pub fn set_xor_max_args(&mut self, value: u32) {
        assert!(
            (XOR_MAX_ARGS_MIN..=XOR_MAX_ARGS_MAX).contains(&value),
            "xor_max_args out of range [{XOR_MAX_ARGS_MIN}, {XOR_MAX_ARGS_MAX}]: {value}"
        );
        self.xor_max_args = value;
    }

    pub fn add_naive(&self) -> bool {
        self.add_naive
    }

    pub fn set_add_naive(&mut self, value: bool) {
        self.add_naive = value;
    }

    /// Loads options from a JSON file, falling back to defaults for any key
    /// that is absent, unreadable, or the wrong shape. Never fails: a missing
    /// or malformed config file just means "use the defaults", matching how
    /// the teacher's own config reader treats a missing solver config.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let mut options = Self::default();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(_) => return options,
        };
        let root: Value = match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(_) => return options,
        };
        if let Some(value) = root.get("add_max_args").and_then(Value::as_u64) {
            if (ADD_MAX_ARGS_MIN as u64..=ADD_MAX_ARGS_MAX as u64).contains(&value) {
                options.add_max_args = value as u32;
            }
        }
        if let Some(value) = root.get("xor_max_args").and_then(Value::as_u64) {
            if (XOR_MAX_ARGS_MIN as u64..=XOR_MAX_ARGS_MAX as u64).contains(&value) {
                options.xor_max_args = value as u32;
            }
        }
        if let Some(value) = root.get("add_naive").and_then(Value::as_bool) {
            options.add_naive = value;
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let options = Options::new();
        assert_eq!(options.add_max_args(), ADD_MAX_ARGS_DEFAULT);
        assert_eq!(options.xor_max_args(), XOR_MAX_ARGS_DEFAULT);
        assert_eq!(options.add_naive(), ADD_NAIVE_DEFAULT);
    }

    #[test]
    #[should_panic(expected = "add_max_args out of range")]
    fn set_add_max_args_rejects_out_of_range() {
        let mut options = Options::new();
        options.set_add_max_args(ADD_MAX_ARGS_MAX + 1);
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let options = Options::load("/nonexistent/path/to/bal-config.json");
        assert_eq!(options.add_max_args(), ADD_MAX_ARGS_DEFAULT);
    }
}
