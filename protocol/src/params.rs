//! The "dynamic parameter map" pattern from the design notes: tool
//! parameters are an open key-value map of tagged-variant values. We reuse
//! `serde_json::Value` as the variant representation (the wire format tool
//! calls already arrive in) and layer typed accessors on top so each tool
//! can validate its own schema at entry instead of every caller hand-rolling
//! `match`es over `Value`.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params(pub serde_json::Map<String, Value>);

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ParamError {
    #[error("missing required parameter `{0}`")]
    Missing(String),
    #[error("parameter `{0}` has the wrong type, expected {1}")]
    WrongType(String, &'static str),
    #[error("parameters map is empty")]
    Empty,
}

impl Params {
    pub fn new(map: serde_json::Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Validates that the map is non-empty. Every tool's entry point should
    /// call this first: an empty parameters map is always a pre-flight
    /// validation error, never a dispatch.
    pub fn require_non_empty(&self) -> Result<(), ParamError> {
        if self.0.is_empty() {
            Err(ParamError::Empty)
        } else {
            Ok(())
        }
    }

    pub fn required_str(&self, key: &str) -> Result<&str, ParamError> {
        match self.0.get(key) {
            None => Err(ParamError::Missing(key.to_string())),
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(_) => Err(ParamError::WrongType(key.to_string(), "string")),
        }
    }

    pub fn optional_str(&self, key: &str) -> Result<Option<&str>, ParamError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(ParamError::WrongType(key.to_string(), "string")),
        }
    }

    pub fn required_path(&self, key: &str) -> Result<PathBuf, ParamError> {
        self.required_str(key).map(PathBuf::from)
    }

    pub fn required_i64(&self, key: &str) -> Result<i64, ParamError> {
        match self.0.get(key) {
            None => Err(ParamError::Missing(key.to_string())),
            Some(v) => v
                .as_i64()
                .ok_or_else(|| ParamError::WrongType(key.to_string(), "integer")),
        }
    }

    pub fn optional_i64(&self, key: &str, default: i64) -> Result<i64, ParamError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(v) => v
                .as_i64()
                .ok_or_else(|| ParamError::WrongType(key.to_string(), "integer")),
        }
    }

    pub fn optional_bool(&self, key: &str, default: bool) -> Result<bool, ParamError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(ParamError::WrongType(key.to_string(), "bool")),
        }
    }

    pub fn required_str_seq(&self, key: &str) -> Result<Vec<String>, ParamError> {
        match self.0.get(key) {
            None => Err(ParamError::Missing(key.to_string())),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or(ParamError::WrongType(key.to_string(), "string array"))
                })
                .collect(),
            Some(_) => Err(ParamError::WrongType(key.to_string(), "array")),
        }
    }

    /// Rendered as `key=value, key=value, ...` for logging/secret-scanning;
    /// never includes nested structure, just enough to grep for patterns.
    pub fn stringify(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl From<serde_json::Map<String, Value>> for Params {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> Params {
        let mut map = serde_json::Map::new();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.clone());
        }
        Params::new(map)
    }

    #[test]
    fn empty_params_fail_require_non_empty() {
        let p = Params::default();
        assert_eq!(p.require_non_empty(), Err(ParamError::Empty));
    }

    #[test]
    fn required_str_missing() {
        let p = params(&[]);
        assert_eq!(
            p.required_str("path"),
            Err(ParamError::Missing("path".to_string()))
        );
    }

    #[test]
    fn required_str_wrong_type() {
        let p = params(&[("path", json!(42))]);
        assert_eq!(
            p.required_str("path"),
            Err(ParamError::WrongType("path".to_string(), "string"))
        );
    }

    #[test]
    fn required_str_ok() {
        let p = params(&[("path", json!("a.txt"))]);
        assert_eq!(p.required_str("path"), Ok("a.txt"));
    }

    #[test]
    fn optional_i64_defaults() {
        let p = params(&[]);
        assert_eq!(p.optional_i64("timeout", 30), Ok(30));
    }
}
