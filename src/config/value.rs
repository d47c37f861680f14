use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Loosely-typed configuration value as authored in YAML or JSON
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum ConfigValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Sequence(Vec<ConfigValue>),
    Mapping(BTreeMap<String, ConfigValue>),
}

/// Accessor failure: the value exists but has the wrong shape
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("expected {expected}, found {found}")]
pub struct TypeMismatch {
    pub expected: &'static str,
    pub found: &'static str,
}

impl ConfigValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Null => "null",
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Int(_) => "integer",
            ConfigValue::Float(_) => "float",
            ConfigValue::String(_) => "string",
            ConfigValue::Sequence(_) => "sequence",
            ConfigValue::Mapping(_) => "mapping",
        }
    }

    fn mismatch(&self, expected: &'static str) -> TypeMismatch {
        TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }

    pub fn as_str(&self) -> Result<&str, TypeMismatch> {
        match self {
            ConfigValue::String(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, TypeMismatch> {
        match self {
            ConfigValue::Bool(b) => Ok(*b),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn as_i64(&self) -> Result<i64, TypeMismatch> {
        match self {
            ConfigValue::Int(i) => Ok(*i),
            other => Err(other.mismatch("integer")),
        }
    }

    /// Numeric view; integers widen to f64
    pub fn as_f64(&self) -> Result<f64, TypeMismatch> {
        match self {
            ConfigValue::Int(i) => Ok(*i as f64),
            ConfigValue::Float(f) => Ok(*f),
            other => Err(other.mismatch("number")),
        }
    }

    pub fn as_sequence(&self) -> Result<&[ConfigValue], TypeMismatch> {
        match self {
            ConfigValue::Sequence(items) => Ok(items),
            other => Err(other.mismatch("sequence")),
        }
    }

    pub fn as_mapping(&self) -> Result<&BTreeMap<String, ConfigValue>, TypeMismatch> {
        match self {
            ConfigValue::Mapping(map) => Ok(map),
            other => Err(other.mismatch("mapping")),
        }
    }

    /// Look up a key; `None` when absent or when `self` is not a mapping
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        match self {
            ConfigValue::Mapping(map) => map.get(key),
            _ => None,
        }
    }
}

impl From<serde_yaml::Value> for ConfigValue {
    fn from(value: serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => ConfigValue::Null,
            serde_yaml::Value::Bool(b) => ConfigValue::Bool(b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ConfigValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    ConfigValue::Float(f)
                } else {
                    ConfigValue::Null
                }
            }
            serde_yaml::Value::String(s) => ConfigValue::String(s),
            serde_yaml::Value::Sequence(items) => {
                ConfigValue::Sequence(items.into_iter().map(ConfigValue::from).collect())
            }
            serde_yaml::Value::Mapping(map) => ConfigValue::Mapping(
                map.into_iter()
                    .map(|(k, v)| (yaml_key(k), ConfigValue::from(v)))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => ConfigValue::from(tagged.value),
        }
    }
}

/// YAML allows non-string keys; scalars are rendered, anything else becomes empty
fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

impl From<serde_json::Value> for ConfigValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ConfigValue::Null,
            serde_json::Value::Bool(b) => ConfigValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ConfigValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    ConfigValue::Float(f)
                } else {
                    ConfigValue::Null
                }
            }
            serde_json::Value::String(s) => ConfigValue::String(s),
            serde_json::Value::Array(items) => {
                ConfigValue::Sequence(items.into_iter().map(ConfigValue::from).collect())
            }
            serde_json::Value::Object(map) => ConfigValue::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, ConfigValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl<'de> Deserialize<'de> for ConfigValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_yaml::Value::deserialize(deserializer).map(ConfigValue::from)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        ConfigValue::Int(i)
    }
}

impl From<f64> for ConfigValue {
    fn from(f: f64) -> Self {
        ConfigValue::Float(f)
    }
}

impl<T: Into<ConfigValue>> From<Vec<T>> for ConfigValue {
    fn from(items: Vec<T>) -> Self {
        ConfigValue::Sequence(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml_nested() {
        let yaml = r#"
must:
  - term: [status, 500]
  - range: [latency, gt, "1.5"]
analyze_wildcards: true
"#;
        let raw: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        let value = ConfigValue::from(raw);

        let must = value.get("must").unwrap().as_sequence().unwrap();
        assert_eq!(must.len(), 2);

        let term = must[0].get("term").unwrap().as_sequence().unwrap();
        assert_eq!(term[0].as_str().unwrap(), "status");
        assert_eq!(term[1].as_i64().unwrap(), 500);

        assert!(value.get("analyze_wildcards").unwrap().as_bool().unwrap());
    }

    #[test]
    fn test_accessor_mismatch() {
        let value = ConfigValue::Int(42);
        let err = value.as_str().unwrap_err();
        assert_eq!(err.expected, "string");
        assert_eq!(err.found, "integer");
        assert_eq!(value.as_f64().unwrap(), 42.0);
        assert!(value.get("anything").is_none());
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!({"query": "a OR b", "n": 1.25, "tags": ["x"]});
        let value = ConfigValue::from(json);
        assert_eq!(value.get("query").unwrap().as_str().unwrap(), "a OR b");
        assert_eq!(value.get("n").unwrap().as_f64().unwrap(), 1.25);
        assert_eq!(value.get("tags").unwrap().as_sequence().unwrap().len(), 1);
    }

    #[test]
    fn test_deserialize_via_serde() {
        let value: ConfigValue = serde_yaml::from_str("{type: boolfilter, limit: 3}").unwrap();
        assert_eq!(value.get("type").unwrap().as_str().unwrap(), "boolfilter");
        assert_eq!(value.get("limit").unwrap().as_i64().unwrap(), 3);
    }
}
