//! Typed query tree produced by the translator

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ConfigValue;

/// Scalar used as a term value or range bound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Scalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Scalar::Bool(b) => serde_json::Value::Bool(*b),
            Scalar::Int(i) => serde_json::json!(i),
            Scalar::Float(f) => serde_json::json!(f),
            Scalar::String(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Best-effort coercion of a config scalar.
    ///
    /// Text is tried as an integer, then as a float, and kept as text
    /// otherwise. Non-text scalars pass through unchanged. Returns `None`
    /// for null, sequences and mappings.
    pub fn coerce(value: &ConfigValue) -> Option<Scalar> {
        match value {
            ConfigValue::String(s) => Some(coerce_str(s)),
            ConfigValue::Bool(b) => Some(Scalar::Bool(*b)),
            ConfigValue::Int(i) => Some(Scalar::Int(*i)),
            ConfigValue::Float(f) => Some(Scalar::Float(*f)),
            ConfigValue::Null | ConfigValue::Sequence(_) | ConfigValue::Mapping(_) => None,
        }
    }
}

fn coerce_str(s: &str) -> Scalar {
    if let Ok(i) = s.parse::<i64>() {
        Scalar::Int(i)
    } else if let Ok(f) = s.parse::<f64>() {
        Scalar::Float(f)
    } else {
        Scalar::String(s.to_string())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

impl From<f64> for Scalar {
    fn from(f: f64) -> Self {
        Scalar::Float(f)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

/// Range comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl RangeOp {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "gt" => Some(RangeOp::Gt),
            "gte" => Some(RangeOp::Gte),
            "lt" => Some(RangeOp::Lt),
            "lte" => Some(RangeOp::Lte),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RangeOp::Gt => "gt",
            RangeOp::Gte => "gte",
            RangeOp::Lt => "lt",
            RangeOp::Lte => "lte",
        }
    }
}

/// Strict query tree executed by a search backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterNode {
    /// Field equals value
    Term { field: String, value: Scalar },
    /// Field satisfies every (operator, bound) pair, in order
    Range {
        field: String,
        bounds: Vec<(RangeOp, Scalar)>,
    },
    /// Boolean combination of nested filters
    Bool {
        must: Vec<FilterNode>,
        must_not: Vec<FilterNode>,
        should: Vec<FilterNode>,
    },
    /// Free-text query string
    QueryString { text: String, analyze_wildcards: bool },
}

impl FilterNode {
    pub fn term(field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        FilterNode::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn range(field: impl Into<String>) -> Self {
        FilterNode::Range {
            field: field.into(),
            bounds: Vec::new(),
        }
    }

    /// Append a bound to a range node; no-op on other variants
    pub fn bound(mut self, op: RangeOp, value: impl Into<Scalar>) -> Self {
        if let FilterNode::Range { bounds, .. } = &mut self {
            bounds.push((op, value.into()));
        }
        self
    }

    pub fn query_string(text: impl Into<String>, analyze_wildcards: bool) -> Self {
        FilterNode::QueryString {
            text: text.into(),
            analyze_wildcards,
        }
    }

    /// Number of clauses in (must, must_not, should); zeros for non-bool nodes
    pub fn clause_counts(&self) -> (usize, usize, usize) {
        match self {
            FilterNode::Bool {
                must,
                must_not,
                should,
            } => (must.len(), must_not.len(), should.len()),
            _ => (0, 0, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_values() {
        assert_eq!(Scalar::coerce(&"40.7".into()), Some(Scalar::Float(40.7)));
        assert_eq!(Scalar::coerce(&"100".into()), Some(Scalar::Int(100)));
        assert_eq!(
            Scalar::coerce(&"now-30m".into()),
            Some(Scalar::String("now-30m".to_string()))
        );
        assert_eq!(
            Scalar::coerce(&"100mille".into()),
            Some(Scalar::String("100mille".to_string()))
        );
        assert_eq!(Scalar::coerce(&ConfigValue::Float(3.3)), Some(Scalar::Float(3.3)));
        assert_eq!(Scalar::coerce(&ConfigValue::Bool(true)), Some(Scalar::Bool(true)));
        assert_eq!(Scalar::coerce(&ConfigValue::Null), None);
    }

    #[test]
    fn test_range_builder() {
        let node = FilterNode::range("code")
            .bound(RangeOp::Lt, 800)
            .bound(RangeOp::Gte, 500);
        match node {
            FilterNode::Range { field, bounds } => {
                assert_eq!(field, "code");
                assert_eq!(
                    bounds,
                    vec![(RangeOp::Lt, Scalar::Int(800)), (RangeOp::Gte, Scalar::Int(500))]
                );
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_range_op_parse() {
        assert_eq!(RangeOp::parse("gte"), Some(RangeOp::Gte));
        assert_eq!(RangeOp::parse("tge"), None);
        assert_eq!(RangeOp::Lte.as_str(), "lte");
    }
}
