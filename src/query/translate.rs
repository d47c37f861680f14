//! Translation of loosely-typed query clauses into a [`FilterNode`]
//!
//! Clauses are authored by hand in YAML, e.g.
//!
//! ```yaml
//! type: boolfilter
//! clauses:
//!   must:
//!     - term: [status, "500"]
//!     - range: [timestamp, gte, now-1h]
//!   must_not:
//!     - term: [host, canary-01]
//! ```
//!
//! This module is the only place where dynamic typing is resolved; the rest
//! of the crate deals with the strict tree.

use super::filter::{FilterNode, RangeOp, Scalar};
use crate::config::ConfigValue;

/// Translate a query clause block selected by its `type` discriminator
pub fn translate(query_type: &str, clauses: &ConfigValue) -> Result<FilterNode, TranslateError> {
    match query_type {
        "boolfilter" => bool_filter(clauses),
        "query_string" | "querystring" => query_string(clauses),
        other => Err(TranslateError::UnsupportedQueryType(other.to_string())),
    }
}

fn bool_filter(clauses: &ConfigValue) -> Result<FilterNode, TranslateError> {
    let must = clause_list(clauses, "must")?;
    let must_not = clause_list(clauses, "must_not")?;
    let should = clause_list(clauses, "should")?;

    if must.is_empty() && must_not.is_empty() && should.is_empty() {
        return Err(TranslateError::EmptyQuery);
    }

    Ok(FilterNode::Bool {
        must,
        must_not,
        should,
    })
}

/// Read one clause collection; a missing or non-sequence key yields no filters
fn clause_list(clauses: &ConfigValue, key: &str) -> Result<Vec<FilterNode>, TranslateError> {
    match clauses.get(key).map(ConfigValue::as_sequence) {
        Some(Ok(entries)) => entries.iter().map(filter_entry).collect(),
        _ => Ok(Vec::new()),
    }
}

fn filter_entry(entry: &ConfigValue) -> Result<FilterNode, TranslateError> {
    let map = entry
        .as_mapping()
        .map_err(|e| TranslateError::MalformedFilter(format!("filter entry: {}", e)))?;

    if map.len() != 1 {
        return Err(TranslateError::MalformedFilter(format!(
            "filter entry must have exactly one key, found {}",
            map.len()
        )));
    }

    let (kind, args) = map
        .iter()
        .next()
        .ok_or_else(|| TranslateError::MalformedFilter("empty filter entry".to_string()))?;

    match kind.as_str() {
        "term" => {
            let args = args
                .as_sequence()
                .map_err(|e| TranslateError::MalformedFilter(format!("term: {}", e)))?;
            term_filter(args)
        }
        "range" => {
            let args = args
                .as_sequence()
                .map_err(|e| TranslateError::MalformedRangeFilter(e.to_string()))?;
            range_filter(args)
        }
        other => Err(TranslateError::MalformedFilter(format!(
            "unsupported filter '{}', expected term or range",
            other
        ))),
    }
}

fn term_filter(args: &[ConfigValue]) -> Result<FilterNode, TranslateError> {
    let [field, value] = args else {
        return Err(TranslateError::MalformedFilter(format!(
            "term expects [field, value], got {} values",
            args.len()
        )));
    };

    let field = field
        .as_str()
        .map_err(|e| TranslateError::MalformedFilter(format!("term field: {}", e)))?;
    let value = Scalar::coerce(value).ok_or_else(|| {
        TranslateError::MalformedFilter(format!(
            "term value must be a scalar, found {}",
            value.type_name()
        ))
    })?;

    Ok(FilterNode::Term {
        field: field.to_string(),
        value,
    })
}

fn range_filter(args: &[ConfigValue]) -> Result<FilterNode, TranslateError> {
    if args.len() < 3 {
        return Err(TranslateError::MalformedRangeFilter(format!(
            "expected [field, op, bound, ...], got {} values",
            args.len()
        )));
    }

    let field = args[0]
        .as_str()
        .map_err(|e| TranslateError::MalformedRangeFilter(format!("field: {}", e)))?;

    let pairs = &args[1..];
    if pairs.len() % 2 != 0 {
        return Err(TranslateError::MalformedRangeFilter(
            "operators and bounds must come in pairs".to_string(),
        ));
    }

    let mut bounds = Vec::with_capacity(pairs.len() / 2);
    for pair in pairs.chunks_exact(2) {
        let op = pair[0]
            .as_str()
            .map_err(|e| TranslateError::MalformedRangeFilter(format!("operator: {}", e)))?;
        let op = RangeOp::parse(op).ok_or_else(|| {
            TranslateError::MalformedRangeFilter(format!(
                "unknown operator '{}', only gt, gte, lt, lte",
                op
            ))
        })?;
        let bound = Scalar::coerce(&pair[1]).ok_or_else(|| {
            TranslateError::MalformedRangeFilter(format!(
                "bound must be a scalar, found {}",
                pair[1].type_name()
            ))
        })?;
        bounds.push((op, bound));
    }

    Ok(FilterNode::Range {
        field: field.to_string(),
        bounds,
    })
}

fn query_string(clauses: &ConfigValue) -> Result<FilterNode, TranslateError> {
    let text = match clauses.get("query").map(ConfigValue::as_str) {
        Some(Ok(text)) if !text.is_empty() => text,
        _ => return Err(TranslateError::MissingQueryText),
    };

    let analyze_wildcards = clauses
        .get("analyze_wildcards")
        .and_then(|v| v.as_bool().ok())
        .unwrap_or(false);

    Ok(FilterNode::QueryString {
        text: text.to_string(),
        analyze_wildcards,
    })
}

/// Translation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranslateError {
    #[error("Unsupported query type: '{0}'")]
    UnsupportedQueryType(String),

    #[error("No filters specified in must, must_not or should")]
    EmptyQuery,

    #[error("Malformed range filter: {0}")]
    MalformedRangeFilter(String),

    #[error("Malformed filter: {0}")]
    MalformedFilter(String),

    #[error("Missing query text in query string")]
    MissingQueryText,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(src: &str) -> ConfigValue {
        serde_yaml::from_str(src).unwrap()
    }

    fn range(args: &str) -> Result<FilterNode, TranslateError> {
        let args = yaml(args);
        range_filter(args.as_sequence().unwrap())
    }

    #[test]
    fn test_range_filter() {
        let node = range(r#"["errorcode", "gte", "500"]"#).unwrap();
        assert_eq!(node, FilterNode::range("errorcode").bound(RangeOp::Gte, 500));

        let node = range(r#"["timestamp", "lt", "now-1h"]"#).unwrap();
        assert_eq!(node, FilterNode::range("timestamp").bound(RangeOp::Lt, "now-1h"));

        let node = range(r#"["code", "lt", "800", "gte", "500"]"#).unwrap();
        assert_eq!(
            node,
            FilterNode::range("code")
                .bound(RangeOp::Lt, 800)
                .bound(RangeOp::Gte, 500)
        );
    }

    #[test]
    fn test_range_filter_errors() {
        for bad in [
            r#"["code", "lt", "800", "pouet", "500"]"#,
            r#"["code", "lt", "800", "gte"]"#,
            r#"["test", "lt", "800", "tge", "500"]"#,
            r#"["testshort"]"#,
            r#"[]"#,
            r#"[42, "gte", "now-30m"]"#,
            r#"["code", 12, "800"]"#,
        ] {
            assert!(
                matches!(range(bad), Err(TranslateError::MalformedRangeFilter(_))),
                "expected range error for {}",
                bad
            );
        }
    }

    #[test]
    fn test_term_filters() {
        let clauses = yaml(
            r#"
must:
  - term: [test, "yes"]
  - term: [required, true]
  - term: [value, 146]
  - range: [Timestamp, gte, now-1h]
"#,
        );
        let node = translate("boolfilter", &clauses).unwrap();
        let FilterNode::Bool { must, .. } = node else {
            panic!("expected bool node");
        };
        assert_eq!(
            must,
            vec![
                FilterNode::term("test", "yes"),
                FilterNode::term("required", true),
                FilterNode::term("value", 146),
                FilterNode::range("Timestamp").bound(RangeOp::Gte, "now-1h"),
            ]
        );
    }

    #[test]
    fn test_term_value_coerced() {
        let clauses = yaml(r#"{must: [{term: [Status, "500"]}, {range: [Code, gt, "42.42"]}]}"#);
        let node = translate("boolfilter", &clauses).unwrap();
        let FilterNode::Bool { must, .. } = node else {
            panic!("expected bool node");
        };
        assert_eq!(must[0], FilterNode::term("Status", 500));
        assert_eq!(must[1], FilterNode::range("Code").bound(RangeOp::Gt, 42.42));
    }

    #[test]
    fn test_invalid_term_filters() {
        for bad in [
            r#"{must: [{term: [145, "yes"]}]}"#,
            r#"{must: [{term: ["yes"]}]}"#,
            r#"{must: [{term: ["a", "b", "c"]}]}"#,
            r#"{must: [{term: ["a", [1, 2]]}]}"#,
            r#"{must: ["term"]}"#,
            r#"{must: [{term: [a, b], range: [c, gt, 1]}]}"#,
            r#"{should: [{plop: [Thomas]}]}"#,
        ] {
            assert!(
                matches!(
                    translate("boolfilter", &yaml(bad)),
                    Err(TranslateError::MalformedFilter(_))
                ),
                "expected filter error for {}",
                bad
            );
        }
    }

    #[test]
    fn test_bool_filter_clause_counts() {
        let clauses = yaml(
            r#"
must:
  - term: [Value, 146.5]
  - term: [othervalue, testTest]
  - range: [Timestamp, lt, now-1h]
must_not:
  - term: [status, OK]
"#,
        );
        let node = translate("boolfilter", &clauses).unwrap();
        assert_eq!(node.clause_counts(), (3, 1, 0));

        let clauses = yaml(
            r#"
should:
  - term: [User, Thomas]
must:
  - term: [Status, OK]
  - range: [Timestamp, gt, now-2h]
"#,
        );
        let node = translate("boolfilter", &clauses).unwrap();
        assert_eq!(node.clause_counts(), (2, 0, 1));
        let FilterNode::Bool { should, .. } = node else {
            panic!("expected bool node");
        };
        assert_eq!(should, vec![FilterNode::term("User", "Thomas")]);
        assert_ne!(should, vec![FilterNode::term("User", "Tobias")]);
    }

    #[test]
    fn test_bool_filter_rejects_unknown_filter() {
        let clauses = yaml(
            r#"
must:
  - term: [Status, OK]
  - hihi: [Timestamp, gt, now-2h]
"#,
        );
        assert!(translate("boolfilter", &clauses).is_err());
    }

    #[test]
    fn test_empty_query() {
        assert_eq!(
            translate("boolfilter", &ConfigValue::Null),
            Err(TranslateError::EmptyQuery)
        );
        let clauses = yaml("{must: [], must_not: [], should: []}");
        assert_eq!(translate("boolfilter", &clauses), Err(TranslateError::EmptyQuery));
        let clauses = yaml("{must: not-a-list}");
        assert_eq!(translate("boolfilter", &clauses), Err(TranslateError::EmptyQuery));
    }

    #[test]
    fn test_query_string() {
        let clauses = yaml(r#"{query: "type:MySQL AND Timestamp [2012-01-01 TO 2012-12-31]"}"#);
        assert_eq!(
            translate("query_string", &clauses).unwrap(),
            FilterNode::query_string("type:MySQL AND Timestamp [2012-01-01 TO 2012-12-31]", false)
        );

        let clauses = yaml(r#"{query: "this OR (that OR thi*)", analyze_wildcards: true}"#);
        assert_eq!(
            translate("querystring", &clauses).unwrap(),
            FilterNode::query_string("this OR (that OR thi*)", true)
        );

        // wrong type for analyze_wildcards falls back to false
        let clauses = yaml(r#"{query: "this OR (that OR this)", analyze_wildcards: 42}"#);
        assert_eq!(
            translate("querystring", &clauses).unwrap(),
            FilterNode::query_string("this OR (that OR this)", false)
        );
    }

    #[test]
    fn test_query_string_errors() {
        let clauses = yaml(r#"{quer: "type:Error AND method:GET"}"#);
        assert_eq!(
            translate("querystring", &clauses),
            Err(TranslateError::MissingQueryText)
        );
        let clauses = yaml(r#"{query: ""}"#);
        assert_eq!(
            translate("query_string", &clauses),
            Err(TranslateError::MissingQueryText)
        );
        let clauses = yaml(r#"{query: 12}"#);
        assert_eq!(
            translate("query_string", &clauses),
            Err(TranslateError::MissingQueryText)
        );
    }

    #[test]
    fn test_unsupported_types() {
        let clauses = yaml(r#"{query: "type:Error AND method:GET"}"#);
        for kind in ["plop", "manual", ""] {
            assert!(matches!(
                translate(kind, &clauses),
                Err(TranslateError::UnsupportedQueryType(_))
            ));
        }
    }
}
