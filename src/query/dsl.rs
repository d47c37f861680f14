//! Rendering of a [`FilterNode`] as Elasticsearch query DSL

use serde_json::{json, Map, Value as Json};

use super::filter::FilterNode;

/// Render a filter tree as the `query` object of a `_search` body
pub fn to_query_dsl(node: &FilterNode) -> Json {
    match node {
        FilterNode::Term { field, value } => json!({ "term": { field: value.to_json() } }),
        FilterNode::Range { field, bounds } => {
            let mut ops = Map::new();
            for (op, bound) in bounds {
                ops.insert(op.as_str().to_string(), bound.to_json());
            }
            json!({ "range": { field: ops } })
        }
        FilterNode::Bool {
            must,
            must_not,
            should,
        } => {
            let mut clauses = Map::new();
            for (key, nodes) in [("must", must), ("must_not", must_not), ("should", should)] {
                if !nodes.is_empty() {
                    clauses.insert(
                        key.to_string(),
                        Json::Array(nodes.iter().map(to_query_dsl).collect()),
                    );
                }
            }
            json!({ "bool": clauses })
        }
        FilterNode::QueryString {
            text,
            analyze_wildcards,
        } => json!({
            "query_string": {
                "query": text,
                "analyze_wildcard": analyze_wildcards,
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::filter::RangeOp;

    #[test]
    fn test_bool_dsl() {
        let node = FilterNode::Bool {
            must: vec![
                FilterNode::term("status", 500),
                FilterNode::range("timestamp").bound(RangeOp::Gte, "now-1h"),
            ],
            must_not: vec![FilterNode::term("host", "canary")],
            should: vec![],
        };

        let dsl = to_query_dsl(&node);
        assert_eq!(
            dsl,
            json!({
                "bool": {
                    "must": [
                        {"term": {"status": 500}},
                        {"range": {"timestamp": {"gte": "now-1h"}}}
                    ],
                    "must_not": [{"term": {"host": "canary"}}]
                }
            })
        );
    }

    #[test]
    fn test_query_string_dsl() {
        let dsl = to_query_dsl(&FilterNode::query_string("error AND nginx*", true));
        assert_eq!(dsl["query_string"]["query"], "error AND nginx*");
        assert_eq!(dsl["query_string"]["analyze_wildcard"], true);
    }

    #[test]
    fn test_range_dsl_multiple_bounds() {
        let node = FilterNode::range("code")
            .bound(RangeOp::Lt, 800)
            .bound(RangeOp::Gte, 500);
        assert_eq!(
            to_query_dsl(&node),
            json!({"range": {"code": {"lt": 800, "gte": 500}}})
        );
    }
}
