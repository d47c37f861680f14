//! Filter evaluation over JSON documents
//!
//! Mirrors the search engine's semantics closely enough for dry runs and
//! tests: term equality with numeric normalization, range comparison with
//! `now±<duration>` date math, and a subset of the query string syntax.

use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use std::cmp::Ordering;

use crate::query::{FilterNode, RangeOp, Scalar};

/// Resolve a dotted field path inside a document
pub fn lookup<'a>(doc: &'a Json, path: &str) -> Option<&'a Json> {
    if let Some(v) = doc.get(path) {
        return Some(v);
    }
    path.split('.').try_fold(doc, |current, key| current.get(key))
}

/// Evaluate a filter tree against a document
pub fn matches(node: &FilterNode, doc: &Json) -> bool {
    match node {
        FilterNode::Term { field, value } => lookup(doc, field)
            .map(|v| any_value(v, |leaf| scalar_eq(leaf, value)))
            .unwrap_or(false),
        FilterNode::Range { field, bounds } => lookup(doc, field)
            .map(|v| {
                any_value(v, |leaf| {
                    bounds.iter().all(|(op, bound)| range_holds(leaf, *op, bound))
                })
            })
            .unwrap_or(false),
        FilterNode::Bool {
            must,
            must_not,
            should,
        } => {
            must.iter().all(|n| matches(n, doc))
                && !must_not.iter().any(|n| matches(n, doc))
                && (should.is_empty() || should.iter().any(|n| matches(n, doc)))
        }
        FilterNode::QueryString {
            text,
            analyze_wildcards,
        } => query_string_matches(text, *analyze_wildcards, doc),
    }
}

/// Arrays match when any element matches
fn any_value(value: &Json, pred: impl Fn(&Json) -> bool) -> bool {
    match value {
        Json::Array(items) => items.iter().any(pred),
        other => pred(other),
    }
}

/// Equality between a document value and a term value
pub fn scalar_eq(value: &Json, target: &Scalar) -> bool {
    match (value, target) {
        (Json::Bool(a), Scalar::Bool(b)) => a == b,
        (Json::Number(n), Scalar::Int(_) | Scalar::Float(_)) => {
            match (n.as_f64(), target.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        (Json::String(s), Scalar::String(t)) => s == t,
        (Json::String(s), Scalar::Int(_) | Scalar::Float(_)) => {
            match (s.parse::<f64>(), target.as_f64()) {
                (Ok(a), Some(b)) => a == b,
                _ => false,
            }
        }
        (Json::Number(n), Scalar::String(t)) => n.to_string() == *t,
        _ => false,
    }
}

fn range_holds(value: &Json, op: RangeOp, bound: &Scalar) -> bool {
    let Some(ordering) = compare(value, bound) else {
        return false;
    };
    match op {
        RangeOp::Gt => ordering == Ordering::Greater,
        RangeOp::Gte => ordering != Ordering::Less,
        RangeOp::Lt => ordering == Ordering::Less,
        RangeOp::Lte => ordering != Ordering::Greater,
    }
}

/// Order a document value relative to a range bound, if comparable
fn compare(value: &Json, bound: &Scalar) -> Option<Ordering> {
    if let Some(b) = bound.as_f64() {
        let a = match value {
            Json::Number(n) => n.as_f64()?,
            Json::String(s) => s.parse::<f64>().ok()?,
            _ => return None,
        };
        return a.partial_cmp(&b);
    }

    let bound = bound.as_str()?;
    if let Some(bound_time) = resolve_date(bound, Utc::now()) {
        return document_time(value).map(|t| t.cmp(&bound_time));
    }

    value.as_str().map(|s| s.cmp(bound))
}

/// Interpret a document value as a point in time (RFC 3339 or epoch millis)
fn document_time(value: &Json) -> Option<DateTime<Utc>> {
    match value {
        Json::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Json::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// Resolve `now`, `now-30m`, `now+1h` (rounding suffixes like `/d` are ignored)
/// or an RFC 3339 timestamp
pub fn resolve_date(expr: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let Some(rest) = expr.strip_prefix("now") else {
        return DateTime::parse_from_rfc3339(expr)
            .ok()
            .map(|t| t.with_timezone(&Utc));
    };
    let rest = rest.split('/').next().unwrap_or("");
    if rest.is_empty() {
        return Some(now);
    }

    let offset = |amount: &str| {
        humantime::parse_duration(amount)
            .ok()
            .and_then(|d| chrono::Duration::from_std(d).ok())
    };

    if let Some(amount) = rest.strip_prefix('-') {
        now.checked_sub_signed(offset(amount)?)
    } else if let Some(amount) = rest.strip_prefix('+') {
        now.checked_add_signed(offset(amount)?)
    } else {
        None
    }
}

// ============================================================================
// Query strings
// ============================================================================

#[derive(Debug)]
struct QueryTerm {
    field: Option<String>,
    pattern: String,
    negated: bool,
}

/// Split a query string into OR-separated groups of AND-ed terms
fn parse_query_string(text: &str) -> Vec<Vec<QueryTerm>> {
    let cleaned: String = text
        .chars()
        .map(|c| if c == '(' || c == ')' { ' ' } else { c })
        .collect();

    let mut groups = vec![Vec::new()];
    let mut negate_next = false;

    for token in cleaned.split_whitespace() {
        match token {
            "AND" | "&&" => continue,
            "OR" | "||" => {
                groups.push(Vec::new());
                continue;
            }
            "NOT" | "!" => {
                negate_next = true;
                continue;
            }
            _ => {}
        }

        let (negated, token) = match token.strip_prefix('-') {
            Some(rest) if !rest.is_empty() => (true, rest),
            _ => (negate_next, token),
        };
        negate_next = false;

        let (field, pattern) = match token.split_once(':') {
            Some((field, pattern)) if !field.is_empty() => (Some(field.to_string()), pattern),
            _ => (None, token),
        };

        if let Some(group) = groups.last_mut() {
            group.push(QueryTerm {
                field,
                pattern: pattern.trim_matches('"').to_string(),
                negated,
            });
        }
    }

    groups.retain(|g| !g.is_empty());
    groups
}

fn query_string_matches(text: &str, analyze_wildcards: bool, doc: &Json) -> bool {
    let groups = parse_query_string(text);
    if groups.is_empty() {
        return false;
    }

    groups.iter().any(|group| {
        group.iter().all(|term| {
            let found = match &term.field {
                Some(field) => lookup(doc, field)
                    .map(|v| leaf_matches(v, &term.pattern, analyze_wildcards))
                    .unwrap_or(false),
                None => leaf_matches(doc, &term.pattern, analyze_wildcards),
            };
            found != term.negated
        })
    })
}

/// Does any leaf under `value` match the pattern, either whole or by word
fn leaf_matches(value: &Json, pattern: &str, analyze_wildcards: bool) -> bool {
    match value {
        Json::Object(map) => map
            .values()
            .any(|v| leaf_matches(v, pattern, analyze_wildcards)),
        Json::Array(items) => items
            .iter()
            .any(|v| leaf_matches(v, pattern, analyze_wildcards)),
        Json::String(s) => {
            text_matches(s, pattern, analyze_wildcards)
                || s
                    .split_whitespace()
                    .any(|w| text_matches(w, pattern, analyze_wildcards))
                || s
                    .split(|c: char| !c.is_alphanumeric() && c != '_')
                    .filter(|w| !w.is_empty())
                    .any(|w| text_matches(w, pattern, analyze_wildcards))
        }
        Json::Number(n) => text_matches(&n.to_string(), pattern, analyze_wildcards),
        Json::Bool(b) => text_matches(&b.to_string(), pattern, analyze_wildcards),
        Json::Null => false,
    }
}

fn text_matches(text: &str, pattern: &str, analyze_wildcards: bool) -> bool {
    if pattern == "*" {
        return true;
    }
    if pattern.contains(['*', '?']) {
        return wildcard_match(text, pattern, analyze_wildcards);
    }
    text.eq_ignore_ascii_case(pattern)
}

/// Glob match; analyzed wildcards are case-insensitive like analyzed text
fn wildcard_match(text: &str, pattern: &str, case_insensitive: bool) -> bool {
    let mut re = String::with_capacity(pattern.len() + 8);
    if case_insensitive {
        re.push_str("(?i)");
    }
    re.push('^');
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');

    regex::Regex::new(&re)
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}
