//! The checks file
//!
//! ```yaml
//! pool_size: 4
//! checks:
//!   http_errors:
//!     schedule: 5m
//!     alert_schedule: 1m
//!     query:
//!       type: boolfilter
//!       index: "nginx-*"
//!       sort_by: "@timestamp"
//!       clauses:
//!         must:
//!           - term: [status, "500"]
//!           - range: ["@timestamp", gte, now-5m]
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::alerts::CheckDefinition;

/// Parsed checks file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChecksFile {
    /// Worker pool size; the process setting wins when both are given
    #[serde(default)]
    pub pool_size: Option<usize>,
    #[serde(default)]
    checks: BTreeMap<String, CheckDefinition>,
}

impl ChecksFile {
    /// Definitions ordered by id, each id taken from its key
    pub fn definitions(&self) -> Vec<CheckDefinition> {
        self.checks
            .iter()
            .map(|(id, definition)| CheckDefinition {
                id: id.clone(),
                ..definition.clone()
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

/// Parse a checks file from YAML text
pub fn parse_checks(text: &str) -> Result<ChecksFile, ConfigFileError> {
    if text.trim().is_empty() {
        return Ok(ChecksFile::default());
    }
    Ok(serde_yaml::from_str(text)?)
}

/// Read and parse a checks file
pub fn load_checks(path: impl AsRef<Path>) -> Result<ChecksFile, ConfigFileError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let file = parse_checks(&text)?;
    tracing::debug!(path = %path.display(), checks = file.len(), "Loaded checks file");
    Ok(file)
}

/// Checks file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid checks file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertCondition;
    use std::io::Write;

    const CHECKS: &str = r#"
pool_size: 3
checks:
  http_errors:
    schedule: 5m
    alert_schedule: 1m
    alert_onlyonce: false
    query:
      type: boolfilter
      index: "nginx-*"
      sort_by: "@timestamp"
      limit: 5
      clauses:
        must:
          - term: [status, "500"]
        must_not:
          - range: [latency, lt, "10"]
    condition:
      type: hits_above
  disk_full:
    enabled: false
    query:
      type: query_string
      index: metrics
      sort_by: ts
      clauses:
        query: "disk.used_pct:[90 TO *]"
"#;

    #[test]
    fn test_parse_checks() {
        let file = parse_checks(CHECKS).unwrap();
        assert_eq!(file.pool_size, Some(3));
        assert_eq!(file.len(), 2);

        let defs = file.definitions();
        assert_eq!(defs[0].id, "disk_full");
        assert!(!defs[0].enabled);
        assert_eq!(defs[1].id, "http_errors");
        assert_eq!(defs[1].alert_onlyonce, Some(false));
        assert_eq!(defs[1].query.limit, 5);
        assert_eq!(defs[1].condition, AlertCondition::HitsAbove { threshold: None });
        assert_eq!(defs[1].query.translate().unwrap().clause_counts(), (1, 1, 0));
    }

    #[test]
    fn test_empty_and_invalid() {
        let file = parse_checks("").unwrap();
        assert!(file.is_empty());
        assert_eq!(file.pool_size, None);

        assert!(matches!(
            parse_checks("checks: [1, 2"),
            Err(ConfigFileError::Yaml(_))
        ));
        assert!(matches!(
            parse_checks("checks:\n  a:\n    alert_onlyonce: maybe\n"),
            Err(ConfigFileError::Yaml(_))
        ));
    }

    #[test]
    fn test_load_checks_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CHECKS.as_bytes()).unwrap();

        let loaded = load_checks(file.path()).unwrap();
        assert_eq!(loaded.len(), 2);

        let missing = load_checks("/nonexistent/checks.yaml");
        assert!(matches!(missing, Err(ConfigFileError::Io { .. })));
    }
}
