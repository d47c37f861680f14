//! Searchwatch: scheduled search checks with alerting
//!
//! Periodically runs queries against a search index, evaluates a condition
//! over the results and drives an alert lifecycle per check.
//!
//! # Features
//!
//! - **Query Translation**: YAML clause blocks become typed filter trees
//! - **Per-Check Scheduling**: separate cadences while normal and alerting
//! - **Alert Repetition Control**: alert once per episode or on every cycle, optional end message
//! - **Bounded Dispatch**: a fixed worker pool runs all checks' cycles
//! - **Backends**: Elasticsearch over HTTP, or an in-memory index
//! - **Notifications**: log and webhook targets
//!
//! # Example
//!
//! ```no_run
//! use searchwatch::alerts::{AlertChecker, CheckDefinition};
//! use searchwatch::dispatch::Dispatcher;
//! use searchwatch::search::MemoryIndex;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let index = Arc::new(MemoryIndex::new());
//! index.insert("logs", serde_json::json!({"ts": 1, "level": "ERROR"}));
//!
//! let dispatcher = Arc::new(Dispatcher::start(4));
//! let checker = AlertChecker::new(index, Arc::clone(&dispatcher));
//!
//! let definition = CheckDefinition::new("errors", "logs", "ts")
//!     .with_schedule("5m")
//!     .with_clauses("query_string", serde_yaml::from_str("{query: 'level:ERROR'}")?);
//! checker.register(definition)?;
//!
//! // ...
//! checker.shutdown().await;
//! dispatcher.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod api;
pub mod config;
pub mod dispatch;
pub mod query;
pub mod search;

// Re-export commonly used types
pub use alerts::{AlertChecker, CheckDefinition, CheckError};
pub use dispatch::{DispatchError, Dispatcher};
pub use query::{translate, FilterNode, TranslateError};
pub use search::{SearchBackend, SearchError, SearchRequest, SearchResult};
