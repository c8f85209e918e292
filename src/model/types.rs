//! Plain data shared by the parser, pane registry and orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Page number a pane falls back to whenever its filter or window changes.
pub const FIRST_PAGE: u32 = 1;

/// Rows per page when nothing else is configured.
pub const PAGE_SIZE: u32 = 10;

/// Index of the "last 15 minutes" entry in the relative time picker.
pub const ACTIVE_TIME_INDEX: usize = 2;

/// Width of the default relative window, in minutes.
pub const DEFAULT_RELATIVE_MINUTES: i64 = 15;

/// Comparison operator of a single filter clause.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Eq,
    Neq,
    Like,
    NotLike,
}

impl Operator {
    /// Textual form as it appears inside a raw filter expression.
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Neq => "!=",
            Operator::Like => " like ",
            Operator::NotLike => " not like ",
        }
    }
}

/// One `key operator 'value'` fragment extracted from a raw filter.
///
/// Clauses only drive highlighting; they are never serialized back into the
/// query that goes to the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterClause {
    pub key: String,
    pub operator: Operator,
    pub value: String,
}

/// Identifier of an open pane, derived from the log library it shows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaneId(String);

impl PaneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for PaneId {
    fn from(library_id: i64) -> Self {
        Self(library_id.to_string())
    }
}

impl From<&str> for PaneId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PaneId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Closed query window in unix seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Window of `minutes` ending at `now`. Saturates instead of overflowing.
    pub fn last_minutes(minutes: i64, now: i64) -> Self {
        Self {
            start: now.saturating_sub(minutes.saturating_mul(60)),
            end: now,
        }
    }

    /// Default relative window ending at the current wall clock.
    pub fn default_relative() -> Self {
        Self::last_minutes(DEFAULT_RELATIVE_MINUTES, chrono::Utc::now().timestamp())
    }
}

/// Which time picker tab produced the pane's window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeRangeType {
    #[default]
    Relative,
    Absolute,
}

/// Raw log listing or aggregated SQL view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    #[default]
    Log,
    Table,
}

/// Pagination cursor. Pages are 1-based.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            number: FIRST_PAGE,
            size: PAGE_SIZE,
        }
    }
}

/// One page of log rows as returned by the logs endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LogsPage {
    #[serde(default)]
    pub logs: Vec<serde_json::Value>,
    /// SQL the server actually ran for this page.
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub keys: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistogramBucket {
    pub count: u64,
    pub from: i64,
    pub to: i64,
}

/// Histogram series plus the authoritative total for the filter and window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct HighCharts {
    pub count: u64,
    #[serde(default)]
    pub histograms: Vec<HistogramBucket>,
}

/// Request payload shared by the logs and histogram endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryParams {
    pub st: i64,
    pub et: i64,
    pub query: String,
    pub page: u32,
    #[serde(rename = "pageSize")]
    pub page_size: u32,
}

/// Log library (table) as listed by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogLibrary {
    pub id: i64,
    pub table_name: String,
    #[serde(default)]
    pub create_type: i32,
    #[serde(default)]
    pub desc: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub iid: i64,
    #[serde(default)]
    pub instance_name: String,
}

/// Secondary index definition on a log library column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IndexDefinition {
    pub field: String,
    #[serde(default)]
    pub alias: String,
    pub typ: i32,
    #[serde(default)]
    pub root_name: String,
}
