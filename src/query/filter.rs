//! Filter expression handling for the log search bar.
//!
//! A raw filter is a flat list of clauses joined by the literal ` and `:
//!
//! ```text
//! `status`='500' and _raw_log_ like '%timeout%' and host!='edge-1'
//! ```
//!
//! Two operations live here:
//!
//! - [`parse`] extracts [`FilterClause`]s for highlighting matched values in
//!   returned rows. It is best-effort: fragments that do not look like
//!   `key op 'value'` are dropped, never reported.
//! - [`upsert_clause`] rewrites a raw filter when a quick-filter action adds a
//!   clause, keeping at most one clause per key.
//!
//! Neither feeds back into what the server sees beyond the rewritten string.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::types::{FilterClause, Operator};

/// Delimiter between clauses of a raw filter.
pub const CLAUSE_DELIMITER: &str = " and ";

/// Column holding the unparsed log line.
pub const RAW_LOG_FIELD: &str = "_raw_log_";

/// Suffix the time picker appends to timestamps; the server expects naive times.
const SHANGHAI_OFFSET_SUFFIX: &str = "+08:00'";

static CLAUSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([^\s'=!]+)(?:\s*(!=|=)\s*|\s+((?i:not\s+like|like))\s+)'([^']+)'")
        .expect("clause regex")
});

static OPERATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(!=|=|\s+not\s+like\s+|\s+like\s+)").expect("operator regex"));

/// Result of matching a single ` and `-separated fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// One or more clauses recognized inside the fragment.
    Clauses(Vec<FilterClause>),
    /// Nothing recognizable; the fragment contributes no clauses.
    Dropped(String),
}

/// Lex a raw filter fragment by fragment, keeping the dropped ones visible.
pub fn lex(raw: &str) -> Vec<Fragment> {
    raw.split(CLAUSE_DELIMITER)
        .filter(|fragment| !fragment.trim().is_empty())
        .map(|fragment| {
            let unquoted = fragment.replace('`', "");
            let clauses: Vec<FilterClause> = CLAUSE_RE
                .captures_iter(&unquoted)
                .map(|caps| {
                    let operator = match (caps.get(2), caps.get(3)) {
                        (Some(op), _) if op.as_str() == "!=" => Operator::Neq,
                        (Some(_), _) => Operator::Eq,
                        (None, Some(word)) if word.as_str().to_ascii_lowercase().starts_with("not") => {
                            Operator::NotLike
                        }
                        _ => Operator::Like,
                    };
                    FilterClause {
                        key: caps[1].to_string(),
                        operator,
                        value: caps[4].to_string(),
                    }
                })
                .collect();
            if clauses.is_empty() {
                Fragment::Dropped(fragment.to_string())
            } else {
                Fragment::Clauses(clauses)
            }
        })
        .collect()
}

/// Extract highlightable clauses from a raw filter, in input order.
///
/// Duplicates are kept. Unrecognized fragments are skipped.
pub fn parse(raw: &str) -> Vec<FilterClause> {
    lex(raw)
        .into_iter()
        .flat_map(|fragment| match fragment {
            Fragment::Clauses(clauses) => clauses,
            Fragment::Dropped(text) => {
                tracing::trace!(fragment = %text, "filter fragment dropped");
                Vec::new()
            }
        })
        .collect()
}

/// Comparison key of a clause: the text in front of its first operator,
/// without back-ticks. Clauses without an operator compare on their full text.
fn clause_key(clause: &str) -> String {
    let unquoted = clause.replace('`', "");
    let head = match OPERATOR_RE.find(&unquoted) {
        Some(m) => &unquoted[..m.start()],
        None => unquoted.as_str(),
    };
    head.trim().to_string()
}

/// Strip the `+08:00` offset from a clause ending in `+08:00'`.
///
/// Only that literal offset is recognized; anything else passes through.
pub fn strip_offset_suffix(clause: &str) -> String {
    match clause.strip_suffix(SHANGHAI_OFFSET_SUFFIX) {
        Some(head) => format!("{head}'"),
        None => clause.to_string(),
    }
}

/// Insert `new_clause` into `raw`, replacing every existing clause on the same key.
///
/// The new clause always ends up last. An empty `raw` yields the clause alone.
pub fn upsert_clause(raw: &str, new_clause: &str) -> String {
    let new_clause = strip_offset_suffix(new_clause.trim());
    let key = clause_key(&new_clause);

    let mut kept: Vec<&str> = raw
        .split(CLAUSE_DELIMITER)
        .filter(|existing| !existing.trim().is_empty())
        .filter(|existing| clause_key(existing) != key)
        .collect();
    kept.push(&new_clause);
    kept.join(CLAUSE_DELIMITER)
}

/// Column a quick filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseTarget<'a> {
    /// Substring match against the raw log line.
    RawLog,
    /// Substring match against a parsed field.
    Field(&'a str),
    /// Exact match against an indexed column.
    Index(&'a str),
}

/// Clause that keeps rows containing `value`.
pub fn inclusion_clause(value: &str, target: ClauseTarget<'_>) -> String {
    match target {
        ClauseTarget::Index(index) => format!("`{index}`='{value}'"),
        ClauseTarget::Field(key) => format!("`{key}` like '%{value}%'"),
        ClauseTarget::RawLog => format!("{RAW_LOG_FIELD} like '%{value}%'"),
    }
}

/// Clause that drops rows containing `value`.
pub fn exclusion_clause(value: &str, target: ClauseTarget<'_>) -> String {
    match target {
        ClauseTarget::Index(index) => format!("`{index}`!='{value}'"),
        ClauseTarget::Field(key) => format!("`{key}` not like '%{value}%'"),
        ClauseTarget::RawLog => format!("{RAW_LOG_FIELD} not like '%{value}%'"),
    }
}

/// True when `text` is a JSON object or array. Any parse failure is `false`.
pub fn is_json(text: &str) -> bool {
    matches!(
        serde_json::from_str::<serde_json::Value>(text),
        Ok(serde_json::Value::Object(_) | serde_json::Value::Array(_))
    )
}
