//! Open query tabs and the registry that owns them.
//!
//! Every change to a pane (filter edits, time window, pagination, fetch
//! completion) goes through [`PaneRegistry::update_pane`]. The merge keeps
//! `logs` and `high_charts` describing the same `(keyword, time_range)`
//! snapshot: a patch that moves either of those without carrying fresh
//! results clears both in the same step, so a reader never sees results
//! from a previous filter next to the new one.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::types::{
    ACTIVE_TIME_INDEX, FIRST_PAGE, FilterClause, HighCharts, LogsPage, PAGE_SIZE, Page, PaneId,
    QueryParams, QueryType, TimeRange, TimeRangeType,
};
use crate::query::filter;

/// One open log search tab.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogPane {
    pub id: PaneId,
    /// Raw filter text as typed or rewritten by quick filters.
    pub keyword: String,
    pub time_range: TimeRange,
    pub page: Page,
    pub active_tab_key: TimeRangeType,
    pub active_time_option_index: usize,
    /// Last fetched page of rows, if any.
    pub logs: Option<LogsPage>,
    /// Last fetched histogram and total count, if any.
    pub high_charts: Option<HighCharts>,
    /// Whether refreshes also fetch the histogram.
    pub histogram_checked: bool,
    pub query_type: QueryType,
}

impl LogPane {
    fn with_defaults(id: PaneId, page_size: u32) -> Self {
        Self {
            id,
            keyword: String::new(),
            time_range: TimeRange::default_relative(),
            page: Page {
                number: FIRST_PAGE,
                size: page_size,
            },
            active_tab_key: TimeRangeType::Relative,
            active_time_option_index: ACTIVE_TIME_INDEX,
            logs: None,
            high_charts: None,
            histogram_checked: true,
            query_type: QueryType::Log,
        }
    }

    /// Clauses to highlight in this pane's rows.
    pub fn highlights(&self) -> Vec<FilterClause> {
        filter::parse(&self.keyword)
    }

    /// Request payload for the pane's current filter, window and page.
    pub fn query_params(&self) -> QueryParams {
        QueryParams {
            st: self.time_range.start,
            et: self.time_range.end,
            query: self.keyword.clone(),
            page: self.page.number,
            page_size: self.page.size,
        }
    }

    /// Total row count for the current filter, when a histogram has been fetched.
    pub fn total(&self) -> Option<u64> {
        self.high_charts.as_ref().map(|hc| hc.count)
    }
}

/// Partial update for a pane. `None` fields are left as they are.
///
/// `logs` and `high_charts` are doubly optional so a patch can clear them
/// (`Some(None)`) as well as set them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanePatch {
    pub keyword: Option<String>,
    pub time_range: Option<TimeRange>,
    pub page: Option<Page>,
    pub active_tab_key: Option<TimeRangeType>,
    pub active_time_option_index: Option<usize>,
    pub logs: Option<Option<LogsPage>>,
    pub high_charts: Option<Option<HighCharts>>,
    pub histogram_checked: Option<bool>,
    pub query_type: Option<QueryType>,
}

impl PanePatch {
    pub fn keyword(keyword: impl Into<String>) -> Self {
        Self {
            keyword: Some(keyword.into()),
            ..Self::default()
        }
    }

    pub fn time_range(range: TimeRange) -> Self {
        Self {
            time_range: Some(range),
            ..Self::default()
        }
    }

    /// Store freshly fetched results.
    pub fn results(logs: LogsPage, high_charts: Option<HighCharts>) -> Self {
        Self {
            logs: Some(Some(logs)),
            high_charts: Some(high_charts),
            ..Self::default()
        }
    }

    /// Clear both result slots.
    pub fn cleared_results() -> Self {
        Self {
            logs: Some(None),
            high_charts: Some(None),
            ..Self::default()
        }
    }

    pub fn with_page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    pub fn with_histogram_checked(mut self, checked: bool) -> Self {
        self.histogram_checked = Some(checked);
        self
    }

    fn carries_results(&self) -> bool {
        self.logs.is_some() || self.high_charts.is_some()
    }
}

/// Owner of every open pane for one console session.
#[derive(Debug, Clone)]
pub struct PaneRegistry {
    panes: HashMap<PaneId, LogPane>,
    page_size: u32,
}

impl Default for PaneRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PaneRegistry {
    pub fn new() -> Self {
        Self::with_page_size(PAGE_SIZE)
    }

    /// Registry whose new panes start with `page_size` rows per page.
    pub fn with_page_size(page_size: u32) -> Self {
        Self {
            panes: HashMap::new(),
            page_size: page_size.max(1),
        }
    }

    pub fn get(&self, id: &PaneId) -> Option<&LogPane> {
        self.panes.get(id)
    }

    pub fn contains(&self, id: &PaneId) -> bool {
        self.panes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.panes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panes.is_empty()
    }

    /// Ids of all open panes, sorted.
    pub fn ids(&self) -> Vec<PaneId> {
        let mut ids: Vec<PaneId> = self.panes.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Open a pane for a log library, or return the existing one untouched.
    pub fn open_pane(&mut self, id: PaneId) -> &LogPane {
        let page_size = self.page_size;
        self.panes
            .entry(id.clone())
            .or_insert_with(|| LogPane::with_defaults(id, page_size))
    }

    /// Drop a pane when its tab closes.
    pub fn close_pane(&mut self, id: &PaneId) -> Option<LogPane> {
        self.panes.remove(id)
    }

    /// Merge `patch` into the pane, creating it from defaults if absent.
    ///
    /// If the patch moves `keyword` or `time_range` and does not itself carry
    /// results, the stored `logs` and `high_charts` are cleared together.
    pub fn update_pane(&mut self, id: &PaneId, patch: PanePatch) -> &LogPane {
        let page_size = self.page_size;
        let pane = self
            .panes
            .entry(id.clone())
            .or_insert_with(|| LogPane::with_defaults(id.clone(), page_size));

        let snapshot_moved = patch.keyword.as_ref().is_some_and(|k| *k != pane.keyword)
            || patch.time_range.is_some_and(|r| r != pane.time_range);
        if snapshot_moved && !patch.carries_results() {
            pane.logs = None;
            pane.high_charts = None;
        }

        if let Some(keyword) = patch.keyword {
            pane.keyword = keyword;
        }
        if let Some(range) = patch.time_range {
            pane.time_range = range;
        }
        if let Some(page) = patch.page {
            pane.page = page;
        }
        if let Some(tab) = patch.active_tab_key {
            pane.active_tab_key = tab;
        }
        if let Some(index) = patch.active_time_option_index {
            pane.active_time_option_index = index;
        }
        if let Some(logs) = patch.logs {
            pane.logs = logs;
        }
        if let Some(high_charts) = patch.high_charts {
            pane.high_charts = high_charts;
        }
        if let Some(checked) = patch.histogram_checked {
            pane.histogram_checked = checked;
        }
        if let Some(query_type) = patch.query_type {
            pane.query_type = query_type;
        }
        pane
    }

    /// Replace the whole pane map with `panes`, then apply `patch` to `id`.
    ///
    /// Used when a caller has rebuilt the tab set (e.g. after reordering or
    /// restoring tabs) and wants the update applied on top of that set.
    pub fn update_pane_in(
        &mut self,
        panes: HashMap<PaneId, LogPane>,
        id: &PaneId,
        patch: PanePatch,
    ) -> &LogPane {
        self.panes = panes;
        self.update_pane(id, patch)
    }

    /// Clear a pane's results without touching its filter, window or page.
    pub fn reset_pane_results(&mut self, id: &PaneId) {
        if let Some(pane) = self.panes.get_mut(id) {
            pane.logs = None;
            pane.high_charts = None;
        }
    }

    /// Move to `number`, or back to the first page when the page size changes.
    pub fn change_page(&mut self, id: &PaneId, number: u32, size: u32) -> Option<&LogPane> {
        let size = size.max(1);
        let current = self.panes.get(id)?.page;
        let page = if size != current.size {
            Page {
                number: FIRST_PAGE,
                size,
            }
        } else {
            Page {
                number: number.max(FIRST_PAGE),
                size,
            }
        };
        Some(self.update_pane(
            id,
            PanePatch {
                page: Some(page),
                ..PanePatch::default()
            },
        ))
    }

    /// Snapshot of every pane, for callers that rebuild the tab set.
    pub fn snapshot(&self) -> HashMap<PaneId, LogPane> {
        self.panes.clone()
    }
}
