//! Request orchestration for log panes.
//!
//! [`QueryOrchestrator`] issues the logs and histogram requests for a pane,
//! cancels whatever request of the same pane it replaces, and folds the
//! replies back into the [`PaneRegistry`] it owns.
//!
//! Rules it keeps:
//!
//! - per pane and per [`RequestKind`] there is at most one outstanding
//!   request; issuing a new one cancels the old one, so the newest user
//!   action always wins;
//! - a cancelled or superseded reply is dropped quietly, without touching
//!   pane state;
//! - a combined fetch is all-or-nothing: if either half reports failure the
//!   pane's results are cleared rather than left half-updated.
//!
//! Timeouts belong to the transport; nothing here imposes one.

pub mod cancel;

use std::future::Future;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::model::types::{
    FIRST_PAGE, FilterClause, HighCharts, LogsPage, Page, PaneId, QueryParams,
};
use crate::panes::{LogPane, PanePatch, PaneRegistry};
use crate::query::filter;
use crate::transport::{ApiResult, LogService, TransportError};

pub use cancel::{CancelHandle, CancelToken, InFlight, RequestKind, cancel_pair};

/// Request fields that take precedence over the pane's stored state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOverrides {
    pub st: Option<i64>,
    pub et: Option<i64>,
    pub keyword: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl QueryOverrides {
    fn apply(&self, mut params: QueryParams) -> QueryParams {
        if let Some(st) = self.st {
            params.st = st;
        }
        if let Some(et) = self.et {
            params.et = et;
        }
        if let Some(keyword) = &self.keyword {
            params.query = keyword.clone();
        }
        if let Some(page) = self.page {
            params.page = page;
        }
        if let Some(size) = self.page_size {
            params.page_size = size;
        }
        params
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Pure pagination: the histogram cannot change, so it is not refetched.
    pub is_paging: bool,
    /// Caller only wants rows this time.
    pub is_only_log: bool,
    pub overrides: QueryOverrides,
}

impl FetchOptions {
    pub fn paging() -> Self {
        Self {
            is_paging: true,
            ..Self::default()
        }
    }

    pub fn only_log() -> Self {
        Self {
            is_only_log: true,
            ..Self::default()
        }
    }
}

/// Rows and histogram describing one `(keyword, window)` snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub logs: LogsPage,
    /// Fresh on a combined fetch; the pane's stored value on a logs-only one.
    pub high_charts: Option<HighCharts>,
    /// Payload the request was issued with.
    pub params: QueryParams,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Ready(FetchResult),
    /// The service reported failure or the request failed below it.
    Failed,
    /// A newer request for the pane replaced this one, or the pane closed.
    Superseded,
    UnknownPane,
}

impl FetchOutcome {
    /// Collapse to "results or nothing".
    pub fn into_result(self) -> Option<FetchResult> {
        match self {
            FetchOutcome::Ready(result) => Some(result),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, FetchOutcome::Ready(_))
    }
}

/// What a quick-filter action did to the pane.
#[derive(Debug, Clone, PartialEq)]
pub struct QuickFilterUpdate {
    pub keyword: String,
    pub highlights: Vec<FilterClause>,
    pub outcome: FetchOutcome,
}

enum Leg<T> {
    Done(T),
    Failed,
    Cancelled,
}

pub struct QueryOrchestrator<S> {
    service: S,
    registry: Mutex<PaneRegistry>,
    in_flight: Mutex<InFlight>,
}

impl<S: LogService> QueryOrchestrator<S> {
    pub fn new(service: S, registry: PaneRegistry) -> Self {
        Self {
            service,
            registry: Mutex::new(registry),
            in_flight: Mutex::new(InFlight::new()),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Copy of the pane as it is right now.
    pub fn pane(&self, id: &PaneId) -> Option<LogPane> {
        self.registry.lock().get(id).cloned()
    }

    pub fn open_pane(&self, id: PaneId) -> LogPane {
        self.registry.lock().open_pane(id).clone()
    }

    /// Close a pane and cancel anything still outstanding for it.
    pub fn close_pane(&self, id: &PaneId) -> Option<LogPane> {
        self.in_flight.lock().cancel_pane(id);
        self.registry.lock().close_pane(id)
    }

    pub fn update_pane(&self, id: &PaneId, patch: PanePatch) -> LogPane {
        self.registry.lock().update_pane(id, patch).clone()
    }

    pub fn reset_pane_results(&self, id: &PaneId) {
        self.registry.lock().reset_pane_results(id);
    }

    /// Run `f` with exclusive access to the registry. Do not await inside.
    pub fn with_registry<R>(&self, f: impl FnOnce(&mut PaneRegistry) -> R) -> R {
        f(&mut self.registry.lock())
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    async fn run<T, F>(
        &self,
        id: &PaneId,
        kind: RequestKind,
        seq: u64,
        token: CancelToken,
        call: F,
    ) -> Leg<T>
    where
        F: Future<Output = Result<ApiResult<T>, TransportError>>,
    {
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(TransportError::Cancelled),
            result = call => result,
        };

        let still_current = self.in_flight.lock().finish(id, kind, seq);
        if !still_current {
            debug!(pane_id = %id, kind = kind.as_str(), "superseded response dropped");
            return Leg::Cancelled;
        }

        match result {
            Ok(ApiResult::Success(value)) => Leg::Done(value),
            Ok(ApiResult::Failure { code, message }) => {
                warn!(pane_id = %id, kind = kind.as_str(), code, reason = %message, "query service reported failure");
                Leg::Failed
            }
            Err(err) if err.is_cancelled() => {
                debug!(pane_id = %id, kind = kind.as_str(), "request cancelled");
                Leg::Cancelled
            }
            Err(err) => {
                warn!(pane_id = %id, kind = kind.as_str(), error = %err, "request failed");
                Leg::Failed
            }
        }
    }

    /// Fetch rows, and the histogram unless this is paging, logs-only, or the
    /// pane has the histogram switched off.
    ///
    /// Does not touch pane state; see [`QueryOrchestrator::refresh`].
    pub async fn fetch_logs_and_histogram(
        &self,
        id: &PaneId,
        options: FetchOptions,
    ) -> FetchOutcome {
        let Some(pane) = self.pane(id) else {
            return FetchOutcome::UnknownPane;
        };
        let params = options.overrides.apply(pane.query_params());
        let logs_only = options.is_paging || options.is_only_log || !pane.histogram_checked;

        if logs_only {
            let (seq, token) = {
                let mut in_flight = self.in_flight.lock();
                in_flight.cancel(id, RequestKind::Histogram);
                in_flight.issue(id, RequestKind::Logs)
            };
            let call = self.service.get_logs(id, &params, token.clone());
            let leg = self.run(id, RequestKind::Logs, seq, token, call).await;
            return match leg {
                Leg::Done(logs) => FetchOutcome::Ready(FetchResult {
                    logs,
                    high_charts: pane.high_charts,
                    params,
                }),
                Leg::Failed => FetchOutcome::Failed,
                Leg::Cancelled => FetchOutcome::Superseded,
            };
        }

        let ((logs_seq, logs_token), (hist_seq, hist_token)) = {
            let mut in_flight = self.in_flight.lock();
            (
                in_flight.issue(id, RequestKind::Logs),
                in_flight.issue(id, RequestKind::Histogram),
            )
        };
        let logs_call = self.service.get_logs(id, &params, logs_token.clone());
        let hist_call = self.service.get_high_charts(id, &params, hist_token.clone());
        let (logs, high_charts) = tokio::join!(
            self.run(id, RequestKind::Logs, logs_seq, logs_token, logs_call),
            self.run(id, RequestKind::Histogram, hist_seq, hist_token, hist_call),
        );

        match (logs, high_charts) {
            (Leg::Cancelled, _) | (_, Leg::Cancelled) => FetchOutcome::Superseded,
            (Leg::Done(logs), Leg::Done(high_charts)) => FetchOutcome::Ready(FetchResult {
                logs,
                high_charts: Some(high_charts),
                params,
            }),
            _ => FetchOutcome::Failed,
        }
    }

    /// Fetch and store the results into the pane.
    ///
    /// Ready results are stored only if the pane still shows the keyword and
    /// window it had when the fetch started; overrides in `options` do not
    /// count as a change. A failure clears the pane's results.
    pub async fn refresh(&self, id: &PaneId, options: FetchOptions) -> FetchOutcome {
        let Some(started) = self.pane(id) else {
            return FetchOutcome::UnknownPane;
        };
        let outcome = self.fetch_logs_and_histogram(id, options).await;
        match &outcome {
            FetchOutcome::Ready(result) => {
                let mut registry = self.registry.lock();
                let matches = registry.get(id).is_some_and(|pane| {
                    pane.keyword == started.keyword && pane.time_range == started.time_range
                });
                if !matches {
                    debug!(pane_id = %id, "pane moved on before results arrived");
                    return FetchOutcome::Superseded;
                }
                registry.update_pane(
                    id,
                    PanePatch::results(result.logs.clone(), result.high_charts.clone()),
                );
            }
            FetchOutcome::Failed => self.reset_pane_results(id),
            FetchOutcome::Superseded | FetchOutcome::UnknownPane => {}
        }
        outcome
    }

    /// Move a pane to another page and fetch only its rows.
    pub async fn change_page(&self, id: &PaneId, number: u32, size: u32) -> FetchOutcome {
        if self.with_registry(|registry| registry.change_page(id, number, size).is_none()) {
            return FetchOutcome::UnknownPane;
        }
        self.refresh(id, FetchOptions::paging()).await
    }

    /// Rewrite the pane's filter with a quick-filter clause and refetch from
    /// the first page. `None` if the pane is not open.
    pub async fn apply_quick_filter(&self, id: &PaneId, clause: &str) -> Option<QuickFilterUpdate> {
        let pane = self.pane(id)?;
        let keyword = filter::upsert_clause(&pane.keyword, clause);
        self.update_pane(
            id,
            PanePatch::keyword(keyword.clone()).with_page(Page {
                number: FIRST_PAGE,
                size: pane.page.size,
            }),
        );
        let outcome = self.refresh(id, FetchOptions::default()).await;
        Some(QuickFilterUpdate {
            highlights: filter::parse(&keyword),
            keyword,
            outcome,
        })
    }
}
