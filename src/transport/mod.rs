//! Boundary to the log query service.
//!
//! The service answers every call with a `{code, data?, msg?}` envelope where
//! any non-zero `code` is a failure. Envelopes are decoded into [`ApiResult`]
//! here so nothing above this module inspects raw payloads.

pub mod http;

use std::future::Future;

use serde::Deserialize;
use thiserror::Error;

use crate::model::types::{HighCharts, LogsPage, PaneId, QueryParams};
use crate::orchestrator::CancelToken;

pub use http::HttpLogService;

/// Outcome reported by the service for a single call.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResult<T> {
    Success(T),
    Failure { code: i64, message: String },
}

impl<T> ApiResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ApiResult::Success(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            ApiResult::Success(value) => Some(value),
            ApiResult::Failure { .. } => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResult<U> {
        match self {
            ApiResult::Success(value) => ApiResult::Success(f(value)),
            ApiResult::Failure { code, message } => ApiResult::Failure { code, message },
        }
    }
}

/// Wire shape shared by every endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

impl<T: Default> ApiEnvelope<T> {
    /// `code == 0` is success; a missing `data` then decodes as `T::default()`.
    pub fn into_result(self) -> ApiResult<T> {
        if self.code == 0 {
            ApiResult::Success(self.data.unwrap_or_default())
        } else {
            ApiResult::Failure {
                code: self.code,
                message: self.msg,
            }
        }
    }
}

/// Failures below the envelope: the call never produced a usable reply.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request cancelled")]
    Cancelled,

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unexpected http status {0}")]
    Status(u16),

    #[error("invalid service url: {0}")]
    Url(String),
}

impl TransportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled)
    }
}

/// Search and histogram endpoints the orchestrator drives.
///
/// Implementations should stop work once `cancel` fires and answer
/// [`TransportError::Cancelled`]; the orchestrator also races every call
/// against its token, so one that ignores the token is still discarded.
pub trait LogService {
    fn get_logs(
        &self,
        pane: &PaneId,
        params: &QueryParams,
        cancel: CancelToken,
    ) -> impl Future<Output = Result<ApiResult<LogsPage>, TransportError>> + Send;

    fn get_high_charts(
        &self,
        pane: &PaneId,
        params: &QueryParams,
        cancel: CancelToken,
    ) -> impl Future<Output = Result<ApiResult<HighCharts>, TransportError>> + Send;
}
