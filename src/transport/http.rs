//! reqwest-backed client for the log query service.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{ApiEnvelope, ApiResult, LogService, TransportError};
use crate::config::ConsoleConfig;
use crate::model::types::{
    Database, HighCharts, IndexDefinition, LogLibrary, LogsPage, PaneId, QueryParams,
};
use crate::orchestrator::CancelToken;

const API_PREFIX: &str = "/api/v1";

#[derive(Debug, Clone)]
pub struct HttpLogService {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct IndexUpdate<'a> {
    data: &'a [IndexDefinition],
}

impl HttpLogService {
    pub fn new(config: &ConsoleConfig) -> Result<Self, TransportError> {
        if !(config.base_url.starts_with("http://") || config.base_url.starts_with("https://")) {
            return Err(TransportError::Url(config.base_url.clone()));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(concat!("logq/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.base_url)
    }

    async fn send<T>(&self, request: RequestBuilder) -> Result<ApiResult<T>, TransportError>
    where
        T: DeserializeOwned + Default,
    {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        let envelope: ApiEnvelope<T> = serde_json::from_slice(&body)?;
        Ok(envelope.into_result())
    }

    async fn send_cancellable<T>(
        &self,
        request: RequestBuilder,
        cancel: CancelToken,
    ) -> Result<ApiResult<T>, TransportError>
    where
        T: DeserializeOwned + Default,
    {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.send(request) => result,
        }
    }

    /// Log libraries stored in a database.
    pub async fn get_table_list(
        &self,
        database_id: i64,
    ) -> Result<ApiResult<Vec<LogLibrary>>, TransportError> {
        let url = self.url(&format!("/databases/{database_id}/tables"));
        self.send(self.client.get(url)).await
    }

    /// Databases, optionally narrowed to one instance.
    pub async fn get_database_list(
        &self,
        instance_id: Option<i64>,
    ) -> Result<ApiResult<Vec<Database>>, TransportError> {
        let mut request = self.client.get(self.url("/databases"));
        if let Some(iid) = instance_id {
            request = request.query(&[("iid", iid)]);
        }
        self.send(request).await
    }

    pub async fn get_indexes(
        &self,
        table_id: i64,
    ) -> Result<ApiResult<Vec<IndexDefinition>>, TransportError> {
        let url = self.url(&format!("/tables/{table_id}/indexes"));
        self.send(self.client.get(url)).await
    }

    pub async fn set_indexes(
        &self,
        table_id: i64,
        indexes: &[IndexDefinition],
    ) -> Result<ApiResult<()>, TransportError> {
        let url = self.url(&format!("/tables/{table_id}/indexes"));
        let request = self.client.patch(url).json(&IndexUpdate { data: indexes });
        let result: ApiResult<serde_json::Value> = self.send(request).await?;
        Ok(result.map(|_| ()))
    }
}

impl LogService for HttpLogService {
    async fn get_logs(
        &self,
        pane: &PaneId,
        params: &QueryParams,
        cancel: CancelToken,
    ) -> Result<ApiResult<LogsPage>, TransportError> {
        debug!(pane_id = %pane, page = params.page, "GET logs");
        let request = self
            .client
            .get(self.url(&format!("/tables/{pane}/logs")))
            .query(params);
        self.send_cancellable(request, cancel).await
    }

    async fn get_high_charts(
        &self,
        pane: &PaneId,
        params: &QueryParams,
        cancel: CancelToken,
    ) -> Result<ApiResult<HighCharts>, TransportError> {
        debug!(pane_id = %pane, "GET charts");
        let request = self
            .client
            .get(self.url(&format!("/tables/{pane}/charts")))
            .query(params);
        self.send_cancellable(request, cancel).await
    }
}
