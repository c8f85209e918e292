use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use log_query_console::model::types::{
    HighCharts, HistogramBucket, LogsPage, PaneId, QueryParams,
};
use log_query_console::orchestrator::CancelToken;
use log_query_console::transport::{ApiResult, LogService, TransportError};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// How the fake service answers one call.
#[allow(dead_code)]
pub enum Reply<T> {
    Api(ApiResult<T>),
    Broken,
}

/// One scripted answer, delivered after `delay`.
pub struct Scripted<T> {
    pub delay: Duration,
    pub reply: Reply<T>,
}

#[allow(dead_code)]
impl<T> Scripted<T> {
    pub fn ok(value: T) -> Self {
        Self {
            delay: Duration::ZERO,
            reply: Reply::Api(ApiResult::Success(value)),
        }
    }

    pub fn failure(code: i64, message: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            reply: Reply::Api(ApiResult::Failure {
                code,
                message: message.to_string(),
            }),
        }
    }

    pub fn broken() -> Self {
        Self {
            delay: Duration::ZERO,
            reply: Reply::Broken,
        }
    }

    pub fn after(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }
}

/// Fake log service answering from per-endpoint scripts.
///
/// Unscripted calls succeed immediately with a page echoing the query.
/// When `honor_cancel` is off the fake ignores its token, the way a
/// transport that cannot abort would.
#[derive(Default)]
pub struct ScriptedService {
    logs: Mutex<VecDeque<Scripted<LogsPage>>>,
    charts: Mutex<VecDeque<Scripted<HighCharts>>>,
    pub honor_cancel: bool,
    pub log_calls: AtomicUsize,
    pub chart_calls: AtomicUsize,
    pub seen: Mutex<Vec<QueryParams>>,
}

#[allow(dead_code)]
impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn honoring_cancel() -> Self {
        Self {
            honor_cancel: true,
            ..Self::default()
        }
    }

    pub fn script_logs(self, step: Scripted<LogsPage>) -> Self {
        self.logs.lock().unwrap().push_back(step);
        self
    }

    pub fn script_charts(self, step: Scripted<HighCharts>) -> Self {
        self.charts.lock().unwrap().push_back(step);
        self
    }

    pub fn log_calls(&self) -> usize {
        self.log_calls.load(Ordering::SeqCst)
    }

    pub fn chart_calls(&self) -> usize {
        self.chart_calls.load(Ordering::SeqCst)
    }

    async fn answer<T>(
        &self,
        step: Option<Scripted<T>>,
        fallback: T,
        cancel: CancelToken,
    ) -> Result<ApiResult<T>, TransportError> {
        let step = step.unwrap_or(Scripted::ok(fallback));
        if self.honor_cancel {
            tokio::select! {
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                _ = tokio::time::sleep(step.delay) => {}
            }
        } else {
            tokio::time::sleep(step.delay).await;
        }
        match step.reply {
            Reply::Api(result) => Ok(result),
            Reply::Broken => Err(TransportError::Status(502)),
        }
    }
}

impl LogService for ScriptedService {
    async fn get_logs(
        &self,
        _pane: &PaneId,
        params: &QueryParams,
        cancel: CancelToken,
    ) -> Result<ApiResult<LogsPage>, TransportError> {
        self.log_calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(params.clone());
        let step = self.logs.lock().unwrap().pop_front();
        self.answer(step, logs_page(&params.query, &["echo"]), cancel)
            .await
    }

    async fn get_high_charts(
        &self,
        _pane: &PaneId,
        _params: &QueryParams,
        cancel: CancelToken,
    ) -> Result<ApiResult<HighCharts>, TransportError> {
        self.chart_calls.fetch_add(1, Ordering::SeqCst);
        let step = self.charts.lock().unwrap().pop_front();
        self.answer(step, high_charts(0), cancel).await
    }
}

/// Page of rows whose `_raw_log_` values are `rows`.
pub fn logs_page(query: &str, rows: &[&str]) -> LogsPage {
    LogsPage {
        logs: rows.iter().map(|row| json!({ "_raw_log_": row })).collect(),
        query: query.to_string(),
        keys: vec![],
    }
}

pub fn high_charts(count: u64) -> HighCharts {
    HighCharts {
        count,
        histograms: vec![HistogramBucket {
            count,
            from: 0,
            to: 60,
        }],
    }
}

/// Request line and body as seen by [`CannedServer`].
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub target: String,
    pub body: String,
}

/// Local HTTP/1.1 server answering every request with one fixed reply.
#[allow(dead_code)]
pub struct CannedServer {
    pub base_url: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    task: tokio::task::JoinHandle<()>,
}

#[allow(dead_code)]
impl CannedServer {
    pub async fn start(status: u16, body: impl Into<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let body = body.into();
        let task = tokio::spawn({
            let seen = seen.clone();
            async move {
                while let Ok((mut stream, _)) = listener.accept().await {
                    if let Some(request) = read_request(&mut stream).await {
                        seen.lock().unwrap().push(request);
                    }
                    let reply = format!(
                        "HTTP/1.1 {status} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        if status == 200 { "OK" } else { "Error" },
                        body.len()
                    );
                    let _ = stream.write_all(reply.as_bytes()).await;
                    let _ = stream.shutdown().await;
                }
            }
        });
        Self {
            base_url: format!("http://{addr}"),
            seen,
            task,
        }
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl Drop for CannedServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn read_request(stream: &mut TcpStream) -> Option<SeenRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break end;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let body_start = head_end + 4;
    while buf.len() < body_start + length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let mut request_line = head.lines().next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let body_end = buf.len().min(body_start + length);
    Some(SeenRequest {
        method,
        target,
        body: String::from_utf8_lossy(&buf[body_start..body_end]).to_string(),
    })
}
