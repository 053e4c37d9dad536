//! Request/response calls to the game (planning) service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reachgrid::grid::Cell;
use reachgrid::input::Direction;
use reachgrid::protocol::{
    InitializeRequest, InitializeResponse, MapPayload, Policy, UpdateRequest,
};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("cannot build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} answered {status}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
    },
}

/// Tuning constants forwarded verbatim to `initialize`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannerParams {
    pub gamma: f64,
    pub theta: f64,
}

impl Default for PlannerParams {
    fn default() -> Self {
        Self {
            gamma: 0.9,
            theta: 0.1,
        }
    }
}

#[async_trait]
pub trait GameService: Send + Sync {
    /// Build the policy for a freshly received map.
    async fn initialize(
        &self,
        map: &MapPayload,
        start: Cell,
        params: PlannerParams,
    ) -> Result<Policy, ServiceError>;

    /// Report one accepted move. The answer is informational only; the held
    /// policy is never replaced by it.
    async fn report_transition(
        &self,
        state: Cell,
        action: Direction,
        policy: &Policy,
    ) -> Result<(), ServiceError>;
}

#[derive(Debug, Clone)]
pub struct HttpGameService {
    http: Client,
    base_url: String,
}

impl HttpGameService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ServiceError::Client)?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: serde::Serialize + Sync>(
        &self,
        endpoint: &'static str,
        body: &B,
    ) -> Result<reqwest::Response, ServiceError> {
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, endpoint))
            .json(body)
            .send()
            .await
            .map_err(|source| ServiceError::Http { endpoint, source })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ServiceError::Status { endpoint, status });
        }
        Ok(resp)
    }
}

#[async_trait]
impl GameService for HttpGameService {
    async fn initialize(
        &self,
        map: &MapPayload,
        start: Cell,
        params: PlannerParams,
    ) -> Result<Policy, ServiceError> {
        let body = InitializeRequest {
            custom_map: map,
            goal: start.to_array(),
            gamma: params.gamma,
            theta: params.theta,
        };
        let endpoint = "/initialize";
        let resp = self.post(endpoint, &body).await?;
        let parsed: InitializeResponse = resp
            .json()
            .await
            .map_err(|source| ServiceError::Http { endpoint, source })?;
        Ok(parsed.policy)
    }

    async fn report_transition(
        &self,
        state: Cell,
        action: Direction,
        policy: &Policy,
    ) -> Result<(), ServiceError> {
        let body = UpdateRequest {
            state: state.to_array(),
            action: action.as_action(),
            policy,
        };
        let endpoint = "/update";
        let resp = self.post(endpoint, &body).await?;
        // Body is optional and unused; a non-JSON answer is not an error.
        match resp.json::<Value>().await {
            Ok(v) => debug!("update answered: {}", v),
            Err(e) => debug!("update answer ignored: {}", e),
        }
        Ok(())
    }
}

struct Transition {
    state: Cell,
    action: Direction,
    policy: Arc<Policy>,
}

/// Sending half of a [`Reporter`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ReportQueue {
    tx: mpsc::UnboundedSender<Transition>,
}

impl ReportQueue {
    /// Queue one accepted move behind every earlier one.
    pub fn push(&self, state: Cell, action: Direction, policy: Arc<Policy>) {
        let queued = self.tx.send(Transition {
            state,
            action,
            policy,
        });
        if queued.is_err() {
            debug!("Reporter stopped; move from {} not reported", state);
        }
    }
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transition")
            .field("state", &self.state)
            .field("action", &self.action)
            .finish()
    }
}

/// Single task that posts queued transitions one at a time, in queue order.
pub struct Reporter {
    queue: ReportQueue,
    task: JoinHandle<usize>,
}

impl Reporter {
    pub fn spawn(service: Arc<dyn GameService>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Transition>();
        let task = tokio::spawn(async move {
            let mut delivered = 0;
            while let Some(t) = rx.recv().await {
                match service.report_transition(t.state, t.action, &t.policy).await {
                    Ok(()) => delivered += 1,
                    Err(e) => warn!("Transition report failed: {}", e),
                }
            }
            delivered
        });
        Self {
            queue: ReportQueue { tx },
            task,
        }
    }

    pub fn queue(&self) -> ReportQueue {
        self.queue.clone()
    }

    /// Close the queue and wait for everything already queued. Returns the
    /// number of reports the service accepted.
    ///
    /// Only completes once every [`ReportQueue`] clone has been dropped.
    pub async fn drain(self) -> usize {
        drop(self.queue);
        match self.task.await {
            Ok(delivered) => delivered,
            Err(e) => {
                warn!("Reporter task ended abnormally: {}", e);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one HTTP request with a canned response; returns the raw request.
    async fn one_shot_server(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = stream.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let len = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let l = l.to_ascii_lowercase();
                            l.strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if buf.len() >= head_end + 4 + len || n == 0 {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let resp = format!(
                "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(resp.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf).to_string()
        });
        (url, handle)
    }

    fn sample_map() -> MapPayload {
        MapPayload {
            player_position: [0, 0],
            goals: vec![[2, 0], [9, 9], [0, 9]],
            blocks: vec![[1, 0]],
        }
    }

    #[tokio::test]
    async fn initialize_posts_map_and_returns_policy() {
        let (url, server) = one_shot_server("HTTP/1.1 200 OK", r#"{"policy":{"pi":[1,2,3]}}"#).await;
        let svc = HttpGameService::new(url, Duration::from_secs(5)).unwrap();

        let policy = svc
            .initialize(&sample_map(), Cell::new(0, 0), PlannerParams::default())
            .await
            .unwrap();
        assert_eq!(policy.as_value(), &json!({"pi": [1, 2, 3]}));

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /initialize "));
        let body: Value = serde_json::from_str(&raw[raw.find("\r\n\r\n").unwrap() + 4..]).unwrap();
        assert_eq!(body["custom_map"]["goals"][0], json!([2, 0]));
        assert_eq!(body["goal"], json!([0, 0]));
        assert_eq!(body["theta"], json!(0.1));
    }

    #[tokio::test]
    async fn report_tolerates_empty_answer_but_not_bad_status() {
        let (url, _server) = one_shot_server("HTTP/1.1 200 OK", "").await;
        let svc = HttpGameService::new(url, Duration::from_secs(5)).unwrap();
        let policy = Policy::new(json!("opaque"));
        svc.report_transition(Cell::new(0, 0), Direction::Up, &policy)
            .await
            .unwrap();

        let (url, _server) = one_shot_server("HTTP/1.1 500 Internal Server Error", "{}").await;
        let svc = HttpGameService::new(url, Duration::from_secs(5)).unwrap();
        let err = svc
            .report_transition(Cell::new(0, 0), Direction::Up, &policy)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Status { endpoint: "/update", .. }));
    }

    #[tokio::test]
    async fn configured_timeout_bounds_a_silent_service() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let _server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(stream);
        });

        let svc = HttpGameService::new(url, Duration::from_millis(100)).unwrap();
        let started = std::time::Instant::now();
        let err = svc
            .initialize(&sample_map(), Cell::new(0, 0), PlannerParams::default())
            .await
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));
        match err {
            ServiceError::Http { endpoint, source } => {
                assert_eq!(endpoint, "/initialize");
                assert!(source.is_timeout());
            }
            other => panic!("expected a timeout, got {other}"),
        }
    }
}
