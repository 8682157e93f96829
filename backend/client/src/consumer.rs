//! Insight consumer: one live commentary stream per mounted chart.
//!
//! State lives in a `watch` channel. Every request is tagged with an epoch
//! and owns a cancellation token; writes go through `send_if_modified` and
//! are dropped unless their epoch is still current, so a superseded or
//! unmounted request can never touch the state again.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use aquadash_core::{parse_data_line, InsightRequest, RelayFrame, SseLineDecoder};

use crate::http::InsightClient;

/// Reported when the body closes before the `[DONE]` sentinel.
pub const STREAM_TRUNCATED: &str = "stream ended before completion";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    /// Request sent, no response yet.
    Loading,
    /// Response accepted, increments arriving.
    Streaming,
    Done,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsightState {
    pub phase: Phase,
    pub content: String,
    pub error: Option<String>,
    /// Sequence number of the request this state belongs to.
    pub epoch: u64,
}

impl InsightState {
    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Loading | Phase::Streaming)
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.phase, Phase::Done | Phase::Error)
    }
}

type StateTx = Arc<watch::Sender<InsightState>>;

pub struct InsightConsumer {
    client: InsightClient,
    params: InsightRequest,
    state: StateTx,
    active: Option<CancellationToken>,
}

impl InsightConsumer {
    /// Create the consumer and start the first request. Must run inside a
    /// tokio runtime.
    pub fn mount(client: InsightClient, chart_type: impl Into<String>, data: Value) -> Self {
        let (tx, _) = watch::channel(InsightState::default());
        let mut consumer = Self {
            client,
            params: InsightRequest::new(chart_type, data),
            state: Arc::new(tx),
            active: None,
        };
        consumer.start();
        consumer
    }

    /// Cancel whatever is in flight and ask again with the same parameters.
    pub fn regenerate(&mut self) {
        self.start();
    }

    /// Restart only when the parameters actually changed.
    pub fn set_params(&mut self, chart_type: impl Into<String>, data: Value) {
        let params = InsightRequest::new(chart_type, data);
        if params == self.params {
            return;
        }
        self.params = params;
        self.start();
    }

    pub fn params(&self) -> &InsightRequest {
        &self.params
    }

    pub fn snapshot(&self) -> InsightState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<InsightState> {
        self.state.subscribe()
    }

    /// Wait until the current request is done or failed.
    pub async fn wait_settled(&self) -> Result<InsightState> {
        let epoch = self.state.borrow().epoch;
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(|s| s.epoch != epoch || s.is_settled())
            .await
            .map_err(|_| anyhow!("insight state closed"))?;
        Ok(state.clone())
    }

    /// Cancel the in-flight request; no state changes happen afterwards.
    pub fn unmount(self) {}

    fn cancel_active(&mut self) {
        if let Some(token) = self.active.take() {
            token.cancel();
        }
    }

    fn start(&mut self) {
        self.cancel_active();

        let mut epoch = 0;
        self.state.send_modify(|s| {
            s.epoch += 1;
            epoch = s.epoch;
            s.phase = Phase::Loading;
            s.content.clear();
            s.error = None;
        });

        let token = CancellationToken::new();
        self.active = Some(token.clone());
        let run = Run {
            epoch,
            token,
            state: self.state.clone(),
        };
        let client = self.client.clone();
        let request = self.params.clone();
        tokio::spawn(async move { run.drive(client, request).await });
    }
}

impl Drop for InsightConsumer {
    fn drop(&mut self) {
        self.cancel_active();
        self.state.send_modify(|s| s.epoch += 1);
    }
}

/// One request's handle on the shared state.
struct Run {
    epoch: u64,
    token: CancellationToken,
    state: StateTx,
}

impl Run {
    /// Apply `f` if this run is still the current one.
    fn apply(&self, f: impl FnOnce(&mut InsightState)) -> bool {
        self.state.send_if_modified(|s| {
            if s.epoch != self.epoch || self.token.is_cancelled() {
                return false;
            }
            f(s);
            true
        })
    }

    fn fail(&self, message: String) {
        self.apply(|s| {
            s.phase = Phase::Error;
            s.error = Some(message);
        });
    }

    async fn drive(self, client: InsightClient, request: InsightRequest) {
        let opened = tokio::select! {
            _ = self.token.cancelled() => {
                debug!(epoch = self.epoch, "Insight request cancelled before response");
                return;
            }
            r = client.open(&request) => r,
        };
        let response = match opened {
            Ok(r) => r,
            Err(e) => {
                self.fail(format!("{e:#}"));
                return;
            }
        };
        self.apply(|s| s.phase = Phase::Streaming);

        let mut body = response.bytes_stream();
        let mut decoder = SseLineDecoder::new();
        loop {
            let read = tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    debug!(epoch = self.epoch, "Insight stream cancelled");
                    return;
                }
                read = body.next() => read,
            };

            let lines = match read {
                Some(Ok(bytes)) => decoder.push(&bytes),
                Some(Err(e)) => {
                    self.fail(format!("{:#}", anyhow::Error::new(e).context("Insight stream broke")));
                    return;
                }
                None => {
                    let tail: Vec<String> = decoder.finish().into_iter().collect();
                    if !self.handle_lines(tail) {
                        self.fail(STREAM_TRUNCATED.to_string());
                    }
                    return;
                }
            };
            if self.handle_lines(lines) {
                return;
            }
        }
    }

    /// Apply decoded lines in order; true once the stream reached a terminal frame.
    fn handle_lines(&self, lines: Vec<String>) -> bool {
        for line in lines {
            match parse_data_line(&line) {
                None => {}
                Some(RelayFrame::Content(text)) => {
                    self.apply(|s| {
                        s.phase = Phase::Streaming;
                        s.content.push_str(&text);
                    });
                }
                Some(RelayFrame::Done) => {
                    self.apply(|s| s.phase = Phase::Done);
                    return true;
                }
                Some(RelayFrame::Error(message)) => {
                    self.fail(message);
                    return true;
                }
                Some(RelayFrame::Malformed(payload)) => {
                    warn!(payload = %payload, "Skipping malformed insight frame");
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::REQUEST_FAILED;
    use aquadash_core::sse::{encode_content, encode_done, encode_error};
    use axum::{
        body::{Body, Bytes},
        extract::State,
        http::{header, StatusCode},
        response::{IntoResponse, Response},
        routing::post,
        Json, Router,
    };
    use serde_json::json;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    type Feed = mpsc::Sender<std::result::Result<Bytes, std::io::Error>>;

    /// A relay whose response bodies are written by the test, one feed per request.
    struct FakeRelay {
        url: String,
        requests: mpsc::UnboundedReceiver<(Value, Feed)>,
    }

    impl FakeRelay {
        async fn start() -> Self {
            let (tx, requests) = mpsc::unbounded_channel();
            let router = Router::new()
                .route("/api/ai-insight", post(relay))
                .route(
                    "/broken",
                    post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "{}") }),
                )
                .with_state(tx);
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, router).await.unwrap();
            });
            Self {
                url: format!("http://{addr}"),
                requests,
            }
        }

        fn client(&self) -> InsightClient {
            InsightClient::new(format!("{}/api/ai-insight", self.url))
        }

        async fn next(&mut self) -> (Value, Feed) {
            tokio::time::timeout(Duration::from_secs(5), self.requests.recv())
                .await
                .unwrap()
                .unwrap()
        }
    }

    async fn relay(
        State(tx): State<mpsc::UnboundedSender<(Value, Feed)>>,
        Json(body): Json<Value>,
    ) -> Response {
        let (feed, rx) = mpsc::channel(16);
        tx.send((body, feed)).unwrap();
        (
            [(header::CONTENT_TYPE, "text/event-stream")],
            Body::from_stream(ReceiverStream::new(rx)),
        )
            .into_response()
    }

    async fn push(feed: &Feed, text: impl Into<String>) {
        let _ = feed.send(Ok(Bytes::from(text.into()))).await;
    }

    async fn until(consumer: &InsightConsumer, pred: impl Fn(&InsightState) -> bool) -> InsightState {
        let mut rx = consumer.subscribe();
        let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| pred(s)))
            .await
            .unwrap()
            .unwrap();
        state.clone()
    }

    async fn settled(consumer: &InsightConsumer) -> InsightState {
        tokio::time::timeout(Duration::from_secs(5), consumer.wait_settled())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn concatenates_increments_in_order() {
        let mut relay = FakeRelay::start().await;
        let consumer = InsightConsumer::mount(relay.client(), "risk", json!({"highRisk": 35}));
        assert!(consumer.snapshot().is_loading());

        let (body, feed) = relay.next().await;
        assert_eq!(body["chartType"], "risk");
        assert_eq!(body["data"]["highRisk"], 35);
        for piece in ["高", "风险", "项目占比35%。"] {
            push(&feed, encode_content(piece)).await;
        }
        push(&feed, encode_done()).await;

        let state = settled(&consumer).await;
        assert_eq!(state.phase, Phase::Done);
        assert_eq!(state.content, "高风险项目占比35%。");
        assert_eq!(state.error, None);
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn reassembles_frames_split_across_reads() {
        let mut relay = FakeRelay::start().await;
        let consumer = InsightConsumer::mount(relay.client(), "industry", json!([]));
        let (_, feed) = relay.next().await;

        let wire = format!("{}{}{}", encode_content("净水"), encode_content("设备"), encode_done());
        let bytes = wire.into_bytes();
        for piece in bytes.chunks(5) {
            let _ = feed.send(Ok(Bytes::copy_from_slice(piece))).await;
        }

        let state = settled(&consumer).await;
        assert_eq!(state.content, "净水设备");
        assert_eq!(state.phase, Phase::Done);
    }

    #[tokio::test]
    async fn malformed_frame_is_skipped() {
        let mut relay = FakeRelay::start().await;
        let consumer = InsightConsumer::mount(relay.client(), "grade", json!({}));
        let (_, feed) = relay.next().await;

        push(&feed, encode_content("A级")).await;
        push(&feed, "data: {not json\n\n").await;
        push(&feed, ": comment\n\n").await;
        push(&feed, encode_content("占比高")).await;
        push(&feed, encode_done()).await;

        let state = settled(&consumer).await;
        assert_eq!(state.content, "A级占比高");
        assert_eq!(state.phase, Phase::Done);
    }

    #[tokio::test]
    async fn regenerate_cancels_and_resets() {
        let mut relay = FakeRelay::start().await;
        let mut consumer = InsightConsumer::mount(relay.client(), "node", json!({}));
        let (_, first) = relay.next().await;
        push(&first, encode_content("旧")).await;
        until(&consumer, |s| s.content == "旧").await;

        consumer.regenerate();
        let reset = consumer.snapshot();
        assert_eq!(reset.phase, Phase::Loading);
        assert_eq!(reset.content, "");
        assert_eq!(reset.error, None);

        let (_, second) = relay.next().await;
        push(&first, encode_content("过期")).await;
        push(&first, encode_done()).await;
        push(&second, encode_content("新")).await;
        push(&second, encode_done()).await;

        let state = settled(&consumer).await;
        assert_eq!(state.content, "新");
        assert_eq!(state.phase, Phase::Done);
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn set_params_restarts_only_on_change() {
        let mut relay = FakeRelay::start().await;
        let mut consumer = InsightConsumer::mount(relay.client(), "risk", json!({"a": 1}));
        let (_, feed) = relay.next().await;
        push(&feed, encode_done()).await;
        settled(&consumer).await;
        let epoch = consumer.snapshot().epoch;

        consumer.set_params("risk", json!({"a": 1}));
        assert_eq!(consumer.snapshot().epoch, epoch);
        assert_eq!(consumer.snapshot().phase, Phase::Done);

        consumer.set_params("stagnant", json!({"a": 1}));
        assert_eq!(consumer.snapshot().epoch, epoch + 1);
        let (body, feed) = relay.next().await;
        assert_eq!(body["chartType"], "stagnant");
        push(&feed, encode_done()).await;
        settled(&consumer).await;
    }

    #[tokio::test]
    async fn unmount_stops_all_writes() {
        let mut relay = FakeRelay::start().await;
        let consumer = InsightConsumer::mount(relay.client(), "risk", json!({}));
        let (_, feed) = relay.next().await;
        push(&feed, encode_content("部分")).await;
        until(&consumer, |s| s.content == "部分").await;

        let rx = consumer.subscribe();
        consumer.unmount();
        push(&feed, encode_content("之后")).await;
        push(&feed, encode_error("late failure")).await;
        drop(feed);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let last = rx.borrow().clone();
        assert_eq!(last.content, "部分");
        assert_eq!(last.error, None);
        assert_ne!(last.phase, Phase::Error);
    }

    #[tokio::test]
    async fn error_frame_keeps_partial_content() {
        let mut relay = FakeRelay::start().await;
        let consumer = InsightConsumer::mount(relay.client(), "risk", json!({}));
        let (_, feed) = relay.next().await;
        push(&feed, encode_content("部分")).await;
        push(&feed, encode_error("upstream exploded")).await;

        let state = settled(&consumer).await;
        assert_eq!(state.phase, Phase::Error);
        assert_eq!(state.content, "部分");
        assert_eq!(state.error.as_deref(), Some("upstream exploded"));
    }

    #[tokio::test]
    async fn eof_without_done_is_an_error() {
        let mut relay = FakeRelay::start().await;
        let consumer = InsightConsumer::mount(relay.client(), "risk", json!({}));
        let (_, feed) = relay.next().await;
        push(&feed, encode_content("部分")).await;
        drop(feed);

        let state = settled(&consumer).await;
        assert_eq!(state.phase, Phase::Error);
        assert_eq!(state.content, "部分");
        assert_eq!(state.error.as_deref(), Some(STREAM_TRUNCATED));
    }

    #[tokio::test]
    async fn rejected_request_reports_generic_failure() {
        let relay = FakeRelay::start().await;
        let client = InsightClient::new(format!("{}/broken", relay.url));
        let consumer = InsightConsumer::mount(client, "risk", json!({}));

        let state = settled(&consumer).await;
        assert_eq!(state.phase, Phase::Error);
        assert_eq!(state.error.as_deref(), Some(REQUEST_FAILED));
        assert_eq!(state.content, "");
    }

    #[tokio::test]
    async fn unreachable_relay_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = InsightClient::new(format!("http://{addr}/api/ai-insight"));
        let consumer = InsightConsumer::mount(client, "risk", json!({}));
        let state = settled(&consumer).await;
        assert_eq!(state.phase, Phase::Error);
        assert!(state.error.unwrap().starts_with("Insight request failed"));
    }
}
