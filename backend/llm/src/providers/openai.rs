use std::collections::VecDeque;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use aquadash_core::sse::{DATA_PREFIX, DONE_SENTINEL};
use aquadash_core::{ChatChunk, ChatMessage, ChunkStream, LlmProvider, LlmRequest, SseLineDecoder};

/// Streaming client for any OpenAI-compatible `/chat/completions` endpoint
/// (Volcengine Ark for Doubao models, OpenRouter, vLLM, ...).
pub struct OpenAiCompatProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAiCompatProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            client,
            api_key,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamError {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn stream(&self, request: &LlmRequest) -> Result<ChunkStream> {
        let start = Instant::now();
        let body = ChatRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            stream: true,
        };

        debug!(model = %request.model, "Opening completion stream");

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Accept", "text/event-stream")
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .context("Completion HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Completion endpoint returned {}: {}", status, error_body);
        }

        debug!(
            model = %request.model,
            latency_ms = start.elapsed().as_millis() as u64,
            "Completion stream opened"
        );
        Ok(decode_chat_stream(response.bytes_stream()))
    }
}

/// What one upstream line contributes.
enum UpstreamLine {
    Delta(ChatChunk),
    Done,
    Failed(String),
    Skip,
}

fn parse_upstream_line(line: &str) -> UpstreamLine {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return UpstreamLine::Skip;
    };
    if payload.trim() == DONE_SENTINEL {
        return UpstreamLine::Done;
    }
    if let Ok(chunk) = serde_json::from_str::<StreamChunk>(payload) {
        if let Some(content) = chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta)
            .and_then(|d| d.content)
        {
            return UpstreamLine::Delta(ChatChunk::text(content));
        }
    }
    if let Ok(err) = serde_json::from_str::<StreamError>(payload) {
        return UpstreamLine::Failed(
            err.error
                .message
                .unwrap_or_else(|| "upstream reported an error".to_string()),
        );
    }
    if serde_json::from_str::<serde_json::Value>(payload).is_err() {
        warn!(payload = %payload, "Skipping undecodable upstream frame");
    }
    UpstreamLine::Skip
}

struct DecodeState<S> {
    body: S,
    decoder: SseLineDecoder,
    ready: VecDeque<Result<ChatChunk>>,
    finished: bool,
}

/// Turn an OpenAI-style SSE byte stream into chat chunks.
///
/// Lines are reassembled across reads; the stream ends at `[DONE]`, at EOF,
/// or after the first error item.
pub fn decode_chat_stream<S, B, E>(body: S) -> ChunkStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let state = DecodeState {
        body,
        decoder: SseLineDecoder::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.ready.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match st.body.next().await {
                Some(Ok(bytes)) => {
                    for line in st.decoder.push(bytes.as_ref()) {
                        match parse_upstream_line(&line) {
                            UpstreamLine::Delta(chunk) => st.ready.push_back(Ok(chunk)),
                            UpstreamLine::Done => {
                                st.finished = true;
                                break;
                            }
                            UpstreamLine::Failed(message) => {
                                st.ready.push_back(Err(anyhow!(message)));
                                st.finished = true;
                                break;
                            }
                            UpstreamLine::Skip => {}
                        }
                    }
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(anyhow::Error::new(e).context("Completion stream broke")), st));
                }
                None => {
                    if st.decoder.has_pending() {
                        debug!("Completion stream ended without trailing newline");
                    }
                    st.finished = true;
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use futures::stream;
    use tokio::net::TcpListener;

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"index": 0, "delta": {"content": text}}]})
        )
    }

    async fn collect(stream: ChunkStream) -> (Vec<String>, Option<String>) {
        let items: Vec<_> = stream.collect().await;
        let mut texts = Vec::new();
        let mut error = None;
        for item in items {
            match item {
                Ok(chunk) => texts.extend(chunk.content),
                Err(e) => error = Some(e.to_string()),
            }
        }
        (texts, error)
    }

    #[tokio::test]
    async fn decodes_deltas_split_across_reads() {
        let wire = format!(
            "{}data: {{\"choices\":[{{\"delta\":{{\"role\":\"assistant\"}}}}]}}\n\n{}{}data: [DONE]\n\n",
            delta("高"),
            delta("风险"),
            delta("项目占比35%。")
        );
        let bytes = wire.into_bytes();
        let reads: Vec<std::result::Result<Vec<u8>, std::io::Error>> =
            bytes.chunks(7).map(|c| Ok(c.to_vec())).collect();

        let (texts, error) = collect(decode_chat_stream(stream::iter(reads))).await;
        assert_eq!(texts, vec!["高", "风险", "项目占比35%。"]);
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn stops_at_done_sentinel() {
        let wire = format!("{}data: [DONE]\n\n{}", delta("a"), delta("ignored"));
        let reads = vec![Ok::<_, std::io::Error>(wire.into_bytes())];
        let (texts, _) = collect(decode_chat_stream(stream::iter(reads))).await;
        assert_eq!(texts, vec!["a"]);
    }

    #[tokio::test]
    async fn surfaces_transport_and_upstream_errors() {
        let reads = vec![
            Ok(delta("部分").into_bytes()),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let (texts, error) = collect(decode_chat_stream(stream::iter(reads))).await;
        assert_eq!(texts, vec!["部分"]);
        assert!(error.unwrap().contains("Completion stream broke"));

        let wire = "data: {\"error\":{\"message\":\"quota exceeded\"}}\n\n";
        let reads = vec![Ok::<_, std::io::Error>(wire.as_bytes().to_vec())];
        let (_, error) = collect(decode_chat_stream(stream::iter(reads))).await;
        assert_eq!(error.as_deref(), Some("quota exceeded"));
    }

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    #[tokio::test]
    async fn streams_from_http_endpoint() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["stream"], true);
                assert_eq!(body["messages"][0]["role"], "system");
                format!("{}{}data: [DONE]\n\n", delta("净水"), delta("行业"))
            }),
        );
        let base = serve(router).await;
        let provider =
            OpenAiCompatProvider::new(base, Some("ak".into()), Duration::from_secs(2)).unwrap();
        let request = LlmRequest {
            model: "doubao".into(),
            messages: vec![ChatMessage::system("s"), ChatMessage::user("u")],
            temperature: 0.7,
        };
        let (texts, error) = collect(provider.stream(&request).await.unwrap()).await;
        assert_eq!(texts.concat(), "净水行业");
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn non_success_status_fails_to_open() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
        );
        let base = serve(router).await;
        let provider = OpenAiCompatProvider::new(base, None, Duration::from_secs(2)).unwrap();
        let request = LlmRequest {
            model: "doubao".into(),
            messages: vec![],
            temperature: 0.7,
        };
        let err = provider.stream(&request).await.err().unwrap();
        assert!(err.to_string().contains("401"));
    }
}
