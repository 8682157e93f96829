use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::Mutex;

use aquadash_core::{ChatChunk, ChunkStream, LlmProvider, LlmRequest};

/// One scripted event of a mock completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Chunk(String),
    Fail(String),
}

impl Step {
    pub fn chunk(text: impl Into<String>) -> Self {
        Step::Chunk(text.into())
    }
}

/// A provider that replays a fixed script. Used by tests and by `provider: mock`
/// for running the dashboard without model credentials.
#[derive(Clone)]
pub struct ScriptedProvider {
    steps: Vec<Step>,
    delay: Option<Duration>,
    open_error: Option<String>,
    requests: Arc<Mutex<Vec<LlmRequest>>>,
}

const CANNED_REPLY: &[&str] = &[
    "当前",
    "数据",
    "整体",
    "平稳，",
    "建议",
    "优先",
    "跟进",
    "金额",
    "较大",
    "的项目。",
];

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            delay: None,
            open_error: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A script that streams each text as one increment.
    pub fn chunks<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(Step::chunk).collect())
    }

    /// Generic commentary used when no model is configured.
    pub fn canned() -> Self {
        Self::chunks(CANNED_REPLY.iter().copied()).with_delay(Duration::from_millis(40))
    }

    /// Refuse to open the stream at all.
    pub fn failing_open(message: impl Into<String>) -> Self {
        let mut provider = Self::new(Vec::new());
        provider.open_error = Some(message.into());
        provider
    }

    /// Pause before each step.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests seen so far, in arrival order.
    pub async fn recorded(&self) -> Vec<LlmRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn stream(&self, request: &LlmRequest) -> Result<ChunkStream> {
        self.requests.lock().await.push(request.clone());
        if let Some(message) = &self.open_error {
            return Err(anyhow!(message.clone()));
        }

        let delay = self.delay;
        let steps = self.steps.clone().into_iter();
        let stream = futures::stream::unfold(Some(steps), move |state| async move {
            let mut steps = state?;
            let step = steps.next()?;
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            match step {
                Step::Chunk(text) => Some((Ok(ChatChunk::text(text)), Some(steps))),
                Step::Fail(message) => Some((Err(anyhow!(message)), None)),
            }
        });
        Ok(stream.boxed())
    }
}
