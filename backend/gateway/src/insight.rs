//! Chart-insight relay: `POST /api/ai-insight`.
//!
//! The provider stream is opened before any response is committed, so open
//! failures still get a JSON body. After that a relay task pushes one SSE
//! event per increment through a bounded channel and finishes with
//! `[DONE]`. A mid-stream failure sends an `{"error": ...}` frame and then
//! errors the body, which aborts the connection.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use aquadash_core::sse::{content_payload, error_payload};
use aquadash_core::{
    build_messages, ChartType, ChunkStream, DashError, InsightRequest, LlmRequest, DONE_SENTINEL,
};

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

/// Events buffered between the relay task and the response body.
const RELAY_BUFFER: usize = 32;

type RelayItem = Result<Event, DashError>;

pub async fn ai_insight(
    State(state): State<AppState>,
    body: Result<Json<InsightRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = body.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Rejected insight request");
        ApiError::from(DashError::InvalidRequest(rejection.body_text()))
    })?;

    let chart = request.chart();
    let llm_request = LlmRequest {
        model: state.config.llm.model.clone(),
        messages: build_messages(&request),
        temperature: state.config.llm.temperature,
    };
    info!(chart = %chart, requested = %request.chart_type, "Generating chart insight");

    let provider = state.provider.name().to_string();
    let upstream = state.provider.stream(&llm_request).await.map_err(|e| {
        warn!(provider = %provider, error = %format!("{e:#}"), "Failed to open model stream");
        ApiError::from(DashError::upstream(&provider, format!("{e:#}")))
    })?;

    let (tx, rx) = mpsc::channel(RELAY_BUFFER);
    tokio::spawn(relay(upstream, tx, provider, chart));

    Ok((
        [(header::CONNECTION, "keep-alive")],
        Sse::new(ReceiverStream::new(rx)),
    )
        .into_response())
}

async fn relay(
    mut upstream: ChunkStream,
    tx: mpsc::Sender<RelayItem>,
    provider: String,
    chart: ChartType,
) {
    let mut increments = 0usize;
    loop {
        let next = tokio::select! {
            _ = tx.closed() => {
                debug!(chart = %chart, increments, "Client went away, dropping model stream");
                return;
            }
            next = upstream.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                let Some(text) = chunk.increment() else {
                    continue;
                };
                let event = Event::default().data(content_payload(text));
                if tx.send(Ok(event)).await.is_err() {
                    debug!(chart = %chart, increments, "Client went away, dropping model stream");
                    return;
                }
                increments += 1;
            }
            Some(Err(e)) => {
                let message = format!("{e:#}");
                warn!(chart = %chart, increments, error = %message, "Model stream failed mid-response");
                let _ = tx
                    .send(Ok(Event::default().data(error_payload(&message))))
                    .await;
                let _ = tx.send(Err(DashError::upstream(provider, message))).await;
                return;
            }
            None => {
                let _ = tx.send(Ok(Event::default().data(DONE_SENTINEL))).await;
                debug!(chart = %chart, increments, "Insight stream complete");
                return;
            }
        }
    }
}
