//! Streaming humanize endpoint
//!
//! Admission failures are plain JSON responses; once admitted, the response
//! is an event stream fed by the pipeline task.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use hmz_common::sse::stream_headers;
use std::convert::Infallible;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};

use super::humanize::{admit, HumanizeRequest};
use crate::error::ApiResult;
use crate::services::new_request_id;
use crate::AppState;

/// POST /api/humanize-stream
pub async fn humanize_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<HumanizeRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let request_id = new_request_id("stream");
    let span = info_span!("humanize_stream", request_id = %request_id);

    async move {
        info!("Starting streaming humanization request");
        let (pipeline, job) = admit(&state, &headers, body, &request_id).await?;

        // Dropping the body (client disconnect) drops the guard and cancels
        // the pipeline
        let cancel = CancellationToken::new();
        let guard = cancel.clone().drop_guard();
        let mut frames = pipeline.spawn_stream(job, cancel);

        let events = async_stream::stream! {
            let _guard = guard;
            while let Some(frame) = frames.recv().await {
                yield Ok::<Event, Infallible>(frame.to_sse_event());
            }
        };

        Ok((stream_headers(), Sse::new(events)).into_response())
    }
    .instrument(span)
    .await
}
