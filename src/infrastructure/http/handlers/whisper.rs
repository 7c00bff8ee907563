//! Whisper HTTP Handlers

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::domain::whisper::WhisperContext;
use crate::infrastructure::http::dto::{
    ApiResponse, EchoRequest, WhisperContextRequest, WhisperResponse,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 立即产生下一个片段并广播
pub async fn next_whisper(State(state): State<Arc<AppState>>) -> Json<ApiResponse<WhisperResponse>> {
    let whisper = state.whispers.next_whisper().await;
    state.event_publisher.publish_whisper(&whisper);
    Json(ApiResponse::success(WhisperResponse::from(&whisper)))
}

/// 更新选择情境
pub async fn update_context(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WhisperContextRequest>,
) -> Json<ApiResponse<WhisperContext>> {
    if let Some(mode) = req.mode {
        state.whispers.set_mode(mode);
    }
    if let Some(intent) = req.intent.as_deref() {
        state.whispers.set_intent(Some(intent));
    }
    if let Some(time_of_day) = req.time_of_day {
        state.whispers.set_time_of_day(time_of_day);
    }
    Json(ApiResponse::success(state.whispers.context()))
}

/// 外部文本作为回声片段
pub async fn echo(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EchoRequest>,
) -> Result<Json<ApiResponse<WhisperResponse>>, ApiError> {
    let whisper = state.whispers.echo(&req.text)?;
    state.event_publisher.publish_whisper(&whisper);
    Ok(Json(ApiResponse::success(WhisperResponse::from(&whisper))))
}
