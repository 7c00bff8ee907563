//! Voice HTTP Handlers

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::infrastructure::http::dto::{
    ApiResponse, DefaultVoiceRequest, Empty, QueueVoiceRequest, QueueVoiceResponse,
    VoiceCacheResponse,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 朗读入队
pub async fn queue_voice(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueueVoiceRequest>,
) -> Result<Json<ApiResponse<QueueVoiceResponse>>, ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".to_string()));
    }

    let ticket = state
        .voice
        .enqueue(req.text.trim(), req.voice_id.as_deref(), req.priority);
    let id = ticket.id();
    let success = if req.wait {
        Some(ticket.wait().await)
    } else {
        None
    };
    Ok(Json(ApiResponse::success(QueueVoiceResponse { id, success })))
}

/// 停止朗读并清空队列
pub async fn stop_voice(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Empty>> {
    state.voice.stop();
    Json(ApiResponse::ok())
}

/// 设置默认音色
pub async fn set_default_voice(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DefaultVoiceRequest>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    state.voice.set_default_voice(&req.voice_id)?;
    Ok(Json(ApiResponse::ok()))
}

/// 缓存统计与队列状态
pub async fn voice_cache(State(state): State<Arc<AppState>>) -> Json<ApiResponse<VoiceCacheResponse>> {
    Json(ApiResponse::success(VoiceCacheResponse {
        cache: state.voice_cache.stats().await,
        queue: state.voice.status(),
    }))
}
