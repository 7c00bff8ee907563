//! Soundscape HTTP Handlers

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::infrastructure::http::dto::{
    ApiResponse, Empty, InteractRequest, InteractResponse, ModeRequest,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 交互手势（focus / submit / hover）
pub async fn interact(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InteractRequest>,
) -> Result<Json<ApiResponse<InteractResponse>>, ApiError> {
    let note = state.soundscape.interact(req.interaction).await?;
    Ok(Json(ApiResponse::success(InteractResponse { note })))
}

/// 切换演示模式
pub async fn set_mode(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ModeRequest>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    let changed = state.soundscape.mode() != req.mode;
    state.soundscape.set_mode(req.mode);
    state.whispers.set_mode(req.mode);
    if changed {
        state.event_publisher.publish_mode_changed(req.mode);
    }
    Ok(Json(ApiResponse::ok()))
}
