//! Audio HTTP Handlers

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::SoundscapeStatus;
use crate::domain::audio::AudioSettingsPatch;
use crate::domain::harmony::{harmonic_note_set, key_notes, HarmonicNoteSet, KeyConfig};
use crate::infrastructure::http::dto::{
    ApiResponse, Empty, KeyResponse, MuteRequest, MuteResponse, SettingsResponse,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 引擎与声床状态
pub async fn audio_status(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<SoundscapeStatus>> {
    Json(ApiResponse::success(state.soundscape.status()))
}

pub async fn start_ambient(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Empty>> {
    state.soundscape.start_ambient();
    Json(ApiResponse::ok())
}

pub async fn stop_ambient(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Empty>> {
    state.soundscape.stop_ambient();
    Json(ApiResponse::ok())
}

/// 设置静音；缺省 `muted` 时切换
pub async fn set_mute(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MuteRequest>,
) -> Json<ApiResponse<MuteResponse>> {
    let muted = match req.muted {
        Some(muted) => {
            state.soundscape.set_muted(muted);
            muted
        }
        None => state.soundscape.toggle_mute(),
    };
    state.event_publisher.publish_mute_changed(muted);
    Json(ApiResponse::success(MuteResponse { muted }))
}

/// 部分更新音频设置
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(patch): Json<AudioSettingsPatch>,
) -> Result<Json<ApiResponse<SettingsResponse>>, ApiError> {
    if patch.is_empty() {
        return Err(ApiError::BadRequest("settings patch is empty".to_string()));
    }
    let change = state.soundscape.update_settings(&patch)?;
    let settings = state.soundscape.settings();
    let changed = change.key_changed || change.tone_changed || change.velocity_changed;
    if changed {
        state.event_publisher.publish_settings_changed(settings);
    }
    Ok(Json(ApiResponse::success(SettingsResponse { settings, changed })))
}

fn key_response(config: KeyConfig) -> KeyResponse {
    KeyResponse {
        notes: key_notes(&config),
        config,
    }
}

/// 当前调性与调内音
pub async fn get_key(State(state): State<Arc<AppState>>) -> Json<ApiResponse<KeyResponse>> {
    Json(ApiResponse::success(key_response(state.soundscape.key_config())))
}

/// 整体替换调性
pub async fn set_key(
    State(state): State<Arc<AppState>>,
    Json(config): Json<KeyConfig>,
) -> Result<Json<ApiResponse<KeyResponse>>, ApiError> {
    let change = state.soundscape.set_key_config(config)?;
    if change.key_changed {
        state
            .event_publisher
            .publish_settings_changed(state.soundscape.settings());
    }
    Ok(Json(ApiResponse::success(key_response(config))))
}

/// 各声部的 UI 音符集合
pub async fn get_notes(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HarmonicNoteSet>> {
    let notes = match state.soundscape.engine() {
        Some(engine) => engine.notes(),
        None => harmonic_note_set(&state.soundscape.key_config()),
    };
    Json(ApiResponse::success(notes))
}
