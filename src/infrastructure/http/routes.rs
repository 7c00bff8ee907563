//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping                    GET   健康检查
//! - /api/soundscape/interact     POST  交互手势（focus / submit / hover）
//! - /api/soundscape/mode         POST  切换演示模式
//! - /api/audio/status            GET   引擎状态
//! - /api/audio/ambient/start     POST  淡入声床
//! - /api/audio/ambient/stop      POST  淡出声床
//! - /api/audio/mute              POST  设置 / 切换静音
//! - /api/audio/settings          POST  部分更新音频设置
//! - /api/audio/key               GET   当前调性
//! - /api/audio/key               POST  替换调性
//! - /api/audio/notes             GET   UI 音符集合
//! - /api/whisper/next            POST  产生下一个片段
//! - /api/whisper/context         POST  更新选择情境
//! - /api/whisper/echo            POST  回声片段
//! - /api/voice/queue             POST  朗读入队
//! - /api/voice/stop              POST  停止朗读
//! - /api/voice/default           POST  设置默认音色
//! - /api/voice/cache             GET   语音缓存统计
//! - /ws/events                   WS    事件流

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api", api_routes())
        .route("/ws/events", get(handlers::events_websocket_handler))
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/soundscape", soundscape_routes())
        .nest("/audio", audio_routes())
        .nest("/whisper", whisper_routes())
        .nest("/voice", voice_routes())
}

fn soundscape_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/interact", post(handlers::interact))
        .route("/mode", post(handlers::set_mode))
}

fn audio_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(handlers::audio_status))
        .route("/ambient/start", post(handlers::start_ambient))
        .route("/ambient/stop", post(handlers::stop_ambient))
        .route("/mute", post(handlers::set_mute))
        .route("/settings", post(handlers::update_settings))
        .route("/key", get(handlers::get_key).post(handlers::set_key))
        .route("/notes", get(handlers::get_notes))
}

fn whisper_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/next", post(handlers::next_whisper))
        .route("/context", post(handlers::update_context))
        .route("/echo", post(handlers::echo))
}

fn voice_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/queue", post(handlers::queue_voice))
        .route("/stop", post(handlers::stop_voice))
        .route("/default", post(handlers::set_default_voice))
        .route("/cache", get(handlers::voice_cache))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    use crate::application::ports::SettingsStorePort;
    use crate::application::{
        AudioEngine, LazyEngine, Soundscape, VoicePlaybackConfig, VoicePlaybackManager,
        WhisperService, WhisperServiceConfig,
    };
    use crate::domain::audio::VoiceKind;
    use crate::infrastructure::adapters::{FakeTtsClient, MixerSpeechPlayer};
    use crate::infrastructure::events::{EventPublisher, WsEvent};
    use crate::infrastructure::persistence::{
        InMemorySettingsStore, SledVoiceCache, SledVoiceCacheConfig,
    };
    use crate::infrastructure::synth::SoftwareBackend;

    fn test_state() -> Arc<AppState> {
        let backend = SoftwareBackend::new(8_000).arc();
        let engine_backend = backend.clone();
        let engine = Arc::new(LazyEngine::new(move |settings| {
            AudioEngine::new(engine_backend.clone(), settings)
        }));
        let store: Arc<dyn SettingsStorePort> = Arc::new(InMemorySettingsStore::new());
        let soundscape = Arc::new(Soundscape::new(engine, store.clone(), VoiceKind::Author));
        let cache = SledVoiceCache::temporary(&SledVoiceCacheConfig::default())
            .unwrap()
            .arc();
        let voice = VoicePlaybackManager::new(
            VoicePlaybackConfig::default(),
            Arc::new(FakeTtsClient::with_defaults()),
            cache.clone(),
            MixerSpeechPlayer::new(backend, 1.0).arc(),
            soundscape.ducker(),
            Some(store),
        );
        let whispers = Arc::new(WhisperService::new(
            WhisperServiceConfig {
                seed: Some(3),
                ..Default::default()
            },
            VoiceKind::Author,
            None,
        ));
        Arc::new(AppState::new(
            soundscape,
            voice,
            whispers,
            cache,
            EventPublisher::new().arc(),
        ))
    }

    async fn call(state: &Arc<AppState>, method: &str, uri: &str, body: Option<Value>) -> Value {
        let app = create_routes().with_state(state.clone());
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let state = test_state();
        let json = call(&state, "GET", "/api/ping", None).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_status_before_activation() {
        let state = test_state();
        let json = call(&state, "GET", "/api/audio/status", None).await;
        assert_eq!(json["errno"], 0);
        assert_eq!(json["data"]["muted"], true);
        assert_eq!(json["data"]["mode"], "author");
        assert!(json["data"].get("engine").is_none());
    }

    #[tokio::test]
    async fn test_hover_does_not_unlock_audio() {
        let state = test_state();
        let json = call(
            &state,
            "POST",
            "/api/soundscape/interact",
            Some(json!({"interaction": "hover"})),
        )
        .await;
        assert_eq!(json["errno"], 0);
        assert!(json["data"]["note"].is_null());
        assert!(state.soundscape.engine().is_none());
    }

    #[tokio::test]
    async fn test_focus_then_submit_plays_note() {
        let state = test_state();
        call(
            &state,
            "POST",
            "/api/audio/mute",
            Some(json!({"muted": false})),
        )
        .await;
        call(
            &state,
            "POST",
            "/api/soundscape/interact",
            Some(json!({"interaction": "focus"})),
        )
        .await;
        let json = call(
            &state,
            "POST",
            "/api/soundscape/interact",
            Some(json!({"interaction": "submit"})),
        )
        .await;
        assert_eq!(json["data"]["note"]["voice"], "author");

        let status = call(&state, "GET", "/api/audio/status", None).await;
        assert_eq!(status["data"]["engine"]["state"], "ready");
    }

    #[tokio::test]
    async fn test_mute_toggle_publishes_event() {
        let state = test_state();
        let mut rx = state.event_publisher.subscribe();
        let json = call(&state, "POST", "/api/audio/mute", Some(json!({}))).await;
        assert_eq!(json["data"]["muted"], false);
        assert_eq!(rx.recv().await.unwrap(), WsEvent::MuteChanged { muted: false });
    }

    #[tokio::test]
    async fn test_mode_change_updates_whispers() {
        let state = test_state();
        let mut rx = state.event_publisher.subscribe();
        call(
            &state,
            "POST",
            "/api/soundscape/mode",
            Some(json!({"mode": "lab"})),
        )
        .await;
        assert_eq!(state.soundscape.mode(), VoiceKind::Lab);
        assert_eq!(state.whispers.context().mode, VoiceKind::Lab);
        assert_eq!(
            rx.recv().await.unwrap(),
            WsEvent::ModeChanged {
                mode: VoiceKind::Lab
            }
        );
    }

    #[tokio::test]
    async fn test_key_roundtrip_and_notes() {
        let state = test_state();
        let json = call(
            &state,
            "POST",
            "/api/audio/key",
            Some(json!({"key": "G", "mode": "major"})),
        )
        .await;
        assert_eq!(json["errno"], 0);

        let json = call(&state, "GET", "/api/audio/key", None).await;
        assert_eq!(json["data"]["key"], "G");
        assert_eq!(json["data"]["mode"], "major");
        assert!(!json["data"]["notes"].as_array().unwrap().is_empty());

        let notes = call(&state, "GET", "/api/audio/notes", None).await;
        assert!(!notes["data"]["lab"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_settings_patch_rejected() {
        let state = test_state();
        let json = call(&state, "POST", "/api/audio/settings", Some(json!({}))).await;
        assert_eq!(json["errno"], 400);

        let json = call(
            &state,
            "POST",
            "/api/audio/settings",
            Some(json!({"velocity": 40})),
        )
        .await;
        assert_eq!(json["data"]["changed"], true);
        assert_eq!(json["data"]["settings"]["velocity"], 40);
    }

    #[tokio::test]
    async fn test_whisper_next_and_echo() {
        let state = test_state();
        let json = call(&state, "POST", "/api/whisper/next", None).await;
        assert_eq!(json["data"]["source"], "curated");

        let json = call(
            &state,
            "POST",
            "/api/whisper/echo",
            Some(json!({"text": "a visitor left a note"})),
        )
        .await;
        assert_eq!(json["data"]["source"], "echo");

        let json = call(&state, "POST", "/api/whisper/echo", Some(json!({"text": " "}))).await;
        assert_eq!(json["errno"], 400);
    }

    #[tokio::test]
    async fn test_whisper_context_update() {
        let state = test_state();
        let json = call(
            &state,
            "POST",
            "/api/whisper/context",
            Some(json!({"intent": "looking for a collaborator", "time_of_day": "dusk"})),
        )
        .await;
        assert_eq!(json["data"]["user_intent"], "looking for a collaborator");
        assert_eq!(json["data"]["time_of_day"], "dusk");
    }

    #[tokio::test]
    async fn test_voice_queue_validation_and_cache_stats() {
        let state = test_state();
        let json = call(&state, "POST", "/api/voice/queue", Some(json!({"text": ""}))).await;
        assert_eq!(json["errno"], 400);

        let json = call(
            &state,
            "POST",
            "/api/voice/default",
            Some(json!({"voice_id": "  "})),
        )
        .await;
        assert_eq!(json["errno"], 400);

        let json = call(&state, "GET", "/api/voice/cache", None).await;
        assert_eq!(json["data"]["cache"]["total_entries"], 0);
        assert_eq!(json["data"]["queue"]["pending"], 0);
    }
}
