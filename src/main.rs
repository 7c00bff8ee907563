//! Susurrus - 交互装置的生成式音频核心

use std::sync::Arc;

use susurrus::application::ports::{
    SettingsStorePort, TextGeneratorPort, TtsEnginePort, VoiceCachePort,
};
use susurrus::application::{
    AudioEngine, LazyEngine, Soundscape, VoicePlaybackConfig, VoicePlaybackManager,
    WhisperService, WhisperServiceConfig,
};
use susurrus::config::{load_config, print_config, AppConfig, OutputKind};
use susurrus::infrastructure::adapters::{
    FakeTtsClient, HttpTextGenerator, HttpTextGeneratorConfig, HttpTtsClient,
    HttpTtsClientConfig, MixerSpeechPlayer,
};
use susurrus::infrastructure::events::EventPublisher;
use susurrus::infrastructure::http::{AppState, HttpServer, ServerConfig};
use susurrus::infrastructure::persistence::{
    SledSettingsStore, SledVoiceCache, SledVoiceCacheConfig,
};
use susurrus::infrastructure::synth::{
    AudioSink, NullSink, OutputDriver, SoftwareBackend, WavFileSink,
};
use susurrus::infrastructure::worker::{WhisperWorker, WhisperWorkerConfig};
use tokio_util::sync::CancellationToken;

fn build_tts(config: &AppConfig) -> anyhow::Result<Arc<dyn TtsEnginePort>> {
    if config.tts.fake {
        return Ok(Arc::new(FakeTtsClient::with_defaults()));
    }
    let tts_config = HttpTtsClientConfig {
        base_url: config.tts.url.clone(),
        timeout_secs: config.tts.timeout_secs,
        max_retries: config.tts.max_retries,
        retry_backoff_ms: config.tts.retry_backoff_ms,
    };
    Ok(Arc::new(HttpTtsClient::new(tts_config)?))
}

fn build_text_generator(config: &AppConfig) -> anyhow::Result<Option<Arc<dyn TextGeneratorPort>>> {
    if !config.textgen.enabled {
        return Ok(None);
    }
    let generator = HttpTextGenerator::new(HttpTextGeneratorConfig {
        base_url: config.textgen.url.clone(),
        timeout_secs: config.textgen.timeout_secs,
    })?;
    Ok(Some(Arc::new(generator)))
}

fn build_sink(config: &AppConfig) -> anyhow::Result<Box<dyn AudioSink>> {
    let sink: Box<dyn AudioSink> = match config.audio.output {
        OutputKind::Null => Box::new(NullSink::default()),
        OutputKind::Wav => Box::new(WavFileSink::create(
            &config.audio.wav_path,
            config.audio.sample_rate,
        )?),
    };
    Ok(sink)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    let log_filter = format!(
        "{},susurrus={},tower_http=debug",
        config.log.level, config.log.level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    tracing::info!("Susurrus - generative audio core");
    print_config(&config);

    tokio::fs::create_dir_all(&config.storage.data_dir).await?;
    if let Some(parent) = config.audio.wav_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let shutdown = CancellationToken::new();

    // 合成后端与渲染驱动
    let backend = SoftwareBackend::new(config.audio.sample_rate).arc();
    let driver = OutputDriver::new(
        backend.clone(),
        build_sink(&config)?,
        config.audio.block_size,
        shutdown.clone(),
    );
    let driver_handle = tokio::spawn(driver.run());

    // 本地偏好与引擎
    let store: Arc<dyn SettingsStorePort> =
        SledSettingsStore::open(config.storage.settings_path())?.arc();
    let engine_backend = backend.clone();
    let engine = Arc::new(LazyEngine::new(move |settings| {
        AudioEngine::new(engine_backend.clone(), settings)
    }));
    let soundscape = Arc::new(Soundscape::new(
        engine,
        store.clone(),
        config.audio.initial_mode,
    ));

    // 朗读队列
    let voice_cache = SledVoiceCache::new(&SledVoiceCacheConfig {
        db_path: config.storage.voice_cache_path().to_string_lossy().to_string(),
        max_entries: config.voice.cache_max_entries,
        evict_count: config.voice.cache_evict_count,
        ttl_ms: config.voice.cache_ttl_ms(),
    })?
    .arc();
    let player = MixerSpeechPlayer::new(backend.clone(), config.audio.speech_gain).arc();
    let voice = VoicePlaybackManager::new(
        VoicePlaybackConfig {
            pacing: std::time::Duration::from_millis(config.voice.pacing_ms),
            duck_db: config.voice.duck_db,
            duck_ramp_secs: config.voice.duck_ramp_secs,
            restore_ramp_secs: config.voice.restore_ramp_secs,
        },
        build_tts(&config)?,
        voice_cache.clone(),
        player,
        soundscape.ducker(),
        Some(store),
    );

    // 片段服务与事件
    let whispers = Arc::new(WhisperService::new(
        WhisperServiceConfig {
            ai_probability: config.whisper.ai_probability,
            max_on_screen: config.whisper.max_on_screen,
            seed: config.whisper.seed,
        },
        config.audio.initial_mode,
        build_text_generator(&config)?,
    ));
    let event_publisher = EventPublisher::new().arc();
    let forwarder = event_publisher.forward_playback(voice.subscribe());

    let worker = WhisperWorker::new(
        WhisperWorkerConfig {
            interval: std::time::Duration::from_secs(config.whisper.interval_secs),
            speak: config.whisper.speak,
            ..Default::default()
        },
        whispers.clone(),
        Some(voice.clone()),
        event_publisher.clone(),
        shutdown.clone(),
    );
    let worker_handle = tokio::spawn(worker.run());

    if let Err(e) = voice_cache.purge_expired().await {
        tracing::warn!(error = %e, "Failed to purge expired voice cache entries");
    }

    let server_config = ServerConfig::new(&config.server.host, config.server.port);
    let state = AppState::new(
        soundscape.clone(),
        voice.clone(),
        whispers,
        voice_cache.clone(),
        event_publisher,
    );
    let server = HttpServer::new(server_config, state);

    // 启动服务器（带优雅关闭）
    server
        .run_with_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to listen for ctrl-c");
            tracing::info!("Received shutdown signal");
        })
        .await?;

    voice.stop();
    soundscape.shutdown();
    shutdown.cancel();
    forwarder.abort();
    let _ = tokio::join!(worker_handle, driver_handle);
    if let Err(e) = voice_cache.flush() {
        tracing::warn!(error = %e, "Failed to flush voice cache");
    }

    tracing::info!("Server shutdown complete");

    Ok(())
}
