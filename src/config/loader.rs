//! Configuration Loader
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml / config.local.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;
use crate::infrastructure::synth::{MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// # 环境变量示例
/// - `SUSURRUS_SERVER__PORT=8080`
/// - `SUSURRUS_TTS__URL=http://tts-server:8000`
/// - `SUSURRUS_AUDIO__OUTPUT=wav`
/// - `SUSURRUS_WHISPER__SPEAK=true`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置，`None` 时搜索默认文件名
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 环境变量名会被转换为小写
    builder = builder.add_source(
        Environment::with_prefix("SUSURRUS")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let app_config: AppConfig = builder.build()?.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("Server port cannot be 0"));
    }
    if config.tts.url.trim().is_empty() {
        return Err(invalid("TTS URL cannot be empty"));
    }
    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&config.audio.sample_rate) {
        return Err(ConfigError::ValidationError(format!(
            "Sample rate must be within {}-{} Hz",
            MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
        )));
    }
    if config.audio.block_size == 0 {
        return Err(invalid("Audio block size cannot be 0"));
    }
    if config.whisper.interval_secs == 0 {
        return Err(invalid("Whisper interval cannot be 0"));
    }
    if !(0.0..=1.0).contains(&config.whisper.ai_probability) {
        return Err(invalid("AI probability must be within [0, 1]"));
    }
    if config.voice.cache_max_entries == 0 {
        return Err(invalid("Voice cache capacity cannot be 0"));
    }
    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}", config.server.addr());
    if config.tts.fake {
        tracing::info!("TTS: offline test tones");
    } else {
        tracing::info!("TTS URL: {}", config.tts.url);
        tracing::info!(
            "TTS Timeout: {}s, retries: {}",
            config.tts.timeout_secs,
            config.tts.max_retries
        );
    }
    if config.textgen.enabled {
        tracing::info!("Text Generator: {}", config.textgen.url);
    }
    tracing::info!(
        "Audio: {} Hz, block {}, output {:?}",
        config.audio.sample_rate,
        config.audio.block_size,
        config.audio.output
    );
    tracing::info!("Initial Mode: {}", config.audio.initial_mode);
    tracing::info!(
        "Whisper Interval: {}s (AI probability {}, speak {})",
        config.whisper.interval_secs,
        config.whisper.ai_probability,
        config.whisper.speak
    );
    tracing::info!("Data Directory: {:?}", config.storage.data_dir);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validation_passes_for_default_config() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.tts.url = "  ".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.audio.sample_rate = 4_000;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.audio.block_size = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.whisper.interval_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.whisper.ai_probability = 1.5;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("susurrus.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[server]\nport = 9000\n\n[whisper]\ninterval_secs = 30").unwrap();

        let config = load_config_from_path(Some(&path)).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.whisper.interval_secs, 30);
        assert_eq!(config.audio.sample_rate, 48_000);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[whisper]\nai_probability = 2.0\n").unwrap();

        assert!(matches!(
            load_config_from_path(Some(&path)),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
