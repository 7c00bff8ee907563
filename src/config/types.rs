//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;

use crate::domain::audio::PresentationMode;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// TTS 服务配置
    #[serde(default)]
    pub tts: TtsConfig,

    /// 文本生成服务配置
    #[serde(default)]
    pub textgen: TextGenConfig,

    /// 合成引擎配置
    #[serde(default)]
    pub audio: AudioConfig,

    /// 朗读队列与语音缓存配置
    #[serde(default)]
    pub voice: VoiceConfig,

    /// 片段推送配置
    #[serde(default)]
    pub whisper: WhisperConfig,

    /// 存储配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5070
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// TTS 服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    /// TTS 服务地址
    #[serde(default = "default_tts_url")]
    pub url: String,

    /// 请求超时（秒）
    #[serde(default = "default_tts_timeout")]
    pub timeout_secs: u64,

    /// 网络错误 / 超时的重试次数
    #[serde(default = "default_tts_retries")]
    pub max_retries: u32,

    /// 重试退避基数（毫秒）
    #[serde(default = "default_tts_backoff")]
    pub retry_backoff_ms: u64,

    /// 使用离线合成的测试音代替 TTS 服务
    #[serde(default)]
    pub fake: bool,
}

fn default_tts_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_tts_timeout() -> u64 {
    30
}

fn default_tts_retries() -> u32 {
    1
}

fn default_tts_backoff() -> u64 {
    500
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            url: default_tts_url(),
            timeout_secs: default_tts_timeout(),
            max_retries: default_tts_retries(),
            retry_backoff_ms: default_tts_backoff(),
            fake: false,
        }
    }
}

/// 文本生成服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct TextGenConfig {
    /// 是否启用 AI 片段
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_textgen_url")]
    pub url: String,

    #[serde(default = "default_textgen_timeout")]
    pub timeout_secs: u64,
}

fn default_textgen_url() -> String {
    "http://localhost:8100".to_string()
}

fn default_textgen_timeout() -> u64 {
    10
}

impl Default for TextGenConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_textgen_url(),
            timeout_secs: default_textgen_timeout(),
        }
    }
}

/// 渲染输出目标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// 丢弃渲染结果
    #[default]
    Null,
    /// 写入 WAV 文件
    Wav,
}

/// 合成引擎配置
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// 采样率 (Hz)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// 每次渲染的帧数
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// 输出目标
    #[serde(default)]
    pub output: OutputKind,

    /// `output = "wav"` 时的文件路径
    #[serde(default = "default_wav_path")]
    pub wav_path: PathBuf,

    /// 语音混入增益（线性）
    #[serde(default = "default_speech_gain")]
    pub speech_gain: f32,

    /// 启动时的演示模式
    #[serde(default = "default_mode")]
    pub initial_mode: PresentationMode,
}

fn default_sample_rate() -> u32 {
    48_000
}

fn default_block_size() -> usize {
    512
}

fn default_wav_path() -> PathBuf {
    PathBuf::from("data/susurrus.wav")
}

fn default_speech_gain() -> f32 {
    1.0
}

fn default_mode() -> PresentationMode {
    PresentationMode::Author
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            block_size: default_block_size(),
            output: OutputKind::default(),
            wav_path: default_wav_path(),
            speech_gain: default_speech_gain(),
            initial_mode: default_mode(),
        }
    }
}

/// 朗读队列与语音缓存配置
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceConfig {
    /// 两句之间的停顿（毫秒）
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// 播放期间声床压低量（dB）
    #[serde(default = "default_duck_db")]
    pub duck_db: f32,

    #[serde(default = "default_duck_ramp")]
    pub duck_ramp_secs: f64,

    #[serde(default = "default_restore_ramp")]
    pub restore_ramp_secs: f64,

    /// 缓存最大条目数
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    /// 超出容量时一次淘汰的条目数
    #[serde(default = "default_cache_evict_count")]
    pub cache_evict_count: usize,

    /// 缓存条目存活天数
    #[serde(default = "default_cache_ttl_days")]
    pub cache_ttl_days: u32,
}

fn default_pacing_ms() -> u64 {
    600
}

fn default_duck_db() -> f32 {
    -6.0
}

fn default_duck_ramp() -> f64 {
    0.3
}

fn default_restore_ramp() -> f64 {
    0.8
}

fn default_cache_max_entries() -> usize {
    100
}

fn default_cache_evict_count() -> usize {
    20
}

fn default_cache_ttl_days() -> u32 {
    7
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            pacing_ms: default_pacing_ms(),
            duck_db: default_duck_db(),
            duck_ramp_secs: default_duck_ramp(),
            restore_ramp_secs: default_restore_ramp(),
            cache_max_entries: default_cache_max_entries(),
            cache_evict_count: default_cache_evict_count(),
            cache_ttl_days: default_cache_ttl_days(),
        }
    }
}

impl VoiceConfig {
    pub fn cache_ttl_ms(&self) -> i64 {
        self.cache_ttl_days as i64 * 24 * 60 * 60 * 1000
    }
}

/// 片段推送配置
#[derive(Debug, Clone, Deserialize)]
pub struct WhisperConfig {
    /// 推送间隔（秒）
    #[serde(default = "default_whisper_interval")]
    pub interval_secs: u64,

    /// 每次尝试 AI 生成的概率
    #[serde(default = "default_ai_probability")]
    pub ai_probability: f64,

    /// 记住的屏幕片段数
    #[serde(default = "default_max_on_screen")]
    pub max_on_screen: usize,

    /// 是否朗读推送的片段
    #[serde(default)]
    pub speak: bool,

    /// 固定随机种子
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_whisper_interval() -> u64 {
    12
}

fn default_ai_probability() -> f64 {
    0.3
}

fn default_max_on_screen() -> usize {
    6
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_whisper_interval(),
            ai_probability: default_ai_probability(),
            max_on_screen: default_max_on_screen(),
            speak: false,
            seed: None,
        }
    }
}

/// 存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 数据目录
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    /// 语音缓存数据库路径
    pub fn voice_cache_path(&self) -> PathBuf {
        self.data_dir.join("voice_cache.sled")
    }

    /// 本地偏好数据库路径
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.sled")
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
