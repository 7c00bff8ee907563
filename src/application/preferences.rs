//! 持久化的客户端偏好
//!
//! 两个本地键值条目（JSON）：
//! - `susurrus.key_config`: 调 + 调式
//! - `susurrus.audio_preferences`: 波形 / 力度 / 默认音色
//!
//! 读取永不失败：缺失或损坏时退回默认值

use serde::{Deserialize, Serialize};

use crate::application::ports::{SettingsStorePort, StoreError};
use crate::domain::audio::{AudioSettings, Tone, Velocity};
use crate::domain::harmony::KeyConfig;

pub const KEY_CONFIG_KEY: &str = "susurrus.key_config";
pub const AUDIO_PREFERENCES_KEY: &str = "susurrus.audio_preferences";

/// 内置默认音色
pub const DEFAULT_VOICE_ID: &str = "whisper-default";

/// 音色 / 力度 / 默认音色
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioPreferences {
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub velocity: Velocity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
}

impl AudioPreferences {
    /// 默认音色，未设置时使用内置音色
    pub fn voice_id(&self) -> &str {
        self.voice_id.as_deref().unwrap_or(DEFAULT_VOICE_ID)
    }
}

fn load_json<T>(store: &dyn SettingsStorePort, key: &str) -> T
where
    T: for<'de> Deserialize<'de> + Default,
{
    match store.get(key) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "Malformed stored value, using default");
                T::default()
            }
        },
        Ok(None) => T::default(),
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to read settings store, using default");
            T::default()
        }
    }
}

fn save_json<T: Serialize>(
    store: &dyn SettingsStorePort,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    store.set(key, &raw)
}

pub fn load_key_config(store: &dyn SettingsStorePort) -> KeyConfig {
    load_json(store, KEY_CONFIG_KEY)
}

pub fn save_key_config(store: &dyn SettingsStorePort, config: &KeyConfig) -> Result<(), StoreError> {
    save_json(store, KEY_CONFIG_KEY, config)
}

pub fn load_audio_preferences(store: &dyn SettingsStorePort) -> AudioPreferences {
    load_json(store, AUDIO_PREFERENCES_KEY)
}

pub fn save_audio_preferences(
    store: &dyn SettingsStorePort,
    preferences: &AudioPreferences,
) -> Result<(), StoreError> {
    save_json(store, AUDIO_PREFERENCES_KEY, preferences)
}

/// 由持久化条目组装完整的 AudioSettings
pub fn load_audio_settings(store: &dyn SettingsStorePort) -> AudioSettings {
    let preferences = load_audio_preferences(store);
    AudioSettings {
        tone: preferences.tone,
        velocity: preferences.velocity,
        ..AudioSettings::default()
    }
    .with_key_config(load_key_config(store))
}

/// 持久化 AudioSettings，保留已保存的默认音色
pub fn save_audio_settings(
    store: &dyn SettingsStorePort,
    settings: &AudioSettings,
) -> Result<(), StoreError> {
    save_key_config(store, &settings.key_config())?;
    let mut preferences = load_audio_preferences(store);
    preferences.tone = settings.tone;
    preferences.velocity = settings.velocity;
    save_audio_preferences(store, &preferences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::harmony::{PitchClass, ScaleMode};
    use crate::infrastructure::persistence::memory::InMemorySettingsStore;

    #[test]
    fn test_key_config_roundtrip() {
        let store = InMemorySettingsStore::new();
        for key in PitchClass::ALL {
            for mode in ScaleMode::ALL {
                let config = KeyConfig::new(key, mode);
                save_key_config(&store, &config).unwrap();
                assert_eq!(load_key_config(&store), config);
            }
        }
    }

    #[test]
    fn test_corrupted_key_config_falls_back_to_default() {
        let store = InMemorySettingsStore::new();
        store.set(KEY_CONFIG_KEY, "{not json").unwrap();
        assert_eq!(load_key_config(&store), KeyConfig::default());

        store.set(KEY_CONFIG_KEY, r#"{"key":"H","mode":"minor"}"#).unwrap();
        assert_eq!(load_key_config(&store), KeyConfig::default());
    }

    #[test]
    fn test_missing_preferences_use_builtin_voice() {
        let store = InMemorySettingsStore::new();
        let preferences = load_audio_preferences(&store);
        assert_eq!(preferences.voice_id(), DEFAULT_VOICE_ID);
        assert_eq!(preferences.velocity, Velocity::default());
    }

    #[test]
    fn test_save_settings_keeps_voice() {
        let store = InMemorySettingsStore::new();
        save_audio_preferences(
            &store,
            &AudioPreferences {
                voice_id: Some("narrator".into()),
                ..Default::default()
            },
        )
        .unwrap();

        let settings = AudioSettings {
            tone: Tone::Triangle,
            velocity: Velocity::new(30),
            ..Default::default()
        }
        .with_key_config(KeyConfig::new(PitchClass::A, ScaleMode::Major));
        save_audio_settings(&store, &settings).unwrap();

        assert_eq!(load_audio_settings(&store), settings);
        assert_eq!(load_audio_preferences(&store).voice_id(), "narrator");
    }
}
