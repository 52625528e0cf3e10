//! TTS設定（エンジン・声・話速）

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Kokoroエンジン固有設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KokoroConfig {
    /// ホスト名
    pub host: String,
    /// ポート番号
    pub port: u16,
}

impl Default for KokoroConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8880,
        }
    }
}

/// TTSの設定値
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TtsSettings {
    /// 使用エンジン（`kokoro` / `disabled`）
    pub engine: String,
    /// 声ID
    pub voice: String,
    /// 本文の話速
    pub speed_normal: f32,
    /// 名前部分の話速
    pub speed_name: f32,
    /// Kokoro固有設定
    #[serde(default)]
    pub kokoro: KokoroConfig,
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            engine: "kokoro".to_string(),
            voice: "zm_yunjian".to_string(),
            speed_normal: 0.9,
            speed_name: 0.8,
            kokoro: KokoroConfig::default(),
        }
    }
}

/// TTS設定（JSON永続化付き）
pub struct TtsConfig {
    path: PathBuf,
    inner: Mutex<TtsSettings>,
}

impl TtsConfig {
    /// ファイルから読み込んで作成
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("tts_config.json");
        let settings: TtsSettings = super::load_json(&path, "TTS Config");
        tracing::info!(
            "[TTS Config] Engine: {}, Voice: {}",
            settings.engine,
            settings.voice
        );
        Self {
            path,
            inner: Mutex::new(settings),
        }
    }

    /// 現在の設定値のスナップショット
    pub fn settings(&self) -> TtsSettings {
        self.inner.lock().clone()
    }

    /// 設定値を部分更新して保存
    pub fn update(
        &self,
        engine: Option<String>,
        voice: Option<String>,
        speed_normal: Option<f32>,
        speed_name: Option<f32>,
    ) {
        let mut inner = self.inner.lock();
        if let Some(engine) = engine {
            inner.engine = engine;
        }
        if let Some(voice) = voice {
            inner.voice = voice;
        }
        if let Some(speed) = speed_normal {
            inner.speed_normal = speed;
        }
        if let Some(speed) = speed_name {
            inner.speed_name = speed;
        }
        super::save_json(&self.path, &*inner, "TTS Config");
    }
}
