//! 音声合成エンジン
//!
//! エンジンは常に1つだけアクティブにする。切り替え時は古いエンジンを
//! 破棄してから新しいエンジンを作る。

pub mod kokoro;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::TtsError;
use crate::config::TtsConfig;

pub use kokoro::KokoroEngine;

/// 声の情報（UI選択肢用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    /// 声ID
    pub value: String,
    /// 表示名
    pub label: String,
}

/// 音声合成エンジントレイト
///
/// 「テキスト＋声ID＋話速 → WAVバイト列」だけを責務とする。
/// 再生は呼び出し側（[`crate::tts::audio`]）が行う。
#[async_trait]
pub trait TtsEngine: Send + Sync {
    /// テキストを音声に合成する
    async fn render(&self, text: &str, voice: &str, speed: f32) -> Result<Vec<u8>, TtsError>;

    /// 接続テスト
    async fn test_connection(&self) -> Result<bool, TtsError>;

    /// 利用可能な声の一覧
    fn voices(&self) -> Vec<VoiceInfo>;

    /// エンジン名
    fn name(&self) -> &'static str;
}

/// エンジンマネージャ
///
/// アクティブなエンジンは常に1つ。設定のエンジン種別に追従し、
/// 切り替え時は古いエンジンを先に破棄する。
pub struct EngineManager {
    config: Arc<TtsConfig>,
    current: Mutex<Option<(String, Arc<dyn TtsEngine>)>>,
}

impl EngineManager {
    /// 新しいマネージャを作成（エンジンは遅延生成）
    pub fn new(config: Arc<TtsConfig>) -> Self {
        Self {
            config,
            current: Mutex::new(None),
        }
    }

    /// 設定に従ったアクティブエンジンを取得する
    ///
    /// 設定のエンジン種別が変わっていれば切り替える。`disabled` の
    /// 場合はNoneを返し、読み上げはスキップされる。
    pub fn engine(&self) -> Option<Arc<dyn TtsEngine>> {
        let engine_type = self.config.settings().engine;
        let mut current = self.current.lock();
        if let Some((active_type, engine)) = current.as_ref() {
            if *active_type == engine_type {
                return Some(engine.clone());
            }
        }
        self.switch_locked(&mut current, &engine_type)
    }

    /// 指定種別のエンジンに切り替える
    pub fn switch_engine(&self, engine_type: &str) -> Option<Arc<dyn TtsEngine>> {
        let mut current = self.current.lock();
        self.switch_locked(&mut current, engine_type)
    }

    fn switch_locked(
        &self,
        current: &mut Option<(String, Arc<dyn TtsEngine>)>,
        engine_type: &str,
    ) -> Option<Arc<dyn TtsEngine>> {
        if let Some((active_type, _)) = current.take() {
            tracing::info!("[EngineManager] {} エンジンを破棄", active_type);
        }

        let engine: Option<Arc<dyn TtsEngine>> = match engine_type {
            "kokoro" => Some(Arc::new(KokoroEngine::new(self.config.settings().kokoro))),
            "disabled" => None,
            other => {
                tracing::warn!("[EngineManager] 未知のエンジン種別: {}", other);
                None
            }
        };

        if let Some(engine) = &engine {
            tracing::info!("[EngineManager] {} エンジンを作成", engine.name());
            *current = Some((engine_type.to_string(), engine.clone()));
        }
        engine
    }

    /// アクティブエンジンを破棄する
    ///
    /// 認証情報や接続先の変更後に呼ぶと、次回取得時に作り直される。
    pub fn dispose_current(&self) {
        let mut current = self.current.lock();
        if let Some((active_type, _)) = current.take() {
            tracing::info!("[EngineManager] {} エンジンを破棄", active_type);
        }
    }

    /// 現在アクティブなエンジン種別
    pub fn current_engine_type(&self) -> Option<String> {
        self.current.lock().as_ref().map(|(t, _)| t.clone())
    }
}
