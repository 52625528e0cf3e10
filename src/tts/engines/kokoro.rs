//! Kokoroエンジン実装
//!
//! ローカルで動くKokoro合成サーバー（OpenAI互換API）に中国語音声の
//! 合成を依頼する。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{TtsEngine, VoiceInfo};
use crate::config::KokoroConfig;
use crate::tts::error::TtsError;

/// Kokoroエンジン
pub struct KokoroEngine {
    config: KokoroConfig,
    client: reqwest::Client,
}

impl KokoroEngine {
    /// 新しいインスタンスを作成
    pub fn new(config: KokoroConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("HTTPクライアントの作成に失敗");

        Self { config, client }
    }

    fn base_url(&self) -> String {
        format!("http://{}:{}", self.config.host, self.config.port)
    }
}

#[async_trait]
impl TtsEngine for KokoroEngine {
    async fn render(&self, text: &str, voice: &str, speed: f32) -> Result<Vec<u8>, TtsError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!("🔊 Kokoroに送信: {} (voice={}, speed={})", text, voice, speed);

        let url = format!("{}/v1/audio/speech", self.base_url());
        let body = json!({
            "model": "kokoro",
            "input": text,
            "voice": voice,
            "speed": speed,
            "response_format": "wav",
        });

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(TtsError::Connection(format!(
                "合成リクエストに失敗: ステータス {}",
                response.status()
            )));
        }

        let wav_bytes = response.bytes().await?.to_vec();
        tracing::debug!("✅ Kokoro合成完了 ({} bytes)", wav_bytes.len());
        Ok(wav_bytes)
    }

    async fn test_connection(&self) -> Result<bool, TtsError> {
        let url = format!("{}/health", self.base_url());
        match self.client.get(&url).send().await {
            Ok(response) => {
                if response.status().is_success() {
                    tracing::info!("✅ Kokoro接続成功");
                    Ok(true)
                } else {
                    tracing::warn!("⚠️ Kokoro接続失敗: ステータス {}", response.status());
                    Ok(false)
                }
            }
            Err(e) => {
                tracing::error!("❌ Kokoro接続エラー: {}", e);
                Err(TtsError::Connection(format!(
                    "Kokoroサーバーに接続できません: {}",
                    e
                )))
            }
        }
    }

    fn voices(&self) -> Vec<VoiceInfo> {
        // 中国語対応の声のみ
        [
            ("zm_yunjian", "Chinese Male (云健)"),
            ("zf_xiaoxiao", "Chinese Female (晓晓)"),
            ("zf_xiaoyi", "Chinese Female (晓依)"),
            ("zm_yunxi", "Chinese Male (云希)"),
        ]
        .iter()
        .map(|(value, label)| VoiceInfo {
            value: value.to_string(),
            label: label.to_string(),
        })
        .collect()
    }

    fn name(&self) -> &'static str {
        "Kokoro"
    }
}
