//! 読み上げコンシューマ
//!
//! キューから1件ずつ取り出し、Webhook発火 → セグメント再生 → 既読化
//! → 完了通知の順に処理する単一タスク。同時再生は常に1件まで。
//! 外部呼び出し（合成・Webhook）の失敗はログに残して次へ進む。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::AnnounceQueue;
use crate::config::{SoundConfig, TtsConfig};
use crate::models::ChatEvent;
use crate::state::{EventBroadcaster, StateChange, StreamState};
use crate::tts::{self, audio, EngineManager};
use crate::webhook::WebhookClient;

/// Webhook発火後のクールダウン（外部呼び出しのレート制限）
const WEBHOOK_COOLDOWN: Duration = Duration::from_secs(1);
/// メッセージ間の小休止
const INTER_MESSAGE_DELAY: Duration = Duration::from_millis(500);

/// 読み上げコンシューマ
pub struct AnnounceProcessor {
    state: Arc<StreamState>,
    queue: Arc<AnnounceQueue>,
    engines: Arc<EngineManager>,
    webhook: WebhookClient,
    tts_config: Arc<TtsConfig>,
    sound_config: Arc<SoundConfig>,
    broadcaster: EventBroadcaster,
    audio_dir: PathBuf,
}

impl AnnounceProcessor {
    /// 新しいコンシューマを作成
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: Arc<StreamState>,
        queue: Arc<AnnounceQueue>,
        engines: Arc<EngineManager>,
        webhook: WebhookClient,
        tts_config: Arc<TtsConfig>,
        sound_config: Arc<SoundConfig>,
        broadcaster: EventBroadcaster,
        audio_dir: PathBuf,
    ) -> Self {
        Self {
            state,
            queue,
            engines,
            webhook,
            tts_config,
            sound_config,
            broadcaster,
            audio_dir,
        }
    }

    /// 処理ループを実行する（シャットダウンまで戻らない）
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("[AnnounceProcessor] 開始");

        loop {
            let entry = tokio::select! {
                _ = shutdown.changed() => break,
                entry = self.queue.pop() => entry,
            };

            let Some(record) = self.state.announcement(&entry.event_id) else {
                tracing::warn!(
                    "[AnnounceProcessor] 未知のイベントIDをスキップ: {}",
                    entry.event_id
                );
                continue;
            };

            tracing::debug!("[AnnounceProcessor] 処理中: {}", entry.event_id);
            self.state.set_now_playing(Some(entry.event_id.clone()));

            self.play_event(&record.event, &mut shutdown).await;

            if entry.mark_read_on_play {
                self.state.mark_read_after_play(&entry.event_id);
            }
            self.state.set_now_playing(None);
            self.broadcaster.send(StateChange::PlaybackComplete {
                event_id: entry.event_id.clone(),
            });

            if *shutdown.borrow() {
                break;
            }
            if sleep_or_shutdown(&mut shutdown, INTER_MESSAGE_DELAY).await {
                break;
            }
        }

        // シャットダウン時に「再生中」のまま残さない
        self.state.set_now_playing(None);
        tracing::info!("[AnnounceProcessor] 停止");
    }

    /// 1イベント分のWebhook発火とセグメント再生
    async fn play_event(&self, event: &ChatEvent, shutdown: &mut watch::Receiver<bool>) {
        if let Some(tag) = event.webhook_tag() {
            self.webhook.trigger(tag).await;
            if sleep_or_shutdown(shutdown, WEBHOOK_COOLDOWN).await {
                return;
            }
        }

        let Some(announce) = &event.announce else {
            return;
        };

        let triggers = self.sound_config.triggers();
        let segments = tts::segment_announcement(&announce.text, &triggers);
        let settings = self.tts_config.settings();

        for segment in segments {
            if *shutdown.borrow() {
                return;
            }

            let display_text = if segment.is_command {
                format!("Playing Command: {}", segment.text)
            } else {
                segment.text.clone()
            };
            self.broadcaster.send(StateChange::NowPlaying {
                event_id: event.id.clone(),
                username: event.username.clone(),
                text: display_text,
                kind: event.kind(),
                is_command: segment.is_command,
            });

            if segment.is_command {
                self.play_command(&segment.text, &event.id).await;
            } else {
                self.play_text(&segment.text, &settings.voice, settings.speed_normal, &event.id)
                    .await;
            }
        }
    }

    /// サウンドコマンドを再生する
    async fn play_command(&self, trigger: &str, event_id: &str) {
        tracing::info!(
            "[AnnounceProcessor] コマンド再生: {} ({})",
            trigger,
            event_id
        );
        let Some(command) = self.sound_config.command_info(trigger) else {
            return;
        };
        let path = self.audio_dir.join(&command.filename);
        if let Err(e) = audio::play_command_file(&path, command.volume).await {
            tracing::error!("[AnnounceProcessor] コマンド音声の再生に失敗: {}", e);
        }
    }

    /// テキストセグメントを合成して再生する
    async fn play_text(&self, text: &str, voice: &str, speed: f32, event_id: &str) {
        tracing::info!(
            "[AnnounceProcessor] テキスト再生: {} ({})",
            text.chars().take(50).collect::<String>(),
            event_id
        );
        let Some(engine) = self.engines.engine() else {
            tracing::debug!("[AnnounceProcessor] エンジン無効のため合成スキップ");
            return;
        };
        match engine.render(text, voice, speed).await {
            Ok(wav_bytes) => {
                if let Err(e) = audio::play_wav(wav_bytes, 1.0).await {
                    tracing::error!("[AnnounceProcessor] 再生に失敗: {}", e);
                }
            }
            Err(e) => {
                tracing::error!("[AnnounceProcessor] 合成に失敗: {}", e);
            }
        }
    }
}

/// 指定時間待つ。シャットダウン要求が来たらtrueを返す。
async fn sleep_or_shutdown(shutdown: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown.changed() => true,
    }
}
