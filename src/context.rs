//! アプリケーションコンテキスト
//!
//! 設定・共有状態・キュー・ブロードキャスターを起動時に1度だけ
//! 構築し、各コンポーネントへ参照で渡す。グローバル変数は持たない。

use std::sync::Arc;

use crate::announce::{AnnounceProcessor, AnnounceQueue};
use crate::config::{
    AppPaths, GiftConfig, MemberConfig, MonitorConfig, SoundConfig, TtsConfig,
};
use crate::state::{EventBroadcaster, StreamState};
use crate::tts::EngineManager;
use crate::watcher::{LogWatcher, ProcessedFileTracker};
use crate::webhook::WebhookClient;

/// アプリケーション全体の共有コンテキスト
pub struct AppContext {
    pub paths: AppPaths,
    pub monitor: Arc<MonitorConfig>,
    pub tts: Arc<TtsConfig>,
    pub gift: Arc<GiftConfig>,
    pub member: Arc<MemberConfig>,
    pub sound: Arc<SoundConfig>,
    pub queue: Arc<AnnounceQueue>,
    pub broadcaster: EventBroadcaster,
    pub state: Arc<StreamState>,
    pub engines: Arc<EngineManager>,
}

impl AppContext {
    /// 設定を読み込んでコンテキストを構築する
    pub fn new(paths: AppPaths) -> Self {
        let monitor = Arc::new(MonitorConfig::load(&paths.data_dir));
        let tts = Arc::new(TtsConfig::load(&paths.data_dir));
        let gift = Arc::new(GiftConfig::load(&paths.data_dir));
        let member = Arc::new(MemberConfig::load(&paths.data_dir));
        let sound = Arc::new(SoundConfig::load(&paths.data_dir));

        let queue = Arc::new(AnnounceQueue::new());
        let broadcaster = EventBroadcaster::new();
        let state = Arc::new(StreamState::new(
            queue.clone(),
            broadcaster.clone(),
            gift.clone(),
        ));
        let engines = Arc::new(EngineManager::new(tts.clone()));

        Self {
            paths,
            monitor,
            tts,
            gift,
            member,
            sound,
            queue,
            broadcaster,
            state,
            engines,
        }
    }

    /// ログ監視タスクを構築する
    pub fn build_watcher(&self) -> LogWatcher {
        let default_log_dir = self.paths.log_dir.join("messages");
        if let Err(e) = std::fs::create_dir_all(&default_log_dir) {
            tracing::warn!(
                "[Context] デフォルトログディレクトリの作成に失敗: {}",
                e
            );
        }
        LogWatcher::new(
            self.monitor.clone(),
            self.state.clone(),
            ProcessedFileTracker::load(&self.paths.log_dir),
            default_log_dir,
        )
    }

    /// 読み上げコンシューマを構築する
    pub fn build_processor(&self) -> AnnounceProcessor {
        AnnounceProcessor::new(
            self.state.clone(),
            self.queue.clone(),
            self.engines.clone(),
            WebhookClient::new(self.member.clone()),
            self.tts.clone(),
            self.sound.clone(),
            self.broadcaster.clone(),
            self.paths.audio_dir.clone(),
        )
    }

    /// マイルストーン目標値を変更し、集計を再計算する
    pub fn set_milestone_goal(&self, goal: f64) {
        self.gift.set_milestone_goal(goal);
        self.state.recalculate_milestones(self.gift.milestone_goal());
    }
}
