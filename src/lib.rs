//! bilivox — Bilibiliライブ配信コンパニオン
//!
//! チャットログを追跡して型付きイベントにパースし、収益マイルストーン
//! や艦隊数を集計し、オーバーレイウィジェット向けの更新通知と
//! TTS読み上げキューへ流し込むパイプライン。

pub mod announce;
pub mod api;
pub mod config;
pub mod context;
pub mod models;
pub mod parser;
pub mod state;
pub mod tts;
pub mod watcher;
pub mod webhook;

// Re-export the main pipeline types for convenience
pub use announce::{AnnounceProcessor, AnnounceQueue, QueueEntry};
pub use context::AppContext;
pub use models::{Announcement, ChatEvent, EventKind, EventPayload, GuardTier};
pub use parser::ChatLogParser;
pub use state::{
    AnnounceStatus, AnnouncementRecord, EventBroadcaster, StateChange, StateSnapshot, StreamState,
};
pub use watcher::{LogWatcher, ProcessedFileTracker};
