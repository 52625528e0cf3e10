//! 状態変更のブロードキャストシステム
//!
//! 集計状態や読み上げライフサイクルの変化を、トランスポート非依存の
//! イベントとしてサブスクライバー（ウィジェット配信層など）に通知する。
//! 各イベントは必要最小限のデータのみを含む。

use tokio::sync::broadcast;

use crate::models::{ChatEvent, EventKind, GuardTier};
use crate::state::StateSnapshot;

/// 状態変更イベント
#[derive(Clone, Debug)]
pub enum StateChange {
    /// イベントが集計に記録された
    EventRecorded {
        /// 記録されたイベント
        event: ChatEvent,
        /// 記録後のスナップショット
        snapshot: StateSnapshot,
    },

    /// 艦隊加入がメンバー表示キューに入った
    MemberArrived { username: String, tier: GuardTier },

    /// セグメントの再生を開始した
    NowPlaying {
        event_id: String,
        username: String,
        text: String,
        kind: EventKind,
        is_command: bool,
    },

    /// 1件の再生が完了した
    PlaybackComplete { event_id: String },

    /// 手動再生でキューに追加された
    MessageQueued { event_id: String, queue_len: usize },

    /// キューが破棄された
    QueueCleared,

    /// 既読状態が変更された
    ReadStateChanged { event_id: String, is_read: bool },

    /// 全件既読化された
    AllMarkedRead,

    /// 自動再生の有効/無効が切り替わった
    AutoplayChanged { enabled: bool },
}

/// 状態変更のブロードキャスター
///
/// `tokio::sync::broadcast` で複数サブスクライバーに通知する。
/// 遅延したサブスクライバーは古いイベントを取りこぼす（lagged）。
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<StateChange>,
}

impl EventBroadcaster {
    /// 新しいブロードキャスターを作成（バッファ256件）
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// 新しいサブスクリプションを作成
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.sender.subscribe()
    }

    /// 状態変更を通知（サブスクライバー不在なら破棄）
    pub fn send(&self, change: StateChange) {
        let _ = self.sender.send(change);
    }

    /// 現在のサブスクライバー数
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_receives_changes() {
        let broadcaster = EventBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        broadcaster.send(StateChange::QueueCleared);

        match rx.recv().await.unwrap() {
            StateChange::QueueCleared => {}
            other => panic!("unexpected change: {:?}", other),
        }
    }

    #[test]
    fn test_send_without_subscribers_is_noop() {
        let broadcaster = EventBroadcaster::new();
        broadcaster.send(StateChange::AllMarkedRead);
        assert_eq!(broadcaster.receiver_count(), 0);
    }
}
