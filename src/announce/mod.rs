//! 読み上げキュー
//!
//! 再生待ちイベントのFIFOキュー。投入は非ブロッキング、取り出しは
//! 単一コンシューマ（[`processor::AnnounceProcessor`]）がエントリ到着
//! まで待機する。同一イベントIDの重複投入は許容する（再キューイング
//! のため重複排除はしない）。

pub mod processor;

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

pub use processor::AnnounceProcessor;

/// キューエントリ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// 対象イベントのID
    pub event_id: String,
    /// 再生完了時に既読化するか
    pub mark_read_on_play: bool,
}

/// 読み上げ待ちキュー
///
/// 内部ロックはpush/pop/clearの間だけ保持し、外部呼び出しを跨いで
/// 保持しない。
pub struct AnnounceQueue {
    entries: Mutex<VecDeque<QueueEntry>>,
    notify: Notify,
}

impl AnnounceQueue {
    /// 空のキューを作成
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// エントリを末尾に追加（非ブロッキング）
    pub fn push(&self, entry: QueueEntry) {
        self.entries.lock().push_back(entry);
        self.notify.notify_one();
    }

    /// 先頭エントリを取り出す（空の間は待機）
    pub async fn pop(&self) -> QueueEntry {
        loop {
            let notified = self.notify.notified();
            if let Some(entry) = self.entries.lock().pop_front() {
                return entry;
            }
            notified.await;
        }
    }

    /// 全エントリを破棄し、破棄した件数を返す
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let cleared = entries.len();
        entries.clear();
        cleared
    }

    /// 現在のキュー長
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// キューが空かどうか
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for AnnounceQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> QueueEntry {
        QueueEntry {
            event_id: id.to_string(),
            mark_read_on_play: true,
        }
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = AnnounceQueue::new();
        queue.push(entry("a"));
        queue.push(entry("b"));
        queue.push(entry("c"));

        assert_eq!(queue.pop().await.event_id, "a");
        assert_eq!(queue.pop().await.event_id, "b");
        assert_eq!(queue.pop().await.event_id, "c");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_duplicates_are_kept() {
        let queue = AnnounceQueue::new();
        queue.push(entry("a"));
        queue.push(entry("a"));
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = std::sync::Arc::new(AnnounceQueue::new());
        let popper = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        queue.push(entry("late"));

        let got = popper.await.unwrap();
        assert_eq!(got.event_id, "late");
    }

    #[test]
    fn test_clear_reports_count() {
        let queue = AnnounceQueue::new();
        queue.push(entry("a"));
        queue.push(entry("b"));
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.clear(), 0);
    }
}
