//! 共有集計状態
//!
//! ギフト収益・マイルストーン・艦隊数などの集計値と、読み上げ対象
//! メッセージのレジストリを1つの排他ロックで守る。各操作は
//! ロックを取ってから返すまでが1クリティカルセクションで、ロック
//! 保持中にawaitしない。

pub mod broadcaster;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::announce::{AnnounceQueue, QueueEntry};
use crate::config::GiftConfig;
use crate::models::{ChatEvent, EventPayload, GuardTier};

pub use broadcaster::{EventBroadcaster, StateChange};

/// 直近イベントの保持上限
const RECENT_EVENTS_CAP: usize = 500;

/// 読み上げレジストリの1レコード
#[derive(Debug, Clone)]
pub struct AnnouncementRecord {
    /// 対象イベント
    pub event: ChatEvent,
    /// 既読フラグ
    pub is_read: bool,
}

/// メンバー表示キューの1件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberNotice {
    pub username: String,
    pub tier: GuardTier,
}

/// 読み上げパイプラインの現在状況
#[derive(Debug, Clone, Serialize)]
pub struct AnnounceStatus {
    /// 自動再生が有効か
    pub autoplay: bool,
    /// キュー内の待ち件数
    pub queue_len: usize,
    /// 再生中イベントのID（なければNone）
    pub now_playing: Option<String>,
}

/// 表示層向けの読み取り専用スナップショット
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// 有料ギフト累計額（元）
    pub paid_gift_total_value: f64,
    /// 有料ギフト累計個数
    pub paid_gift_count: u64,
    /// スーパーチャット累計額（元）
    pub superchat_total_value: f64,
    /// 艦隊（メンバーシップ）累計額（元）
    pub membership_total_value: f64,
    /// 階級別の艦隊数（キーはログ上の表記）
    pub guard_counts: HashMap<String, u64>,
    /// マイルストーン進捗（常に `[0, goal)`）
    pub milestone_progress: f64,
    /// マイルストーン達成回数
    pub milestone_count: u64,
    /// 総艦隊数（初期値 + 加入分）
    pub total_guard_count: u64,
    /// APIから取得した初期艦隊数
    pub initial_guard_count: u64,
}

#[derive(Default)]
struct StateInner {
    paid_gift_total_value: f64,
    paid_gift_count: u64,
    superchat_total_value: f64,
    membership_total_value: f64,
    guard_counts: HashMap<GuardTier, u64>,
    milestone_progress: f64,
    milestone_count: u64,
    total_guard_count: u64,
    initial_guard_count: u64,
    recent_events: VecDeque<ChatEvent>,
    announcements: HashMap<String, AnnouncementRecord>,
    member_queue: VecDeque<MemberNotice>,
    autoplay: bool,
    now_playing: Option<String>,
}

/// 配信状態の集約
///
/// 集計値の唯一の書き込み経路は [`add_event`](Self::add_event)。
/// フィールドは一切公開せず、原子的な操作だけを提供する。
pub struct StreamState {
    inner: Mutex<StateInner>,
    queue: Arc<AnnounceQueue>,
    broadcaster: EventBroadcaster,
    gift_config: Arc<GiftConfig>,
}

impl StreamState {
    /// 新しい状態を作成
    pub fn new(
        queue: Arc<AnnounceQueue>,
        broadcaster: EventBroadcaster,
        gift_config: Arc<GiftConfig>,
    ) -> Self {
        Self {
            inner: Mutex::new(StateInner::default()),
            queue,
            broadcaster,
            gift_config,
        }
    }

    /// イベントを記録する
    ///
    /// 集計値の更新、読み上げレジストリへの登録、自動再生時の
    /// キュー投入までを1クリティカルセクションで行う。
    pub fn add_event(&self, event: ChatEvent) {
        let goal = self.gift_config.milestone_goal();
        let mut member_arrived: Option<MemberNotice> = None;

        let snapshot = {
            let mut inner = self.inner.lock();

            inner.recent_events.push_back(event.clone());
            if inner.recent_events.len() > RECENT_EVENTS_CAP {
                inner.recent_events.pop_front();
            }

            if event.is_announceable() {
                inner.announcements.insert(
                    event.id.clone(),
                    AnnouncementRecord {
                        event: event.clone(),
                        is_read: false,
                    },
                );
            }

            match &event.payload {
                EventPayload::PaidGift {
                    quantity, value, ..
                } => {
                    inner.paid_gift_total_value += value;
                    inner.paid_gift_count += u64::from(*quantity);
                    Self::apply_milestone(&mut inner, *value, goal);
                }
                EventPayload::Guard {
                    tier,
                    duration,
                    value,
                    ..
                } => {
                    *inner.guard_counts.entry(*tier).or_insert(0) += u64::from(*duration);
                    inner.total_guard_count += u64::from(*duration);
                    inner.membership_total_value += value;
                    Self::apply_milestone(&mut inner, *value, goal);

                    let notice = MemberNotice {
                        username: event.username.clone(),
                        tier: *tier,
                    };
                    inner.member_queue.push_back(notice.clone());
                    member_arrived = Some(notice);

                    if inner.autoplay {
                        self.enqueue_if_unread(&inner, &event.id);
                    }
                }
                EventPayload::Superchat { amount, .. } => {
                    inner.superchat_total_value += amount;
                    Self::apply_milestone(&mut inner, *amount, goal);

                    if inner.autoplay {
                        self.enqueue_if_unread(&inner, &event.id);
                    }
                }
                EventPayload::Dm { .. } | EventPayload::FreeGift { .. } => {}
            }

            Self::snapshot_locked(&inner)
        };

        if let Some(notice) = member_arrived {
            self.broadcaster.send(StateChange::MemberArrived {
                username: notice.username,
                tier: notice.tier,
            });
        }
        self.broadcaster
            .send(StateChange::EventRecorded { event, snapshot });
    }

    /// マイルストーン進捗を加算し、目標超過分をラップする
    ///
    /// 1イベントで複数回達成しうるため剰余ではなくループで減算する。
    fn apply_milestone(inner: &mut StateInner, amount: f64, goal: f64) {
        inner.milestone_progress += amount;
        if goal <= 0.0 {
            return;
        }
        while inner.milestone_progress >= goal {
            inner.milestone_progress -= goal;
            inner.milestone_count += 1;
        }
    }

    /// マイルストーンを新しい目標値で再計算する
    ///
    /// 逐次ラップ計算のドリフトを避けるため、累計額からゼロベースで
    /// 導出し直す。目標値変更時に呼ぶ。
    pub fn recalculate_milestones(&self, new_goal: f64) {
        if new_goal <= 0.0 {
            return;
        }
        let mut inner = self.inner.lock();
        let total_revenue = inner.paid_gift_total_value
            + inner.membership_total_value
            + inner.superchat_total_value;
        inner.milestone_count = (total_revenue / new_goal).floor() as u64;
        inner.milestone_progress = total_revenue % new_goal;
        tracing::info!(
            "[State] マイルストーン再計算 - 累計: {}, 目標: {}, 回数: {}, 進捗: {}",
            total_revenue,
            new_goal,
            inner.milestone_count,
            inner.milestone_progress
        );
    }

    /// 初期艦隊数を設定する（総艦隊数もこの値から数え直す）
    pub fn set_initial_guard_count(&self, count: u64) {
        let mut inner = self.inner.lock();
        inner.initial_guard_count = count;
        inner.total_guard_count = count;
    }

    /// 現在のスナップショットを取得
    pub fn snapshot(&self) -> StateSnapshot {
        Self::snapshot_locked(&self.inner.lock())
    }

    fn snapshot_locked(inner: &StateInner) -> StateSnapshot {
        StateSnapshot {
            paid_gift_total_value: inner.paid_gift_total_value,
            paid_gift_count: inner.paid_gift_count,
            superchat_total_value: inner.superchat_total_value,
            membership_total_value: inner.membership_total_value,
            guard_counts: inner
                .guard_counts
                .iter()
                .map(|(tier, count)| (tier.label().to_string(), *count))
                .collect(),
            milestone_progress: inner.milestone_progress,
            milestone_count: inner.milestone_count,
            total_guard_count: inner.total_guard_count,
            initial_guard_count: inner.initial_guard_count,
        }
    }

    /// 未読ならキューに投入する（ロック保持中に呼ぶ）
    fn enqueue_if_unread(&self, inner: &StateInner, event_id: &str) {
        let unread = inner
            .announcements
            .get(event_id)
            .map(|r| !r.is_read)
            .unwrap_or(false);
        if unread {
            self.queue.push(QueueEntry {
                event_id: event_id.to_string(),
                mark_read_on_play: true,
            });
        }
    }

    /// 自動再生を切り替える
    ///
    /// ONにした場合、キューが空なら最も古い未読1件だけを投入して
    /// 再生を再開する（バックログを一斉投入しない）。OFFにした場合は
    /// 未再生エントリを既読化せずに破棄する。
    pub fn set_autoplay(&self, enabled: bool) {
        let queue_cleared = {
            let mut inner = self.inner.lock();
            inner.autoplay = enabled;

            if enabled {
                if self.queue.is_empty() {
                    let oldest_unread = inner
                        .announcements
                        .values()
                        .filter(|r| !r.is_read)
                        .min_by_key(|r| r.event.timestamp)
                        .map(|r| r.event.id.clone());
                    if let Some(event_id) = oldest_unread {
                        self.queue.push(QueueEntry {
                            event_id,
                            mark_read_on_play: true,
                        });
                    }
                }
                false
            } else {
                self.queue.clear();
                true
            }
        };

        if queue_cleared {
            self.broadcaster.send(StateChange::QueueCleared);
        }
        self.broadcaster
            .send(StateChange::AutoplayChanged { enabled });
        tracing::info!("[State] 自動再生を{}に切り替え", enabled);
    }

    /// 自動再生が有効かどうか
    pub fn autoplay(&self) -> bool {
        self.inner.lock().autoplay
    }

    /// 指定イベントを手動でキューに投入する
    ///
    /// 自動再生の状態に関わらず常に既読化フラグ付きで投入する。
    /// 既知のイベントIDでなければfalse。
    pub fn play_event(&self, event_id: &str) -> bool {
        let known = self.inner.lock().announcements.contains_key(event_id);
        if !known {
            return false;
        }
        self.queue.push(QueueEntry {
            event_id: event_id.to_string(),
            mark_read_on_play: true,
        });
        self.broadcaster.send(StateChange::MessageQueued {
            event_id: event_id.to_string(),
            queue_len: self.queue.len(),
        });
        true
    }

    /// 既読状態を設定/反転する
    ///
    /// `desired` がNoneなら反転。変更後の値を返す（未知のIDはNone）。
    pub fn toggle_read(&self, event_id: &str, desired: Option<bool>) -> Option<bool> {
        let is_read = {
            let mut inner = self.inner.lock();
            let record = inner.announcements.get_mut(event_id)?;
            record.is_read = desired.unwrap_or(!record.is_read);
            record.is_read
        };
        self.broadcaster.send(StateChange::ReadStateChanged {
            event_id: event_id.to_string(),
            is_read,
        });
        Some(is_read)
    }

    /// 全レコードを既読化する
    pub fn mark_all_read(&self) {
        {
            let mut inner = self.inner.lock();
            for record in inner.announcements.values_mut() {
                record.is_read = true;
            }
        }
        self.broadcaster.send(StateChange::AllMarkedRead);
    }

    /// 再生完了時の既読化（通知なし、コンシューマ専用）
    pub(crate) fn mark_read_after_play(&self, event_id: &str) {
        if let Some(record) = self.inner.lock().announcements.get_mut(event_id) {
            record.is_read = true;
        }
    }

    /// 読み上げレジストリから1件取得
    pub fn announcement(&self, event_id: &str) -> Option<AnnouncementRecord> {
        self.inner.lock().announcements.get(event_id).cloned()
    }

    /// 未読の読み上げ対象イベント（古い順）
    pub fn unread_announcements(&self) -> Vec<ChatEvent> {
        let inner = self.inner.lock();
        let mut unread: Vec<ChatEvent> = inner
            .announcements
            .values()
            .filter(|r| !r.is_read)
            .map(|r| r.event.clone())
            .collect();
        unread.sort_by_key(|e| e.timestamp);
        unread
    }

    /// 読み上げ履歴（ID順 = 時系列順）
    pub fn announcement_history(&self) -> Vec<AnnouncementRecord> {
        let inner = self.inner.lock();
        let mut history: Vec<AnnouncementRecord> = inner.announcements.values().cloned().collect();
        history.sort_by(|a, b| a.event.id.cmp(&b.event.id));
        history
    }

    /// 再生中イベントを設定する（コンシューマ専用）
    pub(crate) fn set_now_playing(&self, event_id: Option<String>) {
        self.inner.lock().now_playing = event_id;
    }

    /// 読み上げパイプラインの現在状況
    pub fn status(&self) -> AnnounceStatus {
        let inner = self.inner.lock();
        AnnounceStatus {
            autoplay: inner.autoplay,
            queue_len: self.queue.len(),
            now_playing: inner.now_playing.clone(),
        }
    }

    /// メンバー表示キューから次の1件を取り出す
    pub fn next_member(&self) -> Option<MemberNotice> {
        self.inner.lock().member_queue.pop_front()
    }

    /// メンバー表示キューの待ち件数
    pub fn member_queue_len(&self) -> usize {
        self.inner.lock().member_queue.len()
    }

    /// 直近イベント（新しい順ではなく記録順）
    pub fn recent_events(&self) -> Vec<ChatEvent> {
        self.inner.lock().recent_events.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Announcement, EventKind};
    use chrono::NaiveDate;

    fn make_state(goal: f64) -> (Arc<StreamState>, Arc<AnnounceQueue>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let gift_config = Arc::new(GiftConfig::load(dir.path()));
        gift_config.set_milestone_goal(goal);
        let queue = Arc::new(AnnounceQueue::new());
        let state = Arc::new(StreamState::new(
            queue.clone(),
            EventBroadcaster::new(),
            gift_config,
        ));
        (state, queue, dir)
    }

    fn ts(sec: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 18)
            .unwrap()
            .and_hms_opt(12, 0, sec)
            .unwrap()
    }

    fn paid_gift(sec: u32, value: f64) -> ChatEvent {
        let timestamp = ts(sec);
        ChatEvent {
            timestamp,
            username: "小红".to_string(),
            payload: EventPayload::PaidGift {
                gift_name: "小花花".to_string(),
                quantity: 1,
                value,
                currency: "元".to_string(),
            },
            announce: None,
            id: ChatEvent::derive_id(&timestamp, "小红", EventKind::PaidGift.as_str()),
        }
    }

    fn superchat(sec: u32, amount: f64, username: &str) -> ChatEvent {
        let timestamp = ts(sec);
        ChatEvent {
            timestamp,
            username: username.to_string(),
            payload: EventPayload::Superchat {
                amount,
                message: "加油".to_string(),
                currency: "元".to_string(),
            },
            announce: Some(Announcement {
                text: format!("{}说: 加油", username),
                webhook_tag: None,
            }),
            id: ChatEvent::derive_id(&timestamp, username, "sc"),
        }
    }

    fn guard(sec: u32, tier: GuardTier, duration: u32, value: f64) -> ChatEvent {
        let timestamp = ts(sec);
        ChatEvent {
            timestamp,
            username: "老板".to_string(),
            payload: EventPayload::Guard {
                tier,
                duration,
                value,
                currency: "元".to_string(),
            },
            announce: Some(Announcement {
                text: "老板。\t 非常感谢您的支持！".to_string(),
                webhook_tag: tier.webhook_tag().map(str::to_string),
            }),
            id: ChatEvent::derive_id(&timestamp, "老板", &format!("guard_{}", tier.label())),
        }
    }

    #[test]
    fn test_milestone_wraps_across_events() {
        // 200元 x 3、目標500 → 1回達成・進捗100
        let (state, _queue, _dir) = make_state(500.0);
        for sec in 0..3 {
            state.add_event(paid_gift(sec, 200.0));
        }
        let snapshot = state.snapshot();
        assert_eq!(snapshot.milestone_count, 1);
        assert!((snapshot.milestone_progress - 100.0).abs() < 1e-9);
        assert_eq!(snapshot.paid_gift_count, 3);
        assert!((snapshot.paid_gift_total_value - 600.0).abs() < 1e-9);
    }

    #[test]
    fn test_milestone_multi_wrap_in_single_event() {
        // 目標より大きい1イベントで複数回達成する
        let (state, _queue, _dir) = make_state(100.0);
        state.add_event(paid_gift(0, 1050.0));
        let snapshot = state.snapshot();
        assert_eq!(snapshot.milestone_count, 10);
        assert!((snapshot.milestone_progress - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_milestone_invariant_holds() {
        let goal = 130.0;
        let (state, _queue, _dir) = make_state(goal);
        let amounts = [12.5, 300.0, 88.8, 129.9, 130.0, 1.0];
        for (i, amount) in amounts.iter().enumerate() {
            state.add_event(paid_gift(i as u32, *amount));
        }
        let snapshot = state.snapshot();
        let total: f64 = amounts.iter().sum();
        assert!(snapshot.milestone_progress >= 0.0 && snapshot.milestone_progress < goal);
        let reconstructed = snapshot.milestone_progress + snapshot.milestone_count as f64 * goal;
        assert!((reconstructed - total).abs() < 1e-6);
    }

    #[test]
    fn test_recalculate_matches_from_scratch() {
        // 200元 x 3 の後で目標を150に変更 → 600/150 = 4回・進捗0
        let (state, _queue, _dir) = make_state(500.0);
        for sec in 0..3 {
            state.add_event(paid_gift(sec, 200.0));
        }
        state.recalculate_milestones(150.0);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.milestone_count, 4);
        assert!(snapshot.milestone_progress.abs() < 1e-9);
    }

    #[test]
    fn test_recalculate_ignores_non_positive_goal() {
        let (state, _queue, _dir) = make_state(500.0);
        state.add_event(paid_gift(0, 200.0));
        state.recalculate_milestones(0.0);
        let snapshot = state.snapshot();
        assert!((snapshot.milestone_progress - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_guard_counts_and_membership_revenue() {
        let (state, _queue, _dir) = make_state(500.0);
        state.set_initial_guard_count(10);
        state.add_event(guard(0, GuardTier::Captain, 1, 138.0));
        state.add_event(guard(1, GuardTier::Admiral, 3, 1998.0));

        let snapshot = state.snapshot();
        assert_eq!(snapshot.total_guard_count, 14);
        assert_eq!(snapshot.guard_counts.get("舰长"), Some(&1));
        assert_eq!(snapshot.guard_counts.get("提督"), Some(&3));
        assert!((snapshot.membership_total_value - 2136.0).abs() < 1e-9);

        // メンバー表示キューにも積まれる
        assert_eq!(state.member_queue_len(), 2);
        let first = state.next_member().unwrap();
        assert_eq!(first.tier, GuardTier::Captain);
        assert_eq!(state.member_queue_len(), 1);
    }

    #[test]
    fn test_autoplay_gates_auto_enqueue() {
        let (state, queue, _dir) = make_state(500.0);
        state.add_event(superchat(0, 30.0, "甲"));
        assert!(queue.is_empty());

        state.set_autoplay(true);
        // ONにした時点で最古の未読1件が投入される
        assert_eq!(queue.len(), 1);

        state.add_event(superchat(1, 50.0, "乙"));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_autoplay_off_then_on_rearms_single_oldest_unread() {
        let (state, queue, _dir) = make_state(500.0);
        state.set_autoplay(true);
        queue.clear();

        state.add_event(superchat(2, 30.0, "三番"));
        state.add_event(superchat(1, 30.0, "二番"));
        state.add_event(superchat(0, 30.0, "一番"));
        assert_eq!(queue.len(), 3);

        // OFFで全部破棄（既読化されない）
        state.set_autoplay(false);
        assert!(queue.is_empty());
        assert_eq!(state.unread_announcements().len(), 3);

        // ONで最古の未読1件だけが再投入される
        state.set_autoplay(true);
        assert_eq!(queue.len(), 1);
        let entry = tokio_test::block_on(queue.pop());
        assert!(entry.event_id.contains("一番"));
        assert!(entry.mark_read_on_play);
    }

    #[test]
    fn test_manual_play_always_enqueues() {
        let (state, queue, _dir) = make_state(500.0);
        let event = superchat(0, 30.0, "甲");
        let id = event.id.clone();
        state.add_event(event);

        // 自動再生OFFでも手動再生は通る
        assert!(state.play_event(&id));
        assert_eq!(queue.len(), 1);

        // 重複投入も許容される
        assert!(state.play_event(&id));
        assert_eq!(queue.len(), 2);

        // 未知のIDは拒否
        assert!(!state.play_event("存在しないID"));
    }

    #[test]
    fn test_toggle_read_and_mark_all() {
        let (state, _queue, _dir) = make_state(500.0);
        let event = superchat(0, 30.0, "甲");
        let id = event.id.clone();
        state.add_event(event);

        assert_eq!(state.toggle_read(&id, None), Some(true));
        assert_eq!(state.toggle_read(&id, None), Some(false));
        assert_eq!(state.toggle_read(&id, Some(true)), Some(true));
        assert_eq!(state.toggle_read("未知", None), None);

        state.add_event(superchat(1, 30.0, "乙"));
        state.mark_all_read();
        assert!(state.unread_announcements().is_empty());
    }

    #[test]
    fn test_snapshot_after_each_event_is_broadcast() {
        let dir = tempfile::tempdir().unwrap();
        let gift_config = Arc::new(GiftConfig::load(dir.path()));
        let queue = Arc::new(AnnounceQueue::new());
        let broadcaster = EventBroadcaster::new();
        let mut rx = broadcaster.subscribe();
        let state = StreamState::new(queue, broadcaster, gift_config);

        state.add_event(paid_gift(0, 200.0));

        match tokio_test::block_on(rx.recv()).unwrap() {
            StateChange::EventRecorded { snapshot, .. } => {
                assert!((snapshot.paid_gift_total_value - 200.0).abs() < 1e-9);
            }
            other => panic!("unexpected change: {:?}", other),
        }
    }
}
