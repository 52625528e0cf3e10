//! チャットイベントのデータモデル
//!
//! ログ1行からパースされた型付きイベント。パース後は不変。

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 有料通貨（人民元）
pub const CURRENCY_CNY: &str = "元";
/// 無料通貨（銀瓜子）
pub const CURRENCY_SILVER: &str = "银瓜子";

/// イベント種別タグ
///
/// ログ行の `[<tag>]` 部分に対応する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// 弾幕（通常コメント）
    Dm,
    /// 無料ギフト
    FreeGift,
    /// 有料ギフト
    PaidGift,
    /// 艦隊加入（メンバーシップ）
    Guard,
    /// 醒目留言（スーパーチャット）
    Superchat,
}

impl EventKind {
    /// ログ行のタグ文字列から種別を判定
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "dm" => Some(Self::Dm),
            "free_gift" => Some(Self::FreeGift),
            "paid_gift" => Some(Self::PaidGift),
            "guard" => Some(Self::Guard),
            "superchat" => Some(Self::Superchat),
            _ => None,
        }
    }

    /// タグ文字列を取得
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dm => "dm",
            Self::FreeGift => "free_gift",
            Self::PaidGift => "paid_gift",
            Self::Guard => "guard",
            Self::Superchat => "superchat",
        }
    }
}

/// 艦隊階級
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardTier {
    /// 舰长
    Captain,
    /// 提督
    Admiral,
    /// 总督
    Governor,
    /// 判別不能な階級（フォーマット揺れ対応）
    Unknown,
}

impl GuardTier {
    /// ログ上の表記から階級を判定
    pub fn from_label(label: &str) -> Self {
        match label {
            "舰长" => Self::Captain,
            "提督" => Self::Admiral,
            "总督" => Self::Governor,
            _ => Self::Unknown,
        }
    }

    /// ログ上の表記を取得
    pub fn label(&self) -> &'static str {
        match self {
            Self::Captain => "舰长",
            Self::Admiral => "提督",
            Self::Governor => "总督",
            Self::Unknown => "未知舰队等级",
        }
    }

    /// Webhookルーティング用のタグ（判別不能な階級は対象外）
    pub fn webhook_tag(&self) -> Option<&'static str> {
        match self {
            Self::Captain => Some("captain"),
            Self::Admiral => Some("admiral"),
            Self::Governor => Some("governor"),
            Self::Unknown => None,
        }
    }

    /// 既知の全階級
    pub fn all() -> [GuardTier; 3] {
        [Self::Captain, Self::Admiral, Self::Governor]
    }
}

/// 種別ごとのペイロード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    /// 弾幕
    Dm { message: String },
    /// 無料ギフト
    FreeGift {
        gift_name: String,
        quantity: u32,
        value: f64,
        currency: String,
    },
    /// 有料ギフト
    PaidGift {
        gift_name: String,
        quantity: u32,
        value: f64,
        currency: String,
    },
    /// 艦隊加入
    Guard {
        tier: GuardTier,
        /// 購入月数
        duration: u32,
        value: f64,
        currency: String,
    },
    /// スーパーチャット
    Superchat {
        amount: f64,
        message: String,
        currency: String,
    },
}

impl EventPayload {
    /// ペイロードの種別タグ
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Dm { .. } => EventKind::Dm,
            Self::FreeGift { .. } => EventKind::FreeGift,
            Self::PaidGift { .. } => EventKind::PaidGift,
            Self::Guard { .. } => EventKind::Guard,
            Self::Superchat { .. } => EventKind::Superchat,
        }
    }
}

/// 読み上げ・通知用の付加情報
///
/// パーサーが読み上げ対象と判断したイベントにのみ付与される。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    /// 読み上げテキスト
    pub text: String,
    /// Webhookルーティングタグ（`captain` など）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_tag: Option<String>,
}

/// パース済みチャットイベント
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    /// ログ行のタイムスタンプ
    pub timestamp: NaiveDateTime,
    /// 投稿者名
    pub username: String,
    /// 種別ごとのペイロード
    pub payload: EventPayload,
    /// 読み上げ対象の場合の付加情報
    #[serde(skip_serializing_if = "Option::is_none")]
    pub announce: Option<Announcement>,
    /// 決定的に導出される一意ID
    ///
    /// `timestamp + username + kind` から導出する。同一キーの行は
    /// 衝突する（レジストリ上はlast-write-wins）。
    pub id: String,
}

impl ChatEvent {
    /// タイムスタンプ・投稿者・種別サフィックスからIDを導出
    pub fn derive_id(timestamp: &NaiveDateTime, username: &str, suffix: &str) -> String {
        format!(
            "{}_{}_{}",
            timestamp.format("%Y-%m-%dT%H:%M:%S"),
            username,
            suffix
        )
    }

    /// イベント種別
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// 読み上げ対象かどうか
    pub fn is_announceable(&self) -> bool {
        self.announce.is_some()
    }

    /// Webhookルーティングタグ（あれば）
    pub fn webhook_tag(&self) -> Option<&str> {
        self.announce
            .as_ref()
            .and_then(|a| a.webhook_tag.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 18)
            .unwrap()
            .and_hms_opt(5, 6, 32)
            .unwrap()
    }

    #[test]
    fn test_kind_tag_roundtrip() {
        for kind in [
            EventKind::Dm,
            EventKind::FreeGift,
            EventKind::PaidGift,
            EventKind::Guard,
            EventKind::Superchat,
        ] {
            assert_eq!(EventKind::from_tag(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::from_tag("unknown_tag"), None);
    }

    #[test]
    fn test_guard_tier_labels() {
        assert_eq!(GuardTier::from_label("舰长"), GuardTier::Captain);
        assert_eq!(GuardTier::from_label("提督"), GuardTier::Admiral);
        assert_eq!(GuardTier::from_label("总督"), GuardTier::Governor);
        assert_eq!(GuardTier::from_label("何か別の文字"), GuardTier::Unknown);
        assert_eq!(GuardTier::Captain.webhook_tag(), Some("captain"));
        assert_eq!(GuardTier::Unknown.webhook_tag(), None);
    }

    #[test]
    fn test_derive_id_is_deterministic() {
        let a = ChatEvent::derive_id(&ts(), "ユーザーA", "sc");
        let b = ChatEvent::derive_id(&ts(), "ユーザーA", "sc");
        assert_eq!(a, b);
        assert_eq!(a, "2026-01-18T05:06:32_ユーザーA_sc");
    }
}
