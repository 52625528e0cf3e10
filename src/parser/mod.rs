//! チャットログ行パーサー
//!
//! `<YYYY-MM-DD HH:MM:SS> [<kind>] <本文>` 形式の1行を型付きイベントに
//! 変換する。本文のサブ文法は区切りトークンの位置検索で抽出する
//! （ログ出力側のフォーマットに厳密一致させるため、汎用トークナイザは
//! 使わない）。不正な行は `None` で破棄し、呼び出し側には決して
//! エラーを返さない。

use chrono::NaiveDateTime;
use regex::Regex;

use crate::models::{
    Announcement, ChatEvent, EventKind, EventPayload, GuardTier, CURRENCY_CNY, CURRENCY_SILVER,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// 本文サブ文法の区切りトークン
const GIFT_DELIM: &str = " 赠送了 ";
const GIFT_QTY_DELIM: &str = " x ";
const GUARD_DELIM: &str = " 购买了 ";
const SC_DELIM: &str = " 发送了 ";
const SC_MESSAGE_DELIM: &str = " 元的醒目留言：";
const TOTAL_PRICE_DELIM: &str = "总价 ";

/// チャットログ行パーサー
pub struct ChatLogParser {
    /// 艦隊行の構造化マッチ（失敗時は手動スキャンにフォールバック）
    guard_re: Regex,
}

impl ChatLogParser {
    /// 新しいパーサーを作成
    pub fn new() -> Self {
        let guard_re =
            Regex::new(r"^(.+?) 购买了 (\d+)([^\s]+) (舰长|提督|总督)，总价 ([\d.]+) 元$")
                .expect("艦隊行の正規表現の構築に失敗");
        Self { guard_re }
    }

    /// 1行をパースする
    ///
    /// 不正な行（タイムスタンプ不備、未知の種別タグ、区切りトークン
    /// 欠落など）は `None` を返す。副作用はない。
    pub fn parse_line(&self, line: &str) -> Option<ChatEvent> {
        let line = line.trim_start_matches('\u{feff}').trim_end();
        if line.is_empty() {
            return None;
        }

        let timestamp_end = line.find(" [")?;
        let timestamp = match NaiveDateTime::parse_from_str(&line[..timestamp_end], TIMESTAMP_FORMAT)
        {
            Ok(ts) => ts,
            Err(e) => {
                tracing::debug!("タイムスタンプのパースに失敗: {} ({})", line, e);
                return None;
            }
        };

        let type_start = timestamp_end + 2;
        let type_end = line[type_start..].find(']')? + type_start;
        let kind = match EventKind::from_tag(&line[type_start..type_end]) {
            Some(kind) => kind,
            None => {
                tracing::debug!("未知の種別タグ: {}", &line[type_start..type_end]);
                return None;
            }
        };

        let content = line.get(type_end + 1..).unwrap_or("").trim();

        let event = match kind {
            EventKind::Dm => Some(Self::parse_dm(timestamp, content)),
            EventKind::FreeGift => {
                Self::parse_gift(timestamp, content, EventKind::FreeGift, CURRENCY_SILVER)
            }
            EventKind::PaidGift => {
                Self::parse_gift(timestamp, content, EventKind::PaidGift, CURRENCY_CNY)
            }
            EventKind::Guard => self.parse_guard(timestamp, content),
            EventKind::Superchat => Self::parse_superchat(timestamp, content),
        };

        if event.is_none() {
            tracing::debug!("本文のパースに失敗: {}", line);
        }
        event
    }

    /// 弾幕行: `<user>：<message>`
    fn parse_dm(timestamp: NaiveDateTime, content: &str) -> ChatEvent {
        let mut parts = content.splitn(2, '：');
        let username = parts.next().unwrap_or("").to_string();
        let message = parts.next().unwrap_or("").to_string();
        let id = ChatEvent::derive_id(&timestamp, &username, "dm");
        ChatEvent {
            timestamp,
            username,
            payload: EventPayload::Dm { message },
            announce: None,
            id,
        }
    }

    /// ギフト行: `<user> 赠送了 <gift> x <qty>，总价 <value> <currency>`
    fn parse_gift(
        timestamp: NaiveDateTime,
        content: &str,
        kind: EventKind,
        currency: &str,
    ) -> Option<ChatEvent> {
        let username_end = content.find(GIFT_DELIM)?;
        let username = content[..username_end].to_string();

        let gift_start = username_end + GIFT_DELIM.len();
        let gift_end = content[gift_start..].find(GIFT_QTY_DELIM)? + gift_start;
        let gift_name = content[gift_start..gift_end].to_string();

        let quantity_start = gift_end + GIFT_QTY_DELIM.len();
        let quantity_end = content[quantity_start..].find('，')? + quantity_start;
        let quantity: u32 = content[quantity_start..quantity_end].parse().ok()?;

        let value_start = content.find(TOTAL_PRICE_DELIM)? + TOTAL_PRICE_DELIM.len();
        let value_end = content.find(&format!(" {}", currency))?;
        let value: f64 = content.get(value_start..value_end)?.parse().ok()?;

        let suffix = kind.as_str();
        let id = ChatEvent::derive_id(&timestamp, &username, suffix);
        let payload = match kind {
            EventKind::FreeGift => EventPayload::FreeGift {
                gift_name,
                quantity,
                value,
                currency: currency.to_string(),
            },
            _ => EventPayload::PaidGift {
                gift_name,
                quantity,
                value,
                currency: currency.to_string(),
            },
        };

        Some(ChatEvent {
            timestamp,
            username,
            payload,
            announce: None,
            id,
        })
    }

    /// 艦隊行: `<user> 购买了 <n>个月 <tier>，总价 <value> 元`
    ///
    /// まず構造化マッチを試し、失敗したら区切りトークンの手動スキャンで
    /// 軽微なフォーマット揺れを許容する。
    fn parse_guard(&self, timestamp: NaiveDateTime, content: &str) -> Option<ChatEvent> {
        let (username, duration, tier, value) = if let Some(caps) = self.guard_re.captures(content)
        {
            let username = caps.get(1)?.as_str().to_string();
            let duration: u32 = caps.get(2)?.as_str().parse().ok()?;
            let tier = GuardTier::from_label(caps.get(4)?.as_str());
            let value: f64 = caps.get(5)?.as_str().parse().ok()?;
            (username, duration, tier, value)
        } else {
            let username_end = content.find(GUARD_DELIM)?;
            let username = content[..username_end].to_string();

            let rest = &content[username_end + GUARD_DELIM.len()..];
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            let duration: u32 = digits.parse().ok()?;

            let tier = GuardTier::all()
                .into_iter()
                .find(|t| content.contains(t.label()))
                .unwrap_or(GuardTier::Unknown);

            let value_start = content.find(TOTAL_PRICE_DELIM)? + TOTAL_PRICE_DELIM.len();
            let value_end = content.find(&format!(" {}", CURRENCY_CNY))?;
            let value: f64 = content.get(value_start..value_end)?.parse().ok()?;
            (username, duration, tier, value)
        };

        let announce = Announcement {
            text: format!("{}。\t 非常感谢您的支持！", username),
            webhook_tag: tier.webhook_tag().map(str::to_string),
        };
        let id = ChatEvent::derive_id(&timestamp, &username, &format!("guard_{}", tier.label()));

        Some(ChatEvent {
            timestamp,
            username,
            payload: EventPayload::Guard {
                tier,
                duration,
                value,
                currency: CURRENCY_CNY.to_string(),
            },
            announce: Some(announce),
            id,
        })
    }

    /// スーパーチャット行: `<user> 发送了 <amount> 元的醒目留言：<message>`
    fn parse_superchat(timestamp: NaiveDateTime, content: &str) -> Option<ChatEvent> {
        let username_end = content.find(SC_DELIM)?;
        let username = content[..username_end].to_string();

        let amount_start = username_end + SC_DELIM.len();
        let amount_end = content.find(SC_MESSAGE_DELIM)?;
        let amount: f64 = content.get(amount_start..amount_end)?.parse().ok()?;

        let message = content[amount_end + SC_MESSAGE_DELIM.len()..].to_string();

        let announce = Announcement {
            text: format!("{}说: {}", username, message),
            webhook_tag: None,
        };
        let id = ChatEvent::derive_id(&timestamp, &username, "sc");

        Some(ChatEvent {
            timestamp,
            username,
            payload: EventPayload::Superchat {
                amount,
                message,
                currency: CURRENCY_CNY.to_string(),
            },
            announce: Some(announce),
            id,
        })
    }
}

impl Default for ChatLogParser {
    fn default() -> Self {
        Self::new()
    }
}
