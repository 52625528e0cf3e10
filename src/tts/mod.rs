//! TTS（テキスト読み上げ）
//!
//! 読み上げテキストのセグメント分割と、音声合成エンジン・音声出力の
//! 管理。合成エンジンは「テキスト＋声ID＋話速 → 音声バイト列」の
//! 差し替え可能な能力として扱う。

pub mod audio;
pub mod engines;
pub mod error;

pub use engines::{EngineManager, KokoroEngine, TtsEngine, VoiceInfo};
pub use error::TtsError;

/// 読み上げテキストの1セグメント
///
/// サウンドコマンド（音声ファイル再生）と通常テキスト（音声合成）を
/// 出現順のまま区別する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// セグメント本文（コマンドの場合はトリガー語そのもの）
    pub text: String,
    /// サウンドコマンドかどうか
    pub is_command: bool,
}

impl Segment {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_command: false,
        }
    }

    fn command(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_command: true,
        }
    }
}

/// テキストをサウンドコマンドで分割する
///
/// `triggers` は長いもの優先でソート済みであること
/// （[`crate::config::SoundConfig::triggers`] の順序）。
/// 戻り値は（セグメント列、コマンドを除いたテキスト、コマンド過多か）。
pub fn split_text_with_commands(
    text: &str,
    triggers: &[String],
) -> (Vec<Segment>, String, bool) {
    if triggers.is_empty() {
        return (vec![Segment::plain(text)], text.to_string(), false);
    }

    let pattern = triggers
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    let re = match regex::Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            tracing::error!("[TTS] コマンドパターンの構築に失敗: {}", e);
            return (vec![Segment::plain(text)], text.to_string(), false);
        }
    };

    let mut segments = Vec::new();
    let mut cleaned_parts = Vec::new();
    let mut current_pos = 0;
    let mut command_count = 0;

    for m in re.find_iter(text) {
        if m.start() > current_pos {
            let pre_text = text[current_pos..m.start()].trim();
            if !pre_text.is_empty() {
                segments.push(Segment::plain(pre_text));
                cleaned_parts.push(pre_text);
            }
        }
        segments.push(Segment::command(m.as_str()));
        command_count += 1;
        current_pos = m.end();
    }

    if current_pos < text.len() {
        let remaining = text[current_pos..].trim();
        if !remaining.is_empty() {
            segments.push(Segment::plain(remaining));
            cleaned_parts.push(remaining);
        }
    }

    let cleaned_text = cleaned_parts.join(" ").trim().to_string();
    let too_many_commands = command_count > 3;
    (segments, cleaned_text, too_many_commands)
}

/// 読み上げ用のセグメント列を組み立てる
///
/// コマンドが多すぎる行（4個以上）はいたずらとみなし、コマンドを
/// 展開せず全文を1セグメントとして読み上げる。
pub fn segment_announcement(text: &str, triggers: &[String]) -> Vec<Segment> {
    let (segments, _cleaned, too_many) = split_text_with_commands(text, triggers);
    if too_many {
        vec![Segment::plain(text)]
    } else {
        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triggers(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_split_without_commands() {
        let (segments, cleaned, too_many) = split_text_with_commands("ただのテキスト", &[]);
        assert_eq!(segments, vec![Segment::plain("ただのテキスト")]);
        assert_eq!(cleaned, "ただのテキスト");
        assert!(!too_many);
    }

    #[test]
    fn test_split_interleaves_commands_in_source_order() {
        let (segments, cleaned, too_many) =
            split_text_with_commands("こんにちは 拍手 ありがとう", &triggers(&["拍手"]));
        assert_eq!(
            segments,
            vec![
                Segment::plain("こんにちは"),
                Segment::command("拍手"),
                Segment::plain("ありがとう"),
            ]
        );
        assert_eq!(cleaned, "こんにちは ありがとう");
        assert!(!too_many);
    }

    #[test]
    fn test_longest_trigger_wins() {
        // triggersはSoundConfigにより長い順で渡される
        let (segments, _cleaned, _too_many) =
            split_text_with_commands("大拍手喝采です", &triggers(&["大拍手喝采", "拍手"]));
        assert_eq!(segments[0], Segment::command("大拍手喝采"));
    }

    #[test]
    fn test_too_many_commands_collapses_to_plain() {
        let text = "拍手 拍手 拍手 拍手";
        let (_segments, _cleaned, too_many) =
            split_text_with_commands(text, &triggers(&["拍手"]));
        assert!(too_many);

        let segments = segment_announcement(text, &triggers(&["拍手"]));
        assert_eq!(segments, vec![Segment::plain(text)]);
    }

    #[test]
    fn test_three_commands_are_still_expanded() {
        let segments = segment_announcement("拍手 拍手 拍手", &triggers(&["拍手"]));
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.is_command));
    }
}
