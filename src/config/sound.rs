//! サウンドコマンド設定
//!
//! 読み上げテキスト中のトリガー語を音声ファイル再生に置き換えるための
//! `トリガー → 音声ファイル` マッピング。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// 1コマンドの設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundCommand {
    /// 音声ファイル名（audio_commands配下）
    pub filename: String,
    /// 再生音量
    #[serde(default = "default_volume")]
    pub volume: f32,
}

fn default_volume() -> f32 {
    1.0
}

/// 旧形式（ファイル名のみの文字列）も受け付けるための中間表現
#[derive(Deserialize)]
#[serde(untagged)]
enum SoundCommandCompat {
    Legacy(String),
    Current(SoundCommand),
}

#[derive(Default, Serialize, Deserialize)]
struct SoundSettings {
    #[serde(default, deserialize_with = "deserialize_commands")]
    commands: HashMap<String, SoundCommand>,
}

fn deserialize_commands<'de, D>(deserializer: D) -> Result<HashMap<String, SoundCommand>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: HashMap<String, SoundCommandCompat> = HashMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(trigger, value)| {
            let command = match value {
                SoundCommandCompat::Legacy(filename) => SoundCommand {
                    filename,
                    volume: 1.0,
                },
                SoundCommandCompat::Current(command) => command,
            };
            (trigger, command)
        })
        .collect())
}

/// サウンドコマンド設定（JSON永続化付き）
pub struct SoundConfig {
    path: PathBuf,
    inner: Mutex<SoundSettings>,
}

impl SoundConfig {
    /// ファイルから読み込んで作成
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("sound_config.json");
        let settings: SoundSettings = super::load_json(&path, "Sound Config");
        Self {
            path,
            inner: Mutex::new(settings),
        }
    }

    /// トリガー語の一覧（長いもの優先でソート済み）
    ///
    /// テキスト分割時に長いトリガーを先にマッチさせるための順序。
    pub fn triggers(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let mut triggers: Vec<String> = inner.commands.keys().cloned().collect();
        triggers.sort_by_key(|t| std::cmp::Reverse(t.chars().count()));
        triggers
    }

    /// 指定トリガーのコマンド情報
    pub fn command_info(&self, trigger: &str) -> Option<SoundCommand> {
        self.inner.lock().commands.get(trigger).cloned()
    }

    /// コマンドを追加または上書きして保存
    pub fn update_command(&self, trigger: &str, filename: &str) {
        let mut inner = self.inner.lock();
        match inner.commands.get_mut(trigger) {
            Some(command) => command.filename = filename.to_string(),
            None => {
                inner.commands.insert(
                    trigger.to_string(),
                    SoundCommand {
                        filename: filename.to_string(),
                        volume: 1.0,
                    },
                );
            }
        }
        super::save_json(&self.path, &*inner, "Sound Config");
    }

    /// コマンドを削除して保存
    pub fn delete_command(&self, trigger: &str) {
        let mut inner = self.inner.lock();
        if inner.commands.remove(trigger).is_some() {
            super::save_json(&self.path, &*inner, "Sound Config");
        }
    }

    /// コマンドの音量を更新して保存
    pub fn update_volume(&self, trigger: &str, volume: f32) {
        let mut inner = self.inner.lock();
        if let Some(command) = inner.commands.get_mut(trigger) {
            command.volume = volume;
            super::save_json(&self.path, &*inner, "Sound Config");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triggers_sorted_longest_first() {
        let dir = tempfile::tempdir().unwrap();
        let config = SoundConfig::load(dir.path());
        config.update_command("拍手", "clap.wav");
        config.update_command("大拍手喝采", "big_clap.wav");
        config.update_command("笑", "laugh.wav");

        let triggers = config.triggers();
        assert_eq!(triggers[0], "大拍手喝采");
        assert_eq!(triggers[2], "笑");
    }

    #[test]
    fn test_legacy_string_form_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sound_config.json");
        std::fs::write(
            &path,
            r#"{"commands": {"拍手": "clap.wav", "笑": {"filename": "laugh.wav", "volume": 0.5}}}"#,
        )
        .unwrap();

        let config = SoundConfig::load(dir.path());
        let clap = config.command_info("拍手").unwrap();
        assert_eq!(clap.filename, "clap.wav");
        assert_eq!(clap.volume, 1.0);
        let laugh = config.command_info("笑").unwrap();
        assert_eq!(laugh.volume, 0.5);
    }

    #[test]
    fn test_volume_update_requires_existing_command() {
        let dir = tempfile::tempdir().unwrap();
        let config = SoundConfig::load(dir.path());
        config.update_volume("未登録", 0.3);
        assert!(config.command_info("未登録").is_none());

        config.update_command("拍手", "clap.wav");
        config.update_volume("拍手", 0.3);
        assert_eq!(config.command_info("拍手").unwrap().volume, 0.3);
    }
}
