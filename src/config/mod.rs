//! 設定管理
//!
//! 各ウィジェット/機能の設定を1ファイル1関心でJSON永続化する。
//! 読み込みは起動時、保存は更新時。全てロック越しにアクセスする。

pub mod gift;
pub mod member;
pub mod monitor;
pub mod sound;
pub mod tts;

pub use gift::GiftConfig;
pub use member::MemberConfig;
pub use monitor::MonitorConfig;
pub use sound::{SoundCommand, SoundConfig};
pub use tts::{KokoroConfig, TtsConfig, TtsSettings};

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// アプリケーションのディレクトリ構成
///
/// 設定ファイルはデータディレクトリ、ログと処理済みファイル台帳は
/// ログディレクトリに置く。
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// 設定ファイル置き場
    pub data_dir: PathBuf,
    /// アプリ自身のログと処理済みファイル台帳
    pub log_dir: PathBuf,
    /// コマンド音声ファイル置き場
    pub audio_dir: PathBuf,
}

impl AppPaths {
    /// ディレクトリ構成を解決する
    ///
    /// 明示指定がなければXDGディレクトリ配下を使う。
    pub fn resolve(data_dir: Option<PathBuf>, log_dir: Option<PathBuf>) -> Self {
        let base = ProjectDirs::from("dev", "sifyfy", "bilivox");
        let data_dir = data_dir.unwrap_or_else(|| {
            base.as_ref()
                .map(|d| d.data_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from("data"))
        });
        let log_dir = log_dir.unwrap_or_else(|| data_dir.join("log"));
        let audio_dir = data_dir.join("audio_commands");
        Self {
            data_dir,
            log_dir,
            audio_dir,
        }
    }

    /// 必要なディレクトリを作成する
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.data_dir, &self.log_dir, &self.audio_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// JSON設定ファイルを読み込む（失敗時はデフォルト値）
pub(crate) fn load_json<T: DeserializeOwned + Default>(path: &Path, label: &str) -> T {
    if !path.exists() {
        return T::default();
    }
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("[{}] 設定の読み込みに失敗、デフォルトを使用: {}", label, e);
                T::default()
            }
        },
        Err(e) => {
            tracing::error!("[{}] 設定ファイルを開けません: {}", label, e);
            T::default()
        }
    }
}

/// JSON設定ファイルを保存する（失敗はログのみ）
pub(crate) fn save_json<T: Serialize>(path: &Path, value: &T, label: &str) {
    let raw = match serde_json::to_string_pretty(value) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::error!("[{}] 設定のシリアライズに失敗: {}", label, e);
            return;
        }
    };
    if let Err(e) = std::fs::write(path, raw) {
        tracing::error!("[{}] 設定の保存に失敗: {}", label, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_with_overrides() {
        let paths = AppPaths::resolve(Some(PathBuf::from("/tmp/bvx")), None);
        assert_eq!(paths.data_dir, PathBuf::from("/tmp/bvx"));
        assert_eq!(paths.log_dir, PathBuf::from("/tmp/bvx/log"));
        assert_eq!(paths.audio_dir, PathBuf::from("/tmp/bvx/audio_commands"));
    }
}
