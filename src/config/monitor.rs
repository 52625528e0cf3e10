//! 監視対象（ルーム）設定

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// 監視対象の設定値
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// 監視するルームID
    pub room_id: Option<String>,
    /// 配信者UID
    pub uid: Option<String>,
    /// 配信者名（表示用）
    pub username: Option<String>,
    /// チャットログのディレクトリ
    pub log_dir: Option<PathBuf>,
    /// 設定済みフラグ
    pub is_configured: bool,
}

/// 監視対象設定（JSON永続化付き）
pub struct MonitorConfig {
    path: PathBuf,
    inner: Mutex<MonitorSettings>,
}

impl MonitorConfig {
    /// ファイルから読み込んで作成
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("bilibili_config.json");
        let settings: MonitorSettings = super::load_json(&path, "Monitor Config");
        if settings.is_configured {
            tracing::info!(
                "[Monitor Config] 設定を読み込み - Room: {:?}, User: {:?}",
                settings.room_id,
                settings.username
            );
        }
        Self {
            path,
            inner: Mutex::new(settings),
        }
    }

    /// 監視対象を設定して保存
    pub fn set(&self, room_id: String, uid: String, username: String, log_dir: Option<PathBuf>) {
        let mut inner = self.inner.lock();
        inner.room_id = Some(room_id);
        inner.uid = Some(uid);
        inner.username = Some(username);
        inner.log_dir = log_dir;
        inner.is_configured = true;
        super::save_json(&self.path, &*inner, "Monitor Config");
    }

    /// 設定をクリアして保存
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        *inner = MonitorSettings::default();
        super::save_json(&self.path, &*inner, "Monitor Config");
    }

    /// 設定済みならルームIDを返す
    pub fn room_id(&self) -> Option<String> {
        let inner = self.inner.lock();
        if inner.is_configured {
            inner.room_id.clone()
        } else {
            None
        }
    }

    /// 設定済みならUIDを返す
    pub fn uid(&self) -> Option<String> {
        let inner = self.inner.lock();
        if inner.is_configured {
            inner.uid.clone()
        } else {
            None
        }
    }

    /// 設定済みならログディレクトリを返す（未設定ならフォールバック）
    pub fn log_dir(&self, fallback: &Path) -> PathBuf {
        let inner = self.inner.lock();
        match (&inner.log_dir, inner.is_configured) {
            (Some(dir), true) => dir.clone(),
            _ => fallback.to_path_buf(),
        }
    }

    /// 現在の設定値のスナップショット
    pub fn settings(&self) -> MonitorSettings {
        self.inner.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_requires_configured_flag() {
        let dir = tempfile::tempdir().unwrap();
        let config = MonitorConfig::load(dir.path());
        assert_eq!(config.room_id(), None);

        config.set(
            "1769174835".to_string(),
            "12345".to_string(),
            "配信者".to_string(),
            None,
        );
        assert_eq!(config.room_id(), Some("1769174835".to_string()));

        // 再読み込みで永続化を確認
        let reloaded = MonitorConfig::load(dir.path());
        assert_eq!(reloaded.room_id(), Some("1769174835".to_string()));

        reloaded.clear();
        assert_eq!(reloaded.room_id(), None);
    }

    #[test]
    fn test_log_dir_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let config = MonitorConfig::load(dir.path());
        let fallback = dir.path().join("log/messages");
        assert_eq!(config.log_dir(&fallback), fallback);
    }
}
