//! メンバーウィジェット設定（Webhook有効化とURL）

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// メンバーウィジェットの設定値
///
/// 階級ごとにWebhookの有効フラグと送信先URLを持つ。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberSettings {
    #[serde(default)]
    pub enable_webhook_captain: bool,
    #[serde(default)]
    pub enable_webhook_admiral: bool,
    #[serde(default)]
    pub enable_webhook_governor: bool,
    #[serde(default)]
    pub webhook_url_captain: String,
    #[serde(default)]
    pub webhook_url_admiral: String,
    #[serde(default)]
    pub webhook_url_governor: String,
}

/// メンバーウィジェット設定（JSON永続化付き）
pub struct MemberConfig {
    path: PathBuf,
    inner: Mutex<MemberSettings>,
}

impl MemberConfig {
    /// ファイルから読み込んで作成
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("member_config.json");
        let settings: MemberSettings = super::load_json(&path, "Member Config");
        Self {
            path,
            inner: Mutex::new(settings),
        }
    }

    /// 指定タグのWebhookが有効かどうか
    pub fn webhook_enabled(&self, tag: &str) -> bool {
        let inner = self.inner.lock();
        match tag {
            "captain" => inner.enable_webhook_captain,
            "admiral" => inner.enable_webhook_admiral,
            "governor" => inner.enable_webhook_governor,
            _ => false,
        }
    }

    /// 指定タグのWebhook URL（空文字列ならNone）
    pub fn webhook_url(&self, tag: &str) -> Option<String> {
        let inner = self.inner.lock();
        let url = match tag {
            "captain" => &inner.webhook_url_captain,
            "admiral" => &inner.webhook_url_admiral,
            "governor" => &inner.webhook_url_governor,
            _ => return None,
        };
        if url.is_empty() {
            None
        } else {
            Some(url.clone())
        }
    }

    /// 設定値を置き換えて保存
    pub fn update(&self, settings: MemberSettings) {
        let mut inner = self.inner.lock();
        *inner = settings;
        super::save_json(&self.path, &*inner, "Member Config");
    }

    /// 現在の設定値のスナップショット
    pub fn settings(&self) -> MemberSettings {
        self.inner.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_disabled_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = MemberConfig::load(dir.path());
        assert!(!config.webhook_enabled("captain"));
        assert_eq!(config.webhook_url("captain"), None);
    }

    #[test]
    fn test_webhook_lookup_per_tier() {
        let dir = tempfile::tempdir().unwrap();
        let config = MemberConfig::load(dir.path());
        config.update(MemberSettings {
            enable_webhook_admiral: true,
            webhook_url_admiral: "http://localhost:9000/hook".to_string(),
            ..Default::default()
        });

        assert!(config.webhook_enabled("admiral"));
        assert!(!config.webhook_enabled("captain"));
        assert_eq!(
            config.webhook_url("admiral").as_deref(),
            Some("http://localhost:9000/hook")
        );
        assert_eq!(config.webhook_url("他のタグ"), None);
    }
}
