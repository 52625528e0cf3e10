//! ギフトウィジェット設定（マイルストーン目標値）

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

const DEFAULT_MILESTONE_GOAL: f64 = 500.0;

/// ギフトウィジェットの設定値
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiftSettings {
    /// マイルストーン目標値（元）
    pub milestone_goal: f64,
}

impl Default for GiftSettings {
    fn default() -> Self {
        Self {
            milestone_goal: DEFAULT_MILESTONE_GOAL,
        }
    }
}

/// ギフトウィジェット設定（JSON永続化付き）
pub struct GiftConfig {
    path: PathBuf,
    inner: Mutex<GiftSettings>,
}

impl GiftConfig {
    /// ファイルから読み込んで作成
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("gift_config.json");
        let settings: GiftSettings = super::load_json(&path, "Gift Config");
        Self {
            path,
            inner: Mutex::new(settings),
        }
    }

    /// 現在のマイルストーン目標値
    pub fn milestone_goal(&self) -> f64 {
        self.inner.lock().milestone_goal
    }

    /// マイルストーン目標値を更新して保存
    ///
    /// 0以下は無視する。集計側の再計算は呼び出し側の責務。
    pub fn set_milestone_goal(&self, goal: f64) {
        if goal <= 0.0 {
            tracing::warn!("[Gift Config] 不正な目標値を無視: {}", goal);
            return;
        }
        let mut inner = self.inner.lock();
        inner.milestone_goal = goal;
        super::save_json(&self.path, &*inner, "Gift Config");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_goal() {
        let dir = tempfile::tempdir().unwrap();
        let config = GiftConfig::load(dir.path());
        assert_eq!(config.milestone_goal(), 500.0);
    }

    #[test]
    fn test_update_persists_and_rejects_non_positive() {
        let dir = tempfile::tempdir().unwrap();
        let config = GiftConfig::load(dir.path());
        config.set_milestone_goal(150.0);
        assert_eq!(config.milestone_goal(), 150.0);

        config.set_milestone_goal(0.0);
        assert_eq!(config.milestone_goal(), 150.0);

        let reloaded = GiftConfig::load(dir.path());
        assert_eq!(reloaded.milestone_goal(), 150.0);
    }
}
