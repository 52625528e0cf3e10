//! 処理済みファイル台帳
//!
//! 読み切ったログファイル名を追記専用のテキストファイル（1行1ファイル名）
//! に永続化する。再起動後の再処理を防ぐ唯一のゲート。

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

const TRACKING_FILE: &str = "accessed_file.txt";

/// 処理済みファイル台帳
pub struct ProcessedFileTracker {
    path: PathBuf,
    processed: Mutex<HashSet<String>>,
}

impl ProcessedFileTracker {
    /// 台帳ファイルを読み込んで作成
    pub fn load(log_dir: &Path) -> Self {
        let path = log_dir.join(TRACKING_FILE);
        let processed = match std::fs::read_to_string(&path) {
            Ok(raw) => raw
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => HashSet::new(),
        };
        Self {
            path,
            processed: Mutex::new(processed),
        }
    }

    /// 処理済みかどうか
    pub fn is_processed(&self, filename: &str) -> bool {
        self.processed.lock().contains(filename)
    }

    /// 処理済みとして記録する
    ///
    /// 冪等（登録済みなら何もしない）。戻る前に同期的に追記するため、
    /// この呼び出しの後にクラッシュしても読み切ったファイルが再処理
    /// されることはない。追記に失敗した場合はログを残してメモリ上の
    /// 記録だけで継続する。
    pub fn mark_processed(&self, filename: &str) {
        let mut processed = self.processed.lock();
        if !processed.insert(filename.to_string()) {
            return;
        }
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{}", filename));
        if let Err(e) = result {
            tracing::error!("[FileTracker] 台帳への追記に失敗: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_check() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ProcessedFileTracker::load(dir.path());
        assert!(!tracker.is_processed("room_1-20260118_000001.txt"));

        tracker.mark_processed("room_1-20260118_000001.txt");
        assert!(tracker.is_processed("room_1-20260118_000001.txt"));
    }

    #[test]
    fn test_mark_is_idempotent_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ProcessedFileTracker::load(dir.path());
        tracker.mark_processed("a.txt");
        tracker.mark_processed("a.txt");
        tracker.mark_processed("a.txt");

        let raw = std::fs::read_to_string(dir.path().join(TRACKING_FILE)).unwrap();
        assert_eq!(raw.lines().filter(|l| *l == "a.txt").count(), 1);
    }

    #[test]
    fn test_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let tracker = ProcessedFileTracker::load(dir.path());
            tracker.mark_processed("a.txt");
            tracker.mark_processed("b.txt");
        }
        let reloaded = ProcessedFileTracker::load(dir.path());
        assert!(reloaded.is_processed("a.txt"));
        assert!(reloaded.is_processed("b.txt"));
        assert!(!reloaded.is_processed("c.txt"));
    }
}
