//! チャットログ監視
//!
//! 設定されたルームの当日ログファイル群を発見し、過去ファイルは
//! 読み切り、最新ファイルは末尾追記を追いかける。パースできた行は
//! 集計状態と読み上げ経路に渡す。
//!
//! エラー（ディレクトリ列挙・オープン・読み取りの失敗）は全て次の
//! ティックで再試行し、このタスク自体は決して終了しない。停止は
//! シャットダウンシグナルによる協調キャンセルのみ。

pub mod file_tracker;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio::sync::watch;

use crate::config::MonitorConfig;
use crate::parser::ChatLogParser;
use crate::state::StreamState;

pub use file_tracker::ProcessedFileTracker;

/// 追記確認の間隔
const POLL_INTERVAL: Duration = Duration::from_millis(500);
/// ルームID未設定・ファイル未発見時の待機間隔
const IDLE_INTERVAL: Duration = Duration::from_secs(2);

/// ログファイルの拡張子
const LOG_EXTENSION: &str = "txt";

/// チャットログ監視タスク
pub struct LogWatcher {
    monitor: Arc<MonitorConfig>,
    state: Arc<StreamState>,
    tracker: ProcessedFileTracker,
    parser: ChatLogParser,
    default_log_dir: PathBuf,
}

impl LogWatcher {
    /// 新しい監視タスクを作成
    pub fn new(
        monitor: Arc<MonitorConfig>,
        state: Arc<StreamState>,
        tracker: ProcessedFileTracker,
        default_log_dir: PathBuf,
    ) -> Self {
        Self {
            monitor,
            state,
            tracker,
            parser: ChatLogParser::new(),
            default_log_dir,
        }
    }

    /// 監視ループを実行する（シャットダウンまで戻らない）
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("[LogWatcher] ループ開始");

        // ルームIDが設定されるまで待つ
        let mut room_id = loop {
            if *shutdown.borrow() {
                tracing::info!("[LogWatcher] 停止");
                return;
            }
            if let Some(id) = self.monitor.room_id() {
                break id;
            }
            tracing::warn!("[LogWatcher] ルームIDが未設定。待機中...");
            if sleep_or_shutdown(&mut shutdown, IDLE_INTERVAL).await {
                tracing::info!("[LogWatcher] 停止");
                return;
            }
        };

        let mut current_tail: Option<PathBuf> = None;
        let mut offset: u64 = 0;

        tracing::info!(
            "[LogWatcher] 監視開始 - Room: {}, Dir: {}",
            room_id,
            self.monitor.log_dir(&self.default_log_dir).display()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            // 設定変更に追従（通常は再起動が必要だが再取得が単純）
            if let Some(id) = self.monitor.room_id() {
                room_id = id;
            }
            let log_dir = self.monitor.log_dir(&self.default_log_dir);

            let targets = self.scan_targets(&room_id, &log_dir);

            if targets.is_empty() && current_tail.is_none() {
                tracing::debug!(
                    "[LogWatcher] 当日のファイルが見つかりません: {}",
                    log_dir.display()
                );
                if sleep_or_shutdown(&mut shutdown, IDLE_INTERVAL).await {
                    break;
                }
                continue;
            }

            // 最新以外は読み切って確定する。日付が変わって当日の
            // ファイルがまだ無い間は、現行ファイルを追い続ける
            // （日跨ぎ直後の行を取りこぼさないため）。
            let target_tail = if targets.is_empty() {
                current_tail.clone()
            } else {
                let (historical, newest) = targets.split_at(targets.len() - 1);
                for path in historical {
                    if current_tail.as_deref() == Some(path.as_path()) {
                        tracing::info!(
                            "[LogWatcher] 新しいファイルを検出。現行ファイルを読み切り: {}",
                            path.display()
                        );
                        self.finish_file(path, offset).await;
                        current_tail = None;
                        offset = 0;
                    } else {
                        self.read_file_fully(path).await;
                    }
                }
                Some(newest[0].clone())
            };

            let Some(target) = target_tail else {
                if sleep_or_shutdown(&mut shutdown, POLL_INTERVAL).await {
                    break;
                }
                continue;
            };

            // 追跡対象の切り替え
            if current_tail.as_ref() != Some(&target) {
                if let Some(old) = current_tail.take() {
                    self.finish_file(&old, offset).await;
                }
                tracing::info!("[LogWatcher] 追跡開始: {}", target.display());
                // 開始位置は常に0。クラッシュ後の再起動ではアクティブ
                // ファイルを先頭から読み直す（台帳に無い限り）。
                current_tail = Some(target.clone());
                offset = 0;
            }

            // 追記分を読む
            match tokio::fs::metadata(&target).await {
                Ok(meta) => {
                    if meta.len() < offset {
                        // ファイルが切り詰められた
                        tracing::warn!(
                            "[LogWatcher] 切り詰めを検出、先頭から再読込: {}",
                            target.display()
                        );
                        offset = 0;
                    }
                }
                Err(e) => {
                    tracing::error!("[LogWatcher] メタデータ取得に失敗: {}", e);
                    if sleep_or_shutdown(&mut shutdown, POLL_INTERVAL).await {
                        break;
                    }
                    continue;
                }
            }

            match read_complete_lines(&target, offset).await {
                Ok((lines, new_offset)) => {
                    for line in &lines {
                        self.process_line(line);
                    }
                    offset = new_offset;
                }
                Err(e) => {
                    tracing::error!("[LogWatcher] 追記読み取りに失敗: {}", e);
                }
            }

            if sleep_or_shutdown(&mut shutdown, POLL_INTERVAL).await {
                break;
            }
        }

        tracing::info!("[LogWatcher] 停止");
    }

    /// 当日分の対象ファイルを列挙する
    ///
    /// `room_{id}-{today}_*.txt` にマッチし、台帳に無いものをファイル名
    /// 昇順（= 時系列順）で返す。列挙エラーは空リスト扱い。
    fn scan_targets(&self, room_id: &str, log_dir: &Path) -> Vec<PathBuf> {
        let today = chrono::Local::now().format("%Y%m%d");
        let pattern = log_dir
            .join(format!("room_{}-{}_*.{}", room_id, today, LOG_EXTENSION))
            .to_string_lossy()
            .into_owned();

        let entries = match glob::glob(&pattern) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("[LogWatcher] パターンが不正: {}", e);
                return Vec::new();
            }
        };

        let mut targets: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::error!("[LogWatcher] ディレクトリ列挙に失敗: {}", e);
                    None
                }
            })
            .filter(|path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                !self.tracker.is_processed(&name)
            })
            .collect();
        targets.sort();
        targets
    }

    /// 1行をパースして集計に渡す
    fn process_line(&self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        if let Some(event) = self.parser.parse_line(line) {
            self.state.add_event(event);
        }
    }

    /// 過去ファイルを先頭から読み切って台帳に記録する
    async fn read_file_fully(&self, path: &Path) {
        tracing::info!("[LogWatcher] 過去ファイルを処理: {}", path.display());
        self.finish_file(path, 0).await;
    }

    /// 指定オフセットから末尾まで読み切り、台帳に記録する
    ///
    /// ファイルへの追記は終わっている前提なので、末尾の改行無し行も
    /// 処理する。
    async fn finish_file(&self, path: &Path, offset: u64) {
        match drain_remaining(path, offset).await {
            Ok(lines) => {
                for line in &lines {
                    self.process_line(line);
                }
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.tracker.mark_processed(&name);
                tracing::info!("[LogWatcher] 処理完了: {}", name);
            }
            Err(e) => {
                tracing::error!("[LogWatcher] ファイル処理に失敗 {}: {}", path.display(), e);
            }
        }
    }
}

/// オフセット以降の「完結した行」だけを読む
///
/// 書き込み途中の末尾行を取り込まないよう、最後の改行までを消費して
/// 新しいオフセットを返す。
async fn read_complete_lines(path: &Path, offset: u64) -> std::io::Result<(Vec<String>, u64)> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf).await?;

    let Some(last_newline) = buf.iter().rposition(|b| *b == b'\n') else {
        return Ok((Vec::new(), offset));
    };

    let consumed = &buf[..=last_newline];
    let lines = split_lines(consumed);
    Ok((lines, offset + consumed.len() as u64))
}

/// オフセット以降を末尾（改行無し行を含む）まで読む
async fn drain_remaining(path: &Path, offset: u64) -> std::io::Result<Vec<String>> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf).await?;
    Ok(split_lines(&buf))
}

fn split_lines(buf: &[u8]) -> Vec<String> {
    buf.split(|b| *b == b'\n')
        .map(|raw| {
            String::from_utf8_lossy(raw)
                .trim_end_matches('\r')
                .to_string()
        })
        .filter(|line| !line.trim().is_empty())
        .collect()
}

/// 指定時間待つ。シャットダウン要求が来たらtrueを返す。
async fn sleep_or_shutdown(shutdown: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown.changed() => true,
    }
}
