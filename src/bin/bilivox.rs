use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use bilivox::api::BiliClient;
use bilivox::config::AppPaths;
use bilivox::AppContext;

/// Bilibiliライブ配信コンパニオン
///
/// チャットログを監視して収益・艦隊数を集計し、オーバーレイ更新と
/// TTS読み上げを駆動する。
#[derive(Debug, Parser)]
#[command(name = "bilivox", version, about)]
struct Cli {
    /// 設定・データディレクトリ（省略時はXDGデータディレクトリ）
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// アプリログと台帳のディレクトリ（省略時はデータディレクトリ配下）
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// 自動再生を起動時から有効にする
    #[arg(long)]
    autoplay: bool,
}

/// ログ初期化（標準出力 + 日次ローテーションのファイル出力）
fn init_logging(log_dir: &std::path::Path) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();

    let file_appender = tracing_appender::rolling::daily(log_dir, "bilivox.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init()?;

    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // tokio-consoleの初期化（プロファイリング用）
    #[cfg(feature = "debug-tokio")]
    console_subscriber::init();

    let cli = Cli::parse();

    let paths = AppPaths::resolve(cli.data_dir, cli.log_dir);
    paths
        .ensure_dirs()
        .context("ディレクトリの作成に失敗しました")?;

    #[cfg(not(feature = "debug-tokio"))]
    let _log_guard = init_logging(&paths.log_dir)?;

    tracing::info!("🎬 Starting bilivox - Bilibili Live Companion");

    let ctx = AppContext::new(paths);

    if cli.autoplay {
        ctx.state.set_autoplay(true);
    }

    // 初期艦隊数を取得（失敗しても0で継続）
    if let (Some(room_id), Some(uid)) = (ctx.monitor.room_id(), ctx.monitor.uid()) {
        let client = BiliClient::new();
        let count = client.fetch_initial_guard_count(&room_id, &uid).await;
        ctx.state.set_initial_guard_count(count);
        tracing::info!("⚓ 初期艦隊数: {}", count);
    } else {
        tracing::warn!("ルームが未設定のため初期艦隊数の取得をスキップ");
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let watcher = ctx.build_watcher();
    let watcher_handle = tokio::spawn(watcher.run(shutdown_rx.clone()));

    let processor = ctx.build_processor();
    let processor_handle = tokio::spawn(processor.run(shutdown_rx));

    tracing::info!("✅ パイプライン起動完了 (Ctrl+Cで終了)");

    tokio::signal::ctrl_c()
        .await
        .context("シグナル待機に失敗しました")?;
    tracing::info!("🛑 シャットダウン要求を受信");

    let _ = shutdown_tx.send(true);
    let _ = watcher_handle.await;
    let _ = processor_handle.await;

    tracing::info!("👋 bilivox 終了");
    Ok(())
}
