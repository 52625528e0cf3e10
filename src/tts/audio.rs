//! 音声出力
//!
//! 合成済みWAVバイト列とコマンド音声ファイルの再生。rodioの再生は
//! ブロッキングなので `spawn_blocking` 上で実行する。

use std::io::Cursor;
use std::path::Path;

use super::error::TtsError;

/// WAVバイト列を再生する（完了までブロック）
fn play_wav_blocking(wav_bytes: Vec<u8>, volume: f32) -> Result<(), TtsError> {
    use rodio::{Decoder, OutputStream, Sink};

    let (_stream, stream_handle) = OutputStream::try_default()
        .map_err(|e| TtsError::AudioOutput(format!("音声出力の初期化に失敗: {}", e)))?;

    let sink = Sink::try_new(&stream_handle)
        .map_err(|e| TtsError::AudioOutput(format!("音声シンクの作成に失敗: {}", e)))?;
    sink.set_volume(volume);

    let source = Decoder::new(Cursor::new(wav_bytes))
        .map_err(|e| TtsError::AudioDecode(format!("WAVデコードに失敗: {}", e)))?;

    sink.append(source);
    sink.sleep_until_end();
    Ok(())
}

/// WAVバイト列を再生する
///
/// 空のバイト列は再生スキップ（エンジン無効時など）。
pub async fn play_wav(wav_bytes: Vec<u8>, volume: f32) -> Result<(), TtsError> {
    if wav_bytes.is_empty() {
        return Ok(());
    }
    tokio::task::spawn_blocking(move || play_wav_blocking(wav_bytes, volume))
        .await
        .map_err(|e| TtsError::AudioOutput(format!("再生タスクエラー: {}", e)))?
}

/// コマンド音声ファイルを再生する
///
/// ファイルが存在しなければfalseを返し、再生はしない。
pub async fn play_command_file(path: &Path, volume: f32) -> Result<bool, TtsError> {
    if !path.exists() {
        tracing::warn!("[Audio] コマンド音声ファイルがありません: {}", path.display());
        return Ok(false);
    }
    let bytes = tokio::fs::read(path).await?;
    play_wav(bytes, volume).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_bytes_are_skipped() {
        // 空バイト列は音声デバイスなしでも成功する
        play_wav(Vec::new(), 1.0).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_command_file_returns_false() {
        let played = play_command_file(Path::new("/存在しない/音声.wav"), 1.0)
            .await
            .unwrap();
        assert!(!played);
    }
}
