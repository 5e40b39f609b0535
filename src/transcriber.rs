//! 文字起こしエンジン
//!
//! 音声ファイルを受け取り、上限以下なら1回のAPI呼び出しで、
//! 上限超過ならチャンクに分割して順に文字起こしし、結果を連結する。

use crate::chunk_splitter;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// 1回のAPI呼び出しで送信する音声ペイロード
#[derive(Debug)]
pub struct AudioPayload {
    /// エンコード済み音声データ（元のコンテナ形式のまま）
    pub bytes: Vec<u8>,
    /// API側に伝えるファイル名（拡張子でフォーマットを判別させる）
    pub file_name: String,
}

/// 音声→テキスト変換バックエンドの共通トレイト
///
/// 実装はペイロード1個（上限以下）を1回の呼び出しで文字起こしする。
/// テストではモック実装を差し込む。
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// 音声ペイロードを文字起こしして平文テキストを返す
    async fn transcribe(&self, payload: AudioPayload) -> Result<String>;
}

/// 文字起こしエンジン
///
/// - ファイルサイズが上限以下: 1回で送信し、結果をそのまま返す
/// - 上限超過: チャンクに分割し、順に送信して改行で連結、末尾の空白を除去
///
/// 各チャンクファイルは呼び出しの成否を問わず直後に削除する。
/// 元のファイルは削除しない。API呼び出しのエラーはそのまま伝播し、
/// リトライは行わない。
pub struct Transcriber {
    backend: Arc<dyn SpeechToText>,
    ceiling_bytes: u64,
}

impl Transcriber {
    pub fn new(backend: Arc<dyn SpeechToText>, ceiling_bytes: u64) -> Self {
        Self {
            backend,
            ceiling_bytes,
        }
    }

    /// 音声ファイルを文字起こしする
    pub async fn transcribe_file(&self, path: &Path) -> Result<String> {
        let size = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("音声ファイルの情報取得に失敗: {:?}", path))?
            .len();

        if size <= self.ceiling_bytes {
            let payload = read_payload(path).await?;
            return self.backend.transcribe(payload).await;
        }

        log::info!(
            "ファイルサイズ {} バイトが上限 {} バイトを超過。チャンク分割します: {:?}",
            size,
            self.ceiling_bytes,
            path
        );
        self.transcribe_chunked(path).await
    }

    async fn transcribe_chunked(&self, path: &Path) -> Result<String> {
        let chunks = chunk_splitter::split_wav(path, self.ceiling_bytes)?;

        let mut text = String::new();
        let mut failure: Option<anyhow::Error> = None;

        for (index, chunk) in chunks.iter().enumerate() {
            let result = match read_payload(chunk).await {
                Ok(payload) => self.backend.transcribe(payload).await,
                Err(e) => Err(e),
            };

            // チャンクファイルは成否を問わず即座に削除する
            if let Err(e) = tokio::fs::remove_file(chunk).await {
                log::warn!("チャンクファイルの削除に失敗: {:?} - {}", chunk, e);
            }

            match result {
                Ok(chunk_text) => {
                    text.push_str(&chunk_text);
                    text.push('\n');
                }
                Err(e) => {
                    failure =
                        Some(e.context(format!("チャンク {} の文字起こしに失敗", index)));
                    // 残りの未送信チャンクも削除してから伝播する
                    for leftover in &chunks[index + 1..] {
                        if let Err(e) = tokio::fs::remove_file(leftover).await {
                            log::warn!(
                                "チャンクファイルの削除に失敗: {:?} - {}",
                                leftover,
                                e
                            );
                        }
                    }
                    break;
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }

        Ok(text.trim_end().to_string())
    }
}

async fn read_payload(path: &Path) -> Result<AudioPayload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("音声ファイルの読み込みに失敗: {:?}", path))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "audio".to_string());
    Ok(AudioPayload { bytes, file_name })
}
