//! OpenAI Whisper API クライアント
//!
//! エンコード済み音声をmultipartで送信し、平文の文字起こし結果を受け取る。

use crate::config::WhisperConfig;
use crate::transcriber::{AudioPayload, SpeechToText};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart;
use std::time::Duration;

/// OpenAI Whisper API バックエンド
pub struct WhisperClient {
    config: WhisperConfig,
    api_key: String,
    client: reqwest::Client,
}

impl WhisperClient {
    pub fn new(config: &WhisperConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Whisper API HTTPクライアント作成失敗")?;

        Ok(Self {
            config: config.clone(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl SpeechToText for WhisperClient {
    /// Whisper APIを呼び出して文字起こし
    ///
    /// `response_format=text` を要求し、レスポンスボディをそのまま返す。
    /// エラーはリトライせず呼び出し元に伝播する。
    async fn transcribe(&self, payload: AudioPayload) -> Result<String> {
        let mime = mime_for(&payload.file_name);
        let part = multipart::Part::bytes(payload.bytes)
            .file_name(payload.file_name.clone())
            .mime_str(mime)?;

        let mut form = multipart::Form::new()
            .part("file", part)
            .text("model", self.config.model.clone())
            .text("response_format", "text");

        if let Some(ref language) = self.config.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .context("Whisper API リクエスト失敗")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Whisper API エラー: {} - {}", status, error_text);
        }

        response
            .text()
            .await
            .context("Whisper API レスポンス読み取り失敗")
    }
}

/// ファイル名の拡張子からMIMEタイプを決める
fn mime_for(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".wav") {
        "audio/wav"
    } else if lower.ends_with(".webm") {
        "audio/webm"
    } else if lower.ends_with(".mp3") {
        "audio/mpeg"
    } else if lower.ends_with(".ogg") {
        "audio/ogg"
    } else if lower.ends_with(".m4a") {
        "audio/mp4"
    } else {
        "application/octet-stream"
    }
}
