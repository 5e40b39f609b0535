//! シークレット解決とGoogleアクセストークン取得
//!
//! ローカル開発では環境変数から、デプロイ環境ではマウントされた
//! シークレットファイル（Secret Managerのボリュームマウント）から解決する。

use crate::config::{SecretMode, SecretsConfig};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// GCEメタデータサーバのトークンエンドポイント
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// トークン失効前の安全マージン（秒）
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;

/// シークレットストア
///
/// 名前付きシークレット（APIキー、シートIDなど）を解決する。
/// 設定オブジェクトとして起動時に一度構築し、参照で引き回す。
pub struct SecretStore {
    mode: SecretMode,
    dir: PathBuf,
}

impl SecretStore {
    pub fn new(config: &SecretsConfig) -> Self {
        Self {
            mode: config.mode.clone(),
            dir: PathBuf::from(&config.dir),
        }
    }

    /// 名前でシークレットを解決
    ///
    /// - envモード: 同名の環境変数を読む
    /// - fileモード: `dir/<name>` のファイル内容を読む（末尾の空白は除去）
    ///
    /// # Errors
    ///
    /// シークレットが存在しない場合にエラーを返す（設定エラーとして致命的）。
    pub fn resolve(&self, name: &str) -> Result<String> {
        match self.mode {
            SecretMode::Env => std::env::var(name)
                .with_context(|| format!("環境変数 {} が設定されていません", name)),
            SecretMode::File => {
                let path = self.dir.join(name);
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("シークレットファイルの読み込みに失敗: {:?}", path))?;
                Ok(content.trim_end().to_string())
            }
        }
    }
}

/// メタデータサーバのトークンレスポンス
#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Google APIアクセストークンの供給元
///
/// - envモード: `GOOGLE_ACCESS_TOKEN` 環境変数をそのまま使う
/// - fileモード: GCEメタデータサーバから取得し、失効までキャッシュする
pub struct TokenSource {
    mode: SecretMode,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(mode: SecretMode) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("メタデータサーバ用HTTPクライアント作成失敗")?;

        Ok(Self {
            mode,
            client,
            cached: Mutex::new(None),
        })
    }

    /// 有効なアクセストークンを返す
    pub async fn access_token(&self) -> Result<String> {
        if self.mode == SecretMode::Env {
            return std::env::var("GOOGLE_ACCESS_TOKEN")
                .context("環境変数 GOOGLE_ACCESS_TOKEN が設定されていません");
        }

        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref() {
            if entry.expires_at > Instant::now() {
                return Ok(entry.token.clone());
            }
        }

        let token = self.fetch_metadata_token().await?;
        let expires_at = Instant::now()
            + Duration::from_secs(token.expires_in.saturating_sub(TOKEN_EXPIRY_MARGIN_SECS));
        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            token: token.access_token,
            expires_at,
        });
        log::debug!("メタデータサーバからトークンを更新しました");

        Ok(value)
    }

    async fn fetch_metadata_token(&self) -> Result<MetadataToken> {
        let response = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .context("メタデータサーバへのリクエスト失敗")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("メタデータサーバエラー: {} - {}", status, error_text);
        }

        response
            .json::<MetadataToken>()
            .await
            .context("メタデータサーバのレスポンスパース失敗")
    }
}
