//! Google Sheets クライアント
//!
//! 表形式データソースへのアクセス。読み取りは全行を文字列グリッドとして
//! 取得し、書き込みは単一セル（列文字+行番号）への上書きのみ。
//! 呼び出しごとに新しいリクエストを発行し、ローカルキャッシュは持たない。

use crate::config::SheetsConfig;
use crate::secrets::TokenSource;
use crate::types::RESULT_COLUMN;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const SHEETS_ENDPOINT: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// 結果列のセルアドレス（例: 行7 → "F7"）
pub fn result_cell(row: i64) -> String {
    format!("{}{}", RESULT_COLUMN, row)
}

/// 表形式データソースの共通トレイト
///
/// テストではインメモリのモック実装を差し込む。
#[async_trait]
pub trait RowStore: Send + Sync {
    /// 全行を文字列グリッドとして取得（行1はヘッダー）
    async fn fetch_all(&self) -> Result<Vec<Vec<String>>>;

    /// 単一セルに値を書き込む（上書き）
    async fn update_cell(&self, cell: &str, value: &str) -> Result<()>;
}

/// `values.get` のレスポンス
///
/// 空のシートでは `values` フィールド自体が省略される。
#[derive(Debug, Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Google Sheets REST APIクライアント
pub struct SheetsClient {
    client: reqwest::Client,
    tokens: Arc<TokenSource>,
    sheet_id: String,
    worksheet: String,
}

impl SheetsClient {
    pub fn new(
        config: &SheetsConfig,
        sheet_id: String,
        worksheet: String,
        tokens: Arc<TokenSource>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Sheets HTTPクライアント作成失敗")?;

        Ok(Self {
            client,
            tokens,
            sheet_id,
            worksheet,
        })
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/{}/values/{}",
            SHEETS_ENDPOINT,
            self.sheet_id,
            encode_range(range)
        )
    }
}

#[async_trait]
impl RowStore for SheetsClient {
    async fn fetch_all(&self) -> Result<Vec<Vec<String>>> {
        let token = self.tokens.access_token().await?;
        let url = self.values_url(&self.worksheet);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .context("Sheets values.get リクエスト失敗")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Sheets values.get エラー: {} - {}", status, error_text);
        }

        let body: ValuesResponse = response
            .json()
            .await
            .context("Sheets レスポンスパース失敗")?;

        Ok(body.values)
    }

    async fn update_cell(&self, cell: &str, value: &str) -> Result<()> {
        let token = self.tokens.access_token().await?;
        let range = format!("{}!{}", self.worksheet, cell);
        let url = format!("{}?valueInputOption=RAW", self.values_url(&range));
        let body = serde_json::json!({
            "range": range,
            "values": [[value]],
        });

        let response = self
            .client
            .put(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .context("Sheets values.update リクエスト失敗")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Sheets values.update エラー: {} - {}", status, error_text);
        }

        log::debug!("セル {} を更新しました", range);
        Ok(())
    }
}

/// A1記法のレンジをURLパス用にパーセントエンコードする
///
/// ワークシート名には空白や日本語が入りうるため、非予約文字以外を
/// すべてエンコードする。
fn encode_range(range: &str) -> String {
    let mut encoded = String::with_capacity(range.len());
    for byte in range.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_cell() {
        assert_eq!(result_cell(2), "F2");
        assert_eq!(result_cell(120), "F120");
    }

    #[test]
    fn test_encode_range_plain() {
        assert_eq!(encode_range("Sheet1"), "Sheet1");
        assert_eq!(encode_range("Sheet1!F7"), "Sheet1%21F7");
    }

    #[test]
    fn test_encode_range_multibyte() {
        // 日本語のワークシート名
        assert_eq!(encode_range("シート1"), "%E3%82%B7%E3%83%BC%E3%83%881");
        assert_eq!(encode_range("My Sheet"), "My%20Sheet");
    }

    #[test]
    fn test_values_response_missing_field_defaults_empty() {
        // 空のシートでは values フィールドが省略される
        let body: ValuesResponse = serde_json::from_str(r#"{"range":"Sheet1!A1:Z1000"}"#).unwrap();
        assert!(body.values.is_empty());

        let body: ValuesResponse =
            serde_json::from_str(r#"{"values":[["a","b"],["c"]]}"#).unwrap();
        assert_eq!(body.values.len(), 2);
        assert_eq!(body.values[1], vec!["c".to_string()]);
    }
}
