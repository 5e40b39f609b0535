//! HTTPセッションオーケストレータ
//!
//! 録音のアップロードを受け取り、文字起こしと書き戻しをバックグラウンド
//! タスクに回し、応答では待たずに次の未処理レコードを即座に返す。
//! 呼び出し側の応答時間は文字起こしの所要時間に依存しない。

use crate::locator::RecordLocator;
use crate::sheets::{result_cell, RowStore};
use crate::transcriber::Transcriber;
use crate::types::{NextRecord, HEADER_ROW};
use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;

/// アップロードボディの上限（余裕を持って64MiB）
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// indexページのテンプレートと初期レコードの差し込み位置
const INDEX_TEMPLATE: &str = include_str!("../static/index.html");
const RECORD_PLACEHOLDER: &str = "__INITIAL_RECORD__";

/// アプリケーション全体で共有する状態
///
/// 起動時に一度構築し、各ハンドラへ参照で渡す。
pub struct AppState {
    pub locator: RecordLocator,
    pub transcriber: Arc<Transcriber>,
    pub store: Arc<dyn RowStore>,
}

pub type SharedState = Arc<AppState>;

/// ルータを構築
pub fn router(state: SharedState, static_dir: &Path) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/done", post(done))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// ハンドラ用エラー型
///
/// 詳細はログにのみ出し、クライアントには汎用メッセージを返す。
pub struct AppError {
    status: StatusCode,
    source: anyhow::Error,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            source: anyhow::anyhow!(message.into()),
        }
    }

    /// multipartボディの不備はクライアント側の誤りであり、サーバ障害として
    /// 報告しない。ステータスはエラー自身が持つもの（通常400）を使う。
    fn multipart(e: axum::extract::multipart::MultipartError) -> Self {
        Self {
            status: e.status(),
            source: anyhow::anyhow!(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        log::error!("ハンドラエラー ({}): {:#}", self.status, self.source);
        let message = if self.status.is_server_error() {
            "internal server error".to_string()
        } else {
            self.source.to_string()
        };
        (self.status, message).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(e: E) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            source: e.into(),
        }
    }
}

/// `POST /done` の応答
///
/// 次のレコードがあればそのペイロード、なければメッセージのみ。
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum DoneResponse {
    Next(NextRecord),
    Message { message: String },
}

/// GET / : 最初の未処理レコードを埋め込んだページを返す
///
/// スキャンはヘッダー行の直後（行2）から始まる。
async fn index(State(state): State<SharedState>) -> Result<Html<String>, AppError> {
    let first = state.locator.next(HEADER_ROW).await?;
    let record_json = serde_json::to_string(&first)?;
    Ok(Html(INDEX_TEMPLATE.replace(RECORD_PLACEHOLDER, &record_json)))
}

/// POST /done : 「Done & Next」
///
/// 1. アップロードを一時ファイルに保存（元のコンテナ形式のまま）
/// 2. 文字起こし→書き戻しをバックグラウンドタスクとして起動
/// 3. タスクを待たずに次の未処理レコードを返す
async fn done(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<DoneResponse>, AppError> {
    let mut current_row: Option<i64> = None;
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(AppError::multipart)? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                let file_name = field
                    .file_name()
                    .unwrap_or("recording.webm")
                    .to_string();
                upload = Some((
                    file_name,
                    field.bytes().await.map_err(AppError::multipart)?.to_vec(),
                ));
            }
            Some("current_row") => {
                let text = field.text().await.map_err(AppError::multipart)?;
                let row = text
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| AppError::bad_request(format!("current_row が不正です: {}", text)))?;
                current_row = Some(row);
            }
            _ => {}
        }
    }

    let current_row =
        current_row.ok_or_else(|| AppError::bad_request("current_row フィールドがありません"))?;
    let (file_name, bytes) =
        upload.ok_or_else(|| AppError::bad_request("file フィールドがありません"))?;

    // 一時ファイルに保存（拡張子を保持し、バックエンドにフォーマットを伝える）
    let extension = Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("webm");
    let temp = tempfile::Builder::new()
        .prefix("memo_")
        .suffix(&format!(".{}", extension))
        .tempfile()
        .context("一時ファイルの作成に失敗")?;
    tokio::fs::write(temp.path(), &bytes)
        .await
        .context("一時ファイルへの書き込みに失敗")?;
    let temp_path = temp.into_temp_path();

    log::info!(
        "行 {} の録音を受信しました ({} バイト)。文字起こしをバックグラウンドで開始します",
        current_row,
        bytes.len()
    );

    // 文字起こしと書き戻しは応答を返した後も走り続ける。
    // 失敗はホスト側のログにのみ残り、クライアントには届かない。
    let background = state.clone();
    tokio::spawn(async move {
        if let Err(e) = process_transcription(&background, &temp_path, current_row).await {
            log::error!("行 {} のバックグラウンド文字起こしに失敗: {:#}", current_row, e);
        }
        // temp_pathのドロップでアップロード一時ファイルも削除される
        drop(temp_path);
    });

    // バックグラウンドタスクを待たずに次のレコードを探す
    let next = state.locator.next(current_row).await?;
    Ok(Json(match next {
        Some(record) => DoneResponse::Next(record),
        None => DoneResponse::Message {
            message: "No more unprocessed records.".to_string(),
        },
    }))
}

/// 文字起こしして対象行の結果セルへ書き戻す
///
/// 行ロックは持たない。同じ行への再送信が前の書き戻しより先に完了する
/// 競合では後勝ちになる。
async fn process_transcription(state: &AppState, path: &Path, row: i64) -> Result<()> {
    let text = state.transcriber.transcribe_file(path).await?;

    let cell = result_cell(row);
    state
        .store
        .update_cell(&cell, &text)
        .await
        .with_context(|| format!("セル {} への書き戻しに失敗", cell))?;

    log::info!("行 {} の文字起こしを書き戻しました ({} 文字)", row, text.chars().count());
    Ok(())
}
