mod chunk_splitter;
mod config;
mod locator;
mod secrets;
mod server;
mod sheets;
mod transcriber;
mod types;
mod whisper_api;

use anyhow::{Context, Result};
use config::Config;
use env_logger::Env;
use locator::RecordLocator;
use secrets::{SecretStore, TokenSource};
use server::AppState;
use sheets::{RowStore, SheetsClient};
use std::path::Path;
use std::sync::Arc;
use transcriber::{SpeechToText, Transcriber};
use whisper_api::WhisperClient;

#[tokio::main]
async fn main() -> Result<()> {
    // ロガーを初期化
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    // コマンドライン引数をパース
    let args: Vec<String> = std::env::args().collect();

    // 設定ファイル生成モード
    if args.len() > 1 && args[1] == "--generate-config" {
        let config_path = if args.len() > 2 {
            &args[2]
        } else {
            "config.toml"
        };
        Config::write_default(config_path)?;
        println!("設定ファイルを生成しました: {}", config_path);
        return Ok(());
    }

    // 設定ファイルのパス
    let config_path = if args.len() > 1 && !args[1].starts_with("--") {
        &args[1]
    } else {
        "config.toml"
    };

    // 設定を読み込み
    let config = Config::load_or_default(config_path)?;

    log::info!("sheet-memo を起動します");

    // シークレットを起動時に解決（欠落は致命的エラー）
    let secret_store = SecretStore::new(&config.secrets);
    let api_key = secret_store
        .resolve(&config.whisper.api_key_secret)
        .context("Whisper APIキーの解決に失敗")?;
    let sheet_id = if config.sheets.sheet_id.is_empty() {
        secret_store
            .resolve("SHEET_ID")
            .context("シートIDの解決に失敗")?
    } else {
        config.sheets.sheet_id.clone()
    };
    let worksheet = if config.sheets.worksheet.is_empty() {
        secret_store
            .resolve("SHEET_NAME")
            .context("ワークシート名の解決に失敗")?
    } else {
        config.sheets.worksheet.clone()
    };

    // 共有コンポーネントを構築
    let tokens = Arc::new(TokenSource::new(config.secrets.mode.clone())?);
    let store: Arc<dyn RowStore> = Arc::new(SheetsClient::new(
        &config.sheets,
        sheet_id,
        worksheet,
        tokens,
    )?);
    let backend: Arc<dyn SpeechToText> = Arc::new(WhisperClient::new(&config.whisper, api_key)?);
    let transcriber = Arc::new(Transcriber::new(backend, config.audio.ceiling_bytes()));
    let locator = RecordLocator::new(store.clone());

    let state = Arc::new(AppState {
        locator,
        transcriber,
        store,
    });
    let app = server::router(state, Path::new(&config.server.static_dir));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("アドレスのバインドに失敗: {}", addr))?;
    log::info!("待ち受けを開始しました: http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("サーバの実行に失敗")?;

    log::info!("sheet-memo を終了しました");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("停止シグナルの待機に失敗: {}", e);
        return;
    }
    log::info!("停止シグナルを受信しました...");
}
