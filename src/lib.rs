//! sheet-memo - 音声メモのスプレッドシート書き戻しサービス
//!
//! このクレートは、スプレッドシートの行を1件ずつたどりながら音声メモを
//! 録音し、OpenAI Whisper APIで文字起こしして同じ行に書き戻すWebサービスを
//! 提供します。
//!
//! # 主な機能
//!
//! - **未処理レコード検索**: 結果列（F列）が空の最初の行を線形スキャンで特定
//! - **チャンク分割**: 25MiB超の録音をAPI上限内のWAVチャンクに分割
//! - **非同期文字起こし**: 応答を返した後にバックグラウンドで文字起こしと書き戻しを実行
//! - **シークレット解決**: ローカルは環境変数、デプロイ環境はマウントされたシークレットファイル
//!
//! # アーキテクチャ
//!
//! ```text
//! [Browser] → POST /done → [Server] ─→ [RecordLocator] → [SheetsClient] → 次レコード応答
//!                              │
//!                              └─(spawn)→ [Transcriber] ─→ [ChunkSplitter]（上限超過時）
//!                                              │
//!                                              ↓
//!                                        [WhisperClient]
//!                                              │
//!                                              ↓
//!                                    [SheetsClient] → F列へ書き戻し
//! ```
//!
//! # 使用例
//!
//! ```no_run
//! use sheet_memo::config::Config;
//!
//! // 設定ファイルを読み込み
//! let config = Config::load_or_default("config.toml").unwrap();
//!
//! // またはデフォルト設定を生成
//! Config::write_default("config.toml").unwrap();
//! ```

pub mod chunk_splitter;
pub mod config;
pub mod locator;
pub mod secrets;
pub mod server;
pub mod sheets;
pub mod transcriber;
pub mod types;
pub mod whisper_api;
