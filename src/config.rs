use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub whisper: WhisperConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
}

/// HTTPサーバ設定
///
/// # デフォルト値
///
/// - `host`: "127.0.0.1"
/// - `port`: 8080
/// - `static_dir`: "static"
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

/// OpenAI Whisper API 設定
///
/// # デフォルト値
///
/// - `endpoint`: OpenAIの transcriptions エンドポイント
/// - `model`: "whisper-1"
/// - `timeout_seconds`: 120 秒
/// - `api_key_secret`: "OPENAI_API_KEY"（シークレット名）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhisperConfig {
    #[serde(default = "default_whisper_endpoint")]
    pub endpoint: String,
    /// Whisper モデル名（通常 "whisper-1"）
    #[serde(default = "default_whisper_model")]
    pub model: String,
    /// 言語コード（"ja", "en" など）。省略可能
    pub language: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// APIキーを解決するシークレット名
    #[serde(default = "default_api_key_secret")]
    pub api_key_secret: String,
}

/// Google Sheets 設定
///
/// `sheet_id` / `worksheet` が空の場合は、シークレットストアから
/// `SHEET_ID` / `SHEET_NAME` を解決する。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SheetsConfig {
    #[serde(default)]
    pub sheet_id: String,
    #[serde(default)]
    pub worksheet: String,
    #[serde(default = "default_sheets_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// 音声処理設定
///
/// # デフォルト値
///
/// - `ceiling_mb`: 25 MiB（Whisper APIの1呼び出しあたりの上限）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    #[serde(default = "default_ceiling_mb")]
    pub ceiling_mb: u64,
}

impl AudioConfig {
    /// 上限をバイト数で返す
    pub fn ceiling_bytes(&self) -> u64 {
        self.ceiling_mb * 1024 * 1024
    }
}

/// シークレット解決モード
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SecretMode {
    /// ローカル開発: 環境変数から解決
    Env,
    /// デプロイ環境: マウントされたシークレットファイルから解決
    File,
}

/// シークレットストア設定
///
/// # デフォルト値
///
/// - `mode`: "env"（ローカル開発）
/// - `dir`: "/secrets"（fileモードのマウント先）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecretsConfig {
    #[serde(default = "default_secret_mode")]
    pub mode: SecretMode,
    #[serde(default = "default_secret_dir")]
    pub dir: String,
}

// Default functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_static_dir() -> String {
    "static".to_string()
}

fn default_whisper_endpoint() -> String {
    "https://api.openai.com/v1/audio/transcriptions".to_string()
}

fn default_whisper_model() -> String {
    "whisper-1".to_string()
}

fn default_timeout_seconds() -> u64 {
    120
}

fn default_api_key_secret() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_sheets_timeout_seconds() -> u64 {
    30
}

fn default_ceiling_mb() -> u64 {
    25 // Whisper APIの上限
}

fn default_secret_mode() -> SecretMode {
    SecretMode::Env
}

fn default_secret_dir() -> String {
    "/secrets".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            whisper: WhisperConfig::default(),
            sheets: SheetsConfig::default(),
            audio: AudioConfig::default(),
            secrets: SecretsConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            endpoint: default_whisper_endpoint(),
            model: default_whisper_model(),
            language: None,
            timeout_seconds: default_timeout_seconds(),
            api_key_secret: default_api_key_secret(),
        }
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            sheet_id: String::new(),
            worksheet: String::new(),
            timeout_seconds: default_sheets_timeout_seconds(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            ceiling_mb: default_ceiling_mb(),
        }
    }
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            mode: default_secret_mode(),
            dir: default_secret_dir(),
        }
    }
}

impl Config {
    /// 設定ファイルから読み込み
    ///
    /// TOML形式の設定ファイルをパースしてConfig構造体を生成する。
    ///
    /// # Errors
    ///
    /// ファイルの読み込みまたはパースに失敗した場合にエラーを返す。
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("設定ファイルの読み込みに失敗: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "設定ファイルのパースに失敗")?;
        Ok(config)
    }

    /// デフォルト設定をファイルに書き出し
    ///
    /// 既存のファイルは上書きされる。
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Config::default();
        let content =
            toml::to_string_pretty(&config).with_context(|| "設定のシリアライズに失敗")?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("設定ファイルの書き込みに失敗: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// 設定ファイルがあれば読み込み、なければデフォルトを使用
    ///
    /// # Errors
    ///
    /// ファイルが存在するがパースに失敗した場合にエラーを返す。
    /// ファイルが存在しない場合はエラーにならず、デフォルト設定を返す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            log::warn!(
                "設定ファイルが見つかりません。デフォルト設定を使用します: {:?}",
                path.as_ref()
            );
            Ok(Config::default())
        }
    }
}
