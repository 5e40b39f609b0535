use serde::Serialize;

/// 結果列（文字起こしテキスト）の列文字
///
/// 列レイアウトは固定: A=リンク, B=会社名, C=つながった日,
/// D=名, E=姓, F=文字起こし結果
pub const RESULT_COLUMN: &str = "F";

/// 結果列の0始まりインデックス
pub const RESULT_COLUMN_INDEX: usize = 5;

/// ヘッダー行の行番号（1始まり）
///
/// 行1は常にヘッダーであり、スキャン候補にならない。
pub const HEADER_ROW: i64 = 1;

/// 未処理レコード
///
/// Locatorが返す「次に処理すべき行」のペイロード。
/// 行番号は1始まり。足りない列は空文字列として扱う。
///
/// # JSON出力例
///
/// ```json
/// {
///   "row": 2,
///   "url": "https://example.com/in/foo",
///   "company": "Example Inc.",
///   "connected_on": "2024-05-01",
///   "first_name": "Taro",
///   "last_name": "Yamada",
///   "recording": ""
/// }
/// ```
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct NextRecord {
    /// 行番号（1始まり）
    pub row: i64,

    /// A列: リンク
    pub url: String,

    /// B列: 会社名
    pub company: String,

    /// C列: つながった日
    pub connected_on: String,

    /// D列: 名
    pub first_name: String,

    /// E列: 姓
    pub last_name: String,

    /// F列: 文字起こし結果（未処理なら空）
    pub recording: String,
}

impl NextRecord {
    /// グリッドの1行からレコードを生成
    ///
    /// 末尾の列が欠けている行はエラーにせず、空文字列で埋める。
    pub fn from_row(row: i64, values: &[String]) -> Self {
        let col = |i: usize| values.get(i).cloned().unwrap_or_default();
        Self {
            row,
            url: col(0),
            company: col(1),
            connected_on: col(2),
            first_name: col(3),
            last_name: col(4),
            recording: col(5),
        }
    }
}
