//! 未処理レコードの検索
//!
//! 結果列（F列）が空の最初の行を線形スキャンで探す。
//! F列の空文字列（空白のみを含む）だけが「未処理」の印であり、
//! 別のステータス列は存在しない。

use crate::sheets::RowStore;
use crate::types::{NextRecord, HEADER_ROW, RESULT_COLUMN_INDEX};
use anyhow::Result;
use std::sync::Arc;

/// グリッドから `start_row` より後の最初の未処理行を探す
///
/// - 走査は行番号の昇順で、最初に一致した行を返す
/// - `start_row` が0以下でも行1（ヘッダー）は候補にならない
/// - 列が6未満の行はF列が空の行と同一に扱う
/// - 該当行がなければ `None`（エラーではない）
pub fn next_unprocessed(grid: &[Vec<String>], start_row: i64) -> Option<NextRecord> {
    let start = start_row.max(HEADER_ROW);

    for row in (start + 1)..=(grid.len() as i64) {
        let values = &grid[(row - 1) as usize];
        let unprocessed = values
            .get(RESULT_COLUMN_INDEX)
            .map(|text| text.trim().is_empty())
            .unwrap_or(true);
        if unprocessed {
            return Some(NextRecord::from_row(row, values));
        }
    }

    None
}

/// レコードロケータ
///
/// 呼び出しごとにデータソースから全行を取り直す。キャッシュは持たない。
/// 取得と書き戻しは時間的に分離した別呼び出しであり、その間に外部の
/// 更新が入りうる。
pub struct RecordLocator {
    store: Arc<dyn RowStore>,
}

impl RecordLocator {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    /// `start_row` より後の最初の未処理レコードを返す
    pub async fn next(&self, start_row: i64) -> Result<Option<NextRecord>> {
        let grid = self.store.fetch_all().await?;
        Ok(next_unprocessed(&grid, start_row))
    }
}
