//! 音声チャンク分割
//!
//! 上限（25MiB）を超える録音を、非圧縮バイト量が上限に収まる秒数ごとの
//! チャンクに分割する。チャンク秒数は
//! `ceiling_bytes / (sample_rate * frame_width)` を整数秒に切り捨てた値。
//! 各チャンクは単独でデコード可能なWAVファイルとして書き出す。

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// 1回のAPI呼び出しで送信できるエンコード済みバイト数の上限
pub const DEFAULT_CEILING_BYTES: u64 = 25 * 1024 * 1024;

/// チャンク1個あたりの秒数を計算
///
/// 計算結果が0になる場合（上限に対してサンプルレートが極端に高い場合）は
/// 1秒に切り上げる。ステップが0や負になると分割ループが停止しないため、
/// ここで必ず正の値を保証する。
pub fn chunk_seconds(sample_rate: u32, frame_width: u32, ceiling_bytes: u64) -> u64 {
    let bytes_per_second = sample_rate as u64 * frame_width as u64;
    if bytes_per_second == 0 {
        return 1;
    }
    (ceiling_bytes / bytes_per_second).max(1)
}

/// チャンク境界をフレーム単位で計画
///
/// 戻り値は `[start, end)` のフレーム範囲列。全フレームを隙間も重複もなく
/// 覆い、最後のチャンクだけ短くなりうる。空の入力には空列を返す。
pub fn chunk_spans(
    total_frames: u64,
    sample_rate: u32,
    frame_width: u32,
    ceiling_bytes: u64,
) -> Vec<(u64, u64)> {
    if total_frames == 0 {
        return Vec::new();
    }

    // sample_rateが0だと秒数×レートの積も0になるため、ここでも1フレーム以上を保証する
    let frames_per_chunk = chunk_seconds(sample_rate, frame_width, ceiling_bytes)
        .saturating_mul(sample_rate as u64)
        .max(1);
    let mut spans = Vec::new();
    let mut start = 0u64;
    while start < total_frames {
        let end = (start + frames_per_chunk).min(total_frames);
        spans.push((start, end));
        start = end;
    }
    spans
}

/// WAVファイルをチャンクに分割して一時ファイルとして書き出す
///
/// 戻り値はチャンク順のファイルパス。各ファイルの削除は呼び出し側の責任。
/// 元のファイルは変更しない。
///
/// # Errors
///
/// WAVとして読めないファイル、または16bit整数PCM以外のフォーマットの
/// 場合にエラーを返す。
pub fn split_wav(path: &Path, ceiling_bytes: u64) -> Result<Vec<PathBuf>> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("WAVファイルのオープンに失敗: {:?}", path))?;
    let spec = reader.spec();

    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        anyhow::bail!(
            "未対応のWAVフォーマットです（16bit整数PCMのみ対応）: {:?}",
            spec
        );
    }
    // ヘッダ上のサンプルレートが0のWAVはhoundが読めてしまうが、分割計画が成立しない
    if spec.sample_rate == 0 {
        anyhow::bail!("不正なWAVヘッダです（サンプルレートが0）: {:?}", path);
    }

    let frame_width = spec.channels as u32 * (spec.bits_per_sample as u32 / 8);
    let total_frames = reader.duration() as u64;
    let spans = chunk_spans(total_frames, spec.sample_rate, frame_width, ceiling_bytes);

    log::info!(
        "音声を分割します: {}フレーム ({:.1}秒) → {}チャンク",
        total_frames,
        total_frames as f64 / spec.sample_rate as f64,
        spans.len()
    );

    let samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("WAVサンプルの読み込みに失敗: {:?}", path))?;
    let channels = spec.channels as u64;

    let mut chunks = Vec::with_capacity(spans.len());
    for (index, (start, end)) in spans.iter().enumerate() {
        let chunk_path = PathBuf::from(format!("{}_chunk{}.wav", path.display(), index));
        let mut writer = hound::WavWriter::create(&chunk_path, spec)
            .with_context(|| format!("チャンクファイルの作成に失敗: {:?}", chunk_path))?;

        let range = (start * channels) as usize..(end * channels) as usize;
        for &sample in &samples[range] {
            writer
                .write_sample(sample)
                .with_context(|| "チャンクへのサンプル書き込みに失敗")?;
        }
        writer
            .finalize()
            .with_context(|| format!("チャンクのファイナライズに失敗: {:?}", chunk_path))?;

        chunks.push(chunk_path);
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_test_wav(path: &Path, sample_rate: u32, channels: u16, seconds: u32) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let frames = sample_rate * seconds;
        for i in 0..frames {
            for _ in 0..channels {
                let sample = ((i as f32 * 0.05).sin() * 10000.0) as i16;
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_chunk_seconds_formula() {
        // 44.1kHz・2ch・16bit → frame_width 4: 26214400 / 176400 = 148.6 → 148秒
        assert_eq!(chunk_seconds(44100, 4, DEFAULT_CEILING_BYTES), 148);
        // 16kHz・1ch・16bit → 26214400 / 32000 = 819秒
        assert_eq!(chunk_seconds(16000, 2, DEFAULT_CEILING_BYTES), 819);
    }

    #[test]
    fn test_chunk_seconds_never_zero() {
        // 上限が極端に小さくてもステップは1秒を下回らない（回帰テスト）
        assert_eq!(chunk_seconds(192000, 8, 1024), 1);
        assert_eq!(chunk_seconds(48000, 4, 0), 1);
        // frame_widthが0でもパニックしない
        assert_eq!(chunk_seconds(48000, 0, DEFAULT_CEILING_BYTES), 1);
    }

    #[test]
    fn test_chunk_spans_terminates_with_zero_sample_rate() {
        // サンプルレート0でもループのステップは1フレームを下回らず、必ず終了する
        let spans = chunk_spans(10, 0, 4, DEFAULT_CEILING_BYTES);
        assert_eq!(spans.len(), 10);
        assert_eq!(spans.first().unwrap(), &(0, 1));
        assert_eq!(spans.last().unwrap(), &(9, 10));
    }

    #[test]
    fn test_split_wav_rejects_zero_sample_rate_header() {
        // サンプルレート0を宣言する手書きのWAVヘッダ。houndのリーダーは
        // これを受理するため、分割前に明示的に拒否する必要がある。
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("zero_rate.wav");

        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36u32 + 8).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
        bytes.extend_from_slice(&1u16.to_le_bytes()); // モノラル
        bytes.extend_from_slice(&0u32.to_le_bytes()); // サンプルレート0
        bytes.extend_from_slice(&0u32.to_le_bytes()); // バイトレート
        bytes.extend_from_slice(&2u16.to_le_bytes()); // ブロックアライン
        bytes.extend_from_slice(&16u16.to_le_bytes()); // 16bit
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&8u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 8]);
        std::fs::write(&path, bytes).unwrap();

        let err = split_wav(&path, DEFAULT_CEILING_BYTES).unwrap_err();
        assert!(err.to_string().contains("サンプルレートが0"));
    }

    #[test]
    fn test_chunk_spans_empty_input() {
        assert!(chunk_spans(0, 44100, 4, DEFAULT_CEILING_BYTES).is_empty());
    }

    #[test]
    fn test_chunk_spans_cover_without_gaps() {
        // 60MiB・2ch・44.1kHz・16bit → 15728640フレーム、148秒/チャンク → 3チャンク
        let total_frames = 60 * 1024 * 1024 / 4;
        let spans = chunk_spans(total_frames, 44100, 4, DEFAULT_CEILING_BYTES);
        assert_eq!(spans.len(), 3);

        // 隙間も重複もなく全体を覆う
        assert_eq!(spans[0].0, 0);
        for pair in spans.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
        assert_eq!(spans.last().unwrap().1, total_frames);

        // 各チャンクの非圧縮バイト量は上限以下
        for (start, end) in &spans {
            assert!((end - start) * 4 <= DEFAULT_CEILING_BYTES);
        }
    }

    #[test]
    fn test_chunk_spans_single_chunk_for_small_input() {
        let spans = chunk_spans(16000, 16000, 2, DEFAULT_CEILING_BYTES);
        assert_eq!(spans, vec![(0, 16000)]);
    }

    #[test]
    fn test_split_wav_partitions_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("memo.wav");
        // 16kHz・モノラル・3秒 = 96000バイトの音声データ
        write_test_wav(&path, 16000, 1, 3);

        // 上限48000バイト → 1秒/チャンク → 3チャンク
        let chunks = split_wav(&path, 48000).unwrap();
        assert_eq!(chunks.len(), 3);

        // 各チャンクは単独でデコードでき、合計フレーム数が元と一致する
        let mut total_frames = 0u64;
        for chunk in &chunks {
            let reader = hound::WavReader::open(chunk).unwrap();
            assert_eq!(reader.spec().sample_rate, 16000);
            total_frames += reader.duration() as u64;
        }
        assert_eq!(total_frames, 48000);

        // 元のファイルは残る
        assert!(path.exists());

        // チャンクの削除は呼び出し側の責任
        for chunk in chunks {
            std::fs::remove_file(chunk).unwrap();
        }
    }

    #[test]
    fn test_split_wav_nonempty_input_never_zero_chunks() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("short.wav");
        write_test_wav(&path, 16000, 1, 1);

        // 上限が巨大でも最低1チャンク
        let chunks = split_wav(&path, u64::MAX).unwrap();
        assert_eq!(chunks.len(), 1);
        for chunk in chunks {
            std::fs::remove_file(chunk).unwrap();
        }
    }

    #[test]
    fn test_split_wav_rejects_missing_file() {
        assert!(split_wav(Path::new("/nonexistent/no.wav"), DEFAULT_CEILING_BYTES).is_err());
    }
}
