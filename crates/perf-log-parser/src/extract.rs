//! ログ本文から [`PerfResult`] を組み立てる
//!
//! 進捗行（`📦 ... files ... MB`）と `Total time:` 行は必須で、それ以外の項目は
//! 見つからなければ `None` のまま進む。

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use log::debug;
use regex::Regex;

use crate::config::ParseOptions;
use crate::error::ParseError;
use crate::machine::MachineProbe;
use crate::types::PerfResult;

const PROGRESS_MARKER: &str = "📦";
const COMPLETION_MARKER: &str = "✅ Folder locked successfully";
const AES_GCM: &str = "AES-256-GCM";

const NOTE_COMPLETION: &str = "Log includes completion marker.";
const NOTE_SIZE_ARTIFACT: &str = "Progress size counter shows ~49% at end; \
    treat as accounting artifact (batching/size counter mismatch).";

static DATASET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^🔒 Locking folder:\s*(.+)$").expect("invalid DATASET_RE pattern")
});
static ITER_K_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\((\d+)\s*k\s*iterations\)").expect("invalid ITER_K_RE pattern")
});
static ITER_RAW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\((\d{4,})\s*iterations\)").expect("invalid ITER_RAW_RE pattern")
});
static AES_GCM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)AES-256-GCM").expect("invalid AES_GCM_RE pattern"));
static FILES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d+)\s*/\s*(\d+)\s*files\b").expect("invalid FILES_RE pattern")
});
static SIZE_MB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([0-9.]+)\s*/\s*([0-9.]+)\s*MB\b").expect("invalid SIZE_MB_RE pattern")
});
static TOTAL_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Total time:\s*([0-9.]+)s").expect("invalid TOTAL_TIME_RE pattern")
});
static SIZE_49_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([0-9.]+)\s*/\s*([0-9.]+)\s*MB\s*\(49%\)").expect("invalid SIZE_49_RE pattern")
});

/// ログファイルを解析する
///
/// 読み込みは lossy デコードなので、不正な UTF-8 が混じっていても失敗しない。
pub fn parse_log(
    log_path: &Path,
    options: &ParseOptions,
    probe: &dyn MachineProbe,
) -> Result<PerfResult, ParseError> {
    let bytes = fs::read(log_path).map_err(|source| ParseError::Read {
        path: log_path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8_lossy(&bytes);

    let mut result = parse_log_text(&text, log_path, options, probe)?;
    result.date_utc = modified_utc(log_path);
    Ok(result)
}

/// ログ本文を解析する（ファイル更新時刻は扱わない）
///
/// `log_path` は `run_id` とエラーメッセージにのみ使う。
pub fn parse_log_text(
    text: &str,
    log_path: &Path,
    options: &ParseOptions,
    probe: &dyn MachineProbe,
) -> Result<PerfResult, ParseError> {
    let dataset_path = DATASET_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_owned());
    debug!("dataset_path: {dataset_path:?}");

    let pbkdf2_iterations = parse_iterations(text);
    debug!("pbkdf2_iterations: {pbkdf2_iterations:?}");

    let aes_mode = AES_GCM_RE.is_match(text).then(|| AES_GCM.to_owned());

    let (total_files, total_size_mb) = last_progress_totals(text).ok_or_else(|| {
        ParseError::MissingProgress {
            path: log_path.to_path_buf(),
        }
    })?;
    debug!("progress totals: files={total_files} size_mb={total_size_mb}");

    let total_time_s = TOTAL_TIME_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_finite(m.as_str()))
        .ok_or_else(|| ParseError::MissingTotalTime {
            path: log_path.to_path_buf(),
        })?;

    let throughput_mb_s = rate(total_size_mb, total_time_s);
    let files_per_s = rate(total_files as f64, total_time_s);

    let run_id = log_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let notes = collect_notes(text);
    let machine = probe.probe();

    Ok(PerfResult {
        run_id,
        date_utc: None,
        test_name: options.test_name.clone(),
        implementation: options.implementation.clone(),
        dataset_path,
        total_files,
        total_size_mb,
        total_time_s,
        throughput_mb_s,
        files_per_s,
        pbkdf2_iterations,
        aes_mode,
        notes,
        machine,
    })
}

/// `(100k iterations)` 形式を優先し、なければ 4 桁以上の `(250000 iterations)` を探す
fn parse_iterations(text: &str) -> Option<u64> {
    if let Some(caps) = ITER_K_RE.captures(text) {
        return caps[1].parse::<u64>().ok().and_then(|k| k.checked_mul(1000));
    }
    ITER_RAW_RE.captures(text).and_then(|caps| caps[1].parse::<u64>().ok())
}

/// 最後の進捗行から (総ファイル数, 総サイズMB) を取り出す
///
/// 進捗は単調に増えていく前提で、最後の行が最も完全な値を持つ。
/// `\r` で上書き描画された進捗バーもそれぞれ別の行として扱う。
fn last_progress_totals(text: &str) -> Option<(u64, f64)> {
    let line = text
        .split(is_line_break)
        .rev()
        .find(|line| line.contains(PROGRESS_MARKER) && line.contains('/') && line.contains("MB"))?;

    let total_files = FILES_RE.captures(line)?[2].parse::<u64>().ok()?;
    let total_size_mb = parse_finite(&SIZE_MB_RE.captures(line)?[2])?;
    Some((total_files, total_size_mb))
}

/// 改行・復帰に加え、垂直タブ / 改ページ / 区切り制御文字 / Unicode の行区切りも行境界とする
fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r'
            | '\x0b'
            | '\x0c'
            | '\x1c'
            | '\x1d'
            | '\x1e'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}

/// 桁が多すぎて `inf` になる値は解析失敗とみなす
fn parse_finite(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// 経過時間 0 以下なら 0.0、それ以外は小数第 2 位に丸めた値
fn rate(amount: f64, seconds: f64) -> f64 {
    if seconds > 0.0 { round2(amount / seconds) } else { 0.0 }
}

/// 0.5 ちょうどの端数は 0 から遠い側へ丸める
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn collect_notes(text: &str) -> String {
    let mut notes: Vec<&str> = Vec::new();
    if text.contains(COMPLETION_MARKER) {
        notes.push(NOTE_COMPLETION);
    }
    // 計測対象ツールのバッチ処理により、サイズカウンタが 49% 付近で止まって見える
    if SIZE_49_RE.is_match(text) {
        notes.push(NOTE_SIZE_ARTIFACT);
    }
    notes.join(" ")
}

fn modified_utc(path: &Path) -> Option<String> {
    match fs::metadata(path).and_then(|meta| meta.modified()) {
        Ok(mtime) => Some(DateTime::<Utc>::from(mtime).to_rfc3339()),
        Err(e) => {
            debug!("mtime unavailable for {}: {e}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MachineInfo;
    use std::cell::Cell;

    struct CountingProbe {
        calls: Cell<u32>,
    }

    impl CountingProbe {
        fn new() -> Self {
            Self { calls: Cell::new(0) }
        }
    }

    impl MachineProbe for CountingProbe {
        fn probe(&self) -> MachineInfo {
            self.calls.set(self.calls.get() + 1);
            MachineInfo {
                os_version: "TestOS 1.0".to_owned(),
                cpu: "Test CPU".to_owned(),
                ram_bytes: 8 * 1024 * 1024 * 1024,
                disk_root_free_human: "10Gi free of 100Gi".to_owned(),
            }
        }
    }

    const FULL_LOG: &str = "\
🔒 Locking folder: /Users/tester/stress_data
🔑 Deriving key with PBKDF2-HMAC-SHA256 (100k iterations)
🔐 Cipher: AES-256-GCM
📦 1000/15397 files (6%) | 400.0/11363.8 MB (3%) | ETA: 1200s
📦 15299/15397 files (99%) | 5629.5/11363.8 MB (49%) | ETA: 398s
✅ Folder locked successfully
Total time: 200.0s
";

    fn parse(text: &str) -> Result<PerfResult, ParseError> {
        let probe = CountingProbe::new();
        parse_log_text(text, Path::new("logs/run_42.log"), &ParseOptions::default(), &probe)
    }

    #[test]
    fn parses_full_log() {
        let probe = CountingProbe::new();
        let r =
            parse_log_text(FULL_LOG, Path::new("logs/run_42.log"), &ParseOptions::default(), &probe)
                .expect("parse failed");

        assert_eq!(r.run_id, "run_42");
        assert_eq!(r.date_utc, None);
        assert_eq!(r.test_name, "Folder Lock Stress Test");
        assert_eq!(r.implementation, "Python Easy Encryption V2");
        assert_eq!(r.dataset_path.as_deref(), Some("/Users/tester/stress_data"));
        assert_eq!(r.total_files, 15397);
        assert_eq!(r.total_size_mb, 11363.8);
        assert_eq!(r.total_time_s, 200.0);
        assert!((r.throughput_mb_s - 56.82).abs() < 1e-9);
        assert!((r.files_per_s - 76.99).abs() < 1e-9);
        assert_eq!(r.pbkdf2_iterations, Some(100_000));
        assert_eq!(r.aes_mode.as_deref(), Some("AES-256-GCM"));
        assert_eq!(r.notes, format!("{NOTE_COMPLETION} {NOTE_SIZE_ARTIFACT}"));
        assert_eq!(r.machine.cpu, "Test CPU");
        assert_eq!(probe.calls.get(), 1);
    }

    #[test]
    fn zero_time_gives_zero_rates() {
        let r = parse("📦 10/10 files (100%) | 5.0/5.0 MB (100%)\nTotal time: 0s\n")
            .expect("parse failed");
        assert_eq!(r.total_time_s, 0.0);
        assert_eq!(r.throughput_mb_s, 0.0);
        assert_eq!(r.files_per_s, 0.0);
    }

    #[test]
    fn iteration_formats() {
        assert_eq!(parse_iterations("PBKDF2 (100k iterations)"), Some(100_000));
        assert_eq!(parse_iterations("PBKDF2 (100 K Iterations)"), Some(100_000));
        assert_eq!(parse_iterations("PBKDF2 (250000 iterations)"), Some(250_000));
        // 3 桁以下の生の値は拾わない
        assert_eq!(parse_iterations("PBKDF2 (600 iterations)"), None);
        assert_eq!(parse_iterations("no key derivation info"), None);
        // k 表記が先に見つかれば生の値は見ない
        assert_eq!(parse_iterations("(250000 iterations) then (2k iterations)"), Some(2_000));
    }

    #[test]
    fn only_last_progress_line_counts() {
        let text = "\
📦 10/100 files (10%) | 1.5/50.0 MB (3%)
📦 200/250 files (80%) | 40.0/75.5 MB (53%)
progress 300/300 files MB without marker
Total time: 10s
";
        let r = parse(text).expect("parse failed");
        assert_eq!(r.total_files, 250);
        assert_eq!(r.total_size_mb, 75.5);
        assert!((r.files_per_s - 25.0).abs() < 1e-9);
        assert!((r.throughput_mb_s - 7.55).abs() < 1e-9);
        assert_eq!(r.notes, "");
    }

    #[test]
    fn missing_progress_is_fatal_and_skips_probe() {
        let probe = CountingProbe::new();
        let err =
            parse_log_text("Total time: 5.0s\n", Path::new("a.log"), &ParseOptions::default(), &probe)
                .unwrap_err();
        assert!(matches!(err, ParseError::MissingProgress { .. }));
        assert_eq!(probe.calls.get(), 0);
    }

    #[test]
    fn last_progress_line_without_size_is_fatal() {
        // 最後の修飾行に MB 分数が無ければ、それより前の行があっても失敗する
        let text = "📦 1/2 files | 1.0/2.0 MB\n📦 2/2 files | MB pending\nTotal time: 1s\n";
        assert!(matches!(parse(text), Err(ParseError::MissingProgress { .. })));
    }

    #[test]
    fn missing_total_time_is_fatal() {
        let err = parse("📦 1/2 files (50%) | 1.0/2.0 MB (50%)\n").unwrap_err();
        assert!(matches!(err, ParseError::MissingTotalTime { .. }));
        assert!(err.to_string().contains("Total time: <s>s"));
    }

    #[test]
    fn optional_fields_absent() {
        let r = parse("📦 1/2 files (50%) | 1.0/2.0 MB (50%)\nTotal time: 1.5s\n")
            .expect("parse failed");
        assert_eq!(r.dataset_path, None);
        assert_eq!(r.pbkdf2_iterations, None);
        assert_eq!(r.aes_mode, None);
        assert_eq!(r.notes, "");
    }

    #[test]
    fn aes_marker_is_case_insensitive() {
        let r = parse("mode aes-256-gcm\n📦 1/2 files | 1.0/2.0 MB\nTotal time: 1s\n")
            .expect("parse failed");
        assert_eq!(r.aes_mode.as_deref(), Some("AES-256-GCM"));
    }

    #[test]
    fn size_artifact_is_checked_anywhere_in_text() {
        let text = "\
📦 5/10 files (50%) | 2.0/4.0 MB (49%)
📦 10/10 files (100%) | 4.0/4.0 MB (100%)
Total time: 2s
";
        let r = parse(text).expect("parse failed");
        assert_eq!(r.notes, NOTE_SIZE_ARTIFACT);
    }

    #[test]
    fn options_override_descriptive_fields() {
        let options = ParseOptions {
            test_name: "Custom".to_owned(),
            implementation: "Rust".to_owned(),
        };
        let r = parse_log_text(FULL_LOG, Path::new("x.txt"), &options, &CountingProbe::new())
            .expect("parse failed");
        assert_eq!(r.test_name, "Custom");
        assert_eq!(r.implementation, "Rust");
        assert_eq!(r.run_id, "x");
    }

    #[test]
    fn carriage_return_redraws_count_as_separate_lines() {
        let text = "📦 1/100 files | 1.0/50.0 MB\r📦 2/200 files | 2.0/60.0 MB\nTotal time: 1s\n";
        let r = parse(text).expect("parse failed");
        assert_eq!(r.total_files, 200);
        assert_eq!(r.total_size_mb, 60.0);

        // CRLF の行末でも最後の進捗行が使われる
        let text = "📦 1/10 files | 1.0/5.0 MB\r\n📦 3/30 files | 2.0/7.5 MB\r\nTotal time: 1s\r\n";
        let r = parse(text).expect("parse failed");
        assert_eq!(r.total_files, 30);
        assert_eq!(r.total_size_mb, 7.5);
    }

    #[test]
    fn overflowing_floats_are_rejected() {
        let huge = "9".repeat(400);
        let text = format!("📦 1/2 files | 1.0/{huge} MB\nTotal time: 1s\n");
        assert!(matches!(parse(&text), Err(ParseError::MissingProgress { .. })));

        let text = format!("📦 1/2 files | 1.0/2.0 MB\nTotal time: {huge}s\n");
        assert!(matches!(parse(&text), Err(ParseError::MissingTotalTime { .. })));
    }

    #[test]
    fn rates_round_half_away_from_zero() {
        assert_eq!(rate(15397.0, 200.0), 76.99);
        assert_eq!(rate(11363.8, 200.0), 56.82);
        assert_eq!(rate(1.0, 8.0), 0.13);
        assert_eq!(rate(1.0, 3.0), 0.33);
        assert_eq!(rate(5.0, -1.0), 0.0);
    }
}
