//! 解析結果の出力（CSV / JSONL 追記と JSON 表示）

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::types::PerfResult;

/// CSV のヘッダ行（マシン情報は末尾に平坦化）
pub const CSV_HEADER: [&str; 17] = [
    "run_id",
    "date_utc",
    "test_name",
    "implementation",
    "dataset_path",
    "total_files",
    "total_size_mb",
    "total_time_s",
    "throughput_mb_s",
    "files_per_s",
    "pbkdf2_iterations",
    "aes_mode",
    "notes",
    "os_version",
    "cpu",
    "ram_bytes",
    "disk_root_free_human",
];

/// CSV に 1 行追記する
///
/// ファイルが無いか空のときだけ先にヘッダを書く。
pub fn append_csv(csv_path: &Path, r: &PerfResult) -> Result<()> {
    ensure_parent(csv_path)?;

    let write_header = fs::metadata(csv_path).map(|meta| meta.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;

    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if write_header {
        writer
            .write_record(CSV_HEADER)
            .with_context(|| format!("failed to write CSV header to {}", csv_path.display()))?;
    }
    writer
        .write_record(csv_row(r))
        .with_context(|| format!("failed to write CSV row to {}", csv_path.display()))?;
    writer.flush().with_context(|| format!("failed to flush {}", csv_path.display()))?;
    Ok(())
}

/// JSONL に 1 行追記する
pub fn append_jsonl(jsonl_path: &Path, r: &PerfResult) -> Result<()> {
    ensure_parent(jsonl_path)?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(jsonl_path)
        .with_context(|| format!("failed to open {}", jsonl_path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, r)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// 標準出力向けの整形済み JSON
pub fn to_pretty_json(r: &PerfResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(r)?)
}

fn csv_row(r: &PerfResult) -> [String; 17] {
    [
        r.run_id.clone(),
        r.date_utc.clone().unwrap_or_default(),
        r.test_name.clone(),
        r.implementation.clone(),
        r.dataset_path.clone().unwrap_or_default(),
        r.total_files.to_string(),
        fmt_float(r.total_size_mb),
        fmt_float(r.total_time_s),
        fmt_float(r.throughput_mb_s),
        fmt_float(r.files_per_s),
        r.pbkdf2_iterations.map(|n| n.to_string()).unwrap_or_default(),
        r.aes_mode.clone().unwrap_or_default(),
        r.notes.clone(),
        r.machine.os_version.clone(),
        r.machine.cpu.clone(),
        r.machine.ram_bytes.to_string(),
        r.machine.disk_root_free_human.clone(),
    ]
}

/// 整数値でも `200.0` のように小数点を残す
fn fmt_float(value: f64) -> String {
    format!("{value:?}")
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}
