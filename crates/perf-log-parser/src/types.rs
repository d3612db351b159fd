//! 解析結果の型定義

use serde::{Deserialize, Serialize};

/// 実行マシン情報
///
/// 取得に失敗した項目は `"unknown"` / `0` になります。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineInfo {
    /// OS バージョン（複数行は `" | "` で連結）
    pub os_version: String,
    /// CPU モデル名
    pub cpu: String,
    /// 搭載メモリ（バイト）
    pub ram_bytes: u64,
    /// ルートファイルシステムの空き容量（例: `"28Gi free of 460Gi"`）
    pub disk_root_free_human: String,
}

impl MachineInfo {
    pub const UNKNOWN: &'static str = "unknown";

    pub fn unknown() -> Self {
        Self {
            os_version: Self::UNKNOWN.to_owned(),
            cpu: Self::UNKNOWN.to_owned(),
            ram_bytes: 0,
            disk_root_free_human: Self::UNKNOWN.to_owned(),
        }
    }
}

/// ログ 1 本分の解析結果
///
/// フィールド順がそのまま JSON のキー順になります。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfResult {
    /// ログファイル名（拡張子なし）
    pub run_id: String,
    /// ログファイルの更新時刻（UTC, RFC 3339）
    pub date_utc: Option<String>,
    pub test_name: String,
    pub implementation: String,
    /// 暗号化対象フォルダ
    pub dataset_path: Option<String>,
    pub total_files: u64,
    pub total_size_mb: f64,
    pub total_time_s: f64,
    /// MB/s（小数第 2 位に丸め）
    pub throughput_mb_s: f64,
    /// files/s（小数第 2 位に丸め）
    pub files_per_s: f64,
    pub pbkdf2_iterations: Option<u64>,
    pub aes_mode: Option<String>,
    /// ヒューリスティックによる注記（なければ空文字列）
    pub notes: String,
    pub machine: MachineInfo,
}
