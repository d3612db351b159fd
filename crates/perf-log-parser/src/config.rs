//! 解析・出力の既定値

use std::time::Duration;

/// CSV 出力先の既定パス
pub const DEFAULT_CSV_PATH: &str = "performance_results/perf_results.csv";
/// JSONL 出力先の既定パス
pub const DEFAULT_JSONL_PATH: &str = "performance_results/perf_results.jsonl";

/// 既定のテスト名
pub const DEFAULT_TEST_NAME: &str = "Folder Lock Stress Test";
/// 既定の実装名
pub const DEFAULT_IMPLEMENTATION: &str = "Python Easy Encryption V2";

/// マシン情報取得コマンドのタイムアウト
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
/// コマンド終了待ちのポーリング間隔
pub const COMMAND_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// レコードに埋め込む説明用の固定値
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// `test_name` 列に書く値
    pub test_name: String,
    /// `implementation` 列に書く値
    pub implementation: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            test_name: DEFAULT_TEST_NAME.to_owned(),
            implementation: DEFAULT_IMPLEMENTATION.to_owned(),
        }
    }
}
