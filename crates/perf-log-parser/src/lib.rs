//! フォルダ暗号化ストレステストのログ解析ツール
//!
//! ストレステストが出力する自由形式のログから、ファイル数・データサイズ・
//! 経過時間・暗号パラメータを抽出し、スループットを算出して
//! CSV / JSONL に 1 レコードずつ追記します。
//!
//! - [`extract`]: ログ本文から [`PerfResult`] を組み立てる
//! - [`record`]: CSV / JSONL への追記と JSON 表示
//! - [`machine`]: 実行マシン情報の収集

pub mod config;
pub mod error;
pub mod extract;
pub mod machine;
pub mod record;
pub mod types;

pub use config::ParseOptions;
pub use error::ParseError;
pub use extract::{parse_log, parse_log_text};
pub use machine::{MachineProbe, SystemProbe};
pub use record::{CSV_HEADER, append_csv, append_jsonl, to_pretty_json};
pub use types::{MachineInfo, PerfResult};
