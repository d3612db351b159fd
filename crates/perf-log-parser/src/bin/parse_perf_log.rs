/// フォルダロック・ストレステストのログ解析
///
/// 使い方:
///   parse_perf_log logs/run_42.log
///
///   # 出力先を指定
///   parse_perf_log logs/run_42.log --csv out/perf.csv --jsonl out/perf.jsonl
///
/// 解析結果は CSV / JSONL に追記され、整形 JSON が標準出力に出る。
/// ログは標準エラー出力（`RUST_LOG` で調整）。
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use perf_log_parser::config::{
    DEFAULT_CSV_PATH, DEFAULT_IMPLEMENTATION, DEFAULT_JSONL_PATH, DEFAULT_TEST_NAME,
};
use perf_log_parser::{
    ParseOptions, SystemProbe, append_csv, append_jsonl, parse_log, to_pretty_json,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Parse folder-lock stress test logs into CSV / JSONL")]
struct Cli {
    /// ストレステストのログファイル
    log: PathBuf,

    /// 追記先 CSV
    #[arg(long, default_value = DEFAULT_CSV_PATH)]
    csv: PathBuf,

    /// 追記先 JSONL
    #[arg(long, default_value = DEFAULT_JSONL_PATH)]
    jsonl: PathBuf,

    /// test_name 列の値
    #[arg(long, default_value = DEFAULT_TEST_NAME)]
    test_name: String,

    /// implementation 列の値
    #[arg(long, default_value = DEFAULT_IMPLEMENTATION)]
    implementation: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let options = ParseOptions {
        test_name: cli.test_name,
        implementation: cli.implementation,
    };

    let result = parse_log(&cli.log, &options, &SystemProbe::default())?;
    info!(
        "parsed {}: files={} size={}MB time={}s throughput={}MB/s",
        result.run_id,
        result.total_files,
        result.total_size_mb,
        result.total_time_s,
        result.throughput_mb_s
    );

    append_csv(&cli.csv, &result)?;
    info!("appended CSV row: {}", cli.csv.display());
    append_jsonl(&cli.jsonl, &result)?;
    info!("appended JSONL line: {}", cli.jsonl.display());

    println!("{}", to_pretty_json(&result)?);
    Ok(())
}
