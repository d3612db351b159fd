//! 実行マシン情報の収集
//!
//! macOS のコマンド（`sysctl` / `sw_vers` / `df`）を優先し、取れなかった項目は
//! `sysinfo` で補います。どちらでも取れなければ `"unknown"` / `0` のまま。

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use sysinfo::System;

use crate::config::{COMMAND_POLL_INTERVAL, COMMAND_TIMEOUT};
use crate::types::MachineInfo;

/// 外部コマンドの実行口
pub trait CommandRunner {
    /// コマンドを実行し、成功時のみ trim 済みの出力を返す。
    ///
    /// 起動失敗・タイムアウト・非ゼロ終了・空出力はすべて `None`。
    fn run(&self, program: &str, args: &[&str]) -> Option<String>;
}

/// マシン情報の取得元
pub trait MachineProbe {
    fn probe(&self) -> MachineInfo;
}

/// 実プロセスを起動する [`CommandRunner`]
pub struct SystemCommandRunner {
    timeout: Duration,
}

impl SystemCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemCommandRunner {
    fn default() -> Self {
        Self::new(COMMAND_TIMEOUT)
    }
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Option<String> {
        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                debug!("{program}: failed to spawn: {e}");
                return None;
            }
        };

        // パイプ詰まりで子プロセスが止まらないよう、別スレッドで読み切る
        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return None;
        };
        let stdout_rx = drain(stdout);
        let stderr_rx = drain(stderr);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() < deadline => thread::sleep(COMMAND_POLL_INTERVAL),
                Ok(None) => {
                    warn!("{program}: timed out after {:?}", self.timeout);
                    let _ = child.kill();
                    let _ = child.wait();
                    return None;
                }
                Err(e) => {
                    debug!("{program}: wait failed: {e}");
                    let _ = child.kill();
                    let _ = child.wait();
                    return None;
                }
            }
        };
        if !status.success() {
            debug!("{program}: exited with {status}");
            return None;
        }

        let remaining = deadline.saturating_duration_since(Instant::now()).max(COMMAND_POLL_INTERVAL);
        let stdout = stdout_rx.recv_timeout(remaining).unwrap_or_default();
        let stderr = stderr_rx.recv_timeout(remaining).unwrap_or_default();
        let out = if stdout.trim().is_empty() { stderr } else { stdout };
        let out = out.trim();
        if out.is_empty() { None } else { Some(out.to_owned()) }
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

/// 実マシンを調べる [`MachineProbe`]
#[derive(Default)]
pub struct SystemProbe {
    runner: SystemCommandRunner,
}

impl SystemProbe {
    pub fn new(runner: SystemCommandRunner) -> Self {
        Self { runner }
    }
}

impl MachineProbe for SystemProbe {
    fn probe(&self) -> MachineInfo {
        let mut info = collect_machine_info(&self.runner);
        fill_from_sysinfo(&mut info);
        info
    }
}

/// コマンド出力からマシン情報を組み立てる
pub fn collect_machine_info(runner: &impl CommandRunner) -> MachineInfo {
    let cpu = runner
        .run("sysctl", &["-n", "machdep.cpu.brand_string"])
        .or_else(|| runner.run("sysctl", &["-n", "hw.model"]))
        .unwrap_or_else(|| MachineInfo::UNKNOWN.to_owned());

    let ram_bytes = runner
        .run("sysctl", &["-n", "hw.memsize"])
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(0);

    let os_version = runner
        .run("sw_vers", &[])
        .map(|raw| raw.lines().collect::<Vec<_>>().join(" | "))
        .unwrap_or_else(|| MachineInfo::UNKNOWN.to_owned());

    let disk_root_free_human = runner
        .run("df", &["-h", "/"])
        .and_then(|raw| parse_df_free(&raw))
        .unwrap_or_else(|| MachineInfo::UNKNOWN.to_owned());

    MachineInfo {
        os_version,
        cpu,
        ram_bytes,
        disk_root_free_human,
    }
}

/// `df -h /` の最終行から `"<Avail> free of <Size>"` を作る
///
/// 列は `Filesystem Size Used Avail ...` の順を前提とする。
pub fn parse_df_free(report: &str) -> Option<String> {
    let lines: Vec<&str> = report.lines().collect();
    if lines.len() < 2 {
        return None;
    }
    let cols: Vec<&str> = lines.last()?.split_whitespace().collect();
    if cols.len() < 4 {
        return None;
    }
    Some(format!("{} free of {}", cols[3], cols[1]))
}

/// コマンドで取れなかった項目を sysinfo で埋める
fn fill_from_sysinfo(info: &mut MachineInfo) {
    let need_cpu = info.cpu == MachineInfo::UNKNOWN;
    let need_ram = info.ram_bytes == 0;
    let need_os = info.os_version == MachineInfo::UNKNOWN;
    if !(need_cpu || need_ram || need_os) {
        return;
    }

    let mut sys = System::new_all();
    sys.refresh_cpu_all();

    if need_cpu {
        if let Some(brand) =
            sys.cpus().first().map(|cpu| cpu.brand().trim()).filter(|b| !b.is_empty())
        {
            info.cpu = brand.to_owned();
        }
    }
    if need_ram && sys.total_memory() > 0 {
        info.ram_bytes = sys.total_memory();
    }
    if need_os {
        if let Some(version) = System::long_os_version() {
            info.os_version = version;
        }
    }
    debug!("machine info after sysinfo fallback: {info:?}");
}
