//! pixrecover 命令行入口
//!
//! 用法：
//!   pixrecover <input> <output> [--password <pw>] [--allow-unverified] [--rename-dirs] [--flat-names]
//!
//! - `<input>` 为目录时按平铺导出处理，为文件时按备份容器处理
//! - 未给出 `--password` 时从终端读取（不回显）
//! - 日志级别由 `RUST_LOG` 控制，`-v` 打开 debug

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pixrecover::{ContainerFormat, Engine, Event, RecoveryOptions};

#[derive(Debug, Parser)]
#[command(name = "pixrecover", version, about = "Recover media from an encrypted vault export")]
struct Cli {
    /// 平铺导出目录或备份容器文件
    input: PathBuf,

    /// 输出目录
    output: PathBuf,

    #[arg(short, long)]
    password: Option<String>,

    /// 找不到图片样本时不校验口令直接继续
    #[arg(long)]
    allow_unverified: bool,

    /// 结束后按文件日期重命名输出子目录
    #[arg(long)]
    rename_dirs: bool,

    /// 平铺模式不沿用源文件名，改用日期/序号命名
    #[arg(long)]
    flat_names: bool,

    /// 指定容器版本（v1 / v2）
    #[arg(long, value_parser = parse_format)]
    container_format: Option<ContainerFormat>,

    #[arg(short, long)]
    verbose: bool,
}

fn parse_format(s: &str) -> std::result::Result<ContainerFormat, String> {
    match s.to_ascii_lowercase().as_str() {
        "v1" => Ok(ContainerFormat::V1),
        "v2" => Ok(ContainerFormat::V2),
        other => Err(format!("unknown container format {other}")),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let password = match cli.password {
        Some(p) => p,
        None => rpassword::prompt_password("Password: ").context("read password")?,
    };

    let options = RecoveryOptions {
        allow_unverified: cli.allow_unverified,
        rename_dirs_by_date: cli.rename_dirs,
        keep_source_names: !cli.flat_names,
        container_format: cli.container_format,
        work_dir: None,
    };

    let engine = Engine::new(options);
    let handle = engine
        .start(&password, &cli.input, &cli.output)
        .context("start recovery")?;

    for event in handle.events() {
        match event {
            Event::Progress(p) => eprint!("\r[{p:>3}%]"),
            Event::Status(msg) => eprintln!("\r{msg}"),
            Event::Completed { success, summary } => {
                eprintln!();
                println!("{summary}");
                if !success {
                    return Ok(ExitCode::FAILURE);
                }
                break;
            }
        }
    }

    let report = handle.wait();
    Ok(if report.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
