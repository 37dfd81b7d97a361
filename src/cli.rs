use clap::Parser;
use std::path::PathBuf;

mod logger;
mod progress;
mod runner;
pub mod utils;

pub use logger::{LogController, init_logger};
pub use runner::RunReport;

/// CLI 错误类型
#[derive(thiserror::Error, Debug)]
pub enum CliError {
    /// 下载错误
    #[error(transparent)]
    Download(#[from] crate::DownloadError),

    /// 配置错误
    #[error(transparent)]
    Config(#[from] crate::ConfigError),

    /// URL 解析错误
    #[error("URL 解析失败: {0}")]
    UrlParse(#[from] url::ParseError),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 参数错误
    #[error("{0}")]
    Argument(String),
}

/// CLI 结果类型
pub type Result<T> = std::result::Result<T, CliError>;

/// 从 BLDB 下载分类表格和蛋白质序列
#[derive(Parser, Debug)]
#[command(name = "bldb-dl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// 站点根地址
    #[arg(short, long, default_value = "http://www.bldb.eu/")]
    pub url: String,

    /// 每个序列的最大尝试次数
    #[arg(short, long, default_value_t = 3)]
    pub retries: u32,

    /// 每次尝试后的等待时间（秒）
    #[arg(short, long, default_value_t = 0.0)]
    pub delay: f64,

    /// Worker 并发数
    #[arg(short, long, default_value_t = 8)]
    pub workers: usize,

    /// 输出目录
    #[arg(short, long, value_name = "DIRECTORY")]
    pub output: PathBuf,

    /// 单个请求的超时时间（秒）
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// 不下载分类表格
    #[arg(long)]
    pub skip_table: bool,

    /// 有下载失败时以非零状态退出
    #[arg(long)]
    pub strict: bool,

    /// 静默模式（不显示进度条）
    #[arg(short, long)]
    pub quiet: bool,

    /// 详细模式（显示每次尝试的日志）
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,
}

/// 运行 CLI 程序
pub async fn run(cli: Cli, logger_ctrl: Option<LogController>) -> Result<RunReport> {
    runner::execute(&cli, logger_ctrl).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["bldb-dl", "-o", "out"]).unwrap();

        assert_eq!(cli.url, "http://www.bldb.eu/");
        assert_eq!(cli.retries, 3);
        assert_eq!(cli.delay, 0.0);
        assert_eq!(cli.workers, 8);
        assert_eq!(cli.output, PathBuf::from("out"));
        assert!(!cli.strict);
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from([
            "bldb-dl", "-u", "http://mirror/", "-r", "5", "-d", "0.5", "-w", "2", "-o", "seqs",
        ])
        .unwrap();

        assert_eq!(cli.url, "http://mirror/");
        assert_eq!(cli.retries, 5);
        assert_eq!(cli.delay, 0.5);
        assert_eq!(cli.workers, 2);
    }

    #[test]
    fn test_output_is_required() {
        assert!(Cli::try_parse_from(["bldb-dl"]).is_err());
    }
}
