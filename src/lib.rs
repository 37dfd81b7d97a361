//! # bldb-dl: BLDB 蛋白质序列批量下载器
//!
//! 基于 tokio 和 channel 的异步批量下载库
//!
//! ## 特性
//!
//! - 固定大小的 Worker 池，所有 worker 共享一个任务队列
//! - 每个资源独立重试，失败只记入汇总，不会中断整批下载
//! - 流式写入暂存文件后再改名，目标路径上不会出现截断的文件
//! - 实时进度通知，支持优雅关闭
//! - 抓取 BLDB 分类表格并导出 CSV
//! - 使用 `log` crate 进行日志记录
//!
//! ## 示例
//!
//! ### 批量下载
//!
//! ```no_run
//! use bldb_dl::{DownloadJobConfig, ResourceLocator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DownloadJobConfig::builder("sequences")
//!         .concurrency(|c| c.worker_count(8))
//!         .retry(|r| r.max_attempts(3))
//!         .build()?;
//!
//!     let locators = vec![
//!         ResourceLocator::new("http://www.bldb.eu/seq_prot/", "TEM-1.fasta"),
//!         ResourceLocator::new("http://www.bldb.eu/seq_prot/", "SHV-1.fasta"),
//!     ];
//!
//!     let summary = bldb_dl::download_all(locators, config).await?;
//!     println!("{} successful downloads", summary.succeeded);
//!     Ok(())
//! }
//! ```
//!
//! ### 监听进度
//!
//! ```no_run
//! use bldb_dl::{BulkDownloader, DownloadJobConfig, DownloadProgress, ResourceLocator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DownloadJobConfig::builder("sequences").build()?;
//!     let client = config.network().build_client()?;
//!     let downloader = BulkDownloader::new(client, config);
//!
//!     let locators = vec![ResourceLocator::new("http://www.bldb.eu/seq_prot/", "TEM-1.fasta")];
//!     let handle = downloader.start(locators).await?;
//!
//!     let summary = handle
//!         .wait_with_progress(|progress| {
//!             if let DownloadProgress::ItemCompleted { completed, total, .. } = progress {
//!                 println!("{}/{}", completed, total);
//!             }
//!         })
//!         .await?;
//!
//!     println!("失败: {}", summary.failed_joined());
//!     Ok(())
//! }
//! ```

mod config;
mod download;
mod task;
pub mod catalog;
pub mod cli;
pub mod pool {
    pub mod common;
    pub(crate) mod download;
}
pub mod tools {
    pub mod fetch;
    pub mod io_traits;
}

// 重新导出核心类型和函数
pub use config::{
    ConcurrencyConfig, ConcurrencyConfigBuilder, ConfigError, DownloadJobConfig,
    DownloadJobConfigBuilder, NetworkConfig, NetworkConfigBuilder, RetryConfig,
    RetryConfigBuilder,
};
pub use download::{BulkDownloader, DownloadHandle, DownloadProgress, ShutdownTrigger};
pub use task::{DownloadOutcome, DownloadSummary, LocatorState, ResourceLocator};

use thiserror::Error;

/// 下载错误类型
#[derive(Error, Debug)]
pub enum DownloadError {
    /// 配置错误，在发出任何请求之前报告
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// HTTP 客户端构建失败
    #[error("HTTP 客户端错误: {0}")]
    Client(#[from] reqwest::Error),

    /// 目录页或表格页无法获取
    #[error("无法获取 {url}: {reason}")]
    SourceUnavailable {
        /// 请求的 URL
        url: String,
        /// 失败原因
        reason: String,
    },

    /// 标识符无法解析为输出目录内的文件
    #[error("无效的资源标识符: {0:?}")]
    InvalidLocator(String),

    /// 两个资源解析到同一个本地文件
    #[error("资源 {first:?} 和 {second:?} 都会写入 {path:?}")]
    DuplicateDestination {
        /// 先出现的标识符
        first: String,
        /// 后出现的标识符
        second: String,
        /// 相对输出目录的路径
        path: std::path::PathBuf,
    },

    /// 任务发送失败
    #[error("任务发送失败: {0}")]
    TaskSend(String),

    /// 结果数量与资源数量不一致
    #[error("结果数量不一致: 期望 {expected}，实际 {actual}")]
    OutcomeMismatch {
        /// 资源总数
        expected: usize,
        /// 实际收到的结果数
        actual: usize,
    },

    /// 后台任务异常退出
    #[error("后台任务失败: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 结果类型
pub type Result<T> = std::result::Result<T, DownloadError>;

/// 使用默认文件系统和按配置构建的 reqwest 客户端下载全部资源
///
/// # Example
///
/// ```no_run
/// # use bldb_dl::{download_all, DownloadJobConfig, ResourceLocator};
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let config = DownloadJobConfig::builder("out").build()?;
/// let locators = vec![ResourceLocator::new("http://x/", "a.fasta")];
/// let summary = download_all(locators, config).await?;
/// assert_eq!(summary.total, 1);
/// # Ok(())
/// # }
/// ```
pub async fn download_all(
    locators: Vec<ResourceLocator>,
    config: DownloadJobConfig,
) -> Result<DownloadSummary> {
    let client = config.network().build_client()?;
    BulkDownloader::new(client, config).download_all(locators).await
}
