use log::{info, warn};
use std::time::Duration;

use super::logger::LogController;
use super::progress::ProgressManager;
use super::utils::{normalize_base_url, parse_delay};
use super::{Cli, Result};
use crate::catalog::{self, TABLE_FILE_NAME};
use crate::{BulkDownloader, DownloadError, DownloadJobConfig, DownloadSummary};

/// 退出码：存在失败的下载且启用了 `--strict`
pub const EXIT_PARTIAL_FAILURE: i32 = 2;

/// 一次运行的结果
#[derive(Debug, Clone)]
pub struct RunReport {
    /// 序列下载汇总
    pub summary: DownloadSummary,
    /// 导出的表格行数，跳过表格时为 `None`
    pub table_rows: Option<usize>,
}

impl RunReport {
    /// 进程退出码
    ///
    /// 默认部分失败也返回 0，`strict` 时返回 [`EXIT_PARTIAL_FAILURE`]
    pub fn exit_code(&self, strict: bool) -> i32 {
        if strict && !self.summary.is_complete_success() {
            EXIT_PARTIAL_FAILURE
        } else {
            0
        }
    }

    fn print(&self) {
        println!("{} successful downloads", self.summary.succeeded);
        if self.summary.failed() > 0 {
            println!("{} unsuccessful downloads:", self.summary.failed());
            println!("{}", self.summary.failed_joined());
        }
    }
}

/// 执行完整的下载流程
///
/// 表格 -> 序列目录 -> 批量下载 -> 汇总
pub async fn execute(cli: &Cli, logger_ctrl: Option<LogController>) -> Result<RunReport> {
    let base_url = normalize_base_url(&cli.url)?;
    let delay = parse_delay(cli.delay)?;

    // 构建下载配置
    let config = DownloadJobConfig::builder(&cli.output)
        .concurrency(|c| c.worker_count(cli.workers))
        .retry(|r| r.max_attempts(cli.retries).delay(delay))
        .network(|n| n.timeout(Duration::from_secs(cli.timeout)))
        .build()?;

    // 在任何请求之前确认输出目录可用
    config.prepare_destination().await?;
    let client = config
        .network()
        .build_client()
        .map_err(DownloadError::from)?;

    info!("站点: {}", base_url);
    info!(
        "配置: {} workers, 最多 {} 次尝试, 间隔 {:?}",
        config.concurrency().worker_count(),
        config.retry().max_attempts(),
        config.retry().delay()
    );

    let table_rows = if cli.skip_table {
        None
    } else {
        let table = catalog::fetch_catalog_table(&client, &base_url).await?;
        let path = config.destination_dir().join(TABLE_FILE_NAME);
        table.write_csv(&path).await?;
        println!("Table saved to {}", path.display());
        Some(table.len())
    };

    let locators = catalog::fetch_sequence_locators(&client, &base_url).await?;
    println!(
        "Downloading {} protein sequences with {} threads:",
        locators.len(),
        config.concurrency().worker_count()
    );

    let downloader = BulkDownloader::new(client, config);
    let mut handle = downloader.start(locators).await?;

    // Ctrl-C：不再开始新的下载，等待进行中的下载结束
    let trigger = handle.shutdown_trigger();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("收到中断信号，等待进行中的下载结束");
            trigger.shutdown();
        }
    });

    let summary = if cli.quiet {
        // 静默模式：只等待完成
        handle.wait().await?
    } else {
        // 进度条模式
        let mut progress_manager = ProgressManager::new(cli.verbose);

        // 将进度条引用传给 logger，使日志输出不破坏进度条
        if let Some(ctrl) = &logger_ctrl {
            ctrl.set_progress_bar(progress_manager.main_bar()).await;
        }

        while let Some(progress) = handle.progress_receiver().recv().await {
            progress_manager.handle_progress(progress);
        }

        let summary = handle.wait().await?;
        progress_manager.finish();

        if let Some(ctrl) = &logger_ctrl {
            ctrl.clear_progress_bar().await;
        }
        summary
    };

    signal_task.abort();

    let report = RunReport {
        summary,
        table_rows,
    };
    report.print();
    println!("Download ended.");

    Ok(report)
}
