//! 批量下载器
//!
//! 把一组 [`ResourceLocator`] 分发到固定大小的 Worker 池，逐个收集结果并推送进度，
//! 最后生成 [`DownloadSummary`]。
//!
//! 完成顺序不确定：`failed_locators` 按完成顺序排列，调用方只应按集合比较。

mod summary;

use log::{debug, info};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::DownloadJobConfig;
use crate::pool::download::{DownloadWorkerPool, FetchExecutor, spawn_download_pool};
use crate::task::{DownloadOutcome, DownloadSummary, ResourceLocator};
use crate::tools::io_traits::{FileSystem, HttpClient, TokioFileSystem};
use crate::{DownloadError, Result};
use summary::SummaryCollector;

/// 下载进度更新信息
///
/// 每个资源完成时推送一次 `ItemCompleted`，`completed` 严格递增并恰好到达 `total` 一次
#[derive(Debug, Clone)]
pub enum DownloadProgress {
    /// 下载已开始
    Started {
        /// 资源总数
        total: usize,
        /// Worker 数量
        worker_count: usize,
    },
    /// 一个资源已结束（成功、失败或因关闭而取消）
    ItemCompleted {
        /// 已完成数量
        completed: usize,
        /// 资源总数
        total: usize,
        /// 该资源的结果
        outcome: DownloadOutcome,
    },
    /// 全部结束
    Completed {
        /// 汇总
        summary: DownloadSummary,
        /// 总耗时
        elapsed: Duration,
    },
}

/// 关闭触发器
///
/// 可克隆，可以交给信号处理协程使用
#[derive(Clone)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownTrigger {
    /// 请求优雅关闭：正在进行的下载照常结束，不再开始新的下载
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

/// 下载任务句柄
///
/// 封装了正在进行的批量下载，提供进度监听、关闭和等待完成的接口
pub struct DownloadHandle {
    /// 接收进度更新的 channel
    progress_rx: UnboundedReceiver<DownloadProgress>,
    /// 关闭触发器
    trigger: ShutdownTrigger,
    /// 等待下载完成的 handle
    completion_handle: JoinHandle<Result<DownloadSummary>>,
}

impl DownloadHandle {
    /// 获取进度接收器的可变引用
    pub fn progress_receiver(&mut self) -> &mut UnboundedReceiver<DownloadProgress> {
        &mut self.progress_rx
    }

    /// 获取关闭触发器
    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.trigger.clone()
    }

    /// 请求优雅关闭
    pub fn shutdown(&self) {
        self.trigger.shutdown();
    }

    /// 等待下载完成
    ///
    /// 此方法会消费 handle 并等待所有 worker 结束
    pub async fn wait(self) -> Result<DownloadSummary> {
        self.completion_handle.await?
    }

    /// 同时接收进度并等待完成
    ///
    /// # Arguments
    ///
    /// * `callback` - 每次收到进度更新时调用的回调函数
    pub async fn wait_with_progress<F>(mut self, mut callback: F) -> Result<DownloadSummary>
    where
        F: FnMut(DownloadProgress),
    {
        // 收集协程结束时会关闭进度通道
        while let Some(progress) = self.progress_rx.recv().await {
            callback(progress);
        }
        self.wait().await
    }
}

/// 批量下载器
///
/// 完全由自身的 [`DownloadJobConfig`] 和 HTTP 客户端决定行为，可以重复运行，
/// 也可以与其他实例并发运行。
pub struct BulkDownloader<C, FS = TokioFileSystem> {
    client: Arc<C>,
    fs: FS,
    config: DownloadJobConfig,
}

impl<C> BulkDownloader<C, TokioFileSystem>
where
    C: HttpClient + 'static,
{
    /// 使用真实文件系统创建下载器
    pub fn new(client: C, config: DownloadJobConfig) -> Self {
        Self::with_file_system(client, TokioFileSystem, config)
    }
}

impl<C, FS> BulkDownloader<C, FS>
where
    C: HttpClient + 'static,
    FS: FileSystem + Clone + 'static,
{
    /// 使用自定义文件系统创建下载器
    pub fn with_file_system(client: C, fs: FS, config: DownloadJobConfig) -> Self {
        Self {
            client: Arc::new(client),
            fs,
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &DownloadJobConfig {
        &self.config
    }

    /// 启动批量下载
    ///
    /// 在发出任何请求之前完成两项检查：
    ///
    /// - 每个资源解析到不同的本地文件，否则返回 [`DownloadError::DuplicateDestination`]
    /// - 输出目录可用，否则返回配置错误
    pub async fn start(&self, locators: Vec<ResourceLocator>) -> Result<DownloadHandle> {
        check_destinations(&locators)?;
        self.config.prepare_destination().await?;

        let total = locators.len();
        let worker_count = self.config.concurrency().workers_for(total);

        let executor = FetchExecutor::new(
            Arc::clone(&self.client),
            self.fs.clone(),
            self.config.destination_dir().to_path_buf(),
            self.config.retry().clone(),
        );
        let mut pool = spawn_download_pool(executor, worker_count);

        for locator in locators {
            pool.submit(locator)?;
        }
        pool.close();

        info!(
            "开始下载 {} 个资源，{} 个 workers -> {:?}",
            total,
            worker_count,
            self.config.destination_dir()
        );

        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let completion_handle = tokio::spawn(collect(pool, total, progress_tx, shutdown_rx));

        Ok(DownloadHandle {
            progress_rx,
            trigger: ShutdownTrigger {
                tx: Arc::new(shutdown_tx),
            },
            completion_handle,
        })
    }

    /// 下载全部资源并返回汇总
    ///
    /// 阻塞直到每个 worker 都结束；单个资源的失败只体现在汇总中
    pub async fn download_all(&self, locators: Vec<ResourceLocator>) -> Result<DownloadSummary> {
        self.start(locators).await?.wait().await
    }
}

/// 拒绝解析到同一个本地文件的资源
fn check_destinations(locators: &[ResourceLocator]) -> Result<()> {
    let mut seen: HashMap<PathBuf, &str> = HashMap::with_capacity(locators.len());

    for locator in locators {
        let path = locator.relative_path();
        if path.as_os_str().is_empty() {
            return Err(DownloadError::InvalidLocator(locator.identifier().to_string()));
        }
        if let Some(first) = seen.insert(path.clone(), locator.identifier()) {
            return Err(DownloadError::DuplicateDestination {
                first: first.to_string(),
                second: locator.identifier().to_string(),
                path,
            });
        }
    }

    Ok(())
}

enum CollectEvent {
    Outcome(Option<DownloadOutcome>),
    ShutdownRequested,
    TriggerDropped,
}

/// 收集协程：唯一的汇总写入者
async fn collect(
    mut pool: DownloadWorkerPool,
    total: usize,
    progress_tx: UnboundedSender<DownloadProgress>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<DownloadSummary> {
    let started_at = Instant::now();
    let mut collector = SummaryCollector::new(total);
    let mut listen_shutdown = true;

    let _ = progress_tx.send(DownloadProgress::Started {
        total,
        worker_count: pool.worker_count(),
    });

    let report = |collector: &mut SummaryCollector, outcome: DownloadOutcome| {
        let completed = collector.record(&outcome);
        let _ = progress_tx.send(DownloadProgress::ItemCompleted {
            completed,
            total,
            outcome,
        });
    };

    loop {
        let event = tokio::select! {
            outcome = pool.result_receiver().recv() => CollectEvent::Outcome(outcome),
            requested = async { shutdown_rx.wait_for(|stop| *stop).await.is_ok() }, if listen_shutdown => {
                if requested {
                    CollectEvent::ShutdownRequested
                } else {
                    CollectEvent::TriggerDropped
                }
            }
        };

        match event {
            CollectEvent::Outcome(Some(outcome)) => report(&mut collector, outcome),
            CollectEvent::Outcome(None) => break,
            CollectEvent::ShutdownRequested => {
                info!("收到关闭请求，等待进行中的下载结束");
                pool.shutdown();
                listen_shutdown = false;
            }
            CollectEvent::TriggerDropped => listen_shutdown = false,
        }
    }

    pool.wait_for_shutdown().await;

    for id in 0..pool.worker_count() {
        if let Some(stats) = pool.worker_context(id) {
            debug!(
                "Worker #{}: {} 成功, {} 失败, {} 次尝试",
                id,
                stats.succeeded(),
                stats.failed(),
                stats.attempts()
            );
        }
    }

    let pending = pool.drain_pending().await;
    if !pending.is_empty() {
        info!("{} 个资源因关闭未开始下载", pending.len());
    }
    for locator in pending {
        report(&mut collector, DownloadOutcome::cancelled(locator));
    }

    if collector.completed() != total {
        return Err(DownloadError::OutcomeMismatch {
            expected: total,
            actual: collector.completed(),
        });
    }

    let summary = collector.finish();
    let elapsed = started_at.elapsed();
    debug!(
        "批量下载结束: {}/{} 成功，耗时 {:?}",
        summary.succeeded, summary.total, elapsed
    );

    let _ = progress_tx.send(DownloadProgress::Completed {
        summary: summary.clone(),
        elapsed,
    });

    Ok(summary)
}
