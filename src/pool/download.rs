//! 下载专用 Worker 协程池
//!
//! 基于通用 WorkerPool，把一个 [`ResourceLocator`] 交给 Fetcher 处理并产出
//! [`DownloadOutcome`]。
//!
//! # 核心组件
//!
//! - **FetchWorkerContext**: 每个 worker 的统计（成功/失败/尝试次数）
//! - **FetchExecutor**: 下载任务执行器，调用 `fetch_with_retry`
//! - **DownloadWorkerPool**: 下载协程池类型

use async_trait::async_trait;
use log::{debug, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::common::{WorkerContext, WorkerExecutor, WorkerPool, WorkerResult, WorkerTask};
use crate::config::RetryConfig;
use crate::task::{DownloadOutcome, ResourceLocator};
use crate::tools::fetch::fetch_with_retry;
use crate::tools::io_traits::{FileSystem, HttpClient};

impl WorkerTask for ResourceLocator {}

impl WorkerResult for DownloadOutcome {}

/// 单个 worker 的统计
#[derive(Debug, Default)]
pub struct FetchWorkerContext {
    succeeded: AtomicU64,
    failed: AtomicU64,
    attempts: AtomicU64,
}

impl WorkerContext for FetchWorkerContext {}

impl FetchWorkerContext {
    fn record(&self, outcome: &DownloadOutcome) {
        let counter = if outcome.succeeded() {
            &self.succeeded
        } else {
            &self.failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.attempts
            .fetch_add(outcome.attempts() as u64, Ordering::Relaxed);
    }

    /// 成功数
    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    /// 失败数
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// 累计尝试次数
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }
}

/// 下载任务执行器
///
/// 所有 worker 共享，执行期间只读
pub(crate) struct FetchExecutor<C, FS> {
    client: Arc<C>,
    fs: FS,
    destination_dir: PathBuf,
    retry: RetryConfig,
}

impl<C, FS> FetchExecutor<C, FS> {
    pub(crate) fn new(client: Arc<C>, fs: FS, destination_dir: PathBuf, retry: RetryConfig) -> Self {
        Self {
            client,
            fs,
            destination_dir,
            retry,
        }
    }
}

#[async_trait]
impl<C, FS> WorkerExecutor<ResourceLocator, DownloadOutcome, FetchWorkerContext> for FetchExecutor<C, FS>
where
    C: HttpClient,
    FS: FileSystem,
{
    async fn execute(
        &self,
        worker_id: usize,
        locator: ResourceLocator,
        context: &FetchWorkerContext,
    ) -> DownloadOutcome {
        let url = locator.url();
        let destination = locator.destination(&self.destination_dir);

        let report = fetch_with_retry(
            self.client.as_ref(),
            &self.fs,
            &url,
            &destination,
            &self.retry,
        )
        .await;

        if report.succeeded {
            debug!(
                "Worker #{} 完成 {} ({} bytes, {} 次尝试)",
                worker_id, locator, report.bytes, report.attempts
            );
        } else {
            warn!(
                "Worker #{} 放弃 {}：{} 次尝试均失败，最后错误: {}",
                worker_id,
                locator,
                report.attempts,
                report.last_error.as_deref().unwrap_or("未知")
            );
        }

        let outcome = DownloadOutcome::new(locator, report.succeeded, report.attempts);
        context.record(&outcome);
        outcome
    }
}

/// 下载协程池
pub(crate) type DownloadWorkerPool = WorkerPool<ResourceLocator, DownloadOutcome, FetchWorkerContext>;

/// 创建 `worker_count` 个下载 worker
pub(crate) fn spawn_download_pool<C, FS>(
    executor: FetchExecutor<C, FS>,
    worker_count: usize,
) -> DownloadWorkerPool
where
    C: HttpClient + 'static,
    FS: FileSystem + 'static,
{
    let contexts = (0..worker_count)
        .map(|_| FetchWorkerContext::default())
        .collect();
    WorkerPool::new(Arc::new(executor), contexts)
}
