//! 下载并发度
//!
//! 所有 worker 从同一个任务队列领取资源，因此并发度同时也是同一时刻
//! 在途 HTTP 请求数的上限。实际启动的 worker 数不会超过资源数。

use super::ConfigError;

/// 并发默认值
pub struct Defaults;

impl Defaults {
    /// 同时下载 8 个序列文件
    pub const WORKER_COUNT: usize = 8;
}

/// 同时进行的下载数
#[derive(Debug, Clone)]
pub struct ConcurrencyConfig {
    pub(crate) worker_count: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            worker_count: Defaults::WORKER_COUNT,
        }
    }
}

impl ConcurrencyConfig {
    /// 配置的并发上限
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// 下载 `total` 个资源时实际需要的 worker 数
    ///
    /// 资源比并发上限少时不启动空闲 worker；`total` 为 0 时返回 0
    pub fn workers_for(&self, total: usize) -> usize {
        self.worker_count.min(total)
    }

    /// 并发上限为 0 时整批下载无法推进
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }
}

/// 并发配置构建器
///
/// 原样保存传入的值，`0` 留给 [`DownloadJobConfigBuilder::build`] 报告
///
/// [`DownloadJobConfigBuilder::build`]: crate::config::DownloadJobConfigBuilder::build
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyConfigBuilder {
    pub(crate) worker_count: Option<usize>,
}

impl ConcurrencyConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同时进行的下载数
    pub fn worker_count(mut self, count: usize) -> Self {
        self.worker_count = Some(count);
        self
    }

    pub fn build(self) -> ConcurrencyConfig {
        ConcurrencyConfig {
            worker_count: self.worker_count.unwrap_or(Defaults::WORKER_COUNT),
        }
    }
}
