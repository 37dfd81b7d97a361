//! 下载任务配置模块
//!
//! 一次批量下载的全部策略都集中在 [`DownloadJobConfig`] 中，按功能域拆分为子配置。
//! 配置在构建时校验，构建完成后只读；不存在任何进程级的全局默认状态，
//! 因此多个下载器可以用不同的策略并发运行。

mod concurrency;
mod network;
mod retry;

pub use concurrency::{ConcurrencyConfig, ConcurrencyConfigBuilder, Defaults as ConcurrencyDefaults};
pub use network::{Defaults as NetworkDefaults, NetworkConfig, NetworkConfigBuilder};
pub use retry::{Defaults as RetryDefaults, RetryConfig, RetryConfigBuilder};

use std::path::{Path, PathBuf};

use thiserror::Error;

/// 配置错误
///
/// 在任何网络请求发出之前报告，对整次运行是致命的
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Worker 数量为 0
    #[error("并发数必须至少为 1")]
    ZeroConcurrency,

    /// 最大尝试次数为 0
    #[error("最大尝试次数必须至少为 1")]
    ZeroAttempts,

    /// 未指定输出目录
    #[error("未指定输出目录")]
    MissingDestination,

    /// 输出路径已存在但不是目录
    #[error("输出路径 {0:?} 不是目录")]
    NotADirectory(PathBuf),

    /// 输出目录无法创建
    #[error("无法创建输出目录 {path:?}: {source}")]
    CreateDestination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ==================== 主配置结构体 ====================

/// 批量下载配置
///
/// 一次批量运行期间不可变
#[derive(Debug, Clone)]
pub struct DownloadJobConfig {
    /// 并发配置
    concurrency: ConcurrencyConfig,
    /// 重试配置
    retry: RetryConfig,
    /// 网络配置
    network: NetworkConfig,
    /// 输出目录
    destination_dir: PathBuf,
}

impl DownloadJobConfig {
    /// 创建配置构建器
    ///
    /// # Example
    ///
    /// ```
    /// # use bldb_dl::DownloadJobConfig;
    /// # use std::time::Duration;
    /// let config = DownloadJobConfig::builder("out")
    ///     .concurrency(|c| c.worker_count(4))
    ///     .retry(|r| r.max_attempts(5).delay(Duration::from_millis(200)))
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.concurrency().worker_count(), 4);
    /// ```
    pub fn builder(destination_dir: impl Into<PathBuf>) -> DownloadJobConfigBuilder {
        DownloadJobConfigBuilder::new(destination_dir)
    }

    #[inline]
    pub fn concurrency(&self) -> &ConcurrencyConfig {
        &self.concurrency
    }

    #[inline]
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    #[inline]
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    #[inline]
    pub fn destination_dir(&self) -> &Path {
        &self.destination_dir
    }

    /// 确保输出目录存在（含父目录）
    ///
    /// 由下载器在发出第一个请求之前调用
    pub async fn prepare_destination(&self) -> Result<(), ConfigError> {
        let path = &self.destination_dir;
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(ConfigError::NotADirectory(path.clone())),
            Err(_) => tokio::fs::create_dir_all(path)
                .await
                .map_err(|source| ConfigError::CreateDestination {
                    path: path.clone(),
                    source,
                }),
        }
    }
}

// ==================== 构建器 ====================

/// 批量下载配置构建器
///
/// 子配置通过闭包修改：
///
/// ```
/// # use bldb_dl::DownloadJobConfig;
/// # use std::time::Duration;
/// let config = DownloadJobConfig::builder("out")
///     .network(|n| n.timeout(Duration::from_secs(60)))
///     .build()
///     .unwrap();
/// assert_eq!(config.network().timeout(), Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct DownloadJobConfigBuilder {
    concurrency: ConcurrencyConfig,
    retry: RetryConfig,
    network: NetworkConfig,
    destination_dir: PathBuf,
}

impl DownloadJobConfigBuilder {
    /// 创建新的配置构建器（使用默认值）
    pub fn new(destination_dir: impl Into<PathBuf>) -> Self {
        Self {
            concurrency: ConcurrencyConfig::default(),
            retry: RetryConfig::default(),
            network: NetworkConfig::default(),
            destination_dir: destination_dir.into(),
        }
    }

    // ==================== 闭包风格配置方法 ====================

    /// 配置并发设置
    pub fn concurrency<F>(mut self, f: F) -> Self
    where
        F: FnOnce(ConcurrencyConfigBuilder) -> ConcurrencyConfigBuilder,
    {
        let builder = ConcurrencyConfigBuilder {
            worker_count: Some(self.concurrency.worker_count),
        };
        self.concurrency = f(builder).build();
        self
    }

    /// 配置重试设置
    pub fn retry<F>(mut self, f: F) -> Self
    where
        F: FnOnce(RetryConfigBuilder) -> RetryConfigBuilder,
    {
        let builder = RetryConfigBuilder {
            max_attempts: self.retry.max_attempts,
            delay: self.retry.delay,
        };
        self.retry = f(builder).build();
        self
    }

    /// 配置网络设置
    pub fn network<F>(mut self, f: F) -> Self
    where
        F: FnOnce(NetworkConfigBuilder) -> NetworkConfigBuilder,
    {
        let builder = NetworkConfigBuilder {
            timeout: self.network.timeout,
            connect_timeout: self.network.connect_timeout,
        };
        self.network = f(builder).build();
        self
    }

    /// 修改输出目录
    pub fn destination_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.destination_dir = dir.into();
        self
    }

    // ==================== 构建方法 ====================

    /// 校验并构建配置对象
    pub fn build(self) -> Result<DownloadJobConfig, ConfigError> {
        self.concurrency.validate()?;
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.destination_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingDestination);
        }

        Ok(DownloadJobConfig {
            concurrency: self.concurrency,
            retry: self.retry,
            network: self.network,
            destination_dir: self.destination_dir,
        })
    }
}

// ==================== 测试 ====================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_builder_default() {
        let config = DownloadJobConfig::builder("out").build().unwrap();
        assert_eq!(config.concurrency().worker_count(), ConcurrencyDefaults::WORKER_COUNT);
        assert_eq!(config.retry().max_attempts(), RetryDefaults::MAX_ATTEMPTS);
        assert_eq!(config.retry().delay(), Duration::ZERO);
        assert_eq!(
            config.network().timeout(),
            Duration::from_secs(NetworkDefaults::TIMEOUT_SECS)
        );
        assert_eq!(config.destination_dir(), Path::new("out"));
    }

    #[test]
    fn test_builder_custom() {
        let config = DownloadJobConfig::builder("a")
            .concurrency(|c| c.worker_count(2))
            .retry(|r| r.max_attempts(1).delay(Duration::from_millis(250)))
            .network(|n| n.connect_timeout(Duration::from_secs(3)))
            .destination_dir("b")
            .build()
            .unwrap();

        assert_eq!(config.concurrency().worker_count(), 2);
        assert_eq!(config.retry().max_attempts(), 1);
        assert_eq!(config.retry().delay(), Duration::from_millis(250));
        assert_eq!(config.network().connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.destination_dir(), Path::new("b"));
    }

    #[test]
    fn test_closure_keeps_previous_values() {
        let config = DownloadJobConfig::builder("out")
            .retry(|r| r.max_attempts(7))
            .retry(|r| r.delay(Duration::from_secs(1)))
            .build()
            .unwrap();

        assert_eq!(config.retry().max_attempts(), 7);
        assert_eq!(config.retry().delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let result = DownloadJobConfig::builder("out")
            .concurrency(|c| c.worker_count(0))
            .build();
        assert!(matches!(result, Err(ConfigError::ZeroConcurrency)));
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let result = DownloadJobConfig::builder("out")
            .retry(|r| r.max_attempts(0))
            .build();
        assert!(matches!(result, Err(ConfigError::ZeroAttempts)));
    }

    #[test]
    fn test_rejects_empty_destination() {
        let result = DownloadJobConfig::builder("").build();
        assert!(matches!(result, Err(ConfigError::MissingDestination)));
    }

    #[tokio::test]
    async fn test_prepare_destination_creates_parents() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("x").join("y");
        let config = DownloadJobConfig::builder(&nested).build().unwrap();

        config.prepare_destination().await.unwrap();
        assert!(nested.is_dir());

        // 已存在时再次调用不报错
        config.prepare_destination().await.unwrap();
    }

    #[tokio::test]
    async fn test_prepare_destination_rejects_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();

        let config = DownloadJobConfig::builder(&file).build().unwrap();
        let result = config.prepare_destination().await;
        assert!(matches!(result, Err(ConfigError::NotADirectory(_))));
    }
}
