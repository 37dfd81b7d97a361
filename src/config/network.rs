//! 网络配置模块

use std::time::Duration;

// ==================== 常量 ====================

/// 网络配置常量
pub struct Defaults;

impl Defaults {
    /// 请求超时时间：30 秒
    pub const TIMEOUT_SECS: u64 = 30;
    /// 连接超时时间：10 秒
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;
    /// 请求携带的 User-Agent
    pub const USER_AGENT: &'static str = concat!("bldb-dl/", env!("CARGO_PKG_VERSION"));
}

// ==================== 配置结构体 ====================

/// 网络配置
///
/// 控制 HTTP 请求的超时设置，保证卡住的连接不会拖住整个 Worker 池
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// HTTP 请求总体超时时间
    pub(crate) timeout: Duration,
    /// HTTP 连接超时时间
    pub(crate) connect_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(Defaults::TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(Defaults::CONNECT_TIMEOUT_SECS),
        }
    }
}

impl NetworkConfig {
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[inline]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// 按本配置创建 reqwest 客户端
    pub fn build_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(Defaults::USER_AGENT)
            .build()
    }
}

// ==================== 构建器 ====================

/// 网络配置构建器
#[derive(Debug, Clone)]
pub struct NetworkConfigBuilder {
    pub(crate) timeout: Duration,
    pub(crate) connect_timeout: Duration,
}

impl NetworkConfigBuilder {
    /// 创建新的网络配置构建器（使用默认值）
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(Defaults::TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(Defaults::CONNECT_TIMEOUT_SECS),
        }
    }

    /// 设置 HTTP 请求总体超时时间
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 设置 HTTP 连接超时时间
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// 构建网络配置
    pub fn build(self) -> NetworkConfig {
        NetworkConfig {
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
        }
    }
}

impl Default for NetworkConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_original_timeout() {
        let config = NetworkConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_build_client() {
        let config = NetworkConfigBuilder::new()
            .timeout(Duration::from_secs(5))
            .build();
        assert!(config.build_client().is_ok());
    }
}
