//! 重试配置模块

use std::time::Duration;

// ==================== 常量 ====================

/// 重试配置常量
pub struct Defaults;

impl Defaults {
    /// 每个资源的最大尝试次数（首次请求计为第 1 次）
    pub const MAX_ATTEMPTS: u32 = 3;
    /// 两次请求之间的间隔（毫秒），默认不等待
    pub const DELAY_MILLIS: u64 = 0;
}

// ==================== 配置结构体 ====================

/// 重试配置
///
/// 同一资源的多次尝试严格串行：
/// - 失败后等待 `delay` 再发起下一次尝试，最多 `max_attempts` 次
/// - 成功后同样等待 `delay`，作为对服务器的礼貌性限速
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 最大尝试次数
    pub(crate) max_attempts: u32,
    /// 每次请求结束后的等待时间
    pub(crate) delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Defaults::MAX_ATTEMPTS,
            delay: Duration::from_millis(Defaults::DELAY_MILLIS),
        }
    }
}

impl RetryConfig {
    /// 获取最大尝试次数
    #[inline]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 获取请求间隔
    #[inline]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

// ==================== 构建器 ====================

/// 重试配置构建器
#[derive(Debug, Clone)]
pub struct RetryConfigBuilder {
    pub(crate) max_attempts: u32,
    pub(crate) delay: Duration,
}

impl RetryConfigBuilder {
    /// 创建新的重试配置构建器（使用默认值）
    pub fn new() -> Self {
        Self {
            max_attempts: Defaults::MAX_ATTEMPTS,
            delay: Duration::from_millis(Defaults::DELAY_MILLIS),
        }
    }

    /// 设置最大尝试次数
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// 设置请求间隔
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// 构建重试配置
    pub fn build(self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            delay: self.delay,
        }
    }
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ==================== 测试 ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts(), 3);
        assert_eq!(config.delay(), Duration::ZERO);
    }

    #[test]
    fn test_builder_custom() {
        let config = RetryConfigBuilder::new()
            .max_attempts(5)
            .delay(Duration::from_millis(500))
            .build();

        assert_eq!(config.max_attempts(), 5);
        assert_eq!(config.delay(), Duration::from_millis(500));
    }
}
