use std::fmt;
use std::path::{Path, PathBuf};

/// 序列文件扩展名
pub const SEQUENCE_EXTENSION: &str = ".fasta";

/// 待下载资源
///
/// 由基础地址和标识符（通常是文件名）组成，解析为一个 URL 和一个本地文件名。
/// 入队后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceLocator {
    base_url: String,
    identifier: String,
}

impl ResourceLocator {
    pub fn new(base_url: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            identifier: identifier.into(),
        }
    }

    /// 标识符原文
    #[inline]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// 远程地址：`base + identifier`
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.identifier)
    }

    /// 解码后的路径段
    ///
    /// 空段、`.` 和 `..` 被丢弃，解码出的分隔符替换为 `_`，保证结果落在输出目录内
    fn segments(&self) -> Vec<String> {
        self.identifier
            .split('/')
            .map(|segment| {
                urlencoding::decode(segment)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| segment.to_string())
                    .replace(['/', '\\'], "_")
            })
            .filter(|segment| !matches!(segment.as_str(), "" | "." | ".."))
            .collect()
    }

    /// 相对输出目录的路径：保留标识符的目录结构
    ///
    /// 不同的标识符（如 `x/a.fasta` 和 `y/a.fasta`）得到不同的路径
    pub fn relative_path(&self) -> PathBuf {
        self.segments().iter().collect()
    }

    /// 本地文件名：相对路径的最后一段
    pub fn file_name(&self) -> String {
        self.segments().pop().unwrap_or_default()
    }

    /// 在输出目录下的目标路径
    pub fn destination(&self, dir: &Path) -> PathBuf {
        dir.join(self.relative_path())
    }

    /// 报告用的短名称：去掉序列扩展名的相对路径
    ///
    /// ```
    /// # use bldb_dl::ResourceLocator;
    /// let locator = ResourceLocator::new("http://x/", "b.fasta");
    /// assert_eq!(locator.label(), "b");
    /// let nested = ResourceLocator::new("http://x/", "y/a.fasta");
    /// assert_eq!(nested.label(), "y/a");
    /// ```
    pub fn label(&self) -> String {
        let name = self.segments().join("/");
        match name.strip_suffix(SEQUENCE_EXTENSION) {
            Some(stem) if !stem.is_empty() && !stem.ends_with('/') => stem.to_string(),
            _ => name,
        }
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}

/// 单个资源的下载状态
///
/// `Pending → Attempting(n) → {Succeeded | Attempting(n+1) | Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorState {
    Pending,
    Attempting(u32),
    Succeeded,
    Failed,
}

impl LocatorState {
    /// 一次尝试结束后的下一状态
    pub fn next(self, attempt_succeeded: bool, max_attempts: u32) -> Self {
        match self {
            LocatorState::Pending => LocatorState::Attempting(1),
            LocatorState::Attempting(_) if attempt_succeeded => LocatorState::Succeeded,
            LocatorState::Attempting(n) if n >= max_attempts => LocatorState::Failed,
            LocatorState::Attempting(n) => LocatorState::Attempting(n + 1),
            terminal => terminal,
        }
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, LocatorState::Succeeded | LocatorState::Failed)
    }
}

/// 单个资源的最终结果
///
/// 每个提交的资源恰好产生一个，创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    locator: ResourceLocator,
    succeeded: bool,
    attempts: u32,
}

impl DownloadOutcome {
    pub fn new(locator: ResourceLocator, succeeded: bool, attempts: u32) -> Self {
        Self {
            locator,
            succeeded,
            attempts,
        }
    }

    /// 运行被关闭时尚未出队的资源
    pub fn cancelled(locator: ResourceLocator) -> Self {
        Self::new(locator, false, 0)
    }

    #[inline]
    pub fn locator(&self) -> &ResourceLocator {
        &self.locator
    }

    #[inline]
    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    #[inline]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// 从未发起过请求
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        !self.succeeded && self.attempts == 0
    }
}

/// 一次批量下载的汇总
///
/// `failed_locators` 按完成顺序排列，多 Worker 下顺序不确定，只应按集合比较。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed_locators: Vec<String>,
}

impl DownloadSummary {
    #[inline]
    pub fn failed(&self) -> usize {
        self.failed_locators.len()
    }

    #[inline]
    pub fn is_complete_success(&self) -> bool {
        self.failed_locators.is_empty()
    }

    /// 逗号连接的失败列表，便于脚本解析
    pub fn failed_joined(&self) -> String {
        self.failed_locators.join(",")
    }
}
