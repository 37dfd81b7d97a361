//! IO抽象层：HTTP客户端和文件系统trait
//!
//! 为HTTP客户端和文件系统操作提供trait抽象，便于测试

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use reqwest::StatusCode;
use std::path::Path;
use std::pin::Pin;
use tokio::io::AsyncWriteExt;

/// HTTP客户端trait
///
/// 只需要流式GET：目录页和序列文件都通过它获取
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// HTTP响应类型
    type Response: HttpResponse;

    /// 发送GET请求
    async fn get(&self, url: &str) -> Result<Self::Response>;
}

/// HTTP响应trait
///
/// 抽象HTTP响应的核心操作
pub trait HttpResponse: Send {
    /// 字节流类型
    type BytesStream: Stream<Item = Result<Bytes, anyhow::Error>> + Send + Unpin;

    /// 获取HTTP状态码
    fn status(&self) -> StatusCode;

    /// 获取字节流
    fn bytes_stream(self) -> Self::BytesStream;
}

/// 文件系统trait
///
/// 抽象下载落盘需要的操作：创建暂存文件、原子改名、清理
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// 异步文件类型
    type File: AsyncFile;

    /// 创建（或截断）文件
    async fn create(&self, path: &Path) -> Result<Self::File>;

    /// 改名，目标存在时覆盖
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// 删除文件，文件不存在时视为成功
    async fn remove_file(&self, path: &Path) -> Result<()>;

    /// 创建目录（含父目录），目录已存在时视为成功
    async fn create_dir_all(&self, path: &Path) -> Result<()>;
}

/// 异步文件trait
#[async_trait]
pub trait AsyncFile: Send + 'static {
    /// 写入所有数据
    async fn write_all<'a>(&'a mut self, buf: &'a [u8]) -> Result<()>;

    /// 刷新缓冲区
    async fn flush(&mut self) -> Result<()>;
}

// ============================================================================
// 为真实类型实现trait
// ============================================================================

/// reqwest::Response的字节流包装器
pub struct ReqwestBytesStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
}

impl Stream for ReqwestBytesStream {
    type Item = Result<Bytes, anyhow::Error>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner)
            .poll_next(cx)
            .map(|opt| opt.map(|res| res.map_err(|e| anyhow::anyhow!(e))))
    }
}

/// 为reqwest::Client实现HttpClient
#[async_trait]
impl HttpClient for reqwest::Client {
    type Response = reqwest::Response;

    async fn get(&self, url: &str) -> Result<Self::Response> {
        self.get(url)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("HTTP GET请求失败: {}", e))
    }
}

/// 为reqwest::Response实现HttpResponse
impl HttpResponse for reqwest::Response {
    type BytesStream = ReqwestBytesStream;

    fn status(&self) -> StatusCode {
        self.status()
    }

    fn bytes_stream(self) -> Self::BytesStream {
        ReqwestBytesStream {
            inner: Box::pin(self.bytes_stream()),
        }
    }
}

/// Tokio文件系统实现
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioFileSystem;

#[async_trait]
impl FileSystem for TokioFileSystem {
    type File = tokio::fs::File;

    async fn create(&self, path: &Path) -> Result<Self::File> {
        tokio::fs::File::create(path)
            .await
            .map_err(|e| anyhow::anyhow!("创建文件 {:?} 失败: {}", path, e))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        tokio::fs::rename(from, to)
            .await
            .map_err(|e| anyhow::anyhow!("重命名 {:?} -> {:?} 失败: {}", from, to, e))
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::anyhow!("删除文件 {:?} 失败: {}", path, e)),
        }
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| anyhow::anyhow!("创建目录 {:?} 失败: {}", path, e))
    }
}

/// 为tokio::fs::File实现AsyncFile
#[async_trait]
impl AsyncFile for tokio::fs::File {
    async fn write_all<'a>(&'a mut self, buf: &'a [u8]) -> Result<()> {
        AsyncWriteExt::write_all(self, buf)
            .await
            .map_err(|e| anyhow::anyhow!("写入文件失败: {}", e))
    }

    async fn flush(&mut self) -> Result<()> {
        AsyncWriteExt::flush(self)
            .await
            .map_err(|e| anyhow::anyhow!("刷新文件缓冲区失败: {}", e))
    }
}

// ============================================================================
// 测试用的 Mock 实现
// ============================================================================
