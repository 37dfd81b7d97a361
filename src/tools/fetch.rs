use futures::StreamExt;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::config::RetryConfig;
use crate::task::LocatorState;
use crate::tools::io_traits::{AsyncFile, FileSystem, HttpClient, HttpResponse};

/// 单次尝试的错误类型
///
/// 全部视为可重试的瞬时错误，由 [`fetch_with_retry`] 在本地消化
#[derive(Error, Debug)]
pub enum FetchError {
    /// 请求或读取响应体失败（连接、超时、流中断）
    #[error("请求失败: {0}")]
    Request(anyhow::Error),

    /// HTTP 状态码非 2xx
    #[error("HTTP 请求失败，状态码: {0}")]
    HttpStatus(u16),

    /// 落盘失败
    #[error("IO 错误: {0}")]
    Io(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// 一个资源的全部尝试结束后的报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    /// 是否最终成功
    pub succeeded: bool,
    /// 实际发起的尝试次数
    pub attempts: u32,
    /// 成功时写入的字节数
    pub bytes: u64,
    /// 最后一次失败的原因
    pub last_error: Option<String>,
}

/// 暂存文件路径：与目标同目录的 `.<name>.<uuid>.part`
///
/// 每次尝试使用独立的名字，并发写同一个目标时互不截断
pub(crate) fn staging_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{}.{}.part", name, Uuid::new_v4()))
}

/// 获取并保存完整文件（单次尝试）
///
/// 响应体先流式写入暂存文件，全部写完后再改名为目标文件，
/// 任何一步失败都会删除暂存文件，目标路径上不会留下截断的内容。
/// 目标所在的子目录不存在时先创建。
///
/// # Returns
///
/// 写入的字节数
pub async fn fetch_file<C, FS>(client: &C, fs: &FS, url: &str, destination: &Path) -> Result<u64>
where
    C: HttpClient,
    FS: FileSystem,
{
    if let Some(parent) = destination.parent() {
        fs.create_dir_all(parent).await.map_err(FetchError::Io)?;
    }

    let staging = staging_path(destination);
    let result = stream_to(client, fs, url, &staging).await;

    match result {
        Ok(written) => {
            if let Err(e) = fs.rename(&staging, destination).await {
                let _ = fs.remove_file(&staging).await;
                return Err(FetchError::Io(e));
            }
            Ok(written)
        }
        Err(e) => {
            if let Err(cleanup) = fs.remove_file(&staging).await {
                warn!("清理暂存文件 {:?} 失败: {}", staging, cleanup);
            }
            Err(e)
        }
    }
}

async fn stream_to<C, FS>(client: &C, fs: &FS, url: &str, path: &Path) -> Result<u64>
where
    C: HttpClient,
    FS: FileSystem,
{
    let response = client.get(url).await.map_err(FetchError::Request)?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let mut file = fs.create(path).await.map_err(FetchError::Io)?;

    // 流式下载
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Request)?;
        file.write_all(&chunk).await.map_err(FetchError::Io)?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(FetchError::Io)?;

    Ok(written)
}

/// 带重试地获取一个资源
///
/// - 首次请求计为第 1 次尝试，最多 `retry.max_attempts()` 次
/// - 每次尝试结束后（无论成败）等待 `retry.delay()`
/// - 失败是返回值而不是错误：所有异常都会记录为 warn 并进入重试循环
pub async fn fetch_with_retry<C, FS>(
    client: &C,
    fs: &FS,
    url: &str,
    destination: &Path,
    retry: &RetryConfig,
) -> FetchReport
where
    C: HttpClient,
    FS: FileSystem,
{
    let max_attempts = retry.max_attempts().max(1);
    let mut state = LocatorState::Pending.next(false, max_attempts);
    let mut last_error = None;

    while let LocatorState::Attempting(attempt) = state {
        debug!("第 {}/{} 次尝试: {}", attempt, max_attempts, url);

        match fetch_file(client, fs, url, destination).await {
            Ok(bytes) => {
                debug!("下载完成: {} ({} bytes) -> {:?}", url, bytes, destination);
                pause(retry).await;
                return FetchReport {
                    succeeded: true,
                    attempts: attempt,
                    bytes,
                    last_error: None,
                };
            }
            Err(e) => {
                warn!("第 {} 次尝试 {} 失败: {}", attempt, url, e);
                last_error = Some(e.to_string());
                pause(retry).await;
            }
        }

        state = state.next(false, max_attempts);
    }

    FetchReport {
        succeeded: false,
        attempts: max_attempts,
        bytes: 0,
        last_error,
    }
}

async fn pause(retry: &RetryConfig) {
    if !retry.delay().is_zero() {
        tokio::time::sleep(retry.delay()).await;
    }
}
