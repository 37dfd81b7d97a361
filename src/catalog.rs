//! BLDB 目录抓取
//!
//! 负责两类页面：
//!
//! - 分类表格页 `<base>BLDB.php?prot=<class>`，合并后导出为 CSV
//! - 序列目录页 `<base>seq_prot/`，提供批量下载的资源列表

pub mod listing;
pub mod table;

pub use listing::extract_sequence_links;
pub use table::{CatalogCell, CatalogRow, CatalogTable, extract_rows};

use futures::StreamExt;
use log::{debug, info};

use crate::task::ResourceLocator;
use crate::tools::io_traits::{HttpClient, HttpResponse};
use crate::{DownloadError, Result};

/// Ambler 分类
pub const CLASSES: [&str; 6] = ["A", "B1", "B2", "B3", "C", "D"];

/// 序列目录相对路径
pub const SEQUENCE_LISTING_PATH: &str = "seq_prot/";

/// 导出的表格文件名
pub const TABLE_FILE_NAME: &str = "bldb_table.csv";

/// 分类表格页地址
pub fn class_page_url(base_url: &str, class: &str) -> String {
    format!("{}BLDB.php?prot={}", base_url, class)
}

/// 序列目录页地址
pub fn listing_url(base_url: &str) -> String {
    format!("{}{}", base_url, SEQUENCE_LISTING_PATH)
}

/// 获取一个页面的文本
///
/// 传输错误或非 2xx 状态码都视为数据源不可用
pub async fn fetch_page<C: HttpClient>(client: &C, url: &str) -> Result<String> {
    let unavailable = |reason: String| DownloadError::SourceUnavailable {
        url: url.to_string(),
        reason,
    };

    let response = client
        .get(url)
        .await
        .map_err(|e| unavailable(format!("{:#}", e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(unavailable(format!("状态码 {}", status.as_u16())));
    }

    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| unavailable(format!("{:#}", e)))?;
        body.extend_from_slice(&chunk);
    }

    debug!("获取页面 {} ({} bytes)", url, body.len());
    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// 获取全部分类的表格并合并
pub async fn fetch_catalog_table<C: HttpClient>(client: &C, base_url: &str) -> Result<CatalogTable> {
    let mut table = CatalogTable::new();

    for class in CLASSES {
        let html = fetch_page(client, &class_page_url(base_url, class)).await?;
        let class_table = CatalogTable::from_rows(&extract_rows(&html));
        info!("Class {}: {} entries found", class, class_table.len());
        table.append(class_table);
    }

    Ok(table)
}

/// 获取序列目录并解析为待下载资源
pub async fn fetch_sequence_locators<C: HttpClient>(
    client: &C,
    base_url: &str,
) -> Result<Vec<ResourceLocator>> {
    let url = listing_url(base_url);
    let html = fetch_page(client, &url).await?;

    Ok(extract_sequence_links(&html)
        .into_iter()
        .map(|href| ResourceLocator::new(url.clone(), href))
        .collect())
}

/// 解码常见的 HTML 实体
pub(crate) fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        let decoded = tail.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &tail[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}
