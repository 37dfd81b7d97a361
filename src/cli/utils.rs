use super::{CliError, Result};
use std::time::Duration;

/// 规范化站点根地址
///
/// 校验 URL 并保证以 `/` 结尾，资源地址直接拼接在其后
///
/// # Example
/// ```
/// # use bldb_dl::cli::utils::normalize_base_url;
/// assert_eq!(normalize_base_url("http://www.bldb.eu").unwrap(), "http://www.bldb.eu/");
/// ```
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let parsed = url::Url::parse(raw.trim())?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(CliError::Argument(format!(
            "不支持的协议: {}",
            parsed.scheme()
        )));
    }

    let mut normalized = parsed.to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Ok(normalized)
}

/// 把秒数转换为等待时长
pub fn parse_delay(seconds: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(seconds)
        .map_err(|_| CliError::Argument(format!("无效的等待时间: {}", seconds)))
}

/// 格式化时长为人类可读格式
///
/// # Example
/// ```
/// # use bldb_dl::cli::utils::format_duration;
/// assert_eq!(format_duration(90.5), "1m 30s");
/// assert_eq!(format_duration(3661.0), "1h 1m");
/// ```
pub fn format_duration(seconds: f64) -> String {
    let total_secs = seconds as u64;

    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        if minutes > 0 {
            format!("{}h {}m", hours, minutes)
        } else {
            format!("{}h", hours)
        }
    } else if minutes > 0 {
        if secs > 0 {
            format!("{}m {}s", minutes, secs)
        } else {
            format!("{}m", minutes)
        }
    } else {
        format!("{}s", secs)
    }
}
