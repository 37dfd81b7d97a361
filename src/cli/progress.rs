use indicatif::{ProgressBar, ProgressStyle};

use super::utils::format_duration;
use crate::download::DownloadProgress;

/// 进度条管理器
///
/// 按文件计数，不按字节
pub struct ProgressManager {
    /// 主进度条
    main_bar: ProgressBar,
    /// 是否为详细模式
    verbose: bool,
}

impl ProgressManager {
    /// 创建新的进度条管理器
    ///
    /// # Arguments
    /// * `verbose` - 是否在消息中显示每个完成的资源
    pub fn new(verbose: bool) -> Self {
        let main_bar = ProgressBar::new(0);

        main_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .expect("无效的进度条模板")
                .progress_chars("#>-"),
        );

        Self { main_bar, verbose }
    }

    /// 获取主进度条（交给 logger 使用）
    pub fn main_bar(&self) -> ProgressBar {
        self.main_bar.clone()
    }

    /// 处理下载进度更新
    pub fn handle_progress(&mut self, progress: DownloadProgress) {
        match progress {
            DownloadProgress::Started {
                total,
                worker_count,
            } => {
                self.main_bar.set_length(total as u64);
                self.main_bar
                    .set_message(format!("Overall Progress, {} workers", worker_count));
            }

            DownloadProgress::ItemCompleted {
                completed, outcome, ..
            } => {
                self.main_bar.set_position(completed as u64);
                if self.verbose {
                    let mark = if outcome.succeeded() { "✓" } else { "✗" };
                    self.main_bar
                        .set_message(format!("{} {}", mark, outcome.locator().label()));
                }
            }

            DownloadProgress::Completed { elapsed, .. } => {
                self.main_bar.finish_with_message(format!(
                    "完成，耗时 {}",
                    format_duration(elapsed.as_secs_f64())
                ));
            }
        }
    }

    /// 确保进度条结束
    pub fn finish(&self) {
        if !self.main_bar.is_finished() {
            self.main_bar.finish();
        }
    }
}
