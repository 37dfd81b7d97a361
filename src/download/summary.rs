//! 结果汇总
//!
//! 只有收集协程持有 `SummaryCollector`，所有 worker 的结果经 channel 串行到达，
//! 因此计数不需要额外加锁，也不会丢失或重复。

use crate::task::{DownloadOutcome, DownloadSummary};

pub(crate) struct SummaryCollector {
    total: usize,
    completed: usize,
    succeeded: usize,
    failed_locators: Vec<String>,
}

impl SummaryCollector {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            succeeded: 0,
            failed_locators: Vec::new(),
        }
    }

    /// 记录一个结果，返回当前已完成数
    pub(crate) fn record(&mut self, outcome: &DownloadOutcome) -> usize {
        self.completed += 1;
        if outcome.succeeded() {
            self.succeeded += 1;
        } else {
            self.failed_locators.push(outcome.locator().label());
        }
        self.completed
    }

    #[inline]
    pub(crate) fn completed(&self) -> usize {
        self.completed
    }

    pub(crate) fn finish(self) -> DownloadSummary {
        debug_assert_eq!(self.completed, self.total, "每个资源必须恰好产生一个结果");
        debug_assert_eq!(self.succeeded + self.failed_locators.len(), self.total);

        DownloadSummary {
            total: self.total,
            succeeded: self.succeeded,
            failed_locators: self.failed_locators,
        }
    }
}
