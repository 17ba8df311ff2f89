use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::check::TestStatus;

/// 检测进度，可在多个任务间克隆共享
#[derive(Clone)]
pub struct ProgressTracker {
    bar: Option<ProgressBar>,
    total_nodes: Arc<AtomicU64>,
    success_nodes: Arc<AtomicU64>,
    failed_nodes: Arc<AtomicU64>,
    checked_nodes: Arc<AtomicU64>,
}

impl ProgressTracker {
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self::hidden();
        }

        let style = ProgressStyle::with_template(
            "{spinner:.green} ⚡ 测试节点 [{elapsed_precise}] [{bar:50.green/white}] {pos}/{len} ({per_sec}, {eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏░");

        let bar = ProgressBar::new(0);
        bar.set_style(style);

        Self {
            bar: Some(bar),
            ..Self::hidden()
        }
    }

    /// 不显示任何内容，只做计数
    pub fn hidden() -> Self {
        Self {
            bar: None,
            total_nodes: Arc::new(AtomicU64::new(0)),
            success_nodes: Arc::new(AtomicU64::new(0)),
            failed_nodes: Arc::new(AtomicU64::new(0)),
            checked_nodes: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn set_total_nodes(&self, total: u64) {
        self.total_nodes.store(total, Ordering::Relaxed);

        if let Some(pb) = &self.bar {
            pb.set_length(total);
            pb.set_position(0);
        }
    }

    /// 每个节点检测完成后调用一次
    pub fn record(&self, status: TestStatus) {
        self.checked_nodes.fetch_add(1, Ordering::Relaxed);
        if status == TestStatus::Success {
            self.success_nodes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_nodes.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(pb) = &self.bar {
            pb.inc(1);
            pb.set_message(format!(
                "✅ {} ❌ {}",
                self.success_nodes.load(Ordering::Relaxed),
                self.failed_nodes.load(Ordering::Relaxed)
            ));
        }
    }

    pub fn finalize(&self) {
        if let Some(pb) = &self.bar {
            pb.finish_and_clear();
        }
    }

    pub fn get_stats(&self) -> ProgressStats {
        ProgressStats {
            total: self.total_nodes.load(Ordering::Relaxed),
            success: self.success_nodes.load(Ordering::Relaxed),
            failed: self.failed_nodes.load(Ordering::Relaxed),
            checked: self.checked_nodes.load(Ordering::Relaxed),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.bar.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressStats {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub checked: u64,
}

impl ProgressStats {
    pub fn success_rate(&self) -> f64 {
        if self.checked > 0 {
            (self.success as f64 / self.checked as f64) * 100.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_tracker_still_counts() {
        let tracker = ProgressTracker::hidden();
        assert!(!tracker.is_enabled());

        tracker.set_total_nodes(3);
        let shared = tracker.clone();
        shared.record(TestStatus::Success);
        shared.record(TestStatus::Timeout);
        tracker.record(TestStatus::PortReachableButConnectFailed);

        let stats = tracker.get_stats();
        assert_eq!(
            stats,
            ProgressStats {
                total: 3,
                success: 1,
                failed: 2,
                checked: 3
            }
        );
        assert!((stats.success_rate() - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn enabled_tracker_reports_final_stats() {
        let tracker = ProgressTracker::new(true);
        assert!(tracker.is_enabled());

        tracker.set_total_nodes(2);
        tracker.record(TestStatus::Success);
        tracker.record(TestStatus::Success);
        tracker.finalize();

        let stats = tracker.get_stats();
        assert_eq!(stats.checked, stats.total);
        assert_eq!(stats.success_rate(), 100.0);
    }
}
