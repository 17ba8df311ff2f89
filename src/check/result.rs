use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::ProbeError;
use crate::proxy::Node;

/// 节点检测状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestStatus {
    Success,
    /// TCP 端口可达，但代理端点连接（含 TLS 握手）失败
    PortReachableButConnectFailed,
    /// 任何一层都无法建立连接
    Timeout,
    /// 解码阶段被拒绝，未进行探测
    Failed,
}

impl TestStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TestStatus::Success => "成功",
            TestStatus::PortReachableButConnectFailed => "端口可达但连接失败",
            TestStatus::Timeout => "超时",
            TestStatus::Failed => "失败",
        }
    }
}

/// 单个节点的检测结果，由负责该节点的任务一次性写入
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub node: Arc<Node>,
    /// TCP 连接延迟 (ms)
    pub tcp_latency: Option<u64>,
    /// 代理端点连接延迟 (ms)，TLS 节点包含握手时间
    pub proxy_latency: Option<u64>,
    pub status: TestStatus,
    pub error: Option<String>,
}

impl TestResult {
    /// 合并两次探测的结果
    pub fn classify(
        node: Arc<Node>,
        tcp: Result<u64, ProbeError>,
        proxy: Result<u64, ProbeError>,
    ) -> Self {
        let tcp_latency = tcp.ok();

        match proxy {
            Ok(latency) => Self {
                node,
                tcp_latency,
                proxy_latency: Some(latency),
                status: TestStatus::Success,
                error: None,
            },
            Err(e) => Self {
                node,
                tcp_latency,
                proxy_latency: None,
                status: if tcp_latency.is_some() {
                    TestStatus::PortReachableButConnectFailed
                } else {
                    TestStatus::Timeout
                },
                error: Some(e.to_string()),
            },
        }
    }

    /// 解码阶段被拒绝的节点
    pub fn rejected(node: Arc<Node>) -> Self {
        Self {
            node,
            tcp_latency: None,
            proxy_latency: None,
            status: TestStatus::Failed,
            error: None,
        }
    }

    /// 探测任务异常退出时的兜底结果
    pub(crate) fn aborted(node: Arc<Node>, reason: String) -> Self {
        Self {
            node,
            tcp_latency: None,
            proxy_latency: None,
            status: TestStatus::Timeout,
            error: Some(reason),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TestStatus::Success
    }

    /// 优先使用代理延迟，其次 TCP 延迟
    pub fn best_latency(&self) -> Option<u64> {
        self.proxy_latency.or(self.tcp_latency)
    }
}

/// 成功的排在前面并按延迟从低到高；失败的保持原顺序
pub fn sort_for_display(results: &mut [TestResult]) {
    results.sort_by_key(|r| {
        if r.is_success() {
            (false, r.best_latency().unwrap_or(u64::MAX))
        } else {
            (true, 0)
        }
    });
}

/// 延迟分布区间上界 (ms)，最后一档为 >= 1000ms
pub const LATENCY_BUCKETS: [u64; 3] = [100, 300, 1000];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub success: usize,
    pub port_reachable: usize,
    pub timeout: usize,
    pub failed: usize,
    pub min_latency: Option<u64>,
    pub avg_latency: Option<u64>,
    pub max_latency: Option<u64>,
    /// 成功节点的延迟分布，对应 `LATENCY_BUCKETS` 加上最后一档
    pub histogram: [usize; 4],
}

impl Summary {
    pub fn from_results(results: &[TestResult]) -> Self {
        let mut summary = Summary {
            total: results.len(),
            ..Default::default()
        };

        let mut latencies = Vec::new();
        for result in results {
            match result.status {
                TestStatus::Success => summary.success += 1,
                TestStatus::PortReachableButConnectFailed => summary.port_reachable += 1,
                TestStatus::Timeout => summary.timeout += 1,
                TestStatus::Failed => summary.failed += 1,
            }
            if let Some(latency) = result.proxy_latency {
                latencies.push(latency);
            }
        }

        for &latency in &latencies {
            let bucket = LATENCY_BUCKETS
                .iter()
                .position(|&upper| latency < upper)
                .unwrap_or(LATENCY_BUCKETS.len());
            summary.histogram[bucket] += 1;
        }

        if !latencies.is_empty() {
            summary.min_latency = latencies.iter().copied().min();
            summary.max_latency = latencies.iter().copied().max();
            summary.avg_latency = Some(latencies.iter().sum::<u64>() / latencies.len() as u64);
        }

        summary
    }

    pub fn success_rate(&self) -> f64 {
        if self.total > 0 {
            (self.success as f64 / self.total as f64) * 100.0
        } else {
            0.0
        }
    }
}
