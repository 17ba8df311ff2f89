use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio::task;

use crate::errors::ProbeError;
use crate::proxy::Node;
use crate::ui::progress::ProgressTracker;

mod probe;
mod result;

pub use probe::{DirectProber, Prober};
pub use result::{LATENCY_BUCKETS, Summary, TestResult, TestStatus, sort_for_display};

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
/// 超时配置无效 (<= 0) 时使用的值
pub const FALLBACK_TIMEOUT_SECS: u64 = 30;
/// 并发数上限，远低于 `Semaphore::MAX_PERMITS`
pub const MAX_CONCURRENCY: usize = 4096;

/// 调度参数，构造时完成规范化，不会因为配置错误而失败
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    pub concurrency: usize,
    pub timeout: Duration,
}

impl ProbeOptions {
    pub fn new(concurrency: i64, timeout_secs: i64) -> Self {
        let concurrency = if concurrency < 1 {
            warn!("并发数 {} 无效，使用 1", concurrency);
            1
        } else if concurrency as u64 > MAX_CONCURRENCY as u64 {
            warn!("并发数 {} 过大，使用 {}", concurrency, MAX_CONCURRENCY);
            MAX_CONCURRENCY
        } else {
            concurrency as usize
        };

        let timeout_secs = if timeout_secs <= 0 {
            warn!("超时时间 {}s 无效，使用 {}s", timeout_secs, FALLBACK_TIMEOUT_SECS);
            FALLBACK_TIMEOUT_SECS
        } else {
            timeout_secs as u64
        };

        Self {
            concurrency,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

pub struct ProxyChecker {
    options: ProbeOptions,
    prober: Arc<dyn Prober>,
    progress: ProgressTracker,
}

impl ProxyChecker {
    /// 使用直连探测器；只有 TLS 连接器创建失败时才会返回错误
    pub fn new(options: ProbeOptions) -> Result<Self, ProbeError> {
        Ok(Self::with_prober(options, Arc::new(DirectProber::new()?)))
    }

    pub fn with_prober(options: ProbeOptions, prober: Arc<dyn Prober>) -> Self {
        Self {
            options,
            prober,
            progress: ProgressTracker::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = progress;
        self
    }

    pub fn options(&self) -> ProbeOptions {
        self.options
    }

    /// 并发检测所有节点，每个节点恰好产生一个结果，结果顺序与输入无关。
    ///
    /// 同一时刻最多有 `concurrency` 个探测任务在运行，其余节点在派发循环中
    /// 等待空闲许可。Unknown 节点不做探测，直接记为 `Failed`。
    pub async fn probe_all(&self, nodes: Vec<Node>) -> Vec<TestResult> {
        let total = nodes.len();
        let ProbeOptions {
            concurrency,
            timeout,
        } = self.options;

        info!(
            "开始检测 {} 个节点 (并发 {}, 超时 {}s)",
            total,
            concurrency,
            timeout.as_secs()
        );
        self.progress.set_total_nodes(total as u64);

        let semaphore = Arc::new(Semaphore::new(concurrency));
        // 容量足够放下全部结果，发送端永远不会阻塞
        let (tx, mut rx) = mpsc::channel(total.max(1));

        let mut results = Vec::with_capacity(total);
        let mut tasks = Vec::with_capacity(total);

        for node in nodes {
            let node = Arc::new(node);

            if !node.kind.is_known() {
                debug!("跳过未识别节点: {}", node.raw);
                let rejected = TestResult::rejected(node);
                self.progress.record(rejected.status);
                results.push(rejected);
                continue;
            }

            // 信号量从不关闭，获取失败时退化为不限流
            let permit = semaphore.clone().acquire_owned().await.ok();

            let tx = tx.clone();
            let prober = self.prober.clone();
            let progress = self.progress.clone();
            let task_node = node.clone();

            let handle = task::spawn(async move {
                // 许可随任务结束释放，探测失败也不例外
                let _permit = permit;
                let result = probe_node(prober.as_ref(), task_node, timeout).await;
                progress.record(result.status);
                let _ = tx.send(result).await;
            });
            tasks.push((node, handle));
        }

        // 关闭发送端，接收端收完所有消息后结束
        drop(tx);
        while let Some(result) = rx.recv().await {
            results.push(result);
        }

        for (node, handle) in tasks {
            if let Err(e) = handle.await {
                error!("节点 {} 的探测任务异常退出: {}", node.address(), e);
                self.progress.record(TestStatus::Timeout);
                results.push(TestResult::aborted(node, format!("探测任务异常退出: {e}")));
            }
        }

        self.progress.finalize();
        info!(
            "检测完成: {}/{} 个节点可用",
            results.iter().filter(|r| r.is_success()).count(),
            results.len()
        );
        results
    }
}

/// 按给定参数检测所有节点，参数无效时自动规范化
pub async fn probe_all(
    nodes: Vec<Node>,
    concurrency: i64,
    timeout_secs: i64,
) -> Result<Vec<TestResult>, ProbeError> {
    let checker = ProxyChecker::new(ProbeOptions::new(concurrency, timeout_secs))?;
    Ok(checker.probe_all(nodes).await)
}

async fn probe_node(prober: &dyn Prober, node: Arc<Node>, timeout: Duration) -> TestResult {
    // 两次探测相互独立，TCP 失败时仍然进行代理端点探测
    let tcp = prober.tcp_ping(&node, timeout).await;
    let proxy = prober.connect(&node, timeout).await;

    if let Err(e) = &tcp {
        debug!("{} TCP 探测失败: {}", node.address(), e);
    }

    let result = TestResult::classify(node, tcp, proxy);
    debug!(
        "{} ({}) -> {} {}",
        result.node.display_name(),
        result.node.address(),
        result.status.label(),
        result.error.as_deref().unwrap_or_default()
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProxyKind;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 按节点名称返回预设结果的探测器
    #[derive(Default)]
    struct ScriptedProber {
        script: HashMap<String, (Option<u64>, Option<u64>)>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    impl ScriptedProber {
        fn with(mut self, name: &str, tcp: Option<u64>, proxy: Option<u64>) -> Self {
            self.script.insert(name.to_string(), (tcp, proxy));
            self
        }

        fn outcome(latency: Option<u64>, limit: Duration) -> Result<u64, ProbeError> {
            latency.ok_or(ProbeError::Timeout(limit))
        }
    }

    #[async_trait]
    impl Prober for ScriptedProber {
        async fn tcp_ping(&self, node: &Node, limit: Duration) -> Result<u64, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let (tcp, _) = self.script.get(&node.name).copied().unwrap_or_default();
            tokio::time::sleep(Duration::from_millis(tcp.unwrap_or(20))).await;
            Self::outcome(tcp, limit)
        }

        async fn connect(&self, node: &Node, limit: Duration) -> Result<u64, ProbeError> {
            let (_, proxy) = self.script.get(&node.name).copied().unwrap_or_default();
            tokio::time::sleep(Duration::from_millis(proxy.unwrap_or(20))).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Self::outcome(proxy, limit)
        }
    }

    fn node(name: &str) -> Node {
        Node::new(ProxyKind::Vless, "")
            .with_name(name)
            .with_endpoint("127.0.0.1", "443")
            .with_uuid("id")
    }

    fn status_of<'a>(results: &'a [TestResult], name: &str) -> &'a TestResult {
        results.iter().find(|r| r.node.name == name).unwrap()
    }

    #[test]
    fn options_are_clamped() {
        let options = ProbeOptions::new(0, 0);
        assert_eq!(options.concurrency, 1);
        assert_eq!(options.timeout, Duration::from_secs(FALLBACK_TIMEOUT_SECS));

        let options = ProbeOptions::new(-4, -1);
        assert_eq!(options.concurrency, 1);
        assert_eq!(options.timeout, Duration::from_secs(30));

        let options = ProbeOptions::new(16, 3);
        assert_eq!(options.concurrency, 16);
        assert_eq!(options.timeout, Duration::from_secs(3));

        let options = ProbeOptions::new(i64::MAX, 1);
        assert_eq!(options.concurrency, MAX_CONCURRENCY);
        assert!(options.concurrency <= Semaphore::MAX_PERMITS);
    }

    #[tokio::test]
    async fn huge_concurrency_does_not_panic() {
        let prober = Arc::new(ScriptedProber::default().with("a", Some(1), Some(1)));
        let checker = ProxyChecker::with_prober(ProbeOptions::new(i64::MAX, 1), prober);

        let results = checker.probe_all(vec![node("a")]).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, TestStatus::Success);
    }

    #[tokio::test]
    async fn mixed_nodes_each_get_one_result() {
        let prober = Arc::new(
            ScriptedProber::default()
                .with("reachable", Some(30), Some(50))
                .with("port-open", Some(10), None)
                .with("unreachable", None, None),
        );
        let checker = ProxyChecker::with_prober(ProbeOptions::new(2, 5), prober.clone());

        let results = checker
            .probe_all(vec![node("reachable"), node("port-open"), node("unreachable")])
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(status_of(&results, "reachable").status, TestStatus::Success);
        assert_eq!(status_of(&results, "reachable").proxy_latency, Some(50));
        assert_eq!(
            status_of(&results, "port-open").status,
            TestStatus::PortReachableButConnectFailed
        );
        assert_eq!(status_of(&results, "unreachable").status, TestStatus::Timeout);

        for r in &results {
            assert_eq!(r.status == TestStatus::Success, r.proxy_latency.is_some());
        }
        assert!(prober.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn in_flight_never_exceeds_concurrency() {
        let prober = Arc::new(ScriptedProber::default());
        let checker = ProxyChecker::with_prober(ProbeOptions::new(3, 5), prober.clone());

        let nodes = (0..12).map(|i| node(&format!("n{i}"))).collect();
        let results = checker.probe_all(nodes).await;

        assert_eq!(results.len(), 12);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 12);
        let max = prober.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 3 && max >= 1, "max in flight was {max}");
    }

    #[tokio::test]
    async fn zero_concurrency_runs_serially() {
        let prober = Arc::new(ScriptedProber::default());
        let checker = ProxyChecker::with_prober(ProbeOptions::new(0, 0), prober.clone());

        let results = checker
            .probe_all(vec![node("a"), node("b"), node("c")])
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(prober.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_nodes_fail_without_probing() {
        let prober = Arc::new(ScriptedProber::default().with("ok", Some(1), Some(1)));
        let checker = ProxyChecker::with_prober(ProbeOptions::default(), prober.clone());

        let results = checker
            .probe_all(vec![Node::unknown("trojan://x"), node("ok")])
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 1);
        let rejected = results.iter().find(|r| r.node.raw == "trojan://x").unwrap();
        assert_eq!(rejected.status, TestStatus::Failed);
    }

    #[tokio::test]
    async fn empty_input_returns_empty() {
        let checker =
            ProxyChecker::with_prober(ProbeOptions::default(), Arc::new(ScriptedProber::default()));
        assert!(checker.probe_all(Vec::new()).await.is_empty());
    }
}
