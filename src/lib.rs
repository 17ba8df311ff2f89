//! 代理节点批量连通性测试：解析订阅链接，按并发上限直连探测每个节点，
//! 汇总 TCP 可达性与代理端点（含 TLS 握手）延迟。

pub mod check;
pub mod config;
pub mod errors;
pub mod proxy;
pub mod subscribe;
pub mod ui;

pub use check::{ProbeOptions, ProxyChecker, TestResult, TestStatus, probe_all};
pub use proxy::{Node, ProxyKind, parse_node, parse_nodes};
