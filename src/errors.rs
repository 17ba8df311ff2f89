use std::time::Duration;

use thiserror::Error;

use crate::proxy::ProxyKind;

/// 单次探测失败的原因，最终以字符串形式写入 `TestResult::error`
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("无效地址: {0}")]
    InvalidAddress(String),

    #[error("TCP连接失败: {0}")]
    Connect(#[source] std::io::Error),

    #[error("TLS握手失败: {0}")]
    Tls(#[source] native_tls::Error),

    #[error("连接超时 ({}ms)", .0.as_millis())]
    Timeout(Duration),

    #[error("不支持的协议类型: {0}")]
    Unsupported(ProxyKind),
}

/// 订阅下载失败的原因
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("下载失败: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP状态码错误: {0}")]
    Status(u16),

    #[error("订阅内容为空")]
    Empty,

    #[error("读取订阅文件失败: {0}")]
    Io(#[from] std::io::Error),
}
