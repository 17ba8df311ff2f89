//! 连通性探测：只测量连接建立（以及 TLS 握手）的耗时，不发送任何协议数据

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_native_tls::TlsConnector;

use crate::errors::ProbeError;
use crate::proxy::{Node, ProxyKind};

/// 单节点探测接口，调度器通过它完成两次探测
#[async_trait]
pub trait Prober: Send + Sync {
    /// 纯 TCP 连接，返回建立连接耗时 (ms)
    async fn tcp_ping(&self, node: &Node, timeout: Duration) -> Result<u64, ProbeError>;

    /// 代理端点连接：TLS 节点完成握手，其余等同于 TCP 连接
    async fn connect(&self, node: &Node, timeout: Duration) -> Result<u64, ProbeError>;
}

/// 直连探测器。直接使用 `TcpStream`，不读取系统代理或环境变量代理设置
pub struct DirectProber {
    connector: TlsConnector,
}

impl DirectProber {
    pub fn new() -> Result<Self, ProbeError> {
        // 订阅节点常见自签名或域前置证书，不校验证书
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(ProbeError::Tls)?;

        Ok(Self {
            connector: TlsConnector::from(connector),
        })
    }

    async fn tls_handshake(&self, node: &Node, limit: Duration) -> Result<u64, ProbeError> {
        let (host, port) = target(node)?;

        let start = Instant::now();
        let handshake = async {
            let stream = TcpStream::connect((host.as_str(), port))
                .await
                .map_err(ProbeError::Connect)?;
            let tls = self
                .connector
                .connect(&host, stream)
                .await
                .map_err(ProbeError::Tls)?;
            Ok::<_, ProbeError>(tls)
        };

        let _stream = timeout(limit, handshake)
            .await
            .map_err(|_| ProbeError::Timeout(limit))??;
        Ok(elapsed_ms(start))
    }
}

#[async_trait]
impl Prober for DirectProber {
    async fn tcp_ping(&self, node: &Node, limit: Duration) -> Result<u64, ProbeError> {
        let (host, port) = target(node)?;

        let start = Instant::now();
        let _stream = timeout(limit, TcpStream::connect((host.as_str(), port)))
            .await
            .map_err(|_| ProbeError::Timeout(limit))?
            .map_err(ProbeError::Connect)?;
        Ok(elapsed_ms(start))
    }

    async fn connect(&self, node: &Node, limit: Duration) -> Result<u64, ProbeError> {
        match node.kind {
            ProxyKind::Vless | ProxyKind::Vmess | ProxyKind::Shadowsocks => {
                if node.tls {
                    self.tls_handshake(node, limit).await
                } else {
                    self.tcp_ping(node, limit).await
                }
            }
            ProxyKind::Unknown => Err(ProbeError::Unsupported(node.kind)),
        }
    }
}

fn target(node: &Node) -> Result<(String, u16), ProbeError> {
    let host = node.server.trim_start_matches('[').trim_end_matches(']');
    let port = node
        .port
        .parse::<u16>()
        .ok()
        .filter(|&p| p != 0)
        .ok_or_else(|| ProbeError::InvalidAddress(node.address()))?;

    if host.is_empty() {
        return Err(ProbeError::InvalidAddress(node.address()));
    }
    Ok((host.to_string(), port))
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
