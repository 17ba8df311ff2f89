use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use serde::{Deserialize, Serialize};
use std::fmt;

mod parser;

pub use parser::{parse_node, parse_nodes};

/// 名称为空时显示的占位符
pub const UNNAMED_PLACEHOLDER: &str = "未命名";

/// 代理协议类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    Vless,
    Vmess,
    #[serde(rename = "ss")]
    Shadowsocks,
    Unknown,
}

impl ProxyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyKind::Vless => "vless",
            ProxyKind::Vmess => "vmess",
            ProxyKind::Shadowsocks => "ss",
            ProxyKind::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ProxyKind::Unknown)
    }
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 订阅链接解码后的代理节点，创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub kind: ProxyKind,
    pub name: String,
    /// 服务器地址，IPv6 字面量不带方括号
    pub server: String,
    pub port: String,
    /// VLESS / VMess
    pub uuid: Option<String>,
    /// Shadowsocks 加密方式
    pub method: Option<String>,
    /// Shadowsocks 密码
    pub password: Option<String>,
    /// 传输方式 (tcp/ws/grpc 等)，仅作提示
    pub transport: String,
    pub tls: bool,
    /// 原始链接
    pub raw: String,
}

impl Node {
    pub fn new(kind: ProxyKind, raw: impl Into<String>) -> Self {
        Self {
            kind,
            name: String::new(),
            server: String::new(),
            port: String::new(),
            uuid: None,
            method: None,
            password: None,
            transport: "tcp".to_string(),
            tls: false,
            raw: raw.into(),
        }
    }

    pub fn unknown(raw: impl Into<String>) -> Self {
        Self::new(ProxyKind::Unknown, raw)
    }

    pub fn with_endpoint(mut self, server: impl Into<String>, port: impl Into<String>) -> Self {
        self.server = server.into();
        self.port = port.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// `server:port`，IPv6 地址加方括号
    pub fn address(&self) -> String {
        if self.server.contains(':') {
            format!("[{}]:{}", self.server, self.port)
        } else {
            format!("{}:{}", self.server, self.port)
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            UNNAMED_PLACEHOLDER
        } else {
            &self.name
        }
    }

    /// 端点和协议必需的身份字段是否齐全
    pub fn is_complete(&self) -> bool {
        let endpoint = !self.server.is_empty() && !self.port.is_empty();
        let filled = |field: &Option<String>| field.as_deref().is_some_and(|v| !v.is_empty());

        match self.kind {
            ProxyKind::Vless | ProxyKind::Vmess => endpoint && filled(&self.uuid),
            ProxyKind::Shadowsocks => endpoint && filled(&self.method) && filled(&self.password),
            ProxyKind::Unknown => false,
        }
    }
}

/// 依次尝试标准 Base64 和无填充 Base64，都失败时返回 None，由调用方按明文处理
pub fn decode_base64_lenient(input: &str) -> Option<Vec<u8>> {
    STANDARD
        .decode(input)
        .or_else(|_| STANDARD_NO_PAD.decode(input))
        .ok()
}
