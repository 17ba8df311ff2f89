//! 订阅获取：直连下载订阅内容并解码成按行分隔的节点链接

use log::debug;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::errors::FetchError;
use crate::proxy::decode_base64_lenient;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 下载订阅并解码。不走任何系统代理，不校验证书，gzip/deflate 由 reqwest 自动解压
pub async fn fetch_subscription(
    url: &str,
    timeout: Duration,
    user_agent: &str,
) -> Result<String, FetchError> {
    let client = Client::builder()
        .no_proxy()
        .danger_accept_invalid_certs(true)
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(user_agent)
        .gzip(true)
        .deflate(true)
        .build()?;

    let response = client.get(url).header(ACCEPT, "*/*").send().await?;
    let status = response.status();
    if status != StatusCode::OK {
        return Err(FetchError::Status(status.as_u16()));
    }

    let body = response.bytes().await?;
    debug!("下载成功，内容长度: {} 字节", body.len());
    decode_subscription(&String::from_utf8_lossy(&body))
}

/// 从本地文件读取订阅内容
pub fn load_subscription_file<P: AsRef<Path>>(path: P) -> Result<String, FetchError> {
    let body = fs::read_to_string(path)?;
    decode_subscription(&body)
}

/// 订阅内容可能是 Base64（可带换行、可无填充），也可能本身就是明文
pub fn decode_subscription(body: &str) -> Result<String, FetchError> {
    if body.trim().is_empty() {
        return Err(FetchError::Empty);
    }

    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    let decoded = decode_base64_lenient(&compact)
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| body.to_string());

    let content = decoded.trim();
    if content.is_empty() {
        return Err(FetchError::Empty);
    }
    Ok(content.to_string())
}
