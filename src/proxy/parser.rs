//! 订阅链接解析：vless:// vmess:// ss:// 三种格式
//! 解析失败不报错，节点降级为 Unknown 并在上游被跳过

use log::{debug, info};
use serde_json::Value;

use super::{Node, ProxyKind, decode_base64_lenient};

/// 解析订阅内容中的所有节点，只返回可探测的节点，保持原始顺序
pub fn parse_nodes(content: &str) -> Vec<Node> {
    let lines: Vec<&str> = content.lines().collect();
    debug!("开始解析，共 {} 行内容", lines.len());

    let mut nodes = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let node = parse_node(line);
        if node.kind.is_known() {
            debug!("[{}] 解析成功: {} ({})", i + 1, node.display_name(), node.address());
            nodes.push(node);
        } else {
            debug!("[{}] 跳过未知格式: {}", i + 1, preview(line, 50));
        }
    }

    info!("解析完成: 成功 {} 个节点", nodes.len());
    nodes
}

/// 解析单个节点链接，字段不全时 kind 降级为 Unknown
pub fn parse_node(line: &str) -> Node {
    let line = line.trim();

    let mut node = if let Some(rest) = line.strip_prefix("vless://") {
        parse_vless(line, rest)
    } else if let Some(rest) = line.strip_prefix("vmess://") {
        parse_vmess(line, rest)
    } else if let Some(rest) = line.strip_prefix("ss://") {
        parse_shadowsocks(line, rest)
    } else {
        Node::unknown(line)
    };

    if !node.is_complete() {
        node.kind = ProxyKind::Unknown;
    }
    node
}

// 格式: vless://uuid@server:port?params#name
fn parse_vless(raw: &str, link: &str) -> Node {
    let mut node = Node::new(ProxyKind::Vless, raw);

    let (link, name) = split_fragment(link);
    if let Some(name) = name {
        node.name = name;
    }

    let link = match link.split_once('?') {
        Some((link, query)) => {
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                match &*key {
                    "type" if !value.is_empty() => node.transport = value.into_owned(),
                    "security" => node.tls = matches!(&*value, "tls" | "reality"),
                    _ => {}
                }
            }
            link
        }
        None => link,
    };

    let Some((uuid, server_part)) = link.split_once('@') else {
        return node;
    };
    node.uuid = Some(uuid.to_string());

    let (server, port) = split_host_port(server_part.trim_end_matches('/'), Some("443"));
    node.server = server;
    node.port = port;
    node
}

// 格式: vmess://base64(json)
fn parse_vmess(raw: &str, payload: &str) -> Node {
    let mut node = Node::new(ProxyKind::Vmess, raw);

    let Some(decoded) = decode_base64_lenient(payload.trim()) else {
        return node;
    };
    let Ok(config) = serde_json::from_slice::<Value>(&decoded) else {
        return node;
    };

    let text = |key: &str| config.get(key).and_then(Value::as_str).map(str::to_string);

    if let Some(name) = text("ps") {
        node.name = name;
    }
    if let Some(server) = text("add") {
        node.server = server;
    }
    node.port = match config.get("port") {
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|p| p.to_string())
            .or_else(|| n.as_f64().map(|p| format!("{:.0}", p)))
            .unwrap_or_default(),
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    };
    node.uuid = text("id");
    if let Some(net) = text("net").filter(|n| !n.is_empty()) {
        node.transport = net;
    }
    node.tls = text("tls").as_deref() == Some("tls");

    node
}

// 格式: ss://base64(method:password)@server:port#name
// 兼容旧格式: ss://base64(method:password@server:port)#name
fn parse_shadowsocks(raw: &str, link: &str) -> Node {
    let mut node = Node::new(ProxyKind::Shadowsocks, raw);

    let (link, name) = split_fragment(link);
    if let Some(name) = name {
        node.name = name;
    }

    let link = if link.contains('@') {
        link.to_string()
    } else {
        match decode_base64_lenient(link).and_then(|b| String::from_utf8(b).ok()) {
            Some(decoded) if decoded.contains('@') => decoded,
            _ => return node,
        }
    };

    let Some((user_info, server_part)) = link.rsplit_once('@') else {
        return node;
    };

    // userinfo 可能已经是明文
    let user_info = decode_base64_lenient(user_info)
        .and_then(|b| String::from_utf8(b).ok())
        .unwrap_or_else(|| percent_decode_userinfo(user_info));

    if let Some((method, password)) = user_info.split_once(':') {
        node.method = Some(method.to_string());
        node.password = Some(password.to_string());
    }

    // 去掉 /?plugin=... 之类的尾部参数
    let server_part = server_part.split(['?', '/']).next().unwrap_or_default();
    let (server, port) = split_host_port(server_part, None);
    node.server = server;
    node.port = port;
    node
}

fn split_fragment(link: &str) -> (&str, Option<String>) {
    match link.split_once('#') {
        Some((link, fragment)) => (link, Some(percent_decode(fragment))),
        None => (link, None),
    }
}

/// 按查询串规则解码，`+` 视为空格
fn percent_decode(input: &str) -> String {
    let spaced = input.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// userinfo 中的 `+` 是密码字符，只解码 `%XX`
fn percent_decode_userinfo(input: &str) -> String {
    match urlencoding::decode(input) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => input.to_string(),
    }
}

/// 拆分 `host:port`，支持 `[IPv6]:port`；没有端口时使用 `default_port`
fn split_host_port(input: &str, default_port: Option<&str>) -> (String, String) {
    let fallback = || default_port.unwrap_or_default().to_string();

    if let Some(inner) = input.strip_prefix('[') {
        return match inner.split_once(']') {
            Some((host, tail)) => {
                let port = match tail.strip_prefix(':') {
                    Some(port) => port.to_string(),
                    None if tail.is_empty() => fallback(),
                    None => String::new(),
                };
                (host.to_string(), port)
            }
            None => (String::new(), String::new()),
        };
    }

    match input.split_once(':') {
        Some((host, port)) => (host.to_string(), port.to_string()),
        None => (input.to_string(), fallback()),
    }
}

fn preview(line: &str, max_chars: usize) -> String {
    line.chars().take(max_chars).collect()
}
