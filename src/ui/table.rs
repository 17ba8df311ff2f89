use crate::check::{LATENCY_BUCKETS, Summary, TestResult, TestStatus, sort_for_display};

const NAME_WIDTH: usize = 30;
const ADDRESS_WIDTH: usize = 24;

/// 排序并打印检测结果表格和摘要
pub fn show_results(results: &mut [TestResult]) {
    if results.is_empty() {
        println!("⚠️  没有测试结果");
        return;
    }

    sort_for_display(results);
    let summary = Summary::from_results(results);

    println!(
        "\n✅ 测试完成，共 {} 个节点，成功 {} 个。结果按真实延迟排序：\n",
        summary.total, summary.success
    );

    println!("{:─<110}", "");
    println!(
        "| {:<30} | {:<24} | {:<6} | {:<8} | {:<8} | {:<16} |",
        "节点名称", "服务器地址", "协议", "TCP延迟", "真实延迟", "状态"
    );
    println!("{:─<110}", "");
    for result in results.iter() {
        println!("{}", render_row(result));
    }
    println!("{:─<110}", "");

    print_summary(&summary);
}

pub fn render_row(result: &TestResult) -> String {
    format!(
        "| {:<30} | {:<24} | {:<6} | {:<8} | {:<8} | {:<16} |",
        truncate(result.node.display_name(), NAME_WIDTH),
        truncate(&result.node.address(), ADDRESS_WIDTH),
        result.node.kind.as_str(),
        format_latency(result.tcp_latency),
        format_latency(result.proxy_latency),
        format_status(result.status),
    )
}

pub fn print_summary(summary: &Summary) {
    println!("\n检测摘要:");
    println!("{:=<80}", "");
    println!("总节点数: {}", summary.total);
    println!(
        "可用节点: {} ({:.1}%)",
        summary.success,
        summary.success_rate()
    );
    println!("端口可达但连接失败: {}", summary.port_reachable);
    println!("超时: {}", summary.timeout);
    if summary.failed > 0 {
        println!("解析失败: {}", summary.failed);
    }

    if let (Some(min), Some(avg), Some(max)) =
        (summary.min_latency, summary.avg_latency, summary.max_latency)
    {
        println!("延迟: 最低 {}ms / 平均 {}ms / 最高 {}ms", min, avg, max);

        println!("\n延迟分布:");
        let peak = summary.histogram.iter().copied().max().unwrap_or(0).max(1);
        for (label, count) in bucket_labels().iter().zip(summary.histogram) {
            let width = count * 40 / peak;
            println!("  {:>10} | {:<40} {}", label, "█".repeat(width), count);
        }
    }
}

fn bucket_labels() -> Vec<String> {
    let mut labels: Vec<String> = LATENCY_BUCKETS
        .iter()
        .map(|upper| format!("<{}ms", upper))
        .collect();
    if let Some(last) = LATENCY_BUCKETS.last() {
        labels.push(format!(">={}ms", last));
    }
    labels
}

pub fn format_latency(latency: Option<u64>) -> String {
    match latency {
        Some(ms) => format!("{}ms", ms),
        None => "-".to_string(),
    }
}

pub fn format_status(status: TestStatus) -> String {
    match status {
        TestStatus::Success => format!("✅ {}", status.label()),
        TestStatus::PortReachableButConnectFailed => format!("⚠️  {}", status.label()),
        TestStatus::Timeout => format!("⏱️  {}", status.label()),
        TestStatus::Failed => format!("❌ {}", status.label()),
    }
}

/// 按字符截断，保证中文名称不会被截成半个字符
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}
