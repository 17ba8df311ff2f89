use anyhow::{Result, bail};
use clap::Parser;
use log::warn;
use std::path::Path;

use subs_probe_rust::check::ProxyChecker;
use subs_probe_rust::config::Config;
use subs_probe_rust::proxy::parse_nodes;
use subs_probe_rust::subscribe::{fetch_subscription, load_subscription_file};
use subs_probe_rust::ui::progress::ProgressTracker;
use subs_probe_rust::ui::{report, table};

/// 代理节点批量测速工具，支持 VLESS、VMess 和 Shadowsocks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 配置文件路径
    #[arg(short = 'f', long, default_value = "config/config.yaml")]
    config: String,

    /// 订阅链接URL
    #[arg(short = 'u', long)]
    url: Option<String>,

    /// 本地订阅文件（优先于订阅链接）
    #[arg(short = 'i', long)]
    input: Option<String>,

    /// 并发测试数量
    #[arg(short = 'c', long, allow_negative_numbers = true)]
    concurrency: Option<i64>,

    /// 超时时间（秒）
    #[arg(short = 't', long, allow_negative_numbers = true)]
    timeout: Option<i64>,

    /// JSON 报告输出路径
    #[arg(short = 'o', long)]
    output: Option<String>,

    /// 不显示进度条
    #[arg(long)]
    no_progress: bool,

    /// 显示详细日志
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(path: &str) -> Config {
    if !Path::new(path).exists() {
        return Config::default();
    }
    match Config::load_from_file(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("⚠️  配置文件加载失败: {}，使用默认配置", e);
            Config::default()
        }
    }
}

fn init_logger(config: &Config, verbose: bool) {
    let level = if verbose { "debug" } else { config.log_level.as_str() };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(&args.config);

    // 命令行参数覆盖配置文件
    if let Some(url) = args.url {
        config.subscription_url = Some(url);
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(timeout) = args.timeout {
        config.timeout = timeout;
    }
    if let Some(output) = args.output {
        config.output = Some(output);
    }
    if args.no_progress {
        config.print_progress = false;
    }

    init_logger(&config, args.verbose);

    // 1. 获取订阅
    let content = if let Some(input) = &args.input {
        println!("📁 正在读取本地订阅: {}", input);
        load_subscription_file(input)?
    } else if let Some(url) = &config.subscription_url {
        if args.verbose {
            println!("🔄 正在从 URL 下载订阅: {}", url);
        } else {
            println!("🔄 正在从 URL 下载订阅...");
        }
        fetch_subscription(url, config.get_subscription_timeout(), &config.user_agent).await?
    } else {
        bail!("未指定订阅来源，请使用 -u <URL> 或 -i <文件>");
    };

    // 2. 解析节点
    println!("🔍 解码成功，正在解析节点...");
    let nodes = parse_nodes(&content);
    if nodes.is_empty() {
        println!("⚠️  未发现任何节点");
        if !args.verbose {
            println!("💡 提示: 使用 -v 参数查看详细日志");
        }
        return Ok(());
    }

    let options = config.probe_options();
    println!(
        "✅ 发现 {} 个节点，开始并发测试 (并发数: {}, 超时: {}秒)...\n",
        nodes.len(),
        options.concurrency,
        options.timeout.as_secs()
    );

    // 3. 并发测试
    let progress = ProgressTracker::new(config.print_progress && !args.verbose);
    let checker = ProxyChecker::new(options)?.with_progress(progress.clone());
    let mut results = checker.probe_all(nodes).await;

    if progress.is_enabled() {
        let stats = progress.get_stats();
        println!(
            "⏱️  已检测 {}/{} 个节点，✅ {} ❌ {} (成功率 {:.1}%)",
            stats.checked,
            stats.total,
            stats.success,
            stats.failed,
            stats.success_rate()
        );
    }

    // 4. 显示结果
    table::show_results(&mut results);

    if let Some(output) = &config.output {
        match report::write_json_report(output, &results) {
            Ok(()) => println!("\n💾 检测结果已保存到: {}", output),
            Err(e) => warn!("保存检测结果失败: {}", e),
        }
    }

    Ok(())
}
