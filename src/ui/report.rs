use anyhow::Result;
use chrono::Local;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::check::{Summary, TestResult};

#[derive(Serialize)]
struct Report<'a> {
    generated_at: String,
    summary: Summary,
    results: &'a [TestResult],
}

/// 将检测结果写成 JSON 报告
pub fn write_json_report<P: AsRef<Path>>(path: P, results: &[TestResult]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let report = Report {
        generated_at: Local::now().to_rfc3339(),
        summary: Summary::from_results(results),
        results,
    };
    fs::write(path, serde_json::to_string_pretty(&report)?)?;
    Ok(())
}
