use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::models::outcome::RequestOutcome;
use crate::models::report::AggregateReport;
use crate::models::request_spec::RequestSpec;

/// 保存测试结果：配置摘要、成功失败计数和逐请求的派生指标
pub fn save_results(
    path: &Path,
    spec: &RequestSpec,
    report: &AggregateReport,
    outcomes: &[RequestOutcome],
    concurrency: usize,
) -> anyhow::Result<()> {
    let results = json!({
        "config": {
            "url": spec.url,
            "concurrency": concurrency,
            "total_requests": report.total_requests,
            "timestamp": now_rfc3339(),
        },
        "summary": {
            "success_count": report.success_count,
            "failed_count": report.failed_count,
        },
        "metrics": outcomes.iter().map(|m| json!({
            "request_id": m.request_id,
            "ttft": m.ttft(),
            "ttft_fallback": m.ttft_fallback,
            "total_time": m.total_time(),
            "total_units": m.total_units,
            "total_bytes": m.total_bytes,
            "units_per_second": m.units_per_second(),
            "error": m.error.as_ref().map(|e| e.to_string()),
            "events_count": if m.events.is_empty() { None } else { Some(m.events.len()) },
        })).collect::<Vec<_>>(),
    });
    write_json(path, &results)?;
    println!("详细结果已保存: {}", path.display());
    Ok(())
}

/// 保存调试文件，带绝对时间戳、完整事件数据和按类型的分组
pub fn save_debug_results(
    path: &Path,
    spec: &RequestSpec,
    outcomes: &[RequestOutcome],
    total_requests: usize,
) -> anyhow::Result<()> {
    let requests: Vec<Value> = outcomes
        .iter()
        .map(|m| {
            let mut request = json!({
                "request_id": m.request_id,
                "start_time": m.start_epoch(),
                "response_headers_time": m.headers_epoch(),
                "first_token_time": m.first_token_epoch(),
                "end_time": m.end_epoch(),
                "ttft": m.ttft(),
                "ttft_fallback": m.ttft_fallback,
                "total_time": m.total_time(),
                "error": m.error.as_ref().map(|e| e.to_string()),
                "total_units": m.total_units,
                "total_bytes": m.total_bytes,
                "units_per_second": m.units_per_second(),
                "extracted_output": m.extracted_output,
            });
            if !m.events.is_empty() {
                // 按事件类型分组，没有类型的归到unknown
                let mut by_type: HashMap<String, Vec<Value>> = HashMap::new();
                for event in &m.events {
                    let event_type = event.effective_type().unwrap_or("unknown").to_string();
                    by_type.entry(event_type).or_default().push(json!({
                        "data": event.data,
                        "data_json": event.data_json,
                        "id": event.id,
                    }));
                }
                request["events"] = json!(m.events);
                request["events_count"] = json!(m.events.len());
                request["events_by_type"] = json!(by_type);
            }
            request
        })
        .collect();

    let debug_data = json!({
        "config": {
            "url": spec.url,
            "method": spec.method,
            "stream_format": spec.stream.format,
            "first_token_event": spec.stream.first_token_event,
            "timestamp": now_rfc3339(),
        },
        "total_requests": total_requests,
        "requests": requests,
    });
    write_json(path, &debug_data)?;
    println!("调试数据已保存: {}", path.display());
    Ok(())
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

fn write_json(path: &Path, value: &Value) -> anyhow::Result<()> {
    // 父目录不存在就先建出来
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("创建目录失败: {}", parent.display()))?;
        }
    }
    let content = serde_json::to_string_pretty(value).context("序列化结果失败")?;
    fs::write(path, content).with_context(|| format!("写入文件失败: {}", path.display()))?;
    Ok(())
}
