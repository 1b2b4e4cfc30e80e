use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;
use serde_json::Value;

use crate::models::request_spec::{RequestSpec, StreamFormatConfig};
use crate::models::step_option::StepOption;

/// 配置文件加载出来的完整运行参数
#[derive(Debug)]
pub struct LoadedConfig {
    pub spec: RequestSpec,
    pub concurrency: usize,
    pub total_requests: usize,
    pub step: Option<StepOption>,
}

#[derive(Deserialize)]
struct RawConfig {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    body: Option<Value>,
    #[serde(default = "default_timeout")]
    timeout: u64,
    #[serde(default)]
    data_source: Option<DataSource>,
    #[serde(default)]
    stream_format: Option<StreamFormatConfig>,
    #[serde(default = "default_concurrency")]
    concurrency: usize,
    #[serde(default = "default_total_requests")]
    total_requests: usize,
    #[serde(default)]
    step: Option<StepOption>,
}

#[derive(Deserialize)]
struct DataSource {
    #[serde(rename = "type")]
    source_type: String,
    file: Option<String>,
    column: Option<String>,
}

fn default_method() -> String {
    "POST".to_string()
}

fn default_timeout() -> u64 {
    300
}

fn default_concurrency() -> usize {
    10
}

fn default_total_requests() -> usize {
    100
}

/// 从JSON文件加载配置，数据源问题在这里一次性暴露，不会等到派发之后
pub fn load_config(path: &Path) -> anyhow::Result<LoadedConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
    let raw: RawConfig = serde_json::from_str(&content)
        .with_context(|| format!("解析配置文件失败: {}", path.display()))?;

    let data_rows = match &raw.data_source {
        Some(source) => Some(load_data_rows(source, path)?),
        None => None,
    };

    let stream = raw
        .stream_format
        .map(StreamFormatConfig::into_options)
        .unwrap_or_default();

    let headers = if raw.headers.is_empty() {
        None
    } else {
        Some(raw.headers)
    };

    Ok(LoadedConfig {
        spec: RequestSpec {
            url: raw.url,
            method: raw.method,
            headers,
            body: raw.body,
            timeout_secs: raw.timeout,
            data_rows,
            stream,
        },
        concurrency: raw.concurrency,
        total_requests: raw.total_requests,
        step: raw.step,
    })
}

fn load_data_rows(
    source: &DataSource,
    config_path: &Path,
) -> anyhow::Result<Vec<HashMap<String, String>>> {
    if source.source_type.to_lowercase() != "csv" {
        return Err(anyhow!("不支持的数据源类型: {}", source.source_type));
    }
    let file = source
        .file
        .as_deref()
        .ok_or_else(|| anyhow!("CSV数据源配置中缺少 'file' 字段"))?;
    // 相对路径按配置文件所在目录解析
    let mut file_path = PathBuf::from(file);
    if file_path.is_relative() {
        if let Some(dir) = config_path.parent() {
            file_path = dir.join(file_path);
        }
    }
    let rows = load_csv_data(&file_path, source.column.as_deref())?;
    println!("已加载CSV数据: {} ({} 行)", file_path.display(), rows.len());
    Ok(rows)
}

/// 加载CSV数据，表头行定义列名，每条记录变成一个列名到值的映射
pub fn load_csv_data(
    path: &Path,
    column: Option<&str>,
) -> anyhow::Result<Vec<HashMap<String, String>>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("CSV文件不存在或无法读取: {}", path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("读取CSV表头失败: {}", path.display()))?
        .clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("读取CSV行失败: {}", path.display()))?;
        let row: HashMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.to_string(), value.to_string()))
            .collect();
        rows.push(row);
    }
    if rows.is_empty() {
        return Err(anyhow!("CSV文件为空或格式错误: {}", path.display()));
    }
    if let Some(column) = column {
        if !rows[0].contains_key(column) {
            let available: Vec<&str> = headers.iter().collect();
            return Err(anyhow!(
                "CSV文件中不存在列 '{}'，可用列: {}",
                column,
                available.join(", ")
            ));
        }
    }
    Ok(rows)
}
