use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 没配置完成事件时用的默认事件名（Dify格式）
pub const DEFAULT_COMPLETION_EVENT: &str = "workflow_finished";

/// 流式解码方式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamFormat {
    #[default]
    Raw,
    Sse,
}

/// SSE相关配置：首token事件、完成事件和输出提取路径
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StreamOptions {
    #[serde(default, rename = "type")]
    pub format: StreamFormat,
    pub first_token_event: Option<String>,
    pub completion_event: Option<String>,
    pub output_path: Option<String>,
}

impl StreamOptions {
    pub fn completion_event(&self) -> &str {
        self.completion_event
            .as_deref()
            .unwrap_or(DEFAULT_COMPLETION_EVENT)
    }
}

/// 配置文件里的stream_format，允许写成"sse"这样的字符串，也允许写成对象
#[derive(Deserialize)]
#[serde(untagged)]
pub enum StreamFormatConfig {
    Name(StreamFormat),
    Options(StreamOptions),
}

impl StreamFormatConfig {
    pub fn into_options(self) -> StreamOptions {
        match self {
            StreamFormatConfig::Name(format) => StreamOptions {
                format,
                ..StreamOptions::default()
            },
            StreamFormatConfig::Options(options) => options,
        }
    }
}

/// 一轮压测的请求模板，构建完成后不再修改
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestSpec {
    pub url: String,
    pub method: String,
    pub headers: Option<HashMap<String, String>>,
    pub body: Option<Value>,
    pub timeout_secs: u64,
    /// 数据行，按请求id循环使用
    pub data_rows: Option<Vec<HashMap<String, String>>>,
    pub stream: StreamOptions,
}
