use std::collections::HashMap;
use std::str::FromStr;
use std::time::{Duration, Instant};

use futures::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Response};
use serde_json::Value;
use tokio::time::timeout_at;

use crate::core::sse_decoder::{extract_value, SseDecoder};
use crate::models::error::RequestError;
use crate::models::outcome::RequestOutcome;
use crate::models::request_spec::{RequestSpec, StreamFormat};

/// 发送单个流式请求，记录全程时间点并产出一条请求记录
///
/// 不管哪条路径失败，end_time都会被置上，失败请求的耗时同样可算。
pub async fn execute_request(
    client: &Client,
    spec: &RequestSpec,
    headers: HeaderMap,
    body: Option<Value>,
    request_id: usize,
    verbose: bool,
) -> RequestOutcome {
    let mut outcome = RequestOutcome::new(request_id);
    // 整体超时的截止点，覆盖连接、等响应头和读流三个阶段
    let deadline = tokio::time::Instant::now() + Duration::from_secs(spec.timeout_secs);

    let method = match Method::from_str(&spec.method.to_uppercase()) {
        Ok(method) => method,
        Err(_) => {
            outcome.error = Some(RequestError::Other(format!(
                "无效的请求方法: {}",
                spec.method
            )));
            outcome.end_time = Some(Instant::now());
            return outcome;
        }
    };

    let mut request = client.request(method, &spec.url).headers(headers);
    if let Some(ref json_value) = body {
        request = request.json(json_value);
    }

    let response = match timeout_at(deadline, request.send()).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            outcome.error = Some(RequestError::from_reqwest(&e));
            outcome.end_time = Some(Instant::now());
            return outcome;
        }
        Err(_) => {
            outcome.error = Some(RequestError::Timeout);
            outcome.end_time = Some(Instant::now());
            return outcome;
        }
    };

    let status = response.status();
    if !status.is_success() {
        // 非2xx直接终止，读一段错误响应体方便排查
        let body_text = match timeout_at(deadline, response.text()).await {
            Ok(Ok(text)) => text,
            _ => String::new(),
        };
        let excerpt = error_excerpt(&body_text);
        if verbose {
            println!("[{:03}] 错误详情: {}", request_id, excerpt);
        }
        outcome.error = Some(RequestError::HttpStatus {
            code: status.as_u16(),
            body_excerpt: excerpt,
        });
        outcome.end_time = Some(Instant::now());
        return outcome;
    }

    // 响应头已就绪，流还没开始读
    outcome.response_headers_time = Some(Instant::now());

    match spec.stream.format {
        StreamFormat::Sse => stream_sse(spec, &mut outcome, response, deadline, verbose).await,
        StreamFormat::Raw => stream_raw(&mut outcome, response, deadline, verbose).await,
    }
    outcome
}

/// 非2xx响应的错误描述：json里有message字段就取它，截断到200字符
fn error_excerpt(body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .and_then(|m| m.as_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| body.to_string());
    message.chars().take(200).collect()
}

/// SSE模式：解码器逐分片切出事件，边收边判首token和完成事件
async fn stream_sse(
    spec: &RequestSpec,
    outcome: &mut RequestOutcome,
    response: Response,
    deadline: tokio::time::Instant,
    verbose: bool,
) {
    let mut decoder = SseDecoder::new();
    let mut stream = response.bytes_stream();
    let mut first_event_time: Option<Instant> = None;
    let completion_event = spec.stream.completion_event();

    loop {
        let chunk = match timeout_at(deadline, stream.next()).await {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(e))) => {
                outcome.error = Some(RequestError::from_reqwest(&e));
                outcome.end_time = Some(Instant::now());
                return;
            }
            Ok(None) => break,
            Err(_) => {
                outcome.error = Some(RequestError::Timeout);
                outcome.end_time = Some(Instant::now());
                return;
            }
        };
        if chunk.is_empty() {
            continue;
        }
        outcome.total_bytes += chunk.len() as u64;

        for event in decoder.feed(&chunk) {
            let now = Instant::now();
            if first_event_time.is_none() {
                first_event_time = Some(now);
            }
            let event_type = event.effective_type().map(|t| t.to_string());

            // 首token判定：配置了事件名就等它出现，否则取第一个带类型的事件
            if outcome.first_token_time.is_none() {
                let matched = match (&spec.stream.first_token_event, &event_type) {
                    (Some(wanted), Some(arrived)) => wanted == arrived,
                    (None, Some(_)) => true,
                    _ => false,
                };
                if matched {
                    outcome.first_token_time = Some(now);
                    if verbose {
                        println!(
                            "[{:03}] 流式开始 ({}): {:.3}s",
                            outcome.request_id,
                            event_type.as_deref().unwrap_or(""),
                            outcome.ttft().unwrap_or(0.0)
                        );
                    }
                }
            }

            // 完成事件：按点分路径提取输出
            if event_type.as_deref() == Some(completion_event) {
                if let (Some(path), Some(data_json)) =
                    (spec.stream.output_path.as_deref(), event.data_json.as_ref())
                {
                    if let Some(output) = extract_value(data_json, path) {
                        outcome.extracted_output = Some(output.clone());
                        if verbose {
                            println!(
                                "[{:03}] 完成事件 ({}): 输出已提取",
                                outcome.request_id, completion_event
                            );
                        }
                    }
                }
            }

            outcome.events.push(event);
        }
    }

    // 流结束，收掉累加器里可能残留的不完整事件
    if let Some(event) = decoder.finish() {
        outcome.events.push(event);
    }

    outcome.total_units = outcome.events.len();
    let end = Instant::now();
    outcome.end_time = Some(end);

    // 没等到首token事件的兜底链：优先第一个事件的到达时间，
    // 实在没有就用流结束时间并打上兜底标记
    if outcome.first_token_time.is_none() {
        if let Some(first) = first_event_time {
            outcome.first_token_time = Some(first);
        } else if outcome.total_bytes > 0 {
            outcome.first_token_time = Some(end);
            outcome.ttft_fallback = true;
        }
    }

    if verbose {
        let mut event_types: HashMap<String, usize> = HashMap::new();
        for event in &outcome.events {
            let event_type = event.effective_type().unwrap_or("unknown").to_string();
            *event_types.entry(event_type).or_insert(0) += 1;
        }
        let summary = if event_types.is_empty() {
            "无事件".to_string()
        } else {
            event_types
                .iter()
                .map(|(k, v)| format!("{}:{}", k, v))
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!(
            "[{:03}] 完成: {:.3}s | {} 事件 | {}",
            outcome.request_id,
            outcome.total_time().unwrap_or(0.0),
            outcome.events.len(),
            summary
        );
    }
}

/// 原始流模式：每个非空分片算一个单元，第一个分片即首token
async fn stream_raw(
    outcome: &mut RequestOutcome,
    response: Response,
    deadline: tokio::time::Instant,
    verbose: bool,
) {
    let mut stream = response.bytes_stream();
    let mut chunk_count = 0usize;
    // [DONE]标记可能被分片截断，保留上一片的尾巴接着找
    let mut tail: Vec<u8> = Vec::new();
    let mut done_marker = false;

    loop {
        let chunk = match timeout_at(deadline, stream.next()).await {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(e))) => {
                outcome.error = Some(RequestError::from_reqwest(&e));
                outcome.end_time = Some(Instant::now());
                return;
            }
            Ok(None) => break,
            Err(_) => {
                outcome.error = Some(RequestError::Timeout);
                outcome.end_time = Some(Instant::now());
                return;
            }
        };
        if chunk.is_empty() {
            continue;
        }
        if outcome.first_token_time.is_none() {
            outcome.first_token_time = Some(Instant::now());
            if verbose {
                println!(
                    "[{:03}] 流式开始: {:.3}s",
                    outcome.request_id,
                    outcome.ttft().unwrap_or(0.0)
                );
            }
        }
        chunk_count += 1;
        outcome.total_bytes += chunk.len() as u64;

        if !done_marker {
            tail.extend_from_slice(&chunk);
            if tail.windows(6).any(|w| w == b"[DONE]") {
                done_marker = true;
            }
            let keep = tail.len().min(5);
            tail.drain(..tail.len() - keep);
        }
    }

    outcome.total_units = chunk_count;
    outcome.end_time = Some(Instant::now());

    if verbose {
        if done_marker {
            println!("[{:03}] 检测到流式结束标记", outcome.request_id);
        }
        println!(
            "[{:03}] 完成: {:.3}s | {} chunks | {:.2} chunks/s | {:.2} KB",
            outcome.request_id,
            outcome.total_time().unwrap_or(0.0),
            outcome.total_units,
            outcome.units_per_second().unwrap_or(0.0),
            outcome.total_bytes as f64 / 1024.0
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_excerpt_prefers_json_message() {
        assert_eq!(
            error_excerpt("{\"message\": \"quota exceeded\", \"code\": 429}"),
            "quota exceeded"
        );
        assert_eq!(error_excerpt("plain failure text"), "plain failure text");
        assert_eq!(error_excerpt("{\"code\": 1}"), "{\"code\": 1}");
    }

    #[test]
    fn test_error_excerpt_truncates_to_200_chars() {
        let long = "x".repeat(500);
        assert_eq!(error_excerpt(&long).chars().count(), 200);
    }
}
