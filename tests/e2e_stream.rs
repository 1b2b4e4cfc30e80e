
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use stream_storm_engine::core::execute::run;
use stream_storm_engine::models::error::RequestError;
use stream_storm_engine::models::request_spec::{RequestSpec, StreamFormat, StreamOptions};

use support_stream::{spawn_server, write_raw_response, write_sse_response, write_status_response};

fn sse_spec(url: &str) -> RequestSpec {
    RequestSpec {
        url: url.to_string(),
        method: "POST".to_string(),
        headers: None,
        body: Some(serde_json::json!({"inputs": {}})),
        timeout_secs: 30,
        data_rows: None,
        stream: StreamOptions {
            format: StreamFormat::Sse,
            first_token_event: Some("workflow_started".to_string()),
            completion_event: Some("workflow_finished".to_string()),
            output_path: Some("data.outputs.result".to_string()),
        },
    }
}

fn raw_spec(url: &str) -> RequestSpec {
    RequestSpec {
        url: url.to_string(),
        method: "POST".to_string(),
        headers: None,
        body: Some(serde_json::json!({"stream": true})),
        timeout_secs: 30,
        data_rows: None,
        stream: StreamOptions::default(),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_sse_timing_and_output_extraction() {
    let (url, _stats, _server) = spawn_server(|stream| {
        write_sse_response(
            stream,
            &[
                ("workflow_started", "{\"workflow_id\": \"123\"}"),
                ("node_started", "{\"node_id\": \"node-1\"}"),
                (
                    "workflow_finished",
                    "{\"data\": {\"outputs\": {\"result\": \"ok\"}}}",
                ),
            ],
            Duration::from_millis(50),
        );
    })
    .unwrap();

    let output = run(sse_spec(&url), 1, 1, None, false).await.unwrap();
    assert_eq!(output.outcomes.len(), 1);
    let outcome = &output.outcomes[0];
    assert!(outcome.is_success(), "error: {:?}", outcome.error);
    assert_eq!(outcome.total_units, 3);
    assert_eq!(outcome.events.len(), 3);
    assert_eq!(
        outcome.extracted_output,
        Some(serde_json::json!("ok")),
        "completion event output should be extracted"
    );
    assert!(!outcome.ttft_fallback);

    // 第一个事件50ms后到达
    let ttft = outcome.ttft().unwrap();
    assert!(ttft >= 0.03 && ttft < 0.4, "ttft = {}", ttft);
    // 成功请求的时间戳必须齐全且有序
    let headers_time = outcome.response_headers_time.unwrap();
    let first_token = outcome.first_token_time.unwrap();
    let end = outcome.end_time.unwrap();
    assert!(headers_time >= outcome.start_time);
    assert!(first_token >= headers_time);
    assert!(end >= first_token);

    assert_eq!(output.report.success_count, 1);
    assert_eq!(output.report.failed_count, 0);
    assert!(output.report.ttft.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_http_500_is_terminal_failure() {
    let (url, _stats, _server) = spawn_server(|stream| {
        write_status_response(stream, 500, "Internal Server Error", "{\"message\": \"boom\"}");
    })
    .unwrap();

    let output = run(sse_spec(&url), 1, 1, None, false).await.unwrap();
    let outcome = &output.outcomes[0];
    assert_eq!(
        outcome.error,
        Some(RequestError::HttpStatus {
            code: 500,
            body_excerpt: "boom".to_string(),
        })
    );
    assert_eq!(outcome.total_units, 0);
    assert!(outcome.first_token_time.is_none());
    assert!(outcome.end_time.is_some());
    assert_eq!(output.report.failed_count, 1);
    assert_eq!(output.report.errors.get("HTTP 500: boom"), Some(&1));
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_concurrency_bound_is_respected() {
    let (url, stats, _server) = spawn_server(|stream| {
        write_sse_response(
            stream,
            &[("workflow_started", "{}"), ("workflow_finished", "{}")],
            Duration::from_millis(60),
        );
    })
    .unwrap();

    let output = run(sse_spec(&url), 3, 10, None, false).await.unwrap();
    assert_eq!(output.outcomes.len(), 10);
    assert_eq!(output.report.success_count, 10);

    let max_active = stats.max_active.load(std::sync::atomic::Ordering::SeqCst);
    assert!(max_active <= 3, "observed {} concurrent requests", max_active);
    assert_eq!(stats.total.load(std::sync::atomic::Ordering::SeqCst), 10);

    // 每个请求id恰好出现一次
    let mut ids: Vec<usize> = output.outcomes.iter().map(|o| o.request_id).collect();
    ids.sort_unstable();
    assert_eq!(ids, (1..=10).collect::<Vec<usize>>());
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_concurrency_exceeds_total_requests() {
    let (url, _stats, _server) = spawn_server(|stream| {
        write_sse_response(stream, &[("workflow_started", "{}")], Duration::from_millis(10));
    })
    .unwrap();

    let output = run(sse_spec(&url), 8, 3, None, false).await.unwrap();
    assert_eq!(output.outcomes.len(), 3);
    assert_eq!(output.report.success_count, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_zero_requests_completes_cleanly() {
    let (url, _stats, _server) = spawn_server(|stream| {
        write_status_response(stream, 200, "OK", "{}");
    })
    .unwrap();

    let output = run(sse_spec(&url), 4, 0, None, false).await.unwrap();
    assert!(output.outcomes.is_empty());
    assert_eq!(output.report.total_requests, 0);
    assert_eq!(output.report.success_count, 0);
    assert!(output.report.ttft.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_timeout_classified() {
    let (url, _stats, _server) = spawn_server(|stream| {
        // 超过客户端超时才回应
        thread::sleep(Duration::from_secs(3));
        write_status_response(stream, 200, "OK", "{}");
    })
    .unwrap();

    let mut spec = sse_spec(&url);
    spec.timeout_secs = 1;
    let output = run(spec, 1, 1, None, false).await.unwrap();
    let outcome = &output.outcomes[0];
    assert_eq!(outcome.error, Some(RequestError::Timeout));
    assert!(outcome.end_time.is_some());
    assert!(outcome.total_time().unwrap() >= 0.9);
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_connection_error_classified() {
    // 拿一个确定没人监听的端口
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let output = run(sse_spec(&url), 1, 1, None, false).await.unwrap();
    let outcome = &output.outcomes[0];
    match &outcome.error {
        Some(RequestError::ConnectionError(_)) => {}
        other => panic!("expected ConnectionError, got {:?}", other),
    }
    assert!(outcome.end_time.is_some());
    assert_eq!(output.report.failed_count, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_raw_mode_counts_chunks() {
    let (url, _stats, _server) = spawn_server(|stream| {
        write_raw_response(
            stream,
            &[b"hello " as &[u8], b"streaming ", b"world [DONE]"],
            Duration::from_millis(40),
        );
    })
    .unwrap();

    let output = run(raw_spec(&url), 1, 1, None, false).await.unwrap();
    let outcome = &output.outcomes[0];
    assert!(outcome.is_success(), "error: {:?}", outcome.error);
    assert!(outcome.total_units >= 1 && outcome.total_units <= 3);
    assert_eq!(outcome.total_bytes, 28);
    assert!(outcome.events.is_empty());
    let ttft = outcome.ttft().unwrap();
    assert!(ttft >= 0.02 && ttft < 0.4, "ttft = {}", ttft);
    assert!(!outcome.ttft_fallback);
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_ttft_fallback_when_no_complete_event() {
    // 只发半个事件块，没有\n\n边界，TTFT只能用流结束时间兜底
    let (url, _stats, _server) = spawn_server(|stream| {
        write_raw_response(
            stream,
            &[b"data: {\"partial\": true}" as &[u8]],
            Duration::from_millis(20),
        );
    })
    .unwrap();

    let mut spec = sse_spec(&url);
    spec.stream.first_token_event = Some("workflow_started".to_string());
    let output = run(spec, 1, 1, None, false).await.unwrap();
    let outcome = &output.outcomes[0];
    assert!(outcome.is_success());
    assert!(outcome.ttft_fallback);
    assert_eq!(outcome.first_token_time, outcome.end_time);
    // 残留的半个事件在流结束时被冲洗出来
    assert_eq!(outcome.total_units, 1);
    assert_eq!(output.report.ttft_fallback_count, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_data_rows_parameterize_requests() {
    let (url, _stats, _server) = spawn_server(|stream| {
        write_sse_response(stream, &[("workflow_started", "{}")], Duration::from_millis(5));
    })
    .unwrap();

    let rows = vec![
        [("q".to_string(), "alpha".to_string())].into_iter().collect(),
        [("q".to_string(), "beta".to_string())].into_iter().collect(),
    ];
    let mut spec = sse_spec(&url);
    spec.body = Some(serde_json::json!({"inputs": {"query": "{{q}}"}}));
    spec.data_rows = Some(rows);

    let output = run(spec, 2, 5, None, false).await.unwrap();
    assert_eq!(output.outcomes.len(), 5);
    assert_eq!(output.report.success_count, 5);
}
