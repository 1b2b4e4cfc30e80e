use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use indicatif::ProgressBar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, Method};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::core::concurrency_controller::ConcurrencyController;
use crate::core::metrics_aggregator::{summarize, MetricsAggregator};
use crate::core::replace_placeholders::resolve_body;
use crate::core::request_executor::execute_request;
use crate::core::share_progress_periodically::share_progress_periodically;
use crate::core::status_share::PROGRESS_SHOULD_STOP;
use crate::models::report::RunOutput;
use crate::models::request_spec::{RequestSpec, StreamFormat};
use crate::models::step_option::StepOption;

/// 跑一轮压测：固定concurrency个worker消费total_requests个请求id
pub async fn run(
    spec: RequestSpec,
    concurrency: usize,
    total_requests: usize,
    step: Option<StepOption>,
    verbose: bool,
) -> anyhow::Result<RunOutput> {
    if concurrency == 0 {
        return Err(anyhow!("并发数必须大于0"));
    }
    // 配置问题在派发前一次性暴露
    Method::from_str(&spec.method.to_uppercase())
        .map_err(|_| anyhow!("无效的请求方法: {}", spec.method))?;
    if let Some(rows) = &spec.data_rows {
        if rows.is_empty() {
            return Err(anyhow!("数据源为空"));
        }
    }

    // 构建请求头
    let mut headers = HeaderMap::new();
    // user_agent
    let info = os_info::get();
    let os_type = info.os_type();
    let os_version = info.version().to_string();
    let app_name = env!("CARGO_PKG_NAME");
    let app_version = env!("CARGO_PKG_VERSION");
    let user_agent_value = format!("{} {} ({}; {})", app_name, app_version, os_type, os_version);
    headers.insert(
        USER_AGENT,
        user_agent_value.parse().context("构建User-Agent失败")?,
    );
    if let Some(headers_map) = &spec.headers {
        for (key, value) in headers_map {
            let header_name = key
                .parse::<HeaderName>()
                .map_err(|_| anyhow!("无效的header名称: {}", key))?;
            let header_value = value
                .parse::<HeaderValue>()
                .map_err(|_| anyhow!("无效的header值: {}", value))?;
            headers.insert(header_name, header_value);
        }
    }

    print_banner(&spec, concurrency, total_requests);

    // 共享的http客户端，连接池按2倍并发数预留
    let client = Client::builder()
        .timeout(Duration::from_secs(spec.timeout_secs))
        .pool_max_idle_per_host(concurrency * 2)
        .build()
        .context("构建http客户端失败")?;

    let test_start = Instant::now();
    let controller = Arc::new(ConcurrencyController::new(
        concurrency,
        total_requests,
        step.map(Into::into),
    ));
    let aggregator = MetricsAggregator::new();
    let spec_arc = Arc::new(spec);

    // 分发许可证
    {
        let controller_clone = controller.clone();
        tokio::spawn(async move {
            controller_clone.distribute_permits().await;
        });
    }
    // 共享任务状态
    {
        *PROGRESS_SHOULD_STOP.lock() = false;
        let controller_clone = controller.clone();
        let aggregator_clone = aggregator.clone();
        tokio::spawn(async move {
            share_progress_periodically(test_start, total_requests, controller_clone, aggregator_clone)
                .await;
        });
    }

    // 进度条，verbose模式下改打详情日志
    let progress_bar = if verbose {
        None
    } else {
        Some(Arc::new(ProgressBar::new(total_requests as u64)))
    };

    let mut handles = Vec::new();
    for _ in 0..concurrency {
        // 控制器副本
        let controller_clone = controller.clone();
        // 汇总器副本
        let aggregator_clone = aggregator.clone();
        // 请求模板副本
        let spec_clone = spec_arc.clone();
        // 客户端副本，内部共享连接池
        let client_clone = client.clone();
        // 请求头副本
        let headers_clone = headers.clone();
        // 进度条副本
        let progress_bar_clone = progress_bar.clone();
        let handle = tokio::spawn(async move {
            loop {
                // 先拿许可再领任务，保证同时在飞的请求不超过并发数
                let permit = match controller_clone.get_semaphore().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let request_id = match controller_clone.next_task().await {
                    Some(request_id) => request_id,
                    // 哨兵，退出，许可随permit一起归还
                    None => break,
                };
                if verbose {
                    println!(
                        "\n[{:03}] 开始 (活跃: {}/{})",
                        request_id,
                        controller_clone.active_count(),
                        concurrency
                    );
                }
                // 本次请求的body，占位符替换在worker里完成
                let body = resolve_body(&spec_clone, request_id);
                let outcome = execute_request(
                    &client_clone,
                    &spec_clone,
                    headers_clone.clone(),
                    body,
                    request_id,
                    verbose,
                )
                .await;
                aggregator_clone.push(outcome).await;
                drop(permit);
                if let Some(progress_bar) = &progress_bar_clone {
                    progress_bar.inc(1);
                }
                if verbose {
                    let (success, failed) = aggregator_clone.counts().await;
                    println!(
                        "进度: {}/{} | 已用时: {:.1}s",
                        success + failed,
                        total_requests,
                        test_start.elapsed().as_secs_f64()
                    );
                }
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| anyhow!("worker协程被取消或意外停止:{:?}", e))?;
    }
    if let Some(progress_bar) = &progress_bar {
        progress_bar.finish_and_clear();
    }
    *PROGRESS_SHOULD_STOP.lock() = true;

    let total_duration = test_start.elapsed().as_secs_f64();
    let outcomes = aggregator.take().await;
    let report = summarize(&outcomes, total_requests, total_duration);
    Ok(RunOutput { report, outcomes })
}

fn print_banner(spec: &RequestSpec, concurrency: usize, total_requests: usize) {
    println!("\n{}", "=".repeat(70));
    println!("流式接口并发测试");
    println!("{}", "=".repeat(70));
    println!("URL:        {}", spec.url);
    println!("并发数:      {}", concurrency);
    println!("总请求数:    {}", total_requests);
    if let Some(rows) = &spec.data_rows {
        println!("数据源:      CSV ({} 行，将循环使用)", rows.len());
    }
    if spec.stream.format == StreamFormat::Sse {
        println!("流式格式:    SSE");
        if let Some(event) = &spec.stream.first_token_event {
            println!("首Token事件: {}", event);
        }
        if let Some(event) = &spec.stream.completion_event {
            println!("完成事件:    {}", event);
        }
        if let Some(path) = &spec.stream.output_path {
            println!("输出路径:    {}", path);
        }
    }
    let start_time = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    println!("开始时间:    {}", start_time);
    println!("{}\n", "=".repeat(70));
}
