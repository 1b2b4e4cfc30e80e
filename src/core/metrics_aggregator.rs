use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;

use crate::models::outcome::RequestOutcome;
use crate::models::report::{AggregateReport, FieldStats};

/// 按完成顺序收集请求记录，多个worker并发追加
#[derive(Clone)]
pub struct MetricsAggregator {
    outcomes: Arc<Mutex<Vec<RequestOutcome>>>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        MetricsAggregator {
            outcomes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn push(&self, outcome: RequestOutcome) {
        self.outcomes.lock().await.push(outcome);
    }

    /// 当前的成功/失败数，给进度展示用
    pub async fn counts(&self) -> (usize, usize) {
        let outcomes = self.outcomes.lock().await;
        let success = outcomes.iter().filter(|o| o.is_success()).count();
        (success, outcomes.len() - success)
    }

    /// 取走全部记录，run收尾时调用
    pub async fn take(&self) -> Vec<RequestOutcome> {
        std::mem::take(&mut *self.outcomes.lock().await)
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        MetricsAggregator::new()
    }
}

/// 汇总一轮压测的全部请求记录
pub fn summarize(
    outcomes: &[RequestOutcome],
    total_requests: usize,
    wall_clock_secs: f64,
) -> AggregateReport {
    let successful: Vec<&RequestOutcome> =
        outcomes.iter().filter(|o| o.is_success()).collect();
    let success_count = successful.len();
    let failed_count = outcomes.len() - success_count;

    let ttfts: Vec<f64> = successful.iter().filter_map(|o| o.ttft()).collect();
    let total_times: Vec<f64> = successful.iter().filter_map(|o| o.total_time()).collect();
    let rates: Vec<f64> = successful
        .iter()
        .filter_map(|o| o.units_per_second())
        .collect();

    // 失败按错误描述分组计数
    let mut errors: HashMap<String, u32> = HashMap::new();
    for outcome in outcomes {
        if let Some(error) = &outcome.error {
            *errors.entry(error.to_string()).or_insert(0) += 1;
        }
    }

    let total_bytes: u64 = outcomes.iter().map(|o| o.total_bytes).sum();
    let total_data_kb = total_bytes as f64 / 1024.0;

    let success_rate = if total_requests > 0 {
        success_count as f64 / total_requests as f64 * 100.0
    } else {
        0.0
    };
    // 吞吐量对整轮墙钟时间算一次，不做逐请求平均
    let rps = if wall_clock_secs > 0.0 {
        total_requests as f64 / wall_clock_secs
    } else {
        0.0
    };
    let throughput_per_second_kb = if wall_clock_secs > 0.0 {
        total_data_kb / wall_clock_secs
    } else {
        0.0
    };

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|n| n.as_millis())
        .unwrap_or(0);

    AggregateReport {
        total_requests,
        success_count,
        failed_count,
        success_rate,
        total_duration: wall_clock_secs,
        rps,
        total_data_kb,
        throughput_per_second_kb,
        ttft: field_stats(&ttfts),
        total_time: field_stats(&total_times),
        units_per_second: field_stats(&rates),
        errors,
        ttft_fallback_count: outcomes.iter().filter(|o| o.ttft_fallback).count(),
        timestamp,
    }
}

/// 对一组样本算分布统计，没有样本就整块省略
fn field_stats(samples: &[f64]) -> Option<FieldStats> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };
    let stdev = if n > 1 {
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        Some(variance.sqrt())
    } else {
        None
    };
    Some(FieldStats {
        count: n,
        min: sorted[0],
        max: sorted[n - 1],
        mean,
        median,
        stdev,
        p50: nearest_rank(&sorted, 0.50),
        p90: nearest_rank(&sorted, 0.90),
        p95: nearest_rank(&sorted, 0.95),
        p99: nearest_rank(&sorted, 0.99),
    })
}

/// 最近秩百分位：index = floor(fraction × n)，夹在[0, n-1]内
fn nearest_rank(sorted: &[f64], fraction: f64) -> f64 {
    let index = ((sorted.len() as f64 * fraction).floor() as usize).min(sorted.len() - 1);
    sorted[index]
}
