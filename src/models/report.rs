use std::collections::HashMap;

use serde::Serialize;

use crate::models::outcome::RequestOutcome;

/// 一组样本的分布统计
#[derive(Clone, Debug, Serialize)]
pub struct FieldStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// 样本标准差，样本数不足2时为空
    pub stdev: Option<f64>,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// 一轮压测的汇总报告
#[derive(Clone, Debug, Serialize)]
pub struct AggregateReport {
    pub total_requests: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub success_rate: f64,
    /// 整轮压测的墙钟耗时（秒）
    pub total_duration: f64,
    /// 总请求数 / 墙钟耗时
    pub rps: f64,
    pub total_data_kb: f64,
    pub throughput_per_second_kb: f64,
    pub ttft: Option<FieldStats>,
    pub total_time: Option<FieldStats>,
    pub units_per_second: Option<FieldStats>,
    /// 失败分组：错误描述 -> 次数
    pub errors: HashMap<String, u32>,
    /// 用流结束时间兜底TTFT的请求数
    pub ttft_fallback_count: usize,
    pub timestamp: u128,
}

/// 每秒对外共享一次的进度快照
#[derive(Clone, Debug, Serialize)]
pub struct ProgressSnapshot {
    pub elapsed: f64,
    pub completed: usize,
    pub total: usize,
    /// 当前占用的许可数，仅供参考
    pub active: usize,
    pub success: usize,
    pub failed: usize,
}

/// run()的返回：汇总报告加按完成顺序排列的全部请求记录
pub struct RunOutput {
    pub report: AggregateReport,
    pub outcomes: Vec<RequestOutcome>,
}
