use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::interval;

use crate::core::concurrency_controller::ConcurrencyController;
use crate::core::metrics_aggregator::MetricsAggregator;
use crate::core::status_share::{PROGRESS_QUEUE, PROGRESS_SHOULD_STOP};
use crate::models::report::ProgressSnapshot;

/// 每秒发布一次进度快照，run收尾时通过停止标记结束
pub async fn share_progress_periodically(
    start: Instant,
    total: usize,
    controller: Arc<ConcurrencyController>,
    aggregator: MetricsAggregator,
) {
    let mut interval = interval(Duration::from_secs(1));
    loop {
        interval.tick().await;
        if *PROGRESS_SHOULD_STOP.lock() {
            break;
        }
        let (success, failed) = aggregator.counts().await;
        let snapshot = ProgressSnapshot {
            elapsed: start.elapsed().as_secs_f64(),
            completed: success + failed,
            total,
            active: controller.active_count(),
            success,
            failed,
        };
        let mut queue = PROGRESS_QUEUE.lock();
        // 单槽队列，有旧数据就先移除
        if queue.len() == 1 {
            queue.pop_front();
        }
        queue.push_back(snapshot);
    }
}
