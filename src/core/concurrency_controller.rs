use std::cmp::min;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::models::step_option::InnerStepOption;

/// 固定并发的调度核心：准入信号量加共享任务队列
///
/// 队列里预装好1..=total_requests的请求id，尾部按worker数量追加None哨兵，
/// 保证每个worker都能恰好读到一次退出信号，并发数大于请求数时多余的worker
/// 直接领到哨兵退出，不会死锁。
pub struct ConcurrencyController {
    semaphore: Arc<Semaphore>,
    total_permits: usize,
    step_option: Option<InnerStepOption>,
    // 余数累加
    fractional_accumulator: Mutex<f64>,
    // 任务队列，None是结束哨兵
    queue: tokio::sync::Mutex<VecDeque<Option<usize>>>,
}

impl ConcurrencyController {
    pub fn new(
        total_permits: usize,
        total_requests: usize,
        step_option: Option<InnerStepOption>,
    ) -> Self {
        let mut queue = VecDeque::with_capacity(total_requests + total_permits);
        for request_id in 1..=total_requests {
            queue.push_back(Some(request_id));
        }
        for _ in 0..total_permits {
            queue.push_back(None);
        }
        ConcurrencyController {
            semaphore: Arc::new(Semaphore::new(0)),
            total_permits,
            step_option,
            fractional_accumulator: Mutex::new(0.0),
            queue: tokio::sync::Mutex::new(queue),
        }
    }

    /// 取下一个请求id，None表示该worker应当退出
    pub async fn next_task(&self) -> Option<usize> {
        let mut queue = self.queue.lock().await;
        queue.pop_front().flatten()
    }

    // 分发许可证
    pub async fn distribute_permits(&self) {
        if let Some(step_option) = &self.step_option {
            let mut permits_added = 0usize;
            // 锁定并立即尝试增加许可
            {
                let mut fractional_accumulator = self.fractional_accumulator.lock().unwrap();
                *fractional_accumulator += step_option.increase_step;
                if *fractional_accumulator >= 1.0 {
                    let initial_permits_to_add = fractional_accumulator.floor() as usize;
                    self.semaphore.add_permits(initial_permits_to_add);
                    permits_added += initial_permits_to_add;
                    *fractional_accumulator -= initial_permits_to_add as f64;
                }
            }
            // 继续分发剩余的许可证
            while permits_added < self.total_permits {
                tokio::time::sleep(Duration::from_secs(step_option.increase_interval)).await;
                let mut fractional_accumulator = self.fractional_accumulator.lock().unwrap();
                *fractional_accumulator += step_option.increase_step;
                let permits_to_add = min(
                    fractional_accumulator.floor() as usize,
                    self.total_permits - permits_added,
                );
                if permits_to_add > 0 {
                    self.semaphore.add_permits(permits_to_add);
                    permits_added += permits_to_add;
                    // 更新累加器
                    *fractional_accumulator -= permits_to_add as f64;
                }
            }
        } else {
            // 一次性分发所有许可
            self.semaphore.add_permits(self.total_permits);
        }
    }

    // 获取信号量
    pub fn get_semaphore(&self) -> Arc<Semaphore> {
        self.semaphore.clone()
    }

    /// 当前被占用的许可数，只用于展示
    pub fn active_count(&self) -> usize {
        self.total_permits
            .saturating_sub(self.semaphore.available_permits())
    }
}
