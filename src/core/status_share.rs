use std::collections::VecDeque;

use lazy_static::lazy_static;
use parking_lot::Mutex;

use crate::models::report::ProgressSnapshot;

// 定义一个全局的进度队列，嵌入方消费，只保留最新一条
lazy_static! {
    pub static ref PROGRESS_QUEUE: Mutex<VecDeque<ProgressSnapshot>> = Mutex::new(VecDeque::new());
    pub static ref PROGRESS_SHOULD_STOP: Mutex<bool> = Mutex::new(false);
}
