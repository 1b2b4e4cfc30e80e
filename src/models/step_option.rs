use serde::{Deserialize, Serialize};

/// 阶梯式分发并发许可的配置
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepOption {
    /// 每次增加的许可数
    pub increase_step: usize,
    /// 增加间隔（秒）
    pub increase_interval: u64,
}

/// 内部使用的阶梯配置，步长允许是小数
#[derive(Clone, Debug)]
pub struct InnerStepOption {
    pub increase_step: f64,
    pub increase_interval: u64,
}

impl From<StepOption> for InnerStepOption {
    fn from(option: StepOption) -> Self {
        InnerStepOption {
            increase_step: option.increase_step as f64,
            increase_interval: option.increase_interval,
        }
    }
}
