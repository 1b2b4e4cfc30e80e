use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// 配置文件路径（JSON）
    #[arg(short, long)]
    pub config: Option<String>,

    /// 目标地址（不使用配置文件时）
    #[arg(short, long)]
    pub url: Option<String>,

    /// 总请求数
    #[arg(short = 'n', long = "requests", default_value_t = 100)]
    pub total_requests: usize,

    /// 并发数
    #[arg(short = 'p', long, default_value_t = 10)]
    pub concurrency: usize,

    /// 超时时间（秒）
    #[arg(long, default_value_t = 300)]
    pub timeout: u64,

    /// 请求方法
    #[arg(short, long, default_value = "POST")]
    pub method: String,

    /// json请求体
    #[arg(short, long)]
    pub json: Option<String>,

    /// 打印详情
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// 结果文件输出路径
    #[arg(long, default_value = "data/test_results.json")]
    pub output: String,

    /// 调试文件输出路径
    #[arg(long, default_value = "data/debug_responses.json")]
    pub debug_output: String,

    /// 每次增加的并发数（阶梯增压）
    #[arg(long)]
    pub step: Option<usize>,

    /// 阶梯增压间隔（秒）
    #[arg(long)]
    pub step_interval: Option<u64>,
}
