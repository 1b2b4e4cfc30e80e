pub mod concurrency_controller;
pub mod execute;
pub mod load_config;
pub mod metrics_aggregator;
pub mod replace_placeholders;
pub mod request_executor;
pub mod save_results;
pub mod share_progress_periodically;
pub mod show_result_with_table;
pub mod sse_decoder;
pub mod status_share;
