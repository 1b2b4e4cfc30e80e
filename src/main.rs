use std::collections::HashMap;
use std::path::Path;
use std::process;

use anyhow::{anyhow, Context};
use clap::Parser;

use stream_storm_engine::core;
use stream_storm_engine::models::args::Args;
use stream_storm_engine::models::request_spec::{RequestSpec, StreamOptions};
use stream_storm_engine::models::step_option::StepOption;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let (spec, concurrency, total_requests, step) = match build_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("配置错误: {:?}", e);
            process::exit(1);
        }
    };

    match core::execute::run(spec.clone(), concurrency, total_requests, step, args.verbose).await {
        Ok(output) => {
            core::show_result_with_table::show_result_with_table(&output.report);
            if let Err(e) = core::save_results::save_results(
                Path::new(&args.output),
                &spec,
                &output.report,
                &output.outcomes,
                concurrency,
            ) {
                eprintln!("保存结果失败: {:?}", e);
            }
            if let Err(e) = core::save_results::save_debug_results(
                Path::new(&args.debug_output),
                &spec,
                &output.outcomes,
                total_requests,
            ) {
                eprintln!("保存调试数据失败: {:?}", e);
            }
        }
        Err(e) => {
            eprintln!("Error: {:?}", e);
            process::exit(1);
        }
    }
}

fn build_config(args: &Args) -> anyhow::Result<(RequestSpec, usize, usize, Option<StepOption>)> {
    // 命令行指定的阶梯增压优先于配置文件里的
    let step = args.step.map(|increase_step| StepOption {
        increase_step,
        increase_interval: args.step_interval.unwrap_or(1),
    });

    if let Some(config_path) = &args.config {
        let loaded = core::load_config::load_config(Path::new(config_path))?;
        return Ok((
            loaded.spec,
            loaded.concurrency,
            loaded.total_requests,
            step.or(loaded.step),
        ));
    }

    if let Some(url) = &args.url {
        // url快捷模式：默认发{"stream": true}的json请求体
        let body = match &args.json {
            Some(json_str) => serde_json::from_str(json_str).context("解析json失败")?,
            None => serde_json::json!({"stream": true}),
        };
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        let spec = RequestSpec {
            url: url.clone(),
            method: args.method.clone(),
            headers: Some(headers),
            body: Some(body),
            timeout_secs: args.timeout,
            data_rows: None,
            stream: StreamOptions::default(),
        };
        return Ok((spec, args.concurrency, args.total_requests, step));
    }

    Err(anyhow!("必须指定 --config 或 --url"))
}
