use prettytable::{format, row, Table};

use crate::models::report::{AggregateReport, FieldStats};

pub fn show_result_with_table(report: &AggregateReport) {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);

    table.add_row(row!["指标", "值"]);
    table.add_row(row!["总请求数", format!("{}", report.total_requests)]);
    table.add_row(row![
        "成功",
        format!("{} ({:.1}%)", report.success_count, report.success_rate)
    ]);
    table.add_row(row![
        "失败",
        format!(
            "{} ({:.1}%)",
            report.failed_count,
            100.0 - report.success_rate
        )
    ]);
    table.add_row(row!["总耗时", format!("{:.2}s", report.total_duration)]);
    table.add_row(row!["吞吐量", format!("{:.2} req/s", report.rps)]);
    table.add_row(row!["总数据量", format!("{:.2}kb", report.total_data_kb)]);
    table.add_row(row![
        "每秒数据量",
        format!("{:.2}kb", report.throughput_per_second_kb)
    ]);
    println!("压测结果:");
    table.printstd();

    if let Some(stats) = &report.ttft {
        show_stats_table("首Token时间 (TTFT)", stats);
    }
    if let Some(stats) = &report.total_time {
        show_stats_table("总耗时分布", stats);
    }
    if let Some(stats) = &report.units_per_second {
        show_generation_table(stats);
    }

    if !report.errors.is_empty() {
        let mut errors_table = Table::new();
        errors_table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        errors_table.add_row(row!["错误信息", "次数"]);
        for (error, count) in &report.errors {
            errors_table.add_row(row![error, format!("{}次", count)]);
        }
        println!("失败详情:");
        errors_table.printstd();
    }

    if report.ttft_fallback_count > 0 {
        eprintln!(
            "警告: {}个请求没识别到首token事件，TTFT使用流结束时间兜底",
            report.ttft_fallback_count
        );
    }
}

fn show_stats_table(title: &str, stats: &FieldStats) {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.add_row(row!["指标", "值"]);
    table.add_row(row!["样本数", format!("{}", stats.count)]);
    table.add_row(row!["最小值", format!("{:.3}s", stats.min)]);
    table.add_row(row!["最大值", format!("{:.3}s", stats.max)]);
    table.add_row(row!["平均值", format!("{:.3}s", stats.mean)]);
    table.add_row(row!["中位数", format!("{:.3}s", stats.median)]);
    if let Some(stdev) = stats.stdev {
        table.add_row(row!["标准差", format!("{:.3}s", stdev)]);
    }
    table.add_row(row!["P50", format!("{:.3}s", stats.p50)]);
    table.add_row(row!["P90", format!("{:.3}s", stats.p90)]);
    table.add_row(row!["P95", format!("{:.3}s", stats.p95)]);
    table.add_row(row!["P99", format!("{:.3}s", stats.p99)]);
    println!("{}:", title);
    table.printstd();
}

fn show_generation_table(stats: &FieldStats) {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.add_row(row!["指标", "值"]);
    table.add_row(row!["平均值", format!("{:.2} units/s", stats.mean)]);
    table.add_row(row!["中位数", format!("{:.2} units/s", stats.median)]);
    table.add_row(row!["最大值", format!("{:.2} units/s", stats.max)]);
    println!("生成速率:");
    table.printstd();
}
