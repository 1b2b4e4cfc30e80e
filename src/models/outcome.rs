use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;

use crate::models::error::RequestError;

/// 一个完整SSE事件块解析出的字段
#[derive(Clone, Debug, Default, Serialize)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: Option<String>,
    pub data_json: Option<Value>,
    pub id: Option<String>,
    pub retry: Option<String>,
}

impl SseEvent {
    pub fn is_empty(&self) -> bool {
        self.event.is_none()
            && self.data.is_none()
            && self.data_json.is_none()
            && self.id.is_none()
            && self.retry.is_none()
    }

    /// 生效的事件类型：data_json里的event优先（Dify格式），其次SSE的event字段
    pub fn effective_type(&self) -> Option<&str> {
        if let Some(Value::Object(map)) = &self.data_json {
            if let Some(Value::String(event_type)) = map.get("event") {
                return Some(event_type);
            }
        }
        self.event.as_deref()
    }
}

/// 单个请求的性能记录，只有派发它的worker会写入
#[derive(Clone, Debug)]
pub struct RequestOutcome {
    /// 请求id，从1开始
    pub request_id: usize,
    pub start_time: Instant,
    /// 发起时刻的绝对时间，只给持久化用
    pub started_at: SystemTime,
    /// HTTP响应头接收完成时间
    pub response_headers_time: Option<Instant>,
    /// 第一个有效数据单元到达时间
    pub first_token_time: Option<Instant>,
    /// 流式响应结束时间
    pub end_time: Option<Instant>,
    /// 收到的数据单元数（chunk或事件）
    pub total_units: usize,
    pub total_bytes: u64,
    pub error: Option<RequestError>,
    /// SSE模式下解码出的事件列表
    pub events: Vec<SseEvent>,
    /// 完成事件中按路径提取到的输出
    pub extracted_output: Option<Value>,
    /// 首token时间是不是用流结束时间兜底的
    pub ttft_fallback: bool,
}

impl RequestOutcome {
    pub fn new(request_id: usize) -> Self {
        RequestOutcome {
            request_id,
            start_time: Instant::now(),
            started_at: SystemTime::now(),
            response_headers_time: None,
            first_token_time: None,
            end_time: None,
            total_units: 0,
            total_bytes: 0,
            error: None,
            events: Vec::new(),
            extracted_output: None,
            ttft_fallback: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Time To First Token（秒）
    pub fn ttft(&self) -> Option<f64> {
        self.first_token_time
            .map(|t| t.duration_since(self.start_time).as_secs_f64())
    }

    /// 总耗时（秒）
    pub fn total_time(&self) -> Option<f64> {
        self.end_time
            .map(|t| t.duration_since(self.start_time).as_secs_f64())
    }

    /// 数据单元生成速率
    pub fn units_per_second(&self) -> Option<f64> {
        match self.total_time() {
            Some(total_time) if total_time > 0.0 => Some(self.total_units as f64 / total_time),
            _ => None,
        }
    }

    pub fn start_epoch(&self) -> f64 {
        self.started_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    pub fn headers_epoch(&self) -> Option<f64> {
        self.epoch_of(self.response_headers_time)
    }

    pub fn first_token_epoch(&self) -> Option<f64> {
        self.epoch_of(self.first_token_time)
    }

    pub fn end_epoch(&self) -> Option<f64> {
        self.epoch_of(self.end_time)
    }

    fn epoch_of(&self, instant: Option<Instant>) -> Option<f64> {
        instant.map(|t| self.start_epoch() + t.duration_since(self.start_time).as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_derived_metrics_absent_without_timestamps() {
        let outcome = RequestOutcome::new(1);
        assert!(outcome.ttft().is_none());
        assert!(outcome.total_time().is_none());
        assert!(outcome.units_per_second().is_none());
        assert!(outcome.is_success());
    }

    #[test]
    fn test_derived_metrics_from_timestamps() {
        let mut outcome = RequestOutcome::new(1);
        outcome.first_token_time = Some(outcome.start_time + Duration::from_millis(50));
        outcome.end_time = Some(outcome.start_time + Duration::from_millis(200));
        outcome.total_units = 10;

        let ttft = outcome.ttft().unwrap();
        assert!((ttft - 0.05).abs() < 1e-9);
        let total = outcome.total_time().unwrap();
        assert!((total - 0.2).abs() < 1e-9);
        let rate = outcome.units_per_second().unwrap();
        assert!((rate - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_effective_type_prefers_data_json() {
        let event = SseEvent {
            event: Some("message".to_string()),
            data_json: Some(json!({"event": "workflow_started"})),
            ..SseEvent::default()
        };
        assert_eq!(event.effective_type(), Some("workflow_started"));

        let event = SseEvent {
            event: Some("message".to_string()),
            data_json: Some(json!({"other": 1})),
            ..SseEvent::default()
        };
        assert_eq!(event.effective_type(), Some("message"));

        let event = SseEvent {
            data_json: Some(json!("just a string")),
            ..SseEvent::default()
        };
        assert_eq!(event.effective_type(), None);
    }

    #[test]
    fn test_absolute_timestamps_follow_anchor() {
        let mut outcome = RequestOutcome::new(1);
        outcome.end_time = Some(outcome.start_time + Duration::from_secs(1));
        let end_epoch = outcome.end_epoch().unwrap();
        assert!((end_epoch - outcome.start_epoch() - 1.0).abs() < 1e-9);
        assert!(outcome.headers_epoch().is_none());
    }
}
