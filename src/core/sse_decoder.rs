use serde_json::Value;

use crate::models::outcome::SseEvent;

/// SSE增量解码器
///
/// 网络分片不会恰好对齐事件边界，这里维护一个字节累加器，
/// 每喂入一个分片就按\n\n切出所有凑齐的事件块。
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        SseDecoder { buffer: Vec::new() }
    }

    /// 喂入一个网络分片，返回本次凑齐的完整事件（可能0个或多个）
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            let event = parse_event_block(&block[..pos]);
            if !event.is_empty() {
                events.push(event);
            }
        }
        events
    }

    /// 流结束后冲洗累加器里的剩余数据（可能是不完整的事件）
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        if rest.iter().all(|b| b.is_ascii_whitespace()) {
            return None;
        }
        let event = parse_event_block(&rest);
        if event.is_empty() {
            None
        } else {
            Some(event)
        }
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        SseDecoder::new()
    }
}

/// 解析一个事件块，同名字段后写的覆盖先写的
fn parse_event_block(block: &[u8]) -> SseEvent {
    let mut event = SseEvent::default();
    for line in block.split(|&b| b == b'\n') {
        if line.iter().all(|b| b.is_ascii_whitespace()) {
            continue;
        }
        parse_sse_line(line, &mut event);
    }
    event
}

/// 解析单行SSE数据，识别不了的前缀直接跳过
fn parse_sse_line(line: &[u8], event: &mut SseEvent) {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("event:") {
        event.event = Some(rest.trim().to_string());
    } else if let Some(rest) = line.strip_prefix("data:") {
        let data_str = rest.trim().to_string();
        // 能解析成json就顺便带上，失败不算错误，之前解析成功的data_json保留
        if let Ok(parsed) = serde_json::from_str::<Value>(&data_str) {
            event.data_json = Some(parsed);
        }
        event.data = Some(data_str);
    } else if let Some(rest) = line.strip_prefix("id:") {
        event.id = Some(rest.trim().to_string());
    } else if let Some(rest) = line.strip_prefix("retry:") {
        event.retry = Some(rest.trim().to_string());
    }
}

/// 按点分路径从嵌套json中取值，路径走不通或值为null都返回None
///
/// extract_value({"data": {"outputs": {"result": "hello"}}}, "data.outputs.result") -> "hello"
pub fn extract_value<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let mut value = data;
    for key in path.split('.') {
        value = value.as_object()?.get(key)?;
        if value.is_null() {
            return None;
        }
    }
    Some(value)
}
