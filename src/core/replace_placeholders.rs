use std::collections::HashMap;

use serde_json::Value;

use crate::models::request_spec::RequestSpec;

/// 递归替换json树里的{{列名}}占位符，非字符串节点原样保留
pub fn replace_placeholders(data: &Value, row: &HashMap<String, String>) -> Value {
    match data {
        Value::String(s) => {
            let mut result = s.clone();
            for (key, value) in row {
                let placeholder = format!("{{{{{}}}}}", key);
                if result.contains(&placeholder) {
                    result = result.replace(&placeholder, value);
                }
            }
            Value::String(result)
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), replace_placeholders(v, row)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| replace_placeholders(item, row))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// 生成第request_id个请求的body
///
/// 配了数据源就按(id-1) mod 行数循环取行做替换，保证同样输入下
/// 每个id拿到的数据行与执行顺序无关；没配就原样用模板。
pub fn resolve_body(spec: &RequestSpec, request_id: usize) -> Option<Value> {
    let body = spec.body.as_ref()?;
    match &spec.data_rows {
        Some(rows) if !rows.is_empty() => {
            let row = &rows[(request_id - 1) % rows.len()];
            Some(replace_placeholders(body, row))
        }
        _ => Some(body.clone()),
    }
}
