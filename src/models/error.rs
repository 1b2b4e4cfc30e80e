use thiserror::Error;

/// 单个请求级别的错误分类，Display字符串同时用作失败分组的key
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("HTTP {code}: {body_excerpt}")]
    HttpStatus { code: u16, body_excerpt: String },

    #[error("Timeout")]
    Timeout,

    #[error("Connection Error: {0}")]
    ConnectionError(String),

    #[error("Error: {0}")]
    Other(String),
}

impl RequestError {
    /// 把reqwest错误归入分类
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            RequestError::Timeout
        } else if e.is_connect() {
            RequestError::ConnectionError(e.to_string())
        } else {
            RequestError::Other(e.to_string())
        }
    }
}
