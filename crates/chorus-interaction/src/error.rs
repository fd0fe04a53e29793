//! Completion failure taxonomy.

use thiserror::Error;

/// Inline text for a missing API base URL.
pub const MISSING_URL_TEXT: &str = "错误：API URL 未在配置中定义。";

/// Inline text when no history message could be sent.
pub const EMPTY_CONVERSATION_TEXT: &str = "错误：没有有效内容发送给 AI。";

/// Inline text when the request body could not be encoded.
pub const ENCODE_FAILED_TEXT: &str = "错误：无法编码 API 请求。";

/// Why a completion attempt failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompletionError {
    /// Settings make the request impossible; never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Nothing beyond the system message to send; never retried.
    #[error("No messages to send")]
    EmptyConversation,

    /// The request body could not be serialized; never retried.
    #[error("Request encoding error: {0}")]
    Encode(String),

    #[error("Request timed out")]
    Timeout,

    /// Connection-level failure before a status was received.
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response; `message` is the server's error text or the
    /// status reason.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The response body could not be read or decoded.
    #[error("Response error: {0}")]
    Stream(String),
}

impl CompletionError {
    /// Transport-level failures are retried; configuration failures are not.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::EmptyConversation | Self::Encode(_))
    }

    /// Short user-facing reason.
    pub fn reason(&self) -> String {
        match self {
            Self::Config(_) => MISSING_URL_TEXT.to_string(),
            Self::EmptyConversation => EMPTY_CONVERSATION_TEXT.to_string(),
            Self::Encode(_) => ENCODE_FAILED_TEXT.to_string(),
            Self::Timeout => "API 请求超时".to_string(),
            Self::Network(_) => "网络错误或无法连接到 API".to_string(),
            Self::Http { message, .. } => message.clone(),
            Self::Stream(_) => "API 请求失败".to_string(),
        }
    }

    /// Text stored in place of the persona's reply after `retries` retries.
    pub fn user_message(&self, retries: u32) -> String {
        if self.is_retryable() {
            format!("错误: {} (已重试{}次)", self.reason(), retries)
        } else {
            self.reason()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(CompletionError::Timeout.is_retryable());
        assert!(CompletionError::Network("refused".into()).is_retryable());
        assert!(
            CompletionError::Http {
                status: 401,
                message: "bad key".into()
            }
            .is_retryable()
        );
        assert!(!CompletionError::EmptyConversation.is_retryable());
        assert!(!CompletionError::Config("no url".into()).is_retryable());
        assert!(!CompletionError::Encode("bad float".into()).is_retryable());
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            CompletionError::Timeout.user_message(2),
            "错误: API 请求超时 (已重试2次)"
        );
        assert_eq!(
            CompletionError::Network("dns".into()).user_message(2),
            "错误: 网络错误或无法连接到 API (已重试2次)"
        );
        assert_eq!(
            CompletionError::Http {
                status: 503,
                message: "Service Unavailable".into()
            }
            .user_message(1),
            "错误: Service Unavailable (已重试1次)"
        );
        assert_eq!(
            CompletionError::Stream("eof".into()).user_message(0),
            "错误: API 请求失败 (已重试0次)"
        );
        assert_eq!(
            CompletionError::Config("url".into()).user_message(0),
            MISSING_URL_TEXT
        );
        assert_eq!(
            CompletionError::EmptyConversation.user_message(0),
            EMPTY_CONVERSATION_TEXT
        );
        assert_eq!(
            CompletionError::Encode("bad float".into()).user_message(0),
            ENCODE_FAILED_TEXT
        );
    }
}
