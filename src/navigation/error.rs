use std::fmt;

use thiserror::Error;

use crate::catalog::RequestError;

pub const EMPTY_CATALOG_MESSAGE: &str = "No books available";

/// 触发拉取的导航操作；每种操作有各自的提示文案。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Initialize,
    SelectBook,
    SelectChapter,
    NextPage,
    PrevPage,
}

impl Operation {
    pub fn message(self) -> &'static str {
        match self {
            Self::Initialize => "Failed to load initial data. Please try again later.",
            Self::SelectBook => "Failed to load book. Please try again.",
            Self::SelectChapter => "Failed to load chapter. Please try again.",
            Self::NextPage => "Failed to load next chapter. Please try again.",
            Self::PrevPage => "Failed to load previous chapter. Please try again.",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::SelectBook => "select_book",
            Self::SelectChapter => "select_chapter",
            Self::NextPage => "next_page",
            Self::PrevPage => "prev_page",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum NavError {
    /// 列表请求成功但没有任何书籍；与网络错误区分。
    #[error("No books available")]
    EmptyCatalog,
    #[error("{op} failed: {source}")]
    Request {
        op: Operation,
        #[source]
        source: RequestError,
    },
}

impl NavError {
    pub fn request(op: Operation) -> impl FnOnce(RequestError) -> Self {
        move |source| Self::Request { op, source }
    }

    /// 底层请求错误；空目录不是请求失败。
    pub fn request_error(&self) -> Option<&RequestError> {
        match self {
            Self::EmptyCatalog => None,
            Self::Request { source, .. } => Some(source),
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::EmptyCatalog => EMPTY_CATALOG_MESSAGE,
            Self::Request { op, .. } => op.message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_distinct_per_operation() {
        let ops = [
            Operation::Initialize,
            Operation::SelectBook,
            Operation::SelectChapter,
            Operation::NextPage,
            Operation::PrevPage,
        ];
        let mut messages: Vec<_> = ops.iter().map(|op| op.message()).collect();
        messages.sort_unstable();
        messages.dedup();
        assert_eq!(messages.len(), ops.len());
    }

    #[test]
    fn empty_catalog_has_fixed_text() {
        assert_eq!(NavError::EmptyCatalog.to_string(), "No books available");
        assert_eq!(NavError::EmptyCatalog.user_message(), "No books available");
        assert!(NavError::EmptyCatalog.request_error().is_none());
    }

    #[test]
    fn request_failure_exposes_status_for_logging() {
        let err = NavError::request(Operation::NextPage)(RequestError::HttpStatus {
            url: "http://x/api/chapters/11/".into(),
            status: 503,
            reason: "Service Unavailable".into(),
            body: serde_json::json!({"detail": "busy"}),
        });
        let source = err.request_error().unwrap();
        assert_eq!(source.status(), Some(503));
        assert_eq!(source.url(), "http://x/api/chapters/11/");
        assert!(!source.is_timeout());
        assert_eq!(err.user_message(), Operation::NextPage.message());
    }
}
