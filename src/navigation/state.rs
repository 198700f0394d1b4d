//! 导航快照：某一时刻完整、不可变的阅读状态。

use std::sync::Arc;

use crate::catalog::{Book, Chapter, Page};

use super::step::Landing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

/// 面向用户的错误提示。
///
/// `blocking` 的提示只出现在 `Failed` 阶段（整屏 + 重试）；其余为顶部横幅，
/// 已显示的内容保持不变。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub blocking: bool,
}

impl Notice {
    pub fn blocking(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            blocking: true,
        }
    }

    pub fn advisory(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            blocking: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub phase: Phase,
    pub books: Arc<[Book]>,
    pub selected_book: Option<Arc<Book>>,
    pub current_chapter: Option<Arc<Chapter>>,
    pub current_page_index: usize,
    pub notice: Option<Notice>,
}

impl Snapshot {
    pub(crate) fn failed(message: impl Into<String>) -> Self {
        Self {
            phase: Phase::Failed,
            notice: Some(Notice::blocking(message)),
            ..Self::default()
        }
    }

    /// 进行中的快照：保留已显示内容，清除旧提示。
    pub(crate) fn loading(&self) -> Self {
        Self {
            phase: Phase::Loading,
            notice: None,
            ..self.clone()
        }
    }

    pub(crate) fn with_page(&self, index: usize) -> Self {
        Self {
            phase: Phase::Ready,
            current_page_index: index,
            notice: None,
            ..self.clone()
        }
    }

    pub(crate) fn with_chapter(&self, chapter: Chapter, landing: Landing) -> Self {
        let index = landing.page_index(&chapter);
        Self {
            phase: Phase::Ready,
            current_chapter: Some(Arc::new(chapter)),
            current_page_index: index,
            notice: None,
            ..self.clone()
        }
    }

    pub(crate) fn with_book(&self, book: Book, first_chapter: Option<Chapter>) -> Self {
        Self {
            phase: Phase::Ready,
            selected_book: Some(Arc::new(book)),
            current_chapter: first_chapter.map(Arc::new),
            current_page_index: 0,
            notice: None,
            ..self.clone()
        }
    }

    pub(crate) fn with_notice(&self, notice: Notice) -> Self {
        Self {
            notice: Some(notice),
            ..self.clone()
        }
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    pub fn error_message(&self) -> Option<&str> {
        self.notice.as_ref().map(|n| n.message.as_str())
    }

    pub fn current_page(&self) -> Option<&Page> {
        self.current_chapter
            .as_ref()
            .and_then(|c| c.pages.get(self.current_page_index))
    }

    /// (章节 id, 页码)；没有当前章节时为 None。
    pub fn position(&self) -> Option<(u64, usize)> {
        self.current_chapter
            .as_ref()
            .map(|c| (c.id, self.current_page_index))
    }

    /// 形如 `3 / 12` 的页码标签。
    pub fn page_label(&self) -> Option<String> {
        let chapter = self.current_chapter.as_ref()?;
        let count = chapter.page_count();
        if count == 0 {
            return Some("0 / 0".to_string());
        }
        Some(format!("{} / {count}", self.current_page_index + 1))
    }
}
