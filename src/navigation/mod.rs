//! 阅读导航：书籍 / 章节 / 页面之间的状态机。

pub mod error;
pub mod navigator;
pub mod state;
pub mod step;

pub use error::{EMPTY_CATALOG_MESSAGE, NavError, Operation};
pub use navigator::{Navigator, NavigatorHandle};
pub use state::{Notice, Phase, Snapshot};

/// 展示层发给导航器的意图。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Initialize,
    SelectBook(u64),
    SelectChapter(u64),
    NextPage,
    PrevPage,
    RetryInitialize,
}

impl Intent {
    /// 进行中的请求遇到该意图时是否放弃。`settled` 为切换开始前的阶段：
    /// 选书 / 选章只在 `Ready` 下才会被执行，其余阶段不能拿它们打断初始化。
    pub fn supersedes(self, settled: Phase) -> bool {
        match self {
            Self::NextPage | Self::PrevPage => false,
            Self::SelectBook(_) | Self::SelectChapter(_) => settled == Phase::Ready,
            Self::Initialize | Self::RetryInitialize => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_turns_never_supersede() {
        assert!(!Intent::NextPage.supersedes(Phase::Ready));
        assert!(!Intent::PrevPage.supersedes(Phase::Ready));
        assert!(Intent::SelectBook(1).supersedes(Phase::Ready));
        assert!(Intent::SelectChapter(1).supersedes(Phase::Ready));
        assert!(Intent::RetryInitialize.supersedes(Phase::Ready));
    }

    #[test]
    fn selections_cannot_interrupt_loading_before_ready() {
        for phase in [Phase::Idle, Phase::Failed] {
            assert!(!Intent::SelectBook(1).supersedes(phase));
            assert!(!Intent::SelectChapter(1).supersedes(phase));
            assert!(Intent::RetryInitialize.supersedes(phase));
        }
    }
}
