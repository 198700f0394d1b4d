//! 翻页决策：根据当前快照判断是页内翻页、跨章拉取还是原地不动。
//!
//! 纯函数，不做任何 I/O。

use crate::catalog::Chapter;

use super::state::Snapshot;

/// 跨章后落在新章节的哪一页。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    FirstPage,
    /// 向前翻回上一章时落在其最后一页，保持阅读连续。
    LastPage,
}

impl Landing {
    pub fn page_index(self, chapter: &Chapter) -> usize {
        match self {
            Self::FirstPage => 0,
            Self::LastPage => chapter.last_page_index(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStep {
    /// 已到书的首/尾，或数据不一致：什么都不做。
    Stay,
    Turn(usize),
    Fetch { chapter_id: u64, landing: Landing },
}

pub fn plan_next(snapshot: &Snapshot) -> PageStep {
    let (Some(book), Some(chapter)) = (&snapshot.selected_book, &snapshot.current_chapter) else {
        return PageStep::Stay;
    };

    let index = snapshot.current_page_index;
    if index + 1 < chapter.pages.len() {
        return PageStep::Turn(index + 1);
    }

    book.chapter_position(chapter.id)
        .and_then(|pos| book.chapter_ids.get(pos + 1))
        .map_or(PageStep::Stay, |&chapter_id| PageStep::Fetch {
            chapter_id,
            landing: Landing::FirstPage,
        })
}

pub fn plan_prev(snapshot: &Snapshot) -> PageStep {
    let (Some(book), Some(chapter)) = (&snapshot.selected_book, &snapshot.current_chapter) else {
        return PageStep::Stay;
    };

    let index = snapshot.current_page_index;
    if index > 0 {
        return PageStep::Turn(index - 1);
    }

    book.chapter_position(chapter.id)
        .and_then(|pos| pos.checked_sub(1))
        .and_then(|prev| book.chapter_ids.get(prev))
        .map_or(PageStep::Stay, |&chapter_id| PageStep::Fetch {
            chapter_id,
            landing: Landing::LastPage,
        })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::{Book, Image, Page};

    fn chapter(id: u64, pages: usize) -> Chapter {
        Chapter {
            id,
            title: String::new(),
            book: None,
            chapter_index: 0,
            pages: (0..pages)
                .map(|i| Page {
                    id: i as u64,
                    page_index: i as u32,
                    image: Image {
                        id: i as u64,
                        file: String::new(),
                        width: 0,
                        height: 0,
                    },
                })
                .collect(),
        }
    }

    fn at(chapter_ids: &[u64], current: Chapter, index: usize) -> Snapshot {
        Snapshot {
            selected_book: Some(Arc::new(Book {
                id: 1,
                title: "A".into(),
                chapter_ids: chapter_ids.to_vec(),
            })),
            current_chapter: Some(Arc::new(current)),
            current_page_index: index,
            ..Snapshot::default()
        }
    }

    #[test]
    fn interior_pages_turn_without_fetch() {
        let snap = at(&[10, 11], chapter(10, 3), 1);
        assert_eq!(plan_next(&snap), PageStep::Turn(2));
        assert_eq!(plan_prev(&snap), PageStep::Turn(0));
    }

    #[test]
    fn last_page_rolls_into_next_chapter() {
        let snap = at(&[10, 11], chapter(10, 3), 2);
        assert_eq!(
            plan_next(&snap),
            PageStep::Fetch {
                chapter_id: 11,
                landing: Landing::FirstPage
            }
        );
    }

    #[test]
    fn first_page_rolls_into_previous_chapter_last_page() {
        let snap = at(&[10, 11], chapter(11, 2), 0);
        assert_eq!(
            plan_prev(&snap),
            PageStep::Fetch {
                chapter_id: 10,
                landing: Landing::LastPage
            }
        );
    }

    #[test]
    fn book_boundaries_stay() {
        assert_eq!(plan_next(&at(&[10, 11], chapter(11, 2), 1)), PageStep::Stay);
        assert_eq!(plan_prev(&at(&[10, 11], chapter(10, 3), 0)), PageStep::Stay);
    }

    #[test]
    fn chapter_missing_from_book_stays() {
        let snap = at(&[10, 11], chapter(99, 1), 0);
        assert_eq!(plan_next(&snap), PageStep::Stay);
        assert_eq!(plan_prev(&snap), PageStep::Stay);
    }

    #[test]
    fn empty_chapter_rolls_over_in_both_directions() {
        let snap = at(&[10, 11, 12], chapter(11, 0), 0);
        assert_eq!(
            plan_next(&snap),
            PageStep::Fetch {
                chapter_id: 12,
                landing: Landing::FirstPage
            }
        );
        assert_eq!(
            plan_prev(&snap),
            PageStep::Fetch {
                chapter_id: 10,
                landing: Landing::LastPage
            }
        );
    }

    #[test]
    fn nothing_selected_stays() {
        assert_eq!(plan_next(&Snapshot::default()), PageStep::Stay);
        assert_eq!(plan_prev(&Snapshot::default()), PageStep::Stay);
    }

    #[test]
    fn landing_on_empty_chapter_saturates() {
        assert_eq!(Landing::LastPage.page_index(&chapter(1, 0)), 0);
        assert_eq!(Landing::LastPage.page_index(&chapter(1, 4)), 3);
    }
}
