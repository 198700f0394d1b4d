//! 目录接口返回的数据模型（书 / 章节 / 页 / 图片）。
//!
//! 所有实体在拉取后不可变；导航状态整体替换引用而不是原地修改。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    /// 阅读顺序；列表接口可能不带，详情接口为准。
    #[serde(default)]
    pub chapter_ids: Vec<u64>,
}

impl Book {
    /// 章节在本书中的位置（按 id 相等匹配）。
    pub fn chapter_position(&self, chapter_id: u64) -> Option<usize> {
        self.chapter_ids.iter().position(|id| *id == chapter_id)
    }

    pub fn first_chapter_id(&self) -> Option<u64> {
        self.chapter_ids.first().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    /// 所属书籍，仅作关联；顺序以 `Book::chapter_ids` 为准。
    #[serde(default)]
    pub book: Option<Book>,
    #[serde(default)]
    pub chapter_index: u32,
    #[serde(default)]
    pub pages: Vec<Page>,
}

impl Chapter {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn last_page_index(&self) -> usize {
        self.pages.len().saturating_sub(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: u64,
    #[serde(default)]
    pub page_index: u32,
    pub image: Image,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: u64,
    pub file: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

impl Image {
    /// 宽高比（宽/高），缺少尺寸时为 None。
    pub fn aspect_ratio(&self) -> Option<f32> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        Some(self.width as f32 / self.height as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_entry_without_chapter_ids_decodes() {
        let raw = r#"[{"id": 1, "title": "A"}, {"id": 2, "title": "B", "chapter_ids": [7, 8]}]"#;
        let books: Vec<Book> = serde_json::from_str(raw).unwrap();
        assert!(books[0].chapter_ids.is_empty());
        assert_eq!(books[1].chapter_ids, vec![7, 8]);
    }

    #[test]
    fn chapter_detail_decodes_with_back_reference() {
        let raw = r#"{
            "id": 10,
            "title": "Ch 1",
            "book": {"id": 1, "title": "A", "chapter_ids": [10, 11]},
            "chapter_index": 0,
            "pages": [
                {"id": 100, "page_index": 0, "image": {"id": 5, "file": "http://x/1.jpg", "width": 800, "height": 1200}},
                {"id": 101, "page_index": 1, "image": {"id": 6, "file": "http://x/2.jpg", "width": 800, "height": 1200}}
            ],
            "extra": "ignored"
        }"#;
        let chapter: Chapter = serde_json::from_str(raw).unwrap();
        assert_eq!(chapter.page_count(), 2);
        assert_eq!(chapter.last_page_index(), 1);
        assert_eq!(chapter.book.unwrap().chapter_ids, vec![10, 11]);
        assert_eq!(chapter.pages[1].image.file, "http://x/2.jpg");
    }

    #[test]
    fn chapter_position_uses_id_equality() {
        let book = Book {
            id: 1,
            title: "A".into(),
            chapter_ids: vec![30, 10, 20],
        };
        assert_eq!(book.chapter_position(10), Some(1));
        assert_eq!(book.chapter_position(99), None);
        assert_eq!(book.first_chapter_id(), Some(30));
    }

    #[test]
    fn empty_chapter_last_index_saturates() {
        let chapter = Chapter {
            id: 1,
            title: String::new(),
            book: None,
            chapter_index: 0,
            pages: Vec::new(),
        };
        assert_eq!(chapter.last_page_index(), 0);
    }
}
