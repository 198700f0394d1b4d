//! 目录服务客户端：书籍列表、书籍详情、章节详情。

pub mod client;
pub mod error;
pub mod models;

use std::future::Future;

pub use client::CatalogClient;
pub use error::RequestError;
pub use models::{Book, Chapter, Image, Page};

/// 目录服务的请求边界。
///
/// 三个操作都是幂等、无副作用的；实现不持有导航状态。导航层通过该 trait
/// 注入客户端，测试中可替换为内存实现。
pub trait CatalogApi: Send + Sync {
    fn list_books(&self) -> impl Future<Output = Result<Vec<Book>, RequestError>> + Send;

    fn get_book(&self, id: u64) -> impl Future<Output = Result<Book, RequestError>> + Send;

    fn get_chapter(&self, id: u64) -> impl Future<Output = Result<Chapter, RequestError>> + Send;
}
