use std::time::Duration;

use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use super::error::RequestError;
use super::models::{Book, Chapter};
use super::CatalogApi;
use crate::base_system::environment::Endpoint;

fn normalize_base(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}

/// 目录服务 HTTP 客户端。
///
/// 显式构造并注入导航层；自身不保存任何状态。每个请求（含读取响应体）都在
/// 超时内完成，超时后请求 future 被丢弃，连接随之中止。
#[derive(Clone)]
pub struct CatalogClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl CatalogClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        // reqwest 未启用 gzip 解码，要求原样返回。
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("mantra-reader/", env!("CARGO_PKG_VERSION"))),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: normalize_base(base_url),
            timeout,
        })
    }

    pub fn from_endpoint(endpoint: &Endpoint) -> anyhow::Result<Self> {
        Self::new(&endpoint.base_url, endpoint.timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn fetch_body(&self, url: &str) -> Result<Vec<u8>, RequestError> {
        match tokio::time::timeout(self.timeout, self.send(url)).await {
            Ok(result) => result,
            Err(_) => Err(RequestError::Timeout {
                url: url.to_string(),
                after: self.timeout,
            }),
        }
    }

    async fn send(&self, url: &str) -> Result<Vec<u8>, RequestError> {
        debug!(target: "catalog", "GET {url}");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let raw = resp.bytes().await.unwrap_or_default();
            return Err(status_error(url, status, &raw));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| self.transport_error(url, e))?;
        Ok(bytes.to_vec())
    }

    fn transport_error(&self, url: &str, source: reqwest::Error) -> RequestError {
        if source.is_timeout() {
            RequestError::Timeout {
                url: url.to_string(),
                after: self.timeout,
            }
        } else {
            RequestError::Transport {
                url: url.to_string(),
                source,
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RequestError> {
        let url = self.url(path);
        let body = self.fetch_body(&url).await?;
        decode(&url, &body)
    }
}

impl CatalogApi for CatalogClient {
    async fn list_books(&self) -> Result<Vec<Book>, RequestError> {
        let url = self.url("books/");
        let result = match self.fetch_body(&url).await {
            // 成功但响应体为空：视为空目录而不是错误
            Ok(body) if body.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(body) => decode(&url, &body),
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            error!(target: "catalog", "获取书籍列表失败: {err}");
        }
        result
    }

    async fn get_book(&self, id: u64) -> Result<Book, RequestError> {
        self.get_json(&format!("books/{id}/"))
            .await
            .inspect_err(|err| error!(target: "catalog", book_id = id, "获取书籍详情失败: {err}"))
    }

    async fn get_chapter(&self, id: u64) -> Result<Chapter, RequestError> {
        self.get_json(&format!("chapters/{id}/"))
            .await
            .inspect_err(
                |err| error!(target: "catalog", chapter_id = id, "获取章节详情失败: {err}"),
            )
    }
}

fn decode<T: DeserializeOwned>(url: &str, body: &[u8]) -> Result<T, RequestError> {
    serde_json::from_slice(body).map_err(|source| RequestError::Decode {
        url: url.to_string(),
        source,
    })
}

fn status_error(url: &str, status: StatusCode, raw: &[u8]) -> RequestError {
    // 错误体解析失败时用空对象，保留原始状态码
    let body =
        serde_json::from_slice::<Value>(raw).unwrap_or_else(|_| Value::Object(Default::default()));
    RequestError::HttpStatus {
        url: url.to_string(),
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or_default().to_string(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::Router;
    use axum::extract::Path;
    use axum::http::StatusCode as AxumStatus;
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use serde_json::json;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn book_detail(Path(id): Path<u64>) -> Response {
        if id == 404 {
            return (AxumStatus::NOT_FOUND, axum::Json(json!({"detail": "Not found."})))
                .into_response();
        }
        axum::Json(json!({"id": id, "title": "Book", "chapter_ids": [10, 11]})).into_response()
    }

    async fn chapter_detail(Path(id): Path<u64>) -> Response {
        match id {
            500 => (AxumStatus::INTERNAL_SERVER_ERROR, "<html>boom</html>").into_response(),
            7 => {
                tokio::time::sleep(Duration::from_secs(3)).await;
                axum::Json(json!({"id": 7, "pages": []})).into_response()
            }
            _ => axum::Json(json!({
                "id": id,
                "title": "Chapter",
                "chapter_index": 0,
                "pages": [
                    {"id": 1, "page_index": 0, "image": {"id": 1, "file": "http://img/1.png", "width": 10, "height": 20}}
                ]
            }))
            .into_response(),
        }
    }

    fn catalog_router() -> Router {
        Router::new()
            .route(
                "/books/",
                get(|| async { axum::Json(json!([{"id": 1, "title": "Book"}])) }),
            )
            .route("/books/:id/", get(book_detail))
            .route("/chapters/:id/", get(chapter_detail))
    }

    #[tokio::test]
    async fn fetches_books_and_details() {
        let base = serve(catalog_router()).await;
        let client = CatalogClient::new(&format!("{base}/"), Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), base);

        let books = client.list_books().await.unwrap();
        assert_eq!(books.len(), 1);
        assert!(books[0].chapter_ids.is_empty());

        let book = client.get_book(1).await.unwrap();
        assert_eq!(book.chapter_ids, vec![10, 11]);

        let chapter = client.get_chapter(10).await.unwrap();
        assert_eq!(chapter.id, 10);
        assert_eq!(chapter.pages[0].image.height, 20);
    }

    #[tokio::test]
    async fn empty_list_body_is_empty_catalog() {
        let router = Router::new().route("/books/", get(|| async { (AxumStatus::OK, "") }));
        let base = serve(router).await;
        let client = CatalogClient::new(&base, Duration::from_secs(5)).unwrap();
        assert!(client.list_books().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_error_keeps_json_payload() {
        let base = serve(catalog_router()).await;
        let client = CatalogClient::new(&base, Duration::from_secs(5)).unwrap();
        let err = client.get_book(404).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.body().unwrap()["detail"], "Not found.");
    }

    #[tokio::test]
    async fn undecodable_error_body_becomes_empty_payload() {
        let base = serve(catalog_router()).await;
        let client = CatalogClient::new(&base, Duration::from_secs(5)).unwrap();
        let err = client.get_chapter(500).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.body().unwrap(), &json!({}));
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let base = serve(catalog_router()).await;
        let client = CatalogClient::new(&base, Duration::from_millis(200)).unwrap();
        let started = std::time::Instant::now();
        let err = client.get_chapter(7).await.unwrap_err();
        assert!(err.is_timeout(), "unexpected error: {err}");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn short_timeout_is_used_as_configured() {
        let base = serve(catalog_router()).await;
        let client = CatalogClient::new(&base, Duration::from_millis(10)).unwrap();
        assert_eq!(client.timeout(), Duration::from_millis(10));

        let err = client.get_chapter(7).await.unwrap_err();
        match err {
            RequestError::Timeout { after, .. } => assert_eq!(after, Duration::from_millis(10)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn closed_port_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = CatalogClient::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap();
        let err = client.list_books().await.unwrap_err();
        assert!(matches!(err, RequestError::Transport { .. }), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn malformed_success_body_is_decode_error() {
        let router = Router::new().route("/books/:id/", get(|| async { "not json" }));
        let base = serve(router).await;
        let client = CatalogClient::new(&base, Duration::from_secs(5)).unwrap();
        let err = client.get_book(3).await.unwrap_err();
        assert!(matches!(err, RequestError::Decode { .. }));
    }
}
