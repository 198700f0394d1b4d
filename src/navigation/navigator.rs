use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::{Book, CatalogApi, Chapter};

use super::error::{NavError, Operation};
use super::state::{Notice, Phase, Snapshot};
use super::step::{self, Landing, PageStep};
use super::Intent;

const INTENT_BUFFER: usize = 32;

/// 阅读导航状态机。
///
/// 唯一持有当前快照；每次切换在本地算出结果后只发布一次完整快照
/// （拉取型切换会先发布一次 `Loading`）。切换方法都取 `&mut self`，
/// 同一导航器上不会出现交错写入。
pub struct Navigator<C> {
    client: C,
    settled: Arc<Snapshot>,
    tx: watch::Sender<Arc<Snapshot>>,
}

impl<C: CatalogApi> Navigator<C> {
    pub fn new(client: C) -> Self {
        let settled = Arc::new(Snapshot::default());
        let (tx, _rx) = watch::channel(Arc::clone(&settled));
        Self { client, settled, tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }

    /// 当前已发布的快照（可能是 `Loading`）。
    #[cfg(test)]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.tx.borrow())
    }

    pub async fn apply(&mut self, intent: Intent) {
        match intent {
            Intent::Initialize => self.initialize().await,
            Intent::RetryInitialize => self.retry_initialize().await,
            Intent::SelectBook(id) => self.select_book(id).await,
            Intent::SelectChapter(id) => self.select_chapter(id).await,
            Intent::NextPage => self.next_page().await,
            Intent::PrevPage => self.prev_page().await,
        }
    }

    pub async fn initialize(&mut self) {
        info!(target: "navigation", "加载书籍列表");
        self.publish_loading();
        let next = match self.load_initial().await {
            Ok(next) => next,
            Err(err) => {
                log_failure(&err);
                Snapshot::failed(err.user_message())
            }
        };
        self.publish(next);
    }

    pub async fn retry_initialize(&mut self) {
        info!(target: "navigation", "重试初始化");
        self.initialize().await;
    }

    pub async fn select_book(&mut self, book_id: u64) {
        if !self.accepts(Operation::SelectBook) {
            return;
        }
        self.publish_loading();
        let next = match self.load_book(book_id, Operation::SelectBook).await {
            Ok((book, chapter)) => self.settled.with_book(book, chapter),
            Err(err) => self.advisory(err),
        };
        self.publish(next);
    }

    pub async fn select_chapter(&mut self, chapter_id: u64) {
        if !self.accepts(Operation::SelectChapter) {
            return;
        }
        self.publish_loading();
        let next = match self.client.get_chapter(chapter_id).await {
            Ok(chapter) => self.settled.with_chapter(chapter, Landing::FirstPage),
            Err(err) => self.advisory(NavError::request(Operation::SelectChapter)(err)),
        };
        self.publish(next);
    }

    pub async fn next_page(&mut self) {
        let step = step::plan_next(&self.settled);
        self.turn(Operation::NextPage, step).await;
    }

    pub async fn prev_page(&mut self) {
        let step = step::plan_prev(&self.settled);
        self.turn(Operation::PrevPage, step).await;
    }

    async fn turn(&mut self, op: Operation, step: PageStep) {
        if !self.accepts(op) {
            return;
        }
        match step {
            PageStep::Stay => {
                debug!(target: "navigation", op = %op, "已到边界，忽略");
            }
            PageStep::Turn(index) => {
                let next = self.settled.with_page(index);
                self.publish(next);
            }
            PageStep::Fetch {
                chapter_id,
                landing,
            } => {
                debug!(target: "navigation", op = %op, chapter_id, "跨章加载");
                self.publish_loading();
                let next = match self.client.get_chapter(chapter_id).await {
                    Ok(chapter) => self.settled.with_chapter(chapter, landing),
                    Err(err) => self.advisory(NavError::request(op)(err)),
                };
                self.publish(next);
            }
        }
    }

    async fn load_initial(&self) -> Result<Snapshot, NavError> {
        let books = self
            .client
            .list_books()
            .await
            .map_err(NavError::request(Operation::Initialize))?;
        let Some(first) = books.first() else {
            return Err(NavError::EmptyCatalog);
        };
        let (book, chapter) = self.load_book(first.id, Operation::Initialize).await?;
        info!(target: "navigation", count = books.len(), book_id = book.id, "书籍列表已加载");

        let base = Snapshot {
            books: books.into(),
            ..Snapshot::default()
        };
        Ok(base.with_book(book, chapter))
    }

    /// 书籍详情 + 第一章（没有章节时为 None）。
    async fn load_book(&self, book_id: u64, op: Operation) -> Result<(Book, Option<Chapter>), NavError> {
        let book = self
            .client
            .get_book(book_id)
            .await
            .map_err(NavError::request(op))?;
        let chapter = match book.first_chapter_id() {
            Some(chapter_id) => Some(
                self.client
                    .get_chapter(chapter_id)
                    .await
                    .map_err(NavError::request(op))?,
            ),
            None => None,
        };
        Ok((book, chapter))
    }

    fn accepts(&self, op: Operation) -> bool {
        if self.settled.phase == Phase::Ready {
            return true;
        }
        debug!(target: "navigation", op = %op, phase = ?self.settled.phase, "当前阶段不接受导航");
        false
    }

    fn advisory(&self, err: NavError) -> Snapshot {
        log_failure(&err);
        self.settled.with_notice(Notice::advisory(err.user_message()))
    }

    fn publish_loading(&self) {
        self.tx.send_replace(Arc::new(self.settled.loading()));
    }

    fn publish(&mut self, next: Snapshot) {
        debug!(target: "navigation", phase = ?next.phase, position = ?next.position(), "发布快照");
        self.settled = Arc::new(next);
        self.tx.send_replace(Arc::clone(&self.settled));
    }

    /// 放弃进行中的切换后回到最后一次完成的快照。
    fn restore_settled(&self) {
        self.tx.send_replace(Arc::clone(&self.settled));
    }
}

fn log_failure(err: &NavError) {
    match err.request_error() {
        Some(source) => warn!(
            target: "navigation",
            url = source.url(),
            status = ?source.status(),
            timeout = source.is_timeout(),
            body = ?source.body(),
            "{err}"
        ),
        None => warn!(target: "navigation", "{err}"),
    }
}

impl<C: CatalogApi + 'static> Navigator<C> {
    /// 串行消费意图，直到通道关闭。
    ///
    /// 切换进行中收到重试，或在 `Ready` 下收到 `SelectBook` / `SelectChapter` 时，
    /// 丢弃当前切换的 future（其 HTTP 请求随之中止）并改为执行新意图；
    /// 其余意图（翻页、初始化完成前的选书选章）直接忽略。
    pub async fn run(mut self, mut intents: mpsc::Receiver<Intent>) {
        let mut queued = None;
        loop {
            let intent = match queued.take() {
                Some(intent) => intent,
                None => match intents.recv().await {
                    Some(intent) => intent,
                    None => break,
                },
            };
            queued = self.apply_until_superseded(intent, &mut intents).await;
        }
        debug!(target: "navigation", "意图通道已关闭，导航任务退出");
    }

    async fn apply_until_superseded(
        &mut self,
        intent: Intent,
        intents: &mut mpsc::Receiver<Intent>,
    ) -> Option<Intent> {
        let settled_phase = self.settled.phase;
        let superseded_by = {
            let transition = self.apply(intent);
            tokio::pin!(transition);
            let mut open = true;
            loop {
                tokio::select! {
                    biased;
                    _ = &mut transition => break None,
                    incoming = intents.recv(), if open => match incoming {
                        Some(next) if next.supersedes(settled_phase) => break Some(next),
                        Some(next) => {
                            debug!(target: "navigation", ?next, phase = ?settled_phase, "切换进行中，忽略该意图");
                        }
                        None => open = false,
                    },
                }
            }
        };

        if let Some(next) = superseded_by {
            info!(target: "navigation", ?intent, ?next, "新的导航意图取代进行中的请求");
            self.restore_settled();
        }
        superseded_by
    }

    /// 在给定运行时上启动导航任务，并立即发出 `Initialize`。
    pub fn spawn(self, runtime: &Handle) -> NavigatorHandle {
        let (intent_tx, intent_rx) = mpsc::channel(INTENT_BUFFER);
        let snapshots = self.subscribe();
        let _ = intent_tx.try_send(Intent::Initialize);
        let task = runtime.spawn(self.run(intent_rx));
        NavigatorHandle {
            intents: intent_tx,
            snapshots,
            task,
        }
    }
}

/// 展示层持有的一端：发送意图、读取最新快照。
pub struct NavigatorHandle {
    intents: mpsc::Sender<Intent>,
    snapshots: watch::Receiver<Arc<Snapshot>>,
    task: JoinHandle<()>,
}

impl NavigatorHandle {
    /// 非阻塞发送；通道已满时丢弃并返回 false。
    pub fn send(&self, intent: Intent) -> bool {
        match self.intents.try_send(intent) {
            Ok(()) => true,
            Err(err) => {
                warn!(target: "navigation", ?intent, "意图未送达: {err}");
                false
            }
        }
    }

    /// 阻塞等待发送，供非异步的命令行界面使用。
    pub fn send_blocking(&self, intent: Intent) -> bool {
        self.intents.blocking_send(intent).is_ok()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    /// 自上次读取后是否有新快照；读取并标记为已读。
    pub fn take_changed(&mut self) -> Option<Arc<Snapshot>> {
        match self.snapshots.has_changed() {
            Ok(true) => Some(Arc::clone(&self.snapshots.borrow_and_update())),
            _ => None,
        }
    }

    pub fn receiver(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.clone()
    }

    /// 关闭意图通道并等待导航任务结束。
    pub async fn shutdown(self) {
        drop(self.intents);
        let _ = self.task.await;
    }
}
