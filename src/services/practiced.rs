// 练习状态同步
// 每个用户的练习记录保存在 users/{uid}/practiced 子集合，记录存在即代表已练习

use crate::error::{FetchError, WriteError};
use crate::models::{PracticedMap, PracticedRecord, Problem, UserId};
use crate::services::store::{DocumentStore, StoreLayout};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::sync::Arc;

/// 时间来源
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 固定时钟，测试用
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// 一次切换的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PracticedTransition {
    /// 已写入的记录
    Marked(PracticedRecord),
    Unmarked,
}

impl PracticedTransition {
    pub fn is_practiced(&self) -> bool {
        matches!(self, PracticedTransition::Marked(_))
    }
}

/// 练习状态同步器
#[derive(Clone)]
pub struct PracticedSync {
    store: Arc<dyn DocumentStore>,
    layout: StoreLayout,
    clock: Arc<dyn Clock>,
}

impl PracticedSync {
    pub fn new(store: Arc<dyn DocumentStore>, layout: StoreLayout, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            layout,
            clock,
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// 读取用户的全部练习记录
    pub async fn fetch_practiced(&self, user: &UserId) -> Result<PracticedMap, FetchError> {
        let collection = self.layout.practiced_path(user.as_str());
        let documents = self.store.list_documents(&collection).await?;

        let mut practiced = PracticedMap::with_capacity(documents.len());
        for doc in &documents {
            let record =
                PracticedRecord::from_document(doc).map_err(|reason| FetchError::Malformed {
                    collection: collection.clone(),
                    document_id: doc.id.clone(),
                    reason,
                })?;
            practiced.insert(record.problem_id.clone(), record);
        }

        debug!("fetched {} practiced records for {}", practiced.len(), user);
        Ok(practiced)
    }

    /// 切换练习状态
    ///
    /// `currently_practiced` 为调用方最后已知的本地状态：为 true 时删除记录，
    /// 否则写入新记录（已存在则覆盖，时间戳刷新）。每次调用恰好一次远端写入。
    pub async fn toggle(
        &self,
        user: &UserId,
        problem: &Problem,
        currently_practiced: bool,
    ) -> Result<PracticedTransition, WriteError> {
        let collection = self.layout.practiced_path(user.as_str());

        let result = if currently_practiced {
            self.store
                .delete_document(&collection, &problem.id)
                .await
                .map(|_| PracticedTransition::Unmarked)
        } else {
            let record = PracticedRecord::for_problem(problem, self.clock.now());
            self.store
                .set_document(&collection, &problem.id, record.to_fields())
                .await
                .map(|_| PracticedTransition::Marked(record))
        };

        match result {
            Ok(transition) => {
                debug!(
                    "{} problem {} for {}",
                    if transition.is_practiced() { "marked" } else { "unmarked" },
                    problem.id,
                    user
                );
                Ok(transition)
            }
            Err(e) => {
                warn!("toggle of {} for {} failed: {}", problem.id, user, e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::{FieldValue, Fields};
    use crate::services::memory::MemoryDocumentStore;
    use chrono::TimeZone;

    fn problem(id: &str, question: &str) -> Problem {
        Problem {
            id: id.to_string(),
            topic: Some("Arrays".to_string()),
            question: question.to_string(),
            link: format!("https://example.com/{}", id),
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn sync_with(store: Arc<MemoryDocumentStore>, hour: u32) -> PracticedSync {
        PracticedSync::new(store, StoreLayout::default(), Arc::new(FixedClock(at(hour))))
    }

    fn user(raw: &str) -> UserId {
        UserId::new(raw).unwrap()
    }

    #[tokio::test]
    async fn test_mark_then_fetch() {
        let store = Arc::new(MemoryDocumentStore::new());
        let sync = sync_with(store.clone(), 9);
        let alice = user("alice");
        let p = problem("p1", "Reverse the array");

        let transition = sync.toggle(&alice, &p, false).await.unwrap();
        assert_eq!(
            transition,
            PracticedTransition::Marked(PracticedRecord {
                problem_id: "p1".to_string(),
                question: "Reverse the array".to_string(),
                timestamp: at(9),
            })
        );

        let practiced = sync.fetch_practiced(&alice).await.unwrap();
        assert_eq!(practiced.len(), 1);
        assert_eq!(practiced["p1"].question, "Reverse the array");
        assert_eq!(practiced["p1"].timestamp, at(9));
        assert!(store.document("users/alice/practiced", "p1").is_some());
    }

    #[tokio::test]
    async fn test_unmark_is_idempotent() {
        let store = Arc::new(MemoryDocumentStore::new());
        let sync = sync_with(store.clone(), 9);
        let alice = user("alice");
        let p = problem("p1", "Reverse the array");

        sync.toggle(&alice, &p, false).await.unwrap();
        assert_eq!(sync.toggle(&alice, &p, true).await.unwrap(), PracticedTransition::Unmarked);
        assert!(sync.fetch_practiced(&alice).await.unwrap().is_empty());

        // 再次删除不存在的记录
        assert_eq!(sync.toggle(&alice, &p, true).await.unwrap(), PracticedTransition::Unmarked);
        assert!(sync.fetch_practiced(&alice).await.unwrap().is_empty());
        assert_eq!(store.write_count(), 3);
    }

    #[tokio::test]
    async fn test_remark_overwrites_timestamp() {
        let store = Arc::new(MemoryDocumentStore::new());
        let alice = user("alice");
        let p = problem("p1", "Reverse the array");

        sync_with(store.clone(), 9).toggle(&alice, &p, false).await.unwrap();
        let later = sync_with(store.clone(), 15);
        later.toggle(&alice, &p, false).await.unwrap();

        let practiced = later.fetch_practiced(&alice).await.unwrap();
        assert_eq!(practiced.len(), 1);
        assert_eq!(practiced["p1"].timestamp, at(15));
    }

    #[tokio::test]
    async fn test_presence_follows_last_successful_toggle() {
        let store = Arc::new(MemoryDocumentStore::new());
        let sync = sync_with(store.clone(), 9);
        let alice = user("alice");
        let p1 = problem("p1", "Reverse the array");
        let p2 = problem("p2", "Kadane");

        sync.toggle(&alice, &p1, false).await.unwrap();
        sync.toggle(&alice, &p2, false).await.unwrap();
        sync.toggle(&alice, &p1, true).await.unwrap();

        // 失败的写入不改变远端状态
        store.fail_next_writes(1);
        assert!(matches!(
            sync.toggle(&alice, &p2, true).await,
            Err(WriteError::Store(StoreError::Network(_)))
        ));

        let practiced = sync.fetch_practiced(&alice).await.unwrap();
        assert!(!practiced.contains_key("p1"));
        assert!(practiced.contains_key("p2"));
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let store = Arc::new(MemoryDocumentStore::new());
        let sync = sync_with(store.clone(), 9);
        let alice = user("alice");
        let bob = user("bob");
        let p = problem("p1", "Reverse the array");

        sync.toggle(&bob, &problem("p9", "Bob's pick"), false).await.unwrap();
        let before = sync.fetch_practiced(&bob).await.unwrap();

        sync.toggle(&alice, &p, false).await.unwrap();
        sync.toggle(&alice, &p, true).await.unwrap();
        sync.toggle(&alice, &p, false).await.unwrap();

        assert_eq!(sync.fetch_practiced(&bob).await.unwrap(), before);
        assert_eq!(sync.fetch_practiced(&alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_record_fails_fetch() {
        let store = Arc::new(MemoryDocumentStore::new());
        let mut fields = Fields::new();
        fields.insert("question".to_string(), FieldValue::string("Reverse the array"));
        store
            .insert_document("users/alice/practiced", "p1", fields)
            .unwrap();

        let sync = sync_with(store, 9);
        match sync.fetch_practiced(&user("alice")).await {
            Err(FetchError::Malformed {
                collection,
                document_id,
                ..
            }) => {
                assert_eq!(collection, "users/alice/practiced");
                assert_eq!(document_id, "p1");
            }
            other => panic!("Expected Malformed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_surfaces() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.fail_next_reads(1);
        let sync = sync_with(store, 9);
        assert!(matches!(
            sync.fetch_practiced(&user("alice")).await,
            Err(FetchError::Store(_))
        ));
    }
}
