// 内存文档存储
// 用于测试与演示，支持注入读写失败

use crate::error::StoreError;
use crate::models::{Document, Fields};
use crate::services::store::DocumentStore;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

type Collections = HashMap<String, IndexMap<String, Fields>>;

/// 进程内的文档存储，集合内按插入顺序列出
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<Collections>,
    fail_reads: AtomicUsize,
    fail_writes: AtomicUsize,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入文档，不计入写次数
    pub fn insert_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        self.lock()?
            .entry(collection.to_string())
            .or_default()
            .insert(doc_id.to_string(), fields);
        Ok(())
    }

    /// 读取单个文档
    pub fn document(&self, collection: &str, doc_id: &str) -> Option<Fields> {
        let collections = self.lock().ok()?;
        collections.get(collection)?.get(doc_id).cloned()
    }

    /// 接下来的 n 次读取返回网络错误
    pub fn fail_next_reads(&self, n: usize) {
        self.fail_reads.store(n, Ordering::SeqCst);
    }

    /// 接下来的 n 次写入返回网络错误
    pub fn fail_next_writes(&self, n: usize) {
        self.fail_writes.store(n, Ordering::SeqCst);
    }

    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// 成功与失败的写入都会计数
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>, StoreError> {
        self.collections
            .lock()
            .map_err(|e| StoreError::Database(format!("memory store poisoned: {}", e)))
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.fail_reads) {
            return Err(StoreError::Network("injected read failure".to_string()));
        }

        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn set_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.fail_writes) {
            return Err(StoreError::Network("injected write failure".to_string()));
        }

        self.lock()?
            .entry(collection.to_string())
            .or_default()
            .insert(doc_id.to_string(), fields);
        Ok(())
    }

    async fn delete_document(&self, collection: &str, doc_id: &str) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.fail_writes) {
            return Err(StoreError::Network("injected write failure".to_string()));
        }

        if let Some(docs) = self.lock()?.get_mut(collection) {
            docs.shift_remove(doc_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValue;

    fn fields(question: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("question".to_string(), FieldValue::string(question));
        fields
    }

    #[tokio::test]
    async fn test_lists_in_insertion_order() {
        let store = MemoryDocumentStore::new();
        store.insert_document("c", "z", fields("first")).unwrap();
        store.insert_document("c", "a", fields("second")).unwrap();
        store.set_document("c", "z", fields("first again")).await.unwrap();

        let docs = store.list_documents("c").await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a"]);
        assert_eq!(docs[0].fields, fields("first again"));
        assert!(store.list_documents("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let store = MemoryDocumentStore::new();
        store.delete_document("c", "nope").await.unwrap();
        store.insert_document("c", "x", fields("q")).unwrap();
        store.delete_document("c", "x").await.unwrap();
        store.delete_document("c", "x").await.unwrap();
        assert!(store.document("c", "x").is_none());
        assert_eq!(store.write_count(), 3);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let store = MemoryDocumentStore::new();
        store.fail_next_writes(1);
        assert!(matches!(
            store.set_document("c", "x", fields("q")).await,
            Err(StoreError::Network(_))
        ));
        assert!(store.document("c", "x").is_none());
        store.set_document("c", "x", fields("q")).await.unwrap();

        store.fail_next_reads(2);
        assert!(store.list_documents("c").await.is_err());
        assert!(store.list_documents("c").await.is_err());
        assert_eq!(store.list_documents("c").await.unwrap().len(), 1);
        assert_eq!(store.read_count(), 3);
    }
}
