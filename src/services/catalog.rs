// 题库读取
// 题库为所有用户共享的只读集合，这里只提供读取

use crate::error::FetchError;
use crate::models::Problem;
use crate::services::store::DocumentStore;
use log::debug;
use std::sync::Arc;

/// 题库访问器
#[derive(Clone)]
pub struct CatalogAccessor {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl CatalogAccessor {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// 读取全部题目
    ///
    /// 空题库返回空列表；任一文档结构不符时整体失败。
    pub async fn fetch_all_problems(&self) -> Result<Vec<Problem>, FetchError> {
        let documents = self.store.list_documents(&self.collection).await?;

        let problems = documents
            .iter()
            .map(|doc| {
                Problem::from_document(doc).map_err(|reason| FetchError::Malformed {
                    collection: self.collection.clone(),
                    document_id: doc.id.clone(),
                    reason,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "fetched {} problems from {} ({})",
            problems.len(),
            self.collection,
            self.store.backend_tag()
        );
        Ok(problems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::{FieldValue, Fields, SchemaError};
    use crate::services::memory::MemoryDocumentStore;

    const SHEET: &str = "love_babbar_sheet";

    fn seed(store: &MemoryDocumentStore, id: &str, topic: &str, question: &str) {
        let problem = Problem {
            id: id.to_string(),
            topic: Some(topic.to_string()),
            question: question.to_string(),
            link: format!("https://example.com/{}", id),
        };
        store.insert_document(SHEET, id, problem.to_fields()).unwrap();
    }

    #[tokio::test]
    async fn test_fetch_all_problems() {
        let store = Arc::new(MemoryDocumentStore::new());
        seed(&store, "p1", "Arrays", "Reverse the array");
        seed(&store, "p2", "Trees", "Height of a tree");

        let catalog = CatalogAccessor::new(store.clone(), SHEET);
        let problems = catalog.fetch_all_problems().await.unwrap();

        assert_eq!(problems.len(), 2);
        assert_eq!(problems[0].id, "p1");
        assert_eq!(problems[1].question, "Height of a tree");
        assert_eq!(store.read_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_catalog_is_not_an_error() {
        let catalog = CatalogAccessor::new(Arc::new(MemoryDocumentStore::new()), SHEET);
        assert!(catalog.fetch_all_problems().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_surfaces() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.fail_next_reads(1);
        let catalog = CatalogAccessor::new(store, SHEET);

        assert!(matches!(
            catalog.fetch_all_problems().await,
            Err(FetchError::Store(StoreError::Network(_)))
        ));
    }

    #[tokio::test]
    async fn test_malformed_document_is_reported() {
        let store = Arc::new(MemoryDocumentStore::new());
        seed(&store, "p1", "Arrays", "Reverse the array");
        let mut broken = Fields::new();
        broken.insert("question".to_string(), FieldValue::Boolean(true));
        broken.insert("link".to_string(), FieldValue::string("https://example.com"));
        store.insert_document(SHEET, "p2", broken).unwrap();

        let catalog = CatalogAccessor::new(store, SHEET);
        match catalog.fetch_all_problems().await {
            Err(FetchError::Malformed {
                collection,
                document_id,
                reason,
            }) => {
                assert_eq!(collection, SHEET);
                assert_eq!(document_id, "p2");
                assert_eq!(
                    reason,
                    SchemaError::WrongType {
                        field: "question",
                        expected: "string",
                        found: "boolean",
                    }
                );
            }
            other => panic!("Expected Malformed, got {:?}", other),
        }
    }
}
