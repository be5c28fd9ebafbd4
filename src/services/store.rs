// 文档存储抽象
// 题库与练习记录都以“集合/文档”的形式保存，后端可以是内存、SQLite 或远端文档数据库

use crate::error::StoreError;
use crate::models::{Document, Fields};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 文档存储后端
///
/// 集合路径使用 `/` 分隔，例如 `users/{uid}/practiced`。
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    /// 列出集合下的全部文档，集合不存在时返回空列表
    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// 写入文档，已存在时整体覆盖
    async fn set_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: Fields,
    ) -> Result<(), StoreError>;

    /// 删除文档，文档不存在不视为错误
    async fn delete_document(&self, collection: &str, doc_id: &str) -> Result<(), StoreError>;
}

/// 集合命名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreLayout {
    pub catalog_collection: String,
    pub users_collection: String,
    pub practiced_collection: String,
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self {
            catalog_collection: "love_babbar_sheet".to_string(),
            users_collection: "users".to_string(),
            practiced_collection: "practiced".to_string(),
        }
    }
}

impl StoreLayout {
    /// 用户练习记录所在的子集合
    pub fn practiced_path(&self, user_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.users_collection, user_id, self.practiced_collection
        )
    }
}
