// 本地数据库存储
// 以 SQLite 保存文档集合，题库与练习记录共用一张文档表

use crate::error::StoreError;
use crate::models::{Document, Fields};
use crate::services::store::DocumentStore;
use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use rusqlite::{Connection, OpenFlags};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// SQLite 文档存储
pub struct SqliteDocumentStore {
    pool: Arc<Mutex<Connection>>,
    db_path: Option<PathBuf>,
}

impl SqliteDocumentStore {
    /// 打开（必要时创建）数据库文件
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        // 确保数据目录存在
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Database(format!("Failed to create data dir: {}", e))
                })?;
            }
        }

        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;

        let store = Self {
            pool: Arc::new(Mutex::new(conn)),
            db_path: Some(db_path.to_path_buf()),
        };
        store.initialize()?;
        Ok(store)
    }

    /// 内存数据库，进程退出即丢失
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            pool: Arc::new(Mutex::new(Connection::open_in_memory()?)),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// 初始化表结构
    fn initialize(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;

        // journal_mode 会返回一行结果，不能放进 execute_batch
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch(
            "
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                doc_id TEXT NOT NULL,
                fields TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (collection, doc_id)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
        ",
        )?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.pool
            .lock()
            .map_err(|e| StoreError::Database(format!("connection lock poisoned: {}", e)))
    }

    /// 清空集合后整体写入，没有 id 的文档自动分配 id
    ///
    /// 仅用于本地整理题库，核心流程不会调用。
    pub fn replace_collection(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        tx.execute(
            "DELETE FROM documents WHERE collection = ?",
            rusqlite::params![collection],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO documents (collection, doc_id, fields, updated_at)
                 VALUES (?, ?, ?, ?)",
            )?;

            for doc in documents {
                let doc_id = if doc.id.is_empty() {
                    Uuid::new_v4().simple().to_string()
                } else {
                    doc.id.clone()
                };
                let fields = serde_json::to_string(&doc.fields)?;
                stmt.execute(rusqlite::params![collection, doc_id, fields, now])?;
            }
        }

        tx.commit()?;
        debug!(
            "replaced collection {} with {} documents",
            collection,
            documents.len()
        );
        Ok(documents.len())
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    fn backend_tag(&self) -> &'static str {
        "sqlite"
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT doc_id, fields FROM documents WHERE collection = ? ORDER BY rowid",
        )?;

        let rows = stmt.query_map(rusqlite::params![collection], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut documents = Vec::new();
        for row in rows {
            let (doc_id, raw) = row?;
            let fields: Fields = serde_json::from_str(&raw).map_err(|e| {
                StoreError::Encoding(format!("document {}/{}: {}", collection, doc_id, e))
            })?;
            documents.push(Document::new(doc_id, fields));
        }

        Ok(documents)
    }

    async fn set_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let raw = serde_json::to_string(&fields)?;

        // 覆盖时保留 rowid，列出顺序不变
        conn.execute(
            "INSERT INTO documents (collection, doc_id, fields, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(collection, doc_id) DO UPDATE SET
             fields = excluded.fields,
             updated_at = excluded.updated_at",
            rusqlite::params![collection, doc_id, raw, Utc::now().to_rfc3339()],
        )?;

        Ok(())
    }

    async fn delete_document(&self, collection: &str, doc_id: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;

        conn.execute(
            "DELETE FROM documents WHERE collection = ? AND doc_id = ?",
            rusqlite::params![collection, doc_id],
        )?;

        Ok(())
    }
}
