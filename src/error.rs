//! 错误类型
//!
//! - `StoreError` 文档存储后端的失败（网络、权限、数据库、编码）
//! - `FetchError` 读取题库或练习记录失败，包括远端数据结构不符
//! - `WriteError` 创建或删除练习记录失败，失败时远端状态保持不变

use crate::models::SchemaError;
use thiserror::Error;

/// 存储后端错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("network error: {0}")]
    Network(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("backend responded with status {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("database error: {0}")]
    Database(String),

    #[error("encoding error: {0}")]
    Encoding(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Encoding(err.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Encoding(err.to_string())
        } else {
            StoreError::Network(err.to_string())
        }
    }
}

/// 读取失败
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("malformed document '{document_id}' in '{collection}': {reason}")]
    Malformed {
        collection: String,
        document_id: String,
        #[source]
        reason: SchemaError,
    },
}

/// 写入失败
#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Store(#[from] StoreError),
}
