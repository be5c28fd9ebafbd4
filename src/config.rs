//! 运行配置
//! 存储后端、集合命名与日志级别，支持从环境变量读取

use crate::services::database::SqliteDocumentStore;
use crate::services::firestore::{FirestoreSettings, FirestoreStore};
use crate::services::memory::MemoryDocumentStore;
use crate::services::store::{DocumentStore, StoreLayout};
use crate::utils::{get_database_path, log_level_from_str};
use anyhow::{anyhow, Context, Result};
use log::LevelFilter;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// 存储后端配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Memory,
    Sqlite { path: PathBuf },
    Firestore(FirestoreSettings),
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Sqlite {
            path: get_database_path(),
        }
    }
}

/// 追踪器配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub layout: StoreLayout,
    pub backend: BackendConfig,
    pub log_level: LevelFilter,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            layout: StoreLayout::default(),
            backend: BackendConfig::default(),
            log_level: LevelFilter::Info,
        }
    }
}

impl TrackerConfig {
    /// 从进程环境变量读取
    pub fn from_env() -> Result<Self> {
        Self::from_vars(&std::env::vars().collect())
    }

    /// 从给定的变量表读取，未设置的项使用默认值
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |name: &str| vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(catalog) = get("DSA_TRACKER_CATALOG") {
            config.layout.catalog_collection = catalog.to_string();
        }
        if let Some(level) = get("DSA_TRACKER_LOG") {
            config.log_level = log_level_from_str(level);
        }

        config.backend = match get("DSA_TRACKER_BACKEND").unwrap_or("sqlite") {
            "memory" => BackendConfig::Memory,
            "sqlite" => BackendConfig::Sqlite {
                path: get("DSA_TRACKER_DB_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(get_database_path),
            },
            "firestore" => {
                let project_id = get("FIRESTORE_PROJECT_ID")
                    .context("FIRESTORE_PROJECT_ID is required for the firestore backend")?;
                let mut settings = FirestoreSettings::new(project_id);
                if let Some(database_id) = get("FIRESTORE_DATABASE_ID") {
                    settings.database_id = database_id.to_string();
                }
                if let Some(base_url) = get("FIRESTORE_BASE_URL") {
                    settings.base_url = base_url.to_string();
                }
                if let Some(timeout) = get("FIRESTORE_TIMEOUT_SECS") {
                    settings.timeout_secs = timeout
                        .parse()
                        .with_context(|| format!("invalid FIRESTORE_TIMEOUT_SECS: {}", timeout))?;
                }
                BackendConfig::Firestore(settings)
            }
            other => return Err(anyhow!("unknown DSA_TRACKER_BACKEND: {}", other)),
        };

        Ok(config)
    }
}

/// 按配置打开存储后端
pub fn open_store(backend: &BackendConfig) -> Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match backend {
        BackendConfig::Memory => Arc::new(MemoryDocumentStore::new()),
        BackendConfig::Sqlite { path } => Arc::new(
            SqliteDocumentStore::open(path)
                .with_context(|| format!("Failed to open database at {}", path.display()))?,
        ),
        BackendConfig::Firestore(settings) => Arc::new(
            FirestoreStore::new(settings).context("Failed to build document database client")?,
        ),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::from_vars(&HashMap::new()).unwrap();
        assert_eq!(config, TrackerConfig::default());
        assert_eq!(config.layout.catalog_collection, "love_babbar_sheet");
        assert!(matches!(config.backend, BackendConfig::Sqlite { .. }));
    }

    #[test]
    fn test_firestore_from_vars() {
        let config = TrackerConfig::from_vars(&vars(&[
            ("DSA_TRACKER_BACKEND", "firestore"),
            ("FIRESTORE_PROJECT_ID", "dsa-sheet"),
            ("FIRESTORE_BASE_URL", "http://localhost:8080"),
            ("FIRESTORE_TIMEOUT_SECS", "5"),
            ("DSA_TRACKER_CATALOG", "striver_sheet"),
            ("DSA_TRACKER_LOG", "debug"),
        ]))
        .unwrap();

        match config.backend {
            BackendConfig::Firestore(settings) => {
                assert_eq!(settings.project_id, "dsa-sheet");
                assert_eq!(settings.database_id, "(default)");
                assert_eq!(settings.base_url, "http://localhost:8080");
                assert_eq!(settings.timeout_secs, 5);
            }
            other => panic!("Expected firestore backend, got {:?}", other),
        }
        assert_eq!(config.layout.catalog_collection, "striver_sheet");
        assert_eq!(config.log_level, LevelFilter::Debug);
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        assert!(TrackerConfig::from_vars(&vars(&[("DSA_TRACKER_BACKEND", "postgres")])).is_err());
        assert!(TrackerConfig::from_vars(&vars(&[("DSA_TRACKER_BACKEND", "firestore")])).is_err());
        assert!(TrackerConfig::from_vars(&vars(&[
            ("DSA_TRACKER_BACKEND", "firestore"),
            ("FIRESTORE_PROJECT_ID", "p"),
            ("FIRESTORE_TIMEOUT_SECS", "soon"),
        ]))
        .is_err());
    }

    #[test]
    fn test_open_store_backends() {
        let dir = tempfile::tempdir().unwrap();
        let sqlite = open_store(&BackendConfig::Sqlite {
            path: dir.path().join("tracker.db"),
        })
        .unwrap();
        assert_eq!(sqlite.backend_tag(), "sqlite");
        assert_eq!(open_store(&BackendConfig::Memory).unwrap().backend_tag(), "memory");

        let mut settings = FirestoreSettings::new("p");
        settings.base_url = "http://127.0.0.1:9".to_string();
        assert_eq!(
            open_store(&BackendConfig::Firestore(settings)).unwrap().backend_tag(),
            "firestore"
        );
    }
}
