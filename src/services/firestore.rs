//! 远端文档数据库（Firestore REST 接口）存储
//! 列表分页读取、PATCH 整体覆盖写入、DELETE 删除；用户登录后设置 ID token 作为凭证

use crate::error::StoreError;
use crate::models::{Document, Fields};
use crate::services::store::DocumentStore;
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::time::Duration;

/// 默认 REST 入口
pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com";

/// 远端存储配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirestoreSettings {
    pub project_id: String,
    pub database_id: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub page_size: u32,
}

impl FirestoreSettings {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: "(default)".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            page_size: 300,
        }
    }

    /// `{base}/v1/projects/{project}/databases/{database}/documents`
    pub fn documents_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/databases/{}/documents",
            self.base_url.trim_end_matches('/'),
            self.project_id,
            self.database_id
        )
    }
}

/// 列表接口响应
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<RemoteDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// 远端文档，name 形如 `projects/p/databases/d/documents/users/u/practiced/{id}`
#[derive(Debug, Deserialize)]
struct RemoteDocument {
    name: String,
    #[serde(default)]
    fields: Fields,
}

impl RemoteDocument {
    fn into_document(self) -> Result<Document, StoreError> {
        let id = self
            .name
            .rsplit('/')
            .next()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| StoreError::Encoding(format!("document name without id: {}", self.name)))?
            .to_string();
        Ok(Document::new(id, self.fields))
    }
}

#[derive(Debug, Serialize)]
struct WriteBody<'a> {
    fields: &'a Fields,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// 将非成功状态码映射为存储错误
fn status_error(status: StatusCode, message: String) -> StoreError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::PermissionDenied(message),
        _ => StoreError::Backend {
            status: status.as_u16(),
            message,
        },
    }
}

async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let fallback = status.canonical_reason().unwrap_or("unknown error").to_string();
    let message = match response.json::<ErrorEnvelope>().await {
        Ok(envelope) if !envelope.error.message.is_empty() => envelope.error.message,
        _ => fallback,
    };
    Err(status_error(status, message))
}

/// Firestore REST 存储
pub struct FirestoreStore {
    http_client: Client,
    documents_url: Url,
    page_size: u32,
    id_token: RwLock<Option<String>>,
}

impl FirestoreStore {
    pub fn new(settings: &FirestoreSettings) -> Result<Self, StoreError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Self::with_client(settings, http_client)
    }

    /// 使用外部构建的 HTTP 客户端
    pub fn with_client(settings: &FirestoreSettings, http_client: Client) -> Result<Self, StoreError> {
        let documents_url = Url::parse(&settings.documents_url())
            .map_err(|e| StoreError::Encoding(format!("invalid base url: {}", e)))?;
        Ok(Self {
            http_client,
            documents_url,
            page_size: settings.page_size.max(1),
            id_token: RwLock::new(None),
        })
    }

    /// 设置（或清除）当前登录用户的 ID token
    pub fn set_id_token(&self, token: Option<String>) -> Result<(), StoreError> {
        let mut guard = self
            .id_token
            .write()
            .map_err(|e| StoreError::Network(format!("token lock poisoned: {}", e)))?;
        *guard = token;
        Ok(())
    }

    fn id_token(&self) -> Result<Option<String>, StoreError> {
        self.id_token
            .read()
            .map(|guard| guard.clone())
            .map_err(|e| StoreError::Network(format!("token lock poisoned: {}", e)))
    }

    fn url_for(&self, collection: &str, doc_id: Option<&str>) -> Result<Url, StoreError> {
        let mut url = self.documents_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::Encoding("base url cannot hold a path".to_string()))?;
            segments.extend(collection.split('/').filter(|s| !s.is_empty()));
            if let Some(doc_id) = doc_id {
                segments.push(doc_id);
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, StoreError> {
        Ok(match self.id_token()? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    fn backend_tag(&self) -> &'static str {
        "firestore"
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let url = self.url_for(collection, None)?;
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http_client
                .get(url.clone())
                .query(&[("pageSize", self.page_size.to_string())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = self.authorize(request)?.send().await?;
            let page: ListDocumentsResponse = check_status(response).await?.json().await?;
            for remote in page.documents {
                documents.push(remote.into_document()?);
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!("listed {} documents from {}", documents.len(), collection);
        Ok(documents)
    }

    async fn set_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let url = self.url_for(collection, Some(doc_id))?;
        // 不带 updateMask 的 PATCH 即整体覆盖
        let request = self
            .http_client
            .patch(url)
            .json(&WriteBody { fields: &fields });

        let response = self.authorize(request)?.send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn delete_document(&self, collection: &str, doc_id: &str) -> Result<(), StoreError> {
        let url = self.url_for(collection, Some(doc_id))?;
        let request = self.http_client.delete(url);

        let response = self.authorize(request)?.send().await?;
        check_status(response).await?;
        Ok(())
    }
}
