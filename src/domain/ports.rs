use crate::domain::model::{Annotation, AnnotationPage, Canvas};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// What a backend can do beyond the CRUD contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdapterCapabilities {
    /// Pages can be exported as JSON files.
    pub export: bool,
    /// Mutations need a signed-in user.
    pub requires_session: bool,
}

/// Storage backend for the annotation page of one canvas.
///
/// Every mutation returns the refreshed page so callers can hand it straight
/// to the viewer state.
#[async_trait]
pub trait AnnotationAdapter: Send + Sync {
    /// Key under which callers address the page returned by [`all`](Self::all).
    fn annotation_page_id(&self) -> String;

    fn capabilities(&self) -> AdapterCapabilities;

    async fn create(&self, annotation: Annotation) -> Result<AnnotationPage>;

    async fn update(&self, annotation: Annotation) -> Result<AnnotationPage>;

    async fn delete(&self, id: &str) -> Result<AnnotationPage>;

    async fn get(&self, id: &str) -> Result<Option<Annotation>>;

    async fn all(&self) -> Result<AnnotationPage>;
}

/// Builds the adapter for a canvas. This is the only seam between the host and the core.
pub type AdapterFactory = Arc<dyn Fn(&Canvas) -> Box<dyn AnnotationAdapter> + Send + Sync>;

/// Byte-level key/value persistence.
pub trait Storage: Send + Sync {
    /// `Ok(None)` when nothing is stored under `path`.
    fn read_item(
        &self,
        path: &str,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;
    fn write_item(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn remove_item(&self, path: &str) -> impl std::future::Future<Output = Result<bool>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub uid: String,
    pub display_name: Option<String>,
    /// Bearer token presented to remote document stores.
    pub id_token: Option<String>,
}

impl SessionUser {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
            id_token: None,
        }
    }
}

pub trait SessionProvider: Send + Sync {
    fn current_user(&self) -> Option<SessionUser>;
}

/// Schemaless document collection, filtered by top-level string equality.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>>;

    async fn put(&self, collection: &str, key: &str, document: Value) -> Result<()>;

    /// Returns whether a document was removed.
    async fn delete(&self, collection: &str, key: &str) -> Result<bool>;

    async fn query(&self, collection: &str, filters: &[(String, String)]) -> Result<Vec<Value>>;
}
