//! Document-database backend with per-record ownership.
//!
//! Each annotation is stored as its own document together with the canvas,
//! manifest and owner it belongs to. Reads are scoped to the signed-in user;
//! without a session the page is empty and mutations are refused before any
//! request is made.

mod store;

pub use store::{MemoryDocumentStore, RestDocumentStore};

use crate::domain::model::{Annotation, AnnotationPage};
use crate::domain::ports::{
    AdapterCapabilities, AnnotationAdapter, DocumentStore, SessionProvider, SessionUser,
};
use crate::utils::error::{AnnoError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_COLLECTION: &str = "annotations";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRecord {
    #[serde(flatten)]
    pub annotation: Annotation,
    pub canvas_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_id: Option<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

pub struct DocumentAnnotationAdapter {
    store: Arc<dyn DocumentStore>,
    session: Arc<dyn SessionProvider>,
    collection: String,
    canvas_id: String,
    manifest_id: Option<String>,
}

impl DocumentAnnotationAdapter {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        session: Arc<dyn SessionProvider>,
        canvas_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            session,
            collection: DEFAULT_COLLECTION.to_string(),
            canvas_id: canvas_id.into(),
            manifest_id: None,
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_manifest(mut self, manifest_id: Option<String>) -> Self {
        self.manifest_id = manifest_id;
        self
    }

    /// Documents are keyed per canvas so the same annotation id can be saved
    /// on several canvases.
    fn document_key(&self, id: &str) -> String {
        format!("{}::{}", self.canvas_id, id)
    }

    fn require_user(&self) -> Result<SessionUser> {
        self.session
            .current_user()
            .ok_or_else(|| AnnoError::AuthenticationRequired {
                backend: "document".to_string(),
            })
    }

    async fn load_record(&self, id: &str) -> Result<Option<AnnotationRecord>> {
        match self.store.get(&self.collection, &self.document_key(id)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Loads a record the current user is allowed to change.
    async fn owned_record(&self, id: &str, user: &SessionUser) -> Result<AnnotationRecord> {
        let record = self
            .load_record(id)
            .await?
            .ok_or_else(|| AnnoError::NotFound { id: id.to_string() })?;

        if record.user_id != user.uid {
            tracing::warn!(
                "User {} tried to modify {} owned by {}",
                user.uid,
                id,
                record.user_id
            );
            return Err(AnnoError::NotAuthorized { id: id.to_string() });
        }
        Ok(record)
    }

    async fn save_record(&self, record: &AnnotationRecord) -> Result<()> {
        let key = self.document_key(&record.annotation.id);
        self.store
            .put(&self.collection, &key, serde_json::to_value(record)?)
            .await
    }
}

#[async_trait]
impl AnnotationAdapter for DocumentAnnotationAdapter {
    fn annotation_page_id(&self) -> String {
        format!("{}/annotations", self.canvas_id)
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            export: true,
            requires_session: true,
        }
    }

    async fn create(&self, annotation: Annotation) -> Result<AnnotationPage> {
        let user = self.require_user()?;
        if self.load_record(&annotation.id).await?.is_some() {
            return Err(AnnoError::Conflict { id: annotation.id });
        }

        let now = Utc::now();
        let record = AnnotationRecord {
            annotation,
            canvas_id: self.canvas_id.clone(),
            manifest_id: self.manifest_id.clone(),
            created: now,
            modified: now,
            user_id: user.uid.clone(),
            user_name: user.display_name.clone(),
        };
        tracing::debug!("Creating {} for {}", record.annotation.id, user.uid);
        self.save_record(&record).await?;
        self.all().await
    }

    async fn update(&self, annotation: Annotation) -> Result<AnnotationPage> {
        let user = self.require_user()?;
        let existing = self.owned_record(&annotation.id, &user).await?;

        let record = AnnotationRecord {
            annotation,
            manifest_id: self.manifest_id.clone().or(existing.manifest_id),
            modified: Utc::now(),
            ..existing
        };
        self.save_record(&record).await?;
        self.all().await
    }

    async fn delete(&self, id: &str) -> Result<AnnotationPage> {
        let user = self.require_user()?;
        self.owned_record(id, &user).await?;

        if !self
            .store
            .delete(&self.collection, &self.document_key(id))
            .await?
        {
            return Err(AnnoError::NotFound { id: id.to_string() });
        }
        self.all().await
    }

    async fn get(&self, id: &str) -> Result<Option<Annotation>> {
        Ok(self.load_record(id).await?.map(|record| record.annotation))
    }

    async fn all(&self) -> Result<AnnotationPage> {
        let page_id = self.annotation_page_id();
        let Some(user) = self.session.current_user() else {
            return Ok(AnnotationPage::empty(page_id));
        };

        let mut filters = vec![
            ("canvasId".to_string(), self.canvas_id.clone()),
            ("userId".to_string(), user.uid),
        ];
        if let Some(manifest_id) = &self.manifest_id {
            filters.push(("manifestId".to_string(), manifest_id.clone()));
        }

        let documents = self.store.query(&self.collection, &filters).await?;
        let mut records = documents
            .into_iter()
            .map(serde_json::from_value::<AnnotationRecord>)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        records.sort_by(|a, b| a.created.cmp(&b.created));

        Ok(AnnotationPage::with_items(
            page_id,
            records.into_iter().map(|r| r.annotation).collect(),
        ))
    }
}
