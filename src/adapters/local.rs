use crate::domain::model::{Annotation, AnnotationPage};
use crate::domain::ports::{AdapterCapabilities, AnnotationAdapter, Storage};
use crate::utils::error::{AnnoError, Result};
use async_trait::async_trait;

/// Single-device store: the whole page of a canvas is one JSON value under
/// its page id, the way the viewer keeps pages in browser local storage.
#[derive(Debug, Clone)]
pub struct LocalStorageAdapter<S: Storage> {
    storage: S,
    canvas_id: String,
}

impl<S: Storage> LocalStorageAdapter<S> {
    pub fn new(storage: S, canvas_id: impl Into<String>) -> Self {
        Self {
            storage,
            canvas_id: canvas_id.into(),
        }
    }

    pub fn page_id_for(canvas_id: &str) -> String {
        format!("localStorage://?canvasId={}", canvas_id)
    }

    async fn load_page(&self) -> Result<AnnotationPage> {
        let page_id = Self::page_id_for(&self.canvas_id);
        match self.storage.read_item(&page_id).await? {
            Some(data) => {
                let mut page: AnnotationPage = serde_json::from_slice(&data)?;
                if page.id.is_empty() {
                    page.id = page_id;
                }
                Ok(page)
            }
            None => Ok(AnnotationPage::empty(page_id)),
        }
    }

    async fn store_page(&self, page: &AnnotationPage) -> Result<()> {
        let data = serde_json::to_vec(page)?;
        self.storage.write_item(&page.id, &data).await
    }
}

#[async_trait]
impl<S: Storage> AnnotationAdapter for LocalStorageAdapter<S> {
    fn annotation_page_id(&self) -> String {
        Self::page_id_for(&self.canvas_id)
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            export: true,
            requires_session: false,
        }
    }

    async fn create(&self, annotation: Annotation) -> Result<AnnotationPage> {
        let mut page = self.load_page().await?;
        if page.contains(&annotation.id) {
            return Err(AnnoError::Conflict { id: annotation.id });
        }

        tracing::debug!("Adding {} to {}", annotation.id, page.id);
        page.items.push(annotation);
        self.store_page(&page).await?;
        Ok(page)
    }

    async fn update(&self, annotation: Annotation) -> Result<AnnotationPage> {
        let mut page = self.load_page().await?;
        let slot = page
            .items
            .iter_mut()
            .find(|item| item.id == annotation.id)
            .ok_or_else(|| AnnoError::NotFound {
                id: annotation.id.clone(),
            })?;

        *slot = annotation;
        self.store_page(&page).await?;
        Ok(page)
    }

    async fn delete(&self, id: &str) -> Result<AnnotationPage> {
        let mut page = self.load_page().await?;
        let before = page.items.len();
        page.items.retain(|item| item.id != id);
        if page.items.len() == before {
            return Err(AnnoError::NotFound { id: id.to_string() });
        }

        self.store_page(&page).await?;
        Ok(page)
    }

    async fn get(&self, id: &str) -> Result<Option<Annotation>> {
        let page = self.load_page().await?;
        Ok(page.items.into_iter().find(|item| item.id == id))
    }

    async fn all(&self) -> Result<AnnotationPage> {
        self.load_page().await
    }
}
