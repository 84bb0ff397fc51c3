use crate::domain::model::{Annotation, AnnotationPage, Canvas};
use crate::domain::ports::{AdapterFactory, AnnotationAdapter, SessionProvider};
use crate::domain::web_annotation::AnnotationDraft;
use crate::utils::error::{AnnoError, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Receives refreshed pages, the "receive annotation page" hook of the host viewer.
pub trait PageSink: Send + Sync {
    fn receive_annotation_page(&self, canvas_id: &str, page_id: &str, page: &AnnotationPage);
}

/// Last page seen per canvas and page id.
#[derive(Debug, Default)]
pub struct PageCache {
    pages: RwLock<HashMap<String, HashMap<String, AnnotationPage>>>,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pages_for(&self, canvas_id: &str) -> Vec<AnnotationPage> {
        self.read(|pages| {
            pages
                .get(canvas_id)
                .map(|by_id| by_id.values().cloned().collect())
                .unwrap_or_default()
        })
    }

    /// The annotation with `id` on any of `canvases`, as the edit form loads it.
    pub fn find_annotation(&self, id: &str, canvases: &[Canvas]) -> Option<Annotation> {
        self.read(|pages| {
            canvases
                .iter()
                .filter_map(|canvas| pages.get(&canvas.id))
                .flat_map(|by_id| by_id.values())
                .find_map(|page| page.find(id).cloned())
        })
    }

    /// Only annotations held in one of our pages offer edit and delete.
    pub fn is_editable(&self, id: &str, canvases: &[Canvas]) -> bool {
        self.find_annotation(id, canvases).is_some()
    }

    fn read<T>(&self, f: impl FnOnce(&HashMap<String, HashMap<String, AnnotationPage>>) -> T) -> T {
        match self.pages.read() {
            Ok(guard) => f(&guard),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }
}

impl PageSink for PageCache {
    fn receive_annotation_page(&self, canvas_id: &str, page_id: &str, page: &AnnotationPage) {
        let mut pages = match self.pages.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        pages
            .entry(canvas_id.to_string())
            .or_default()
            .insert(page_id.to_string(), page.clone());
    }
}

#[derive(Debug)]
pub struct CanvasOutcome {
    pub canvas_id: String,
    pub page_id: String,
    pub result: Result<AnnotationPage>,
}

/// Per-canvas results of a multi-canvas write. Writes are best-effort: a
/// failure on one canvas does not undo or skip the others, it is reported here.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<CanvasOutcome>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &CanvasOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &AnnoError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.canvas_id.as_str(), e)))
    }

    /// Collapses the report, returning the first failure if any canvas failed.
    pub fn into_result(self) -> Result<Vec<AnnotationPage>> {
        self.outcomes.into_iter().map(|o| o.result).collect()
    }
}

/// Runs user actions against every visible canvas through the configured factory.
pub struct AnnotationService {
    factory: AdapterFactory,
    sink: Arc<dyn PageSink>,
    session: Option<Arc<dyn SessionProvider>>,
}

impl AnnotationService {
    pub fn new(factory: AdapterFactory, sink: Arc<dyn PageSink>) -> Self {
        Self {
            factory,
            sink,
            session: None,
        }
    }

    /// Writes to session-bound backends are refused up front while nobody is signed in.
    pub fn with_session(mut self, session: Arc<dyn SessionProvider>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn ensure_session(&self, adapter: &dyn AnnotationAdapter) -> Result<()> {
        if !adapter.capabilities().requires_session {
            return Ok(());
        }
        match &self.session {
            Some(session) if session.current_user().is_none() => {
                Err(AnnoError::AuthenticationRequired {
                    backend: adapter.annotation_page_id(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Creates the draft on each canvas, or replaces it when `existing` is set.
    pub async fn save(
        &self,
        draft: &AnnotationDraft,
        canvases: &[Canvas],
        existing: bool,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for canvas in canvases {
            let adapter = (self.factory)(canvas);
            let annotation = draft
                .for_canvas(&canvas.id, canvas.manifest_id.as_deref())
                .to_annotation();
            let result = if let Err(e) = self.ensure_session(adapter.as_ref()) {
                Err(e)
            } else if existing {
                tracing::info!("Updating {} on {}", annotation.id, canvas.id);
                adapter.update(annotation).await
            } else {
                tracing::info!("Creating {} on {}", annotation.id, canvas.id);
                adapter.create(annotation).await
            };
            report
                .outcomes
                .push(self.deliver(canvas, adapter.annotation_page_id(), result));
        }

        self.log_report("save", &report);
        report
    }

    pub async fn delete(&self, id: &str, canvases: &[Canvas]) -> BatchReport {
        let mut report = BatchReport::default();

        for canvas in canvases {
            let adapter = (self.factory)(canvas);
            let result = match self.ensure_session(adapter.as_ref()) {
                Ok(()) => {
                    tracing::info!("Deleting {} from {}", id, canvas.id);
                    adapter.delete(id).await
                }
                Err(e) => Err(e),
            };
            report
                .outcomes
                .push(self.deliver(canvas, adapter.annotation_page_id(), result));
        }

        self.log_report("delete", &report);
        report
    }

    /// Re-reads a canvas page, e.g. after the signed-in user changed.
    pub async fn refresh(&self, canvas: &Canvas) -> Result<AnnotationPage> {
        let adapter = (self.factory)(canvas);
        let page = adapter.all().await?;
        self.sink
            .receive_annotation_page(&canvas.id, &adapter.annotation_page_id(), &page);
        Ok(page)
    }

    pub async fn get(&self, id: &str, canvas: &Canvas) -> Result<Annotation> {
        (self.factory)(canvas)
            .get(id)
            .await?
            .ok_or_else(|| AnnoError::NotFound { id: id.to_string() })
    }

    /// Whether the backend of `canvas` can export pages.
    pub fn offers_export(&self, canvas: &Canvas) -> bool {
        (self.factory)(canvas).capabilities().export
    }

    fn deliver(
        &self,
        canvas: &Canvas,
        page_id: String,
        result: Result<AnnotationPage>,
    ) -> CanvasOutcome {
        if let Ok(page) = &result {
            self.sink
                .receive_annotation_page(&canvas.id, &page_id, page);
        }
        CanvasOutcome {
            canvas_id: canvas.id.clone(),
            page_id,
            result,
        }
    }

    fn log_report(&self, action: &str, report: &BatchReport) {
        for (canvas_id, err) in report.failed() {
            tracing::error!("❌ {} failed on {}: {}", action, canvas_id, err);
        }
        tracing::debug!(
            "{} finished: {}/{} canvases succeeded",
            action,
            report.succeeded().count(),
            report.outcomes.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{
        DocumentAnnotationAdapter, LocalStorageAdapter, MemoryDocumentStore, MemoryStorage,
        StaticSession,
    };
    use crate::domain::ports::SessionUser;

    fn local_service() -> (AnnotationService, Arc<PageCache>) {
        let storage = MemoryStorage::new();
        let factory: AdapterFactory = Arc::new(move |canvas: &Canvas| {
            Box::new(LocalStorageAdapter::new(storage.clone(), canvas.id.clone()))
                as Box<dyn AnnotationAdapter>
        });
        let cache = Arc::new(PageCache::new());
        (AnnotationService::new(factory, cache.clone()), cache)
    }

    #[tokio::test]
    async fn test_save_on_every_canvas_feeds_cache() {
        let (service, cache) = local_service();
        let canvases = vec![Canvas::new("c1"), Canvas::new("c2")];
        let draft = AnnotationDraft::new("c1").with_body("hello");

        let report = service.save(&draft, &canvases, false).await;
        assert!(report.is_complete());
        assert_eq!(report.outcomes.len(), 2);

        assert!(cache.is_editable(&draft.id, &canvases));
        assert!(!cache.is_editable("other", &canvases));
        let on_c2 = cache.find_annotation(&draft.id, &canvases[1..]).unwrap();
        assert_eq!(on_c2.canvas_id(), "c2");
        assert_eq!(cache.pages_for("c1").len(), 1);
    }

    #[tokio::test]
    async fn test_update_then_delete() {
        let (service, cache) = local_service();
        let canvases = vec![Canvas::new("c1")];
        let draft = AnnotationDraft::new("c1").with_body("first");
        service.save(&draft, &canvases, false).await.into_result().unwrap();

        let edited = draft.clone().with_body("second");
        service.save(&edited, &canvases, true).await.into_result().unwrap();
        let stored = service.get(&draft.id, &canvases[0]).await.unwrap();
        assert_eq!(stored.text(), Some("second"));

        service.delete(&draft.id, &canvases).await.into_result().unwrap();
        assert!(!cache.is_editable(&draft.id, &canvases));
        assert!(matches!(
            service.get(&draft.id, &canvases[0]).await,
            Err(AnnoError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_partial_failure_is_reported() {
        let (service, _cache) = local_service();
        let c1 = Canvas::new("c1");
        let c2 = Canvas::new("c2");
        let draft = AnnotationDraft::new("c1").with_body("x");
        service.save(&draft, &[c1.clone()], false).await;

        // Exists on c1 only: the update fails on c2 and succeeds on c1.
        let report = service.save(&draft, &[c1, c2], true).await;
        assert!(!report.is_complete());
        assert_eq!(report.succeeded().count(), 1);
        let failed: Vec<_> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "c2");
        assert!(matches!(failed[0].1, AnnoError::NotFound { .. }));
        assert!(report.into_result().is_err());
    }

    #[tokio::test]
    async fn test_refresh_follows_session() {
        let store = MemoryDocumentStore::new();
        let signed_in = Arc::new(StaticSession::signed_in(SessionUser::new("u1")));
        let anonymous = Arc::new(StaticSession::anonymous());

        let make = |session: Arc<StaticSession>| -> AdapterFactory {
            let store = store.clone();
            Arc::new(move |canvas: &Canvas| {
                Box::new(DocumentAnnotationAdapter::new(
                    Arc::new(store.clone()),
                    session.clone(),
                    canvas.id.clone(),
                )) as Box<dyn AnnotationAdapter>
            })
        };

        let cache = Arc::new(PageCache::new());
        let writer = AnnotationService::new(make(signed_in), cache.clone());
        let canvas = Canvas::new("c1");
        writer
            .save(&AnnotationDraft::new("c1").with_body("x"), &[canvas.clone()], false)
            .await
            .into_result()
            .unwrap();
        assert_eq!(writer.refresh(&canvas).await.unwrap().len(), 1);
        assert!(writer.offers_export(&canvas));

        let reader = AnnotationService::new(make(anonymous), cache.clone());
        assert!(reader.refresh(&canvas).await.unwrap().is_empty());
        let report = reader
            .save(&AnnotationDraft::new("c1").with_body("y"), &[canvas], false)
            .await;
        assert!(matches!(
            report.failed().next(),
            Some((_, AnnoError::AuthenticationRequired { .. }))
        ));
    }

    #[tokio::test]
    async fn test_ensure_session_checks_before_writing() {
        let store = MemoryDocumentStore::new();
        let session = Arc::new(crate::adapters::SharedSession::new());
        let adapter_session = session.clone();
        let adapter_store = store.clone();
        let factory: AdapterFactory = Arc::new(move |canvas: &Canvas| {
            Box::new(DocumentAnnotationAdapter::new(
                Arc::new(adapter_store.clone()),
                adapter_session.clone(),
                canvas.id.clone(),
            )) as Box<dyn AnnotationAdapter>
        });
        let service = AnnotationService::new(factory.clone(), Arc::new(PageCache::new()))
            .with_session(session.clone());
        let canvas = Canvas::new("c1");

        let err = service
            .ensure_session(factory(&canvas).as_ref())
            .unwrap_err();
        assert!(matches!(err, AnnoError::AuthenticationRequired { .. }));
        let report = service.delete("a", &[canvas.clone()]).await;
        assert!(matches!(
            report.failed().next(),
            Some((_, AnnoError::AuthenticationRequired { .. }))
        ));

        session.sign_in(SessionUser::new("u1"));
        assert!(service.ensure_session(factory(&canvas).as_ref()).is_ok());
        service
            .save(&AnnotationDraft::new("c1").with_body("x"), &[canvas], false)
            .await
            .into_result()
            .unwrap();
    }

    #[test]
    fn test_ensure_session_ignores_local_backends() {
        let (service, _cache) = local_service();
        let service = service.with_session(Arc::new(StaticSession::anonymous()));
        let adapter = LocalStorageAdapter::new(MemoryStorage::new(), "c1");
        assert!(service.ensure_session(&adapter).is_ok());
    }
}
