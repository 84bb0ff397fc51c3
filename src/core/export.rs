use crate::domain::model::{AnnotationPage, Canvas};
use crate::domain::ports::{AdapterFactory, Storage};
use crate::utils::error::Result;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct ExportEntry {
    pub canvas_id: String,
    pub label: String,
    pub file_name: String,
    pub page: AnnotationPage,
}

/// Writes the stored pages of the given canvases as JSON files.
pub struct AnnotationExporter<S: Storage> {
    factory: AdapterFactory,
    storage: S,
}

impl<S: Storage> AnnotationExporter<S> {
    pub fn new(factory: AdapterFactory, storage: S) -> Self {
        Self { factory, storage }
    }

    /// Non-empty pages of canvases whose backend supports export.
    pub async fn collect(&self, canvases: &[Canvas]) -> Result<Vec<ExportEntry>> {
        let mut entries = Vec::new();
        let mut used_names = HashSet::new();

        for canvas in canvases {
            let adapter = (self.factory)(canvas);
            if !adapter.capabilities().export {
                tracing::debug!("Backend of {} does not export, skipping", canvas.id);
                continue;
            }

            let page = adapter.all().await?;
            if page.is_empty() {
                continue;
            }

            let label = canvas.display_label().to_string();
            let file_name = unique_file_name(&label, &mut used_names);
            entries.push(ExportEntry {
                canvas_id: canvas.id.clone(),
                label,
                file_name,
                page,
            });
        }

        Ok(entries)
    }

    /// Returns the written file names.
    pub async fn export(&self, canvases: &[Canvas]) -> Result<Vec<String>> {
        let entries = self.collect(canvases).await?;
        if entries.is_empty() {
            tracing::warn!("No annotations stored yet.");
        }

        let mut written = Vec::with_capacity(entries.len());
        for entry in entries {
            let json = serde_json::to_string_pretty(&entry.page)?;
            self.storage
                .write_item(&entry.file_name, json.as_bytes())
                .await?;
            tracing::info!(
                "📁 Exported {} annotations for {} to {}",
                entry.page.len(),
                entry.label,
                entry.file_name
            );
            written.push(entry.file_name);
        }
        Ok(written)
    }
}

fn slugify(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "canvas".to_string()
    } else {
        slug.to_string()
    }
}

fn unique_file_name(label: &str, used: &mut HashSet<String>) -> String {
    let base = slugify(label);
    let mut candidate = format!("{}.json", base);
    let mut n = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{}-{}.json", base, n);
        n += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AnnototAdapter, LocalStorageAdapter, MemoryStorage};
    use crate::domain::ports::AnnotationAdapter;
    use crate::domain::web_annotation::AnnotationDraft;
    use std::sync::Arc;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("My Canvas"), "my-canvas");
        assert_eq!(slugify("https://example.org/canvas/1"), "https-example-org-canvas-1");
        assert_eq!(slugify("  "), "canvas");
    }

    #[test]
    fn test_unique_file_names() {
        let mut used = HashSet::new();
        assert_eq!(unique_file_name("a b", &mut used), "a-b.json");
        assert_eq!(unique_file_name("a-b", &mut used), "a-b-2.json");
        assert_eq!(unique_file_name("A B", &mut used), "a-b-3.json");
    }

    #[tokio::test]
    async fn test_exports_non_empty_pages() {
        let annotations = MemoryStorage::new();
        let adapter_storage = annotations.clone();
        let factory: AdapterFactory = Arc::new(move |canvas: &Canvas| {
            Box::new(LocalStorageAdapter::new(adapter_storage.clone(), canvas.id.clone()))
                as Box<dyn AnnotationAdapter>
        });

        LocalStorageAdapter::new(annotations.clone(), "canvas/1")
            .create(AnnotationDraft::new("canvas/1").with_body("x").to_annotation())
            .await
            .unwrap();

        let output = MemoryStorage::new();
        let exporter = AnnotationExporter::new(factory, output.clone());
        let canvases = vec![
            Canvas::new("canvas/1").with_label("My Canvas"),
            Canvas::new("canvas/2"),
        ];

        let written = exporter.export(&canvases).await.unwrap();
        assert_eq!(written, vec!["my-canvas.json"]);

        let data = output.read_item("my-canvas.json").await.unwrap().unwrap();
        let page: AnnotationPage = serde_json::from_slice(&data).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page.id, "localStorage://?canvasId=canvas/1");
    }

    #[tokio::test]
    async fn test_backends_without_export_are_skipped() {
        let factory: AdapterFactory = Arc::new(|canvas: &Canvas| {
            Box::new(
                AnnototAdapter::new(reqwest::Client::new(), "http://127.0.0.1:9/annotations", &canvas.id)
                    .unwrap(),
            ) as Box<dyn AnnotationAdapter>
        });

        let exporter = AnnotationExporter::new(factory, MemoryStorage::new());
        let entries = exporter.collect(&[Canvas::new("c1")]).await.unwrap();
        assert!(entries.is_empty());
    }
}
