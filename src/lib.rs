pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;
pub use config::AppConfig;

pub use crate::core::export::AnnotationExporter;
pub use crate::core::service::{AnnotationService, BatchReport, PageCache, PageSink};
pub use domain::model::{Annotation, AnnotationPage, Canvas};
pub use domain::ports::{AdapterCapabilities, AdapterFactory, AnnotationAdapter};
pub use domain::web_annotation::AnnotationDraft;
pub use utils::error::{AnnoError, Result};
