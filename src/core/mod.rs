pub mod export;
pub mod service;

pub use crate::domain::model::{Annotation, AnnotationPage, Canvas};
pub use crate::domain::ports::{AdapterFactory, AnnotationAdapter, Storage};
pub use crate::utils::error::Result;
