// Adapters layer: concrete implementations of the domain ports (storage backends, sessions).

pub mod annotot;
pub mod document;
pub mod local;
pub mod session;
pub mod storage;

pub use annotot::AnnototAdapter;
pub use document::{DocumentAnnotationAdapter, MemoryDocumentStore, RestDocumentStore};
pub use local::LocalStorageAdapter;
pub use session::{SharedSession, StaticSession};
pub use storage::{FileStorage, MemoryStorage};
