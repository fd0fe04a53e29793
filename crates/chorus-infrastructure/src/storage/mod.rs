//! Storage layer: atomic files and blob stores.

mod atomic_file;
mod blob_store;

pub use atomic_file::AtomicTextFile;
pub use blob_store::{BlobStore, FileBlobStore, MemoryBlobStore};
