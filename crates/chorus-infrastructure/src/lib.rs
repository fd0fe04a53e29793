pub mod blob_mute_list_repository;
pub mod blob_session_repository;
pub mod config_loader;
pub mod paths;
pub mod storage;

pub use crate::blob_mute_list_repository::BlobMuteListRepository;
pub use crate::blob_session_repository::BlobSessionRepository;
pub use crate::config_loader::ConfigLoader;
pub use crate::paths::ChorusPaths;
