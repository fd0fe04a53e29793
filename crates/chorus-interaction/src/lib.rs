//! Completion client for OpenAI-compatible chat endpoints.

pub mod attachment;
pub mod client;
pub mod error;
pub mod request;
pub mod retry;
pub mod stream;
pub mod transport;

pub use client::CompletionClient;
pub use error::CompletionError;
pub use transport::{CompletionTransport, ReqwestTransport};
