//! Session domain module.
//!
//! # Module Structure
//!
//! - `message`: chat message types (`MessageRole`, `MessageContent`, `ChatMessage`)
//! - `model`: sessions and the persisted store (`Session`, `ChatData`)
//! - `repository`: repository trait for chat-data persistence
//! - `store`: session lifecycle management (`SessionStore`)
//!
//! # Usage
//!
//! ```ignore
//! use chorus_core::session::{ChatData, SessionRepository, SessionStore};
//! use chorus_core::session::{ChatMessage, MessageContent, MessageRole};
//! ```

mod message;
mod model;
mod repository;
mod store;

pub use message::{ChatMessage, MessageContent, MessageRole};
pub use model::{ChatData, Session, default_session_name, generate_session_id};
pub use repository::SessionRepository;
pub use store::SessionStore;
