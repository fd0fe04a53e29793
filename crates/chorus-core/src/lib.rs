pub mod config;
pub mod eligibility;
pub mod error;
pub mod persona;
pub mod render;
pub mod responder;
pub mod selection;
pub mod session;

// Re-export common error type
pub use error::{ChorusError, Result};
