//! Persona domain module.
//!
//! - `model`: the `Persona` entity
//! - `registry`: ordered registry with the active prefix

mod model;
mod registry;

pub use model::Persona;
pub use registry::PersonaRegistry;
