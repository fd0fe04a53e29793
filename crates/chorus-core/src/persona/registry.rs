//! Ordered persona registry with an active prefix.

use super::model::Persona;
use crate::error::{ChorusError, Result};
use std::collections::HashSet;

/// Holds the configured personas in registry order.
///
/// The first `active_limit` personas form the active set that takes part in
/// rounds. The registry is immutable once built.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    personas: Vec<Persona>,
    active_limit: usize,
}

impl PersonaRegistry {
    /// Builds a registry, rejecting an empty list, empty names and duplicates.
    pub fn new(personas: Vec<Persona>, active_limit: usize) -> Result<Self> {
        if personas.is_empty() {
            return Err(ChorusError::config("at least one persona must be configured"));
        }

        let mut seen = HashSet::new();
        for persona in &personas {
            if persona.name.trim().is_empty() {
                return Err(ChorusError::config("persona name must not be empty"));
            }
            if !seen.insert(persona.name.as_str()) {
                return Err(ChorusError::config(format!(
                    "duplicate persona name '{}'",
                    persona.name
                )));
            }
        }

        Ok(Self {
            personas,
            active_limit,
        })
    }

    /// All configured personas in registry order.
    pub fn all(&self) -> &[Persona] {
        &self.personas
    }

    /// The active prefix of the registry.
    pub fn active(&self) -> &[Persona] {
        let count = self.active_limit.min(self.personas.len());
        &self.personas[..count]
    }

    /// The configured active count, which may exceed the number of personas.
    pub fn active_limit(&self) -> usize {
        self.active_limit
    }

    /// Looks up an active persona by name.
    pub fn find_active(&self, name: &str) -> Option<&Persona> {
        self.active().iter().find(|persona| persona.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn personas(names: &[&str]) -> Vec<Persona> {
        names.iter().map(|n| Persona::new(*n, "m")).collect()
    }

    #[test]
    fn test_active_prefix() {
        let registry = PersonaRegistry::new(personas(&["A", "B", "C"]), 2).unwrap();
        let names: Vec<_> = registry.active().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert!(registry.find_active("C").is_none());
        assert_eq!(registry.all().len(), 3);
    }

    #[test]
    fn test_active_limit_larger_than_registry() {
        let registry = PersonaRegistry::new(personas(&["A", "B"]), 5).unwrap();
        assert_eq!(registry.active().len(), 2);
        assert_eq!(registry.active_limit(), 5);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = PersonaRegistry::new(personas(&["A", "A"]), 2).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_empty_registry_rejected() {
        assert!(PersonaRegistry::new(Vec::new(), 5).unwrap_err().is_config());
    }
}
