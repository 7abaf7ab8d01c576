//! Namespaced registry of passes.
//!
//! Identifiers are `namespace::pass_name`. A registry only grows: there is no
//! way to replace or remove a pass once registered.

use std::sync::OnceLock;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::optimizer::passes::{AlertReturnTypeCast, DeadCodeElimination, DivideToMultiply, Pass};

pub const SEPARATOR: &str = "::";

pub fn pass_identifier(namespace: &str, name: &str) -> String {
    format!("{namespace}{SEPARATOR}{name}")
}

#[derive(Default)]
pub struct PassRegistry {
    passes: IndexMap<String, Box<dyn Pass>>,
}

impl PassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `pass` under `namespace::pass.name()`. An identifier that is
    /// already taken is rejected and the registry is left as it was.
    pub fn register<P: Pass + 'static>(&mut self, namespace: &str, pass: P) -> Result<()> {
        let identifier = pass_identifier(namespace, pass.name());
        if self.passes.contains_key(&identifier) {
            return Err(Error::DuplicateRegistration(identifier));
        }
        debug!(pass = %identifier, "registered pass");
        self.passes.insert(identifier, Box::new(pass));
        Ok(())
    }

    pub fn lookup(&self, identifier: &str) -> Result<&dyn Pass> {
        self.passes
            .get(identifier)
            .map(|pass| pass.as_ref())
            .ok_or_else(|| Error::PassNotFound(identifier.to_string()))
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.passes.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Identifiers in registration order.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.passes.keys().map(String::as_str)
    }
}

/// Registers every builtin pass, in a fixed order.
pub fn register_all_builtin_passes(registry: &mut PassRegistry) -> Result<()> {
    registry.register("common", DivideToMultiply)?;
    registry.register("common", DeadCodeElimination)?;
    registry.register("nn_backend", AlertReturnTypeCast)?;
    Ok(())
}

static GLOBAL_REGISTRY: OnceLock<PassRegistry> = OnceLock::new();

/// Process-wide registry holding the builtin passes, built on first use.
pub fn global_registry() -> Result<&'static PassRegistry> {
    if let Some(registry) = GLOBAL_REGISTRY.get() {
        return Ok(registry);
    }
    let mut registry = PassRegistry::new();
    register_all_builtin_passes(&mut registry)?;
    // A concurrent first call may have won the race; both built the same set.
    Ok(GLOBAL_REGISTRY.get_or_init(|| registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Program;

    struct Named(&'static str);

    impl Pass for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn run(&self, _program: &mut Program) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_distinct_registrations() {
        let mut registry = PassRegistry::new();
        registry.register("common", Named("fold")).unwrap();
        registry.register("backend", Named("fold")).unwrap();
        registry.register("common", Named("prune")).unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.lookup("common::fold").unwrap().name(), "fold");
        assert_eq!(registry.lookup("common::prune").unwrap().name(), "prune");
        assert!(registry.contains("backend::fold"));
        assert_eq!(
            registry.identifiers().collect::<Vec<_>>(),
            vec!["common::fold", "backend::fold", "common::prune"]
        );
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = PassRegistry::new();
        registry.register("common", Named("fold")).unwrap();

        let err = registry.register("common", Named("fold")).unwrap_err();

        assert!(matches!(err, Error::DuplicateRegistration(ref id) if id == "common::fold"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.identifiers().collect::<Vec<_>>(), vec!["common::fold"]);
    }

    #[test]
    fn test_unknown_lookup() {
        let registry = PassRegistry::new();
        assert!(registry.is_empty());
        let err = registry.lookup("common::missing").err().unwrap();
        assert!(matches!(err, Error::PassNotFound(ref id) if id == "common::missing"));
        assert_eq!(err.to_string(), "no pass registered as 'common::missing'");
    }

    #[test]
    fn test_lookup_needs_full_identifier() {
        let mut registry = PassRegistry::new();
        registry.register("common", Named("fold")).unwrap();
        assert!(registry.lookup("fold").is_err());
        assert!(registry.lookup("common::").is_err());
    }

    #[test]
    fn test_global_registry_has_builtins() {
        let registry = global_registry().unwrap();
        assert_eq!(
            registry.identifiers().collect::<Vec<_>>(),
            vec![
                "common::divide_to_multiply",
                "common::dead_code_elimination",
                "nn_backend::alert_return_type_cast",
            ]
        );
        assert!(std::ptr::eq(registry, global_registry().unwrap()));
    }

    #[test]
    fn test_builtins_registered_twice_fail() {
        let mut registry = PassRegistry::new();
        register_all_builtin_passes(&mut registry).unwrap();
        assert!(matches!(
            register_all_builtin_passes(&mut registry),
            Err(Error::DuplicateRegistration(_))
        ));
        assert_eq!(registry.len(), 3);
    }
}
