//! Namespaces of compiled units

use super::CompiledUnit;
use crate::error::CompileFailure;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

/// Compiled units by name
///
/// Every view owns one of these, and the engine owns the shared one. Entries are
/// only added through [`UnitRegistry::define`], which hands out the [`Registration`]
/// that removes the entry again.
pub struct UnitRegistry {
    label: String,
    units: RwLock<HashMap<String, Arc<CompiledUnit>>>,
}

impl UnitRegistry {
    pub fn new(label: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            units: RwLock::new(HashMap::new()),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.units.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<CompiledUnit>> {
        self.units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Register `unit` under its name
    ///
    /// Names are never replaced: defining a taken name is a `Redefinition`.
    pub(crate) fn define(
        self: &Arc<Self>,
        unit: Arc<CompiledUnit>,
    ) -> Result<Registration, CompileFailure> {
        let mut units = self.units.write().unwrap_or_else(PoisonError::into_inner);
        let name = unit.name().to_string();
        if units.contains_key(&name) {
            return Err(CompileFailure::Redefinition {
                name,
                namespace: self.label.clone(),
            });
        }
        units.insert(name.clone(), unit);
        Ok(Registration {
            namespace: Arc::downgrade(self),
            name,
        })
    }

    fn release(&self, name: &str) -> bool {
        self.units
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }
}

impl fmt::Debug for UnitRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitRegistry")
            .field("label", &self.label)
            .field("units", &self.len())
            .finish()
    }
}

/// RAII handle on a registry entry
///
/// Dropping it removes the entry. A namespace that is already gone needs no cleanup.
#[derive(Debug)]
pub struct Registration {
    namespace: Weak<UnitRegistry>,
    name: String,
}

impl Registration {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Label of the namespace the unit is registered in, while it exists
    pub fn namespace(&self) -> Option<String> {
        self.namespace
            .upgrade()
            .map(|namespace| namespace.label().to_string())
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(namespace) = self.namespace.upgrade() {
            if namespace.release(&self.name) {
                tracing::debug!(
                    unit = %self.name,
                    namespace = namespace.label(),
                    "released compiled unit"
                );
            }
        }
    }
}
