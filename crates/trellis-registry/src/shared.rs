//! Build-then-swap publication of a registry shared across threads.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::registry::{BuiltinRegistry, RegistrationError, RegistryBuilder};

/// Process-wide handle to the current registry.
///
/// Readers take a cheap `Arc` snapshot. Extending the registry builds a
/// complete new table and swaps it in whole, so no reader ever observes a
/// partially registered category.
#[derive(Debug, Default)]
pub struct SharedRegistry {
    current: RwLock<Arc<BuiltinRegistry>>,
}

impl SharedRegistry {
    pub fn new(registry: BuiltinRegistry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
        }
    }

    /// The currently published registry.
    pub fn snapshot(&self) -> Arc<BuiltinRegistry> {
        self.current.read().clone()
    }

    /// Publish a registry extended by `extend`.
    ///
    /// On error the previously published registry stays in place.
    pub fn extend<F>(&self, extend: F) -> Result<Arc<BuiltinRegistry>, RegistrationError>
    where
        F: FnOnce(&mut RegistryBuilder) -> Result<(), RegistrationError>,
    {
        let mut guard = self.current.write();
        let mut builder = RegistryBuilder::from_registry(&guard);
        extend(&mut builder)?;
        let next = Arc::new(builder.build());
        *guard = next.clone();
        Ok(next)
    }
}
