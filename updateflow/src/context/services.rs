//! Scoped services handed to every update context.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// A typed service container keyed by type.
///
/// Cloning is cheap; containers are built once and shared by every context
/// of a bot.
#[derive(Clone, Default)]
pub struct Services {
    inner: Arc<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Services {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a service, replacing any previous one of the same type.
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, service: T) -> Self {
        Arc::make_mut(&mut self.inner).insert(TypeId::of::<T>(), Arc::new(service));
        self
    }

    /// Looks up a service by type.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|svc| svc.downcast::<T>().ok())
    }

    /// Returns the number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if no service is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Greeting(&'static str);

    #[test]
    fn test_services_lookup_by_type() {
        let services = Services::new().with(Greeting("hello")).with(5_u32);

        assert_eq!(services.get::<Greeting>().as_deref(), Some(&Greeting("hello")));
        assert_eq!(services.get::<u32>().as_deref(), Some(&5));
        assert!(services.get::<String>().is_none());
        assert_eq!(services.len(), 2);
    }

    #[test]
    fn test_services_clone_is_independent_after_with() {
        let base = Services::new().with(1_u8);
        let extended = base.clone().with(2_u16);

        assert_eq!(base.len(), 1);
        assert_eq!(extended.len(), 2);
    }
}
