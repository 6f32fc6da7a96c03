//! Lifecycle hooks for pooled objects.

/// Error type returned by factory hooks.
pub type FactoryError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Creates, checks and tears down the objects held by an `ObjectPool`.
///
/// Only `make` is required; the remaining hooks default to no-ops that accept
/// every object.
pub trait ObjectFactory<T>: Send + Sync {
    /// Creates a new object.
    fn make(&self) -> Result<T, FactoryError>;

    /// Prepares an object right before it is handed to a borrower.
    fn activate(&self, _obj: &mut T) -> Result<(), FactoryError> {
        Ok(())
    }

    /// Returns `false` when the object must not be used or kept.
    fn validate(&self, _obj: &mut T) -> Result<bool, FactoryError> {
        Ok(true)
    }

    /// Resets an object before it goes back to the idle stack.
    fn passivate(&self, _obj: &mut T) -> Result<(), FactoryError> {
        Ok(())
    }

    /// Releases an object for good.
    fn destroy(&self, obj: T) -> Result<(), FactoryError> {
        drop(obj);
        Ok(())
    }
}
