use thiserror::Error;

use crate::factory::FactoryError;

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors surfaced by the object pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool was closed; no further borrows or additions are allowed.
    #[error("pool is closed")]
    Closed,
    /// The pool is empty and has no factory to make a new object.
    #[error("no such element: pool is empty and has no factory")]
    Exhausted,
    /// A freshly made object failed activation or validation.
    #[error("could not create a validated object: {0}")]
    NoValidObject(#[source] FactoryError),
    /// `return_object`/`invalidate` without an outstanding borrow.
    #[error("object was not borrowed from this pool")]
    NotBorrowed,
    /// `add_object` on a pool without a factory.
    #[error("cannot add objects without a factory")]
    NoFactory,
    /// A factory hook failed and the failure is the caller's to handle.
    #[error("factory error: {0}")]
    Factory(#[source] FactoryError),
}
