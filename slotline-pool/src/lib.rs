//! # Generic Object Pool
//!
//! Purpose: Recycle expensive objects (connections, mostly) across callers
//! without bounding how many may exist at once.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Idle objects are kept on a stack; the most
//!    recently returned one is handed out first.
//! 2. **Factory Hooks**: `ObjectFactory` decides how objects are made, checked
//!    and torn down; the pool only sequences the calls.
//! 3. **Minimal Locking**: The mutex guards the idle stack and counters only;
//!    factory hooks run outside it.
//! 4. **No Backpressure**: An empty pool manufactures a new object instead of
//!    making the caller wait.
//! 5. **Explicit Reclamation**: Idle objects can be dropped under memory
//!    pressure through a `Reclaimer`, observed lazily by the pool.

mod error;
mod factory;
mod pool;
mod reclaim;

pub use error::{PoolError, PoolResult};
pub use factory::{FactoryError, ObjectFactory};
pub use pool::{ObjectPool, PoolConfig, Pooled};
pub use reclaim::Reclaimer;
