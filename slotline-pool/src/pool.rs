//! # Object Pool
//!
//! Purpose: Hand out validated objects to one caller at a time and take them
//! back for reuse.
//!
//! ## Design Principles
//! 1. **LIFO Reuse**: The most recently returned object is the warmest one.
//! 2. **Minimal Locking**: Hold the mutex only while moving idle entries and
//!    adjusting counters; factory hooks and destroys run unlocked.
//! 3. **Exact Accounting**: `active` moves by exactly one per successful
//!    borrow and per matching return/invalidate.
//! 4. **Quiet Teardown**: Failures while destroying or passivating during a
//!    return are logged, never raised over the return itself.
//!
//! ## Structure Overview
//!
//! ```text
//! ObjectPool<T> (Clone)
//!   └── inner: Arc<PoolInner<T>>
//!         ├── factory: Option<Box<dyn ObjectFactory<T>>>
//!         ├── config: PoolConfig { max_idle, idle_ttl }
//!         ├── reclaim_tx: Sender<ReclaimNotice>   (cloned into Reclaimers)
//!         └── state: Mutex<PoolState<T>>
//!               ├── idle: Vec<IdleEntry<T>>   (top of stack = last)
//!               ├── notices: Receiver<ReclaimNotice>
//!               ├── active: usize
//!               └── closed: bool
//! ```

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{PoolError, PoolResult};
use crate::factory::{FactoryError, ObjectFactory};
use crate::reclaim::{is_reclaimable, pending_cutoff, ReclaimNotice, Reclaimer};

/// Idle-retention policy.
#[derive(Debug, Clone, Default)]
pub struct PoolConfig {
    /// Maximum idle objects kept; pushing past it evicts the oldest.
    pub max_idle: Option<usize>,
    /// Idle objects unused for this long are reclaimed on the next drain.
    pub idle_ttl: Option<Duration>,
}

struct IdleEntry<T> {
    object: T,
    returned_at: Instant,
}

struct PoolState<T> {
    idle: Vec<IdleEntry<T>>,
    notices: Receiver<ReclaimNotice>,
    active: usize,
    closed: bool,
}

impl<T> PoolState<T> {
    /// Removes idle entries that were reclaimed since the last drain.
    fn drain_reclaimed(&mut self, idle_ttl: Option<Duration>) -> Vec<T> {
        let cutoff = match pending_cutoff(&self.notices, idle_ttl) {
            Some(cutoff) => cutoff,
            None => return Vec::new(),
        };
        let now = Instant::now();
        let (reclaimed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.idle)
            .into_iter()
            .partition(|entry| is_reclaimable(entry.returned_at, now, cutoff));
        self.idle = kept;
        reclaimed.into_iter().map(|entry| entry.object).collect()
    }

    /// Pushes an idle entry and returns whatever the idle cap evicted.
    fn push_idle(&mut self, object: T, max_idle: Option<usize>) -> Vec<T> {
        self.idle.push(IdleEntry {
            object,
            returned_at: Instant::now(),
        });
        let excess = match max_idle {
            Some(max) if self.idle.len() > max => self.idle.len() - max,
            _ => return Vec::new(),
        };
        self.idle.drain(..excess).map(|entry| entry.object).collect()
    }
}

struct PoolInner<T> {
    factory: Option<Box<dyn ObjectFactory<T>>>,
    config: PoolConfig,
    reclaim_tx: Sender<ReclaimNotice>,
    state: Mutex<PoolState<T>>,
}

impl<T> PoolInner<T> {
    fn destroy_quietly(&self, obj: T) {
        if let Some(factory) = &self.factory {
            if let Err(err) = factory.destroy(obj) {
                tracing::warn!(error = %err, "failed to destroy pooled object");
            }
        }
    }

    fn destroy_all_quietly(&self, objects: Vec<T>) {
        for obj in objects {
            self.destroy_quietly(obj);
        }
    }
}

/// Pool handle; clones share the same idle stack and counters.
pub struct ObjectPool<T> {
    inner: Arc<PoolInner<T>>,
}

impl<T> Clone for ObjectPool<T> {
    fn clone(&self) -> Self {
        ObjectPool {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ObjectPool")
            .field("idle", &state.idle.len())
            .field("active", &state.active)
            .field("closed", &state.closed)
            .finish()
    }
}

impl<T> ObjectPool<T> {
    /// Creates a pool that manufactures objects on demand through `factory`.
    pub fn new<F>(factory: F, config: PoolConfig) -> Self
    where
        F: ObjectFactory<T> + 'static,
    {
        Self::build(Some(Box::new(factory)), config)
    }

    /// Creates a pool that only recycles objects handed to it via `offer`.
    ///
    /// Borrowing from an empty factoryless pool fails with `Exhausted`.
    pub fn without_factory(config: PoolConfig) -> Self {
        Self::build(None, config)
    }

    fn build(factory: Option<Box<dyn ObjectFactory<T>>>, config: PoolConfig) -> Self {
        let (reclaim_tx, notices) = mpsc::channel();
        let state = PoolState {
            idle: Vec::with_capacity(config.max_idle.unwrap_or(8)),
            notices,
            active: 0,
            closed: false,
        };
        ObjectPool {
            inner: Arc::new(PoolInner {
                factory,
                config,
                reclaim_tx,
                state: Mutex::new(state),
            }),
        }
    }

    /// Returns a handle that can reclaim this pool's idle objects.
    pub fn reclaimer(&self) -> Reclaimer {
        Reclaimer::new(self.inner.reclaim_tx.clone())
    }

    /// Borrows an object.
    ///
    /// **Logic**:
    /// 1. Pop the most recently returned idle entry, skipping reclaimed ones.
    /// 2. If none is left, make a new object (or fail with `Exhausted`).
    /// 3. Activate and validate; on failure destroy it, then retry with the next
    ///    idle entry, or fail with `NoValidObject` if it was freshly made.
    /// 4. Count the borrow.
    pub fn borrow(&self) -> PoolResult<T> {
        loop {
            let (candidate, reclaimed) = {
                let mut state = self.inner.state.lock();
                if state.closed {
                    return Err(PoolError::Closed);
                }
                let reclaimed = state.drain_reclaimed(self.inner.config.idle_ttl);
                (state.idle.pop(), reclaimed)
            };
            self.inner.destroy_all_quietly(reclaimed);

            let (mut obj, newly_created) = match candidate {
                Some(entry) => (entry.object, false),
                None => match &self.inner.factory {
                    Some(factory) => (factory.make().map_err(PoolError::Factory)?, true),
                    None => return Err(PoolError::Exhausted),
                },
            };

            if let Err(err) = self.activate_and_validate(&mut obj) {
                self.inner.destroy_quietly(obj);
                if newly_created {
                    return Err(PoolError::NoValidObject(err));
                }
                tracing::debug!(error = %err, "discarding idle object that failed validation");
                continue;
            }

            let mut state = self.inner.state.lock();
            if state.closed {
                drop(state);
                self.inner.destroy_quietly(obj);
                return Err(PoolError::Closed);
            }
            state.active += 1;
            return Ok(obj);
        }
    }

    /// Borrows an object wrapped in a guard that returns it on drop.
    pub fn get(&self) -> PoolResult<Pooled<T>> {
        let object = self.borrow()?;
        Ok(Pooled {
            pool: self.clone(),
            object: Some(object),
            broken: false,
        })
    }

    fn activate_and_validate(&self, obj: &mut T) -> Result<(), FactoryError> {
        let factory = match &self.inner.factory {
            Some(factory) => factory,
            None => return Ok(()),
        };
        factory.activate(obj)?;
        if !factory.validate(obj)? {
            return Err("validation failed".into());
        }
        Ok(())
    }

    /// Returns a borrowed object.
    ///
    /// The object is validated then passivated; if either step fails, or the
    /// pool is closed, it is destroyed instead of kept. `active` drops by one
    /// on every path. A validation error is raised after that accounting;
    /// passivate and destroy errors are only logged.
    pub fn return_object(&self, mut obj: T) -> PoolResult<()> {
        let mut validate_error = None;
        let mut keep = true;
        if let Some(factory) = &self.inner.factory {
            match factory.validate(&mut obj) {
                Ok(true) => {
                    if let Err(err) = factory.passivate(&mut obj) {
                        tracing::warn!(error = %err, "failed to passivate returned object");
                        keep = false;
                    }
                }
                Ok(false) => keep = false,
                Err(err) => {
                    validate_error = Some(err);
                    keep = false;
                }
            }
        }

        let discard = {
            let mut state = self.inner.state.lock();
            if state.active == 0 {
                drop(state);
                self.inner.destroy_quietly(obj);
                return Err(PoolError::NotBorrowed);
            }
            state.active -= 1;

            let mut discard = state.drain_reclaimed(self.inner.config.idle_ttl);
            if keep && !state.closed {
                discard.extend(state.push_idle(obj, self.inner.config.max_idle));
            } else {
                discard.push(obj);
            }
            discard
        };
        self.inner.destroy_all_quietly(discard);

        match validate_error {
            Some(err) => Err(PoolError::Factory(err)),
            None => Ok(()),
        }
    }

    /// Destroys a borrowed object that must not be reused, e.g. a broken
    /// connection.
    pub fn invalidate(&self, obj: T) -> PoolResult<()> {
        let balanced = {
            let mut state = self.inner.state.lock();
            if state.active == 0 {
                false
            } else {
                state.active -= 1;
                true
            }
        };
        if !balanced {
            self.inner.destroy_quietly(obj);
            return Err(PoolError::NotBorrowed);
        }

        match &self.inner.factory {
            Some(factory) => factory.destroy(obj).map_err(PoolError::Factory),
            None => Ok(()),
        }
    }

    /// Makes a new object and parks it in the idle stack.
    ///
    /// An object that fails validation is destroyed silently.
    pub fn add_object(&self) -> PoolResult<()> {
        if self.inner.state.lock().closed {
            return Err(PoolError::Closed);
        }
        let factory = self.inner.factory.as_ref().ok_or(PoolError::NoFactory)?;
        let obj = factory.make().map_err(PoolError::Factory)?;
        self.park(obj)
    }

    /// Parks an externally created object in the idle stack.
    pub fn offer(&self, obj: T) -> PoolResult<()> {
        if self.inner.state.lock().closed {
            self.inner.destroy_quietly(obj);
            return Err(PoolError::Closed);
        }
        self.park(obj)
    }

    fn park(&self, mut obj: T) -> PoolResult<()> {
        if let Some(factory) = &self.inner.factory {
            match factory.validate(&mut obj) {
                Ok(true) => {}
                Ok(false) => {
                    self.inner.destroy_quietly(obj);
                    return Ok(());
                }
                Err(err) => {
                    self.inner.destroy_quietly(obj);
                    return Err(PoolError::Factory(err));
                }
            }
            if let Err(err) = factory.passivate(&mut obj) {
                self.inner.destroy_quietly(obj);
                return Err(PoolError::Factory(err));
            }
        }

        let evicted = {
            let mut state = self.inner.state.lock();
            if state.closed {
                vec![obj]
            } else {
                state.push_idle(obj, self.inner.config.max_idle)
            }
        };
        self.inner.destroy_all_quietly(evicted);
        Ok(())
    }

    /// Number of idle objects after draining pending reclaim notices.
    ///
    /// Reclamation can happen right after this returns, so treat the count as
    /// an estimate.
    pub fn num_idle(&self) -> usize {
        let (idle, reclaimed) = {
            let mut state = self.inner.state.lock();
            let reclaimed = state.drain_reclaimed(self.inner.config.idle_ttl);
            (state.idle.len(), reclaimed)
        };
        self.inner.destroy_all_quietly(reclaimed);
        idle
    }

    /// Number of objects currently borrowed.
    pub fn num_active(&self) -> usize {
        self.inner.state.lock().active
    }

    /// Destroys every idle object. Destroy failures are logged and the sweep
    /// continues.
    pub fn clear(&self) {
        let idle = {
            let mut state = self.inner.state.lock();
            while state.notices.try_recv().is_ok() {}
            std::mem::take(&mut state.idle)
        };
        self.inner
            .destroy_all_quietly(idle.into_iter().map(|entry| entry.object).collect());
    }

    /// Closes the pool. Later borrows and additions fail with `Closed`;
    /// borrowed objects are destroyed when they come back. Idempotent.
    pub fn close(&self) {
        let first = {
            let mut state = self.inner.state.lock();
            !std::mem::replace(&mut state.closed, true)
        };
        if first {
            tracing::debug!("object pool closed");
        }
        self.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }
}

/// RAII wrapper returning an object to its pool on drop.
///
/// Mark the object broken to have it destroyed instead of returned.
pub struct Pooled<T> {
    pool: ObjectPool<T>,
    object: Option<T>,
    broken: bool,
}

impl<T> Pooled<T> {
    /// Flags the object as unusable; it will be invalidated on drop.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// The pool this object came from.
    pub fn pool(&self) -> &ObjectPool<T> {
        &self.pool
    }
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.object.as_ref().expect("pooled object exists")
    }
}

impl<T> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.object.as_mut().expect("pooled object exists")
    }
}

impl<T> Drop for Pooled<T> {
    fn drop(&mut self) {
        let obj = match self.object.take() {
            Some(obj) => obj,
            None => return,
        };

        let result = if self.broken {
            self.pool.invalidate(obj)
        } else {
            self.pool.return_object(obj)
        };
        if let Err(err) = result {
            tracing::warn!(error = %err, broken = self.broken, "failed to release pooled object");
        }
    }
}
