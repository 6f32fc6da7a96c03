//! # Idle Reclamation
//!
//! Idle objects may be discarded under memory pressure without waiting for a
//! timeout. Whoever notices the pressure holds a `Reclaimer` and posts a notice;
//! the pool drains the notices the next time it touches its idle stack
//! (`borrow`, `return_object`, `num_idle`), so idle counts are approximate
//! between drains.

use std::sync::mpsc::{Receiver, Sender};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub(crate) enum ReclaimNotice {
    All,
    IdleFor(Duration),
}

/// Cloneable handle that asks a pool to drop idle objects.
#[derive(Debug, Clone)]
pub struct Reclaimer {
    tx: Sender<ReclaimNotice>,
}

impl Reclaimer {
    pub(crate) fn new(tx: Sender<ReclaimNotice>) -> Self {
        Reclaimer { tx }
    }

    /// Requests that every idle object be reclaimed.
    ///
    /// Returns `false` once the pool is gone.
    pub fn reclaim_idle(&self) -> bool {
        self.tx.send(ReclaimNotice::All).is_ok()
    }

    /// Requests that idle objects unused for at least `age` be reclaimed.
    pub fn reclaim_idle_older_than(&self, age: Duration) -> bool {
        self.tx.send(ReclaimNotice::IdleFor(age)).is_ok()
    }
}

/// Drains pending notices and folds them with the configured idle TTL into one
/// cutoff: idle entries unused for at least the cutoff are reclaimed.
pub(crate) fn pending_cutoff(
    notices: &Receiver<ReclaimNotice>,
    idle_ttl: Option<Duration>,
) -> Option<Duration> {
    let mut cutoff = idle_ttl;
    while let Ok(notice) = notices.try_recv() {
        let age = match notice {
            ReclaimNotice::All => Duration::ZERO,
            ReclaimNotice::IdleFor(age) => age,
        };
        cutoff = Some(cutoff.map_or(age, |current| current.min(age)));
    }
    cutoff
}

pub(crate) fn is_reclaimable(returned_at: Instant, now: Instant, cutoff: Duration) -> bool {
    now.saturating_duration_since(returned_at) >= cutoff
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn folds_notices_into_smallest_cutoff() {
        let (tx, rx) = mpsc::channel();
        let reclaimer = Reclaimer::new(tx);
        assert_eq!(pending_cutoff(&rx, None), None);

        reclaimer.reclaim_idle_older_than(Duration::from_secs(30));
        reclaimer.reclaim_idle_older_than(Duration::from_secs(5));
        assert_eq!(
            pending_cutoff(&rx, Some(Duration::from_secs(60))),
            Some(Duration::from_secs(5))
        );

        reclaimer.reclaim_idle();
        assert_eq!(pending_cutoff(&rx, None), Some(Duration::ZERO));
        // Notices are consumed by the drain.
        assert_eq!(pending_cutoff(&rx, None), None);
    }

    #[test]
    fn reports_dropped_pool() {
        let (tx, rx) = mpsc::channel();
        let reclaimer = Reclaimer::new(tx);
        drop(rx);
        assert!(!reclaimer.reclaim_idle());
    }
}
