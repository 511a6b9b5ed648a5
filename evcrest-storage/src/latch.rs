//! Latch over per-group completions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use evcrest_core::{LatchSnapshot, LatchWait, QuorumPolicy};
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::traits::WriteLatch;

/// One completion in the high half, one success in the low half.
const COMPLETED_ONE: u64 = 1 << 32;
const SUCCEEDED_MASK: u64 = u32::MAX as u64;

/// Tracks completions of one operation across server groups.
///
/// Completed and succeeded counts are packed into a single atomic so a
/// reader never sees a success that has not also been counted as complete.
#[derive(Debug)]
pub struct GroupLatch {
    targeted: usize,
    required: usize,
    counts: AtomicU64,
    notify: Notify,
}

impl GroupLatch {
    pub fn new(targeted: usize, policy: QuorumPolicy) -> Arc<Self> {
        Arc::new(Self {
            targeted,
            required: policy.required(targeted),
            counts: AtomicU64::new(0),
            notify: Notify::new(),
        })
    }

    /// Acknowledgements needed for the wait to be satisfied.
    pub fn required(&self) -> usize {
        self.required
    }

    /// Record that one server group finished.
    pub fn record(&self, success: bool) {
        let delta = if success { COMPLETED_ONE + 1 } else { COMPLETED_ONE };
        self.counts.fetch_add(delta, Ordering::AcqRel);
        self.notify.notify_waiters();
    }

    fn load(&self) -> LatchSnapshot {
        let counts = self.counts.load(Ordering::Acquire);
        LatchSnapshot::new(
            self.targeted,
            (counts >> 32) as usize,
            (counts & SUCCEEDED_MASK) as usize,
        )
    }

    /// `Some` once waiting longer cannot change the answer.
    fn resolved(&self) -> Option<LatchWait> {
        if self.targeted == 0 {
            // Nothing was sent anywhere; there is no acknowledgement to wait for.
            return Some(LatchWait::Settled);
        }
        let snapshot = self.load();
        if snapshot.succeeded >= self.required {
            Some(LatchWait::Satisfied)
        } else if snapshot.completed >= self.targeted {
            Some(LatchWait::Settled)
        } else {
            None
        }
    }
}

#[async_trait]
impl WriteLatch for GroupLatch {
    fn targeted(&self) -> usize {
        self.targeted
    }

    fn completed(&self) -> usize {
        self.load().completed
    }

    fn succeeded(&self) -> usize {
        self.load().succeeded
    }

    fn snapshot(&self) -> LatchSnapshot {
        self.load()
    }

    async fn await_completion(&self, timeout: Duration) -> LatchWait {
        let deadline = Instant::now() + timeout;
        loop {
            // Register before checking so a record() between the check and
            // the await still wakes us.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(wait) = self.resolved() {
                return wait;
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return match self.resolved() {
                    Some(LatchWait::Satisfied) => LatchWait::Satisfied,
                    _ => LatchWait::TimedOut,
                };
            }
        }
    }
}
