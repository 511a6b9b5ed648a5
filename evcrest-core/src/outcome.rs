//! Quorum policies and write outcome classification.
//!
//! A fan-out write is observed through a latch that reports how many server
//! groups were targeted, how many have finished, and how many of those
//! finished successfully. [`classify`] turns one observation of those counts
//! into a [`WriteOutcome`]; it does not care how the wait was implemented.

use std::fmt;

/// How many server groups must acknowledge a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QuorumPolicy {
    /// Fire and forget.
    None,
    /// Any single group.
    One,
    /// A strict majority of groups.
    Quorum,
    /// Every group except one. Used for all gateway writes.
    #[default]
    AllMinusOne,
    /// Every group.
    All,
}

impl QuorumPolicy {
    /// Acknowledgements required when `groups` server groups are targeted.
    ///
    /// Never exceeds `groups`, and is at least 1 for every policy other than
    /// `None` as long as there is a group to write to.
    pub fn required(&self, groups: usize) -> usize {
        if groups == 0 {
            return 0;
        }
        match self {
            QuorumPolicy::None => 0,
            QuorumPolicy::One => 1,
            QuorumPolicy::Quorum => groups / 2 + 1,
            QuorumPolicy::AllMinusOne => groups.saturating_sub(1).max(1),
            QuorumPolicy::All => groups,
        }
    }
}

/// Counts observed on a latch at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LatchSnapshot {
    pub targeted: usize,
    pub completed: usize,
    pub succeeded: usize,
}

impl LatchSnapshot {
    pub fn new(targeted: usize, completed: usize, succeeded: usize) -> Self {
        Self {
            targeted,
            completed,
            succeeded,
        }
    }

    pub fn failed(&self) -> usize {
        self.completed.saturating_sub(self.succeeded)
    }

    pub fn pending(&self) -> usize {
        self.targeted.saturating_sub(self.completed)
    }
}

/// How a bounded wait on a latch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchWait {
    /// The required number of groups acknowledged within the window.
    Satisfied,
    /// The window elapsed first.
    TimedOut,
    /// Every targeted group reported before the window elapsed, but not
    /// enough of them succeeded. Classified exactly like `TimedOut`.
    Settled,
}

/// Result of a quorum write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// All required groups acknowledged within the window.
    Complete,
    /// The quorum was missed but this many groups (at least one) succeeded.
    PartialSuccess(usize),
    /// Nothing that finished succeeded, or nothing finished at all.
    Failure,
}

impl WriteOutcome {
    /// Whether the gateway reports the write as accepted.
    pub fn is_success(&self) -> bool {
        !matches!(self, WriteOutcome::Failure)
    }

    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            WriteOutcome::Complete => "complete",
            WriteOutcome::PartialSuccess(_) => "partial",
            WriteOutcome::Failure => "failure",
        }
    }
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOutcome::Complete => f.write_str("complete"),
            WriteOutcome::PartialSuccess(n) => write!(f, "partial success in {} server groups", n),
            WriteOutcome::Failure => f.write_str("failure"),
        }
    }
}

/// Classify a write from how its wait ended and the counts seen afterwards.
pub fn classify(wait: LatchWait, snapshot: LatchSnapshot) -> WriteOutcome {
    match wait {
        LatchWait::Satisfied => WriteOutcome::Complete,
        LatchWait::TimedOut | LatchWait::Settled => {
            if snapshot.completed == 0 || snapshot.succeeded == 0 {
                WriteOutcome::Failure
            } else {
                WriteOutcome::PartialSuccess(snapshot.succeeded)
            }
        }
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn snapshot_strategy() -> impl Strategy<Value = LatchSnapshot> {
        (0usize..16)
            .prop_flat_map(|targeted| (Just(targeted), 0..=targeted))
            .prop_flat_map(|(targeted, completed)| {
                (Just(targeted), Just(completed), 0..=completed)
            })
            .prop_map(|(t, c, s)| LatchSnapshot::new(t, c, s))
    }

    proptest! {
        /// Property: an unsatisfied wait is partial exactly when something succeeded,
        /// and the reported count is the success count.
        #[test]
        fn prop_unsatisfied_partial_iff_success(snap in snapshot_strategy()) {
            match classify(LatchWait::TimedOut, snap) {
                WriteOutcome::PartialSuccess(n) => {
                    prop_assert!(n >= 1);
                    prop_assert_eq!(n, snap.succeeded);
                }
                WriteOutcome::Failure => prop_assert_eq!(snap.succeeded, 0),
                WriteOutcome::Complete => prop_assert!(false, "timeout never yields Complete"),
            }
        }

        /// Property: a satisfied wait is always Complete, whatever the counts.
        #[test]
        fn prop_satisfied_always_complete(snap in snapshot_strategy()) {
            prop_assert_eq!(classify(LatchWait::Satisfied, snap), WriteOutcome::Complete);
        }

        /// Property: required acknowledgements never exceed the group count.
        #[test]
        fn prop_required_bounded(groups in 0usize..64) {
            for policy in [
                QuorumPolicy::None,
                QuorumPolicy::One,
                QuorumPolicy::Quorum,
                QuorumPolicy::AllMinusOne,
                QuorumPolicy::All,
            ] {
                prop_assert!(policy.required(groups) <= groups);
            }
        }
    }
}
