//! Quorum write coordination.

use std::time::Duration;

use bytes::Bytes;
use evcrest_core::{
    classify, CacheOperationError, CacheValue, Flag, LatchWait, QuorumPolicy, Ttl, WriteOutcome,
    WriteRequest,
};

use crate::traits::CacheClient;

/// How long a write waits for its acknowledgements. Not caller-configurable.
pub const QUORUM_WAIT: Duration = Duration::from_millis(2500);

/// Every gateway write asks all server groups but one to acknowledge.
pub const WRITE_POLICY: QuorumPolicy = QuorumPolicy::AllMinusOne;

/// Issues fan-out writes and classifies how far they got.
///
/// The wait is bounded and the in-flight write is never cancelled: groups
/// that finish after the window still apply the write, but the outcome only
/// reflects what had been observed when the window closed.
#[derive(Debug, Clone)]
pub struct QuorumCoordinator {
    wait: Duration,
    policy: QuorumPolicy,
}

impl Default for QuorumCoordinator {
    fn default() -> Self {
        Self {
            wait: QUORUM_WAIT,
            policy: WRITE_POLICY,
        }
    }
}

impl QuorumCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    pub fn policy(&self) -> QuorumPolicy {
        self.policy
    }

    /// Write `payload` under `key`, annotated with `flag` when given.
    ///
    /// Submission errors come back as `Err`; a write that was submitted but
    /// missed its quorum is `Ok(WriteOutcome::Failure)`.
    pub async fn write_with_quorum(
        &self,
        client: &dyn CacheClient,
        key: &str,
        payload: Bytes,
        ttl: Ttl,
        flag: Option<Flag>,
    ) -> Result<WriteOutcome, CacheOperationError> {
        let value = match flag {
            Some(flag) => CacheValue::annotated(payload, flag),
            None => CacheValue::raw(payload),
        };

        let latch = client.write(key, value, ttl, self.policy).await.inspect_err(|e| {
            tracing::error!(
                tenant = %client.tenant(),
                key,
                error = %e,
                "Cache write submission failed"
            );
        })?;

        let Some(latch) = latch else {
            tracing::error!(
                tenant = %client.tenant(),
                key,
                "Cache write returned no completion latch"
            );
            return Ok(WriteOutcome::Failure);
        };

        let wait = latch.await_completion(self.wait).await;
        let snapshot = latch.snapshot();
        let outcome = classify(wait, snapshot);

        match outcome {
            WriteOutcome::Complete => tracing::debug!(
                tenant = %client.tenant(),
                key,
                targeted = snapshot.targeted,
                succeeded = snapshot.succeeded,
                "Write acknowledged"
            ),
            WriteOutcome::PartialSuccess(n) => tracing::warn!(
                tenant = %client.tenant(),
                key,
                targeted = snapshot.targeted,
                completed = snapshot.completed,
                succeeded = n,
                timed_out = wait == LatchWait::TimedOut,
                "Write quorum missed, partial success"
            ),
            WriteOutcome::Failure => tracing::error!(
                tenant = %client.tenant(),
                key,
                targeted = snapshot.targeted,
                completed = snapshot.completed,
                timed_out = wait == LatchWait::TimedOut,
                "Write quorum failed"
            ),
        }

        Ok(outcome)
    }

    /// Write a validated request.
    pub async fn write(
        &self,
        client: &dyn CacheClient,
        request: &WriteRequest,
    ) -> Result<WriteOutcome, CacheOperationError> {
        self.write_with_quorum(
            client,
            &request.key,
            request.payload.clone(),
            request.ttl,
            request.flag,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use evcrest_core::{CacheOperation, LatchSnapshot, TenantId};

    use crate::traits::WriteLatch;

    /// Latch that reports a fixed wait result and fixed counts.
    struct FixedLatch {
        wait: LatchWait,
        snapshot: LatchSnapshot,
        waited_for: Mutex<Option<Duration>>,
    }

    #[async_trait]
    impl WriteLatch for FixedLatch {
        fn targeted(&self) -> usize {
            self.snapshot.targeted
        }

        fn completed(&self) -> usize {
            self.snapshot.completed
        }

        fn succeeded(&self) -> usize {
            self.snapshot.succeeded
        }

        async fn await_completion(&self, timeout: Duration) -> LatchWait {
            if let Ok(mut waited) = self.waited_for.lock() {
                *waited = Some(timeout);
            }
            self.wait
        }
    }

    enum Reply {
        Latch(Arc<FixedLatch>),
        NoLatch,
        Error,
    }

    struct ScriptedClient {
        tenant: TenantId,
        reply: Reply,
        written: Mutex<Vec<(String, CacheValue, Ttl, QuorumPolicy)>>,
    }

    impl ScriptedClient {
        fn new(reply: Reply) -> Self {
            Self {
                tenant: TenantId::parse("app").unwrap(),
                reply,
                written: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CacheClient for ScriptedClient {
        fn tenant(&self) -> &TenantId {
            &self.tenant
        }

        fn server_groups(&self) -> usize {
            5
        }

        async fn write(
            &self,
            key: &str,
            value: CacheValue,
            ttl: Ttl,
            policy: QuorumPolicy,
        ) -> Result<Option<Arc<dyn WriteLatch>>, CacheOperationError> {
            self.written
                .lock()
                .unwrap()
                .push((key.to_string(), value, ttl, policy));
            match &self.reply {
                Reply::Latch(latch) => Ok(Some(latch.clone() as Arc<dyn WriteLatch>)),
                Reply::NoLatch => Ok(None),
                Reply::Error => Err(CacheOperationError::new(
                    CacheOperation::Write,
                    key,
                    "connection reset",
                )),
            }
        }

        async fn read(&self, _key: &str) -> Result<Option<CacheValue>, CacheOperationError> {
            Ok(None)
        }

        async fn delete(&self, _key: &str) -> Result<Option<Arc<dyn WriteLatch>>, CacheOperationError> {
            Ok(None)
        }
    }

    fn latch(wait: LatchWait, completed: usize, succeeded: usize) -> Arc<FixedLatch> {
        Arc::new(FixedLatch {
            wait,
            snapshot: LatchSnapshot::new(5, completed, succeeded),
            waited_for: Mutex::new(None),
        })
    }

    async fn run(reply: Reply) -> Result<WriteOutcome, CacheOperationError> {
        let client = ScriptedClient::new(reply);
        let ttl = Ttl::from_secs(60).unwrap();
        QuorumCoordinator::new()
            .write_with_quorum(&client, "k", Bytes::from_static(b"v"), ttl, None)
            .await
    }

    #[tokio::test]
    async fn test_all_acknowledged_is_complete() {
        let outcome = run(Reply::Latch(latch(LatchWait::Satisfied, 5, 5))).await;
        assert_eq!(outcome, Ok(WriteOutcome::Complete));
    }

    #[tokio::test]
    async fn test_timeout_with_two_of_three_is_partial() {
        let outcome = run(Reply::Latch(latch(LatchWait::TimedOut, 3, 2))).await;
        assert_eq!(outcome, Ok(WriteOutcome::PartialSuccess(2)));
    }

    #[tokio::test]
    async fn test_timeout_with_only_failures_is_failure() {
        let outcome = run(Reply::Latch(latch(LatchWait::TimedOut, 2, 0))).await;
        assert_eq!(outcome, Ok(WriteOutcome::Failure));
    }

    #[tokio::test]
    async fn test_timeout_with_nothing_completed_is_failure() {
        let outcome = run(Reply::Latch(latch(LatchWait::TimedOut, 0, 0))).await;
        assert_eq!(outcome, Ok(WriteOutcome::Failure));
    }

    #[tokio::test]
    async fn test_missing_latch_is_failure_not_success() {
        let outcome = run(Reply::NoLatch).await;
        assert_eq!(outcome, Ok(WriteOutcome::Failure));
    }

    #[tokio::test]
    async fn test_submission_error_is_not_folded_into_failure() {
        let outcome = run(Reply::Error).await;
        let err = outcome.unwrap_err();
        assert_eq!(err.operation, CacheOperation::Write);
        assert_eq!(err.key, "k");
    }

    #[tokio::test]
    async fn test_uses_fixed_wait_and_all_minus_one() {
        let fixed = latch(LatchWait::Satisfied, 5, 5);
        let client = ScriptedClient::new(Reply::Latch(fixed.clone()));
        let ttl = Ttl::from_secs(30).unwrap();

        QuorumCoordinator::new()
            .write_with_quorum(&client, "k", Bytes::from_static(b"v"), ttl, Some(Flag(4)))
            .await
            .unwrap();

        assert_eq!(*fixed.waited_for.lock().unwrap(), Some(Duration::from_millis(2500)));
        let written = client.written.lock().unwrap();
        assert_eq!(written.len(), 1);
        let (key, value, ttl, policy) = &written[0];
        assert_eq!(key, "k");
        assert_eq!(value, &CacheValue::annotated(Bytes::from_static(b"v"), Flag(4)));
        assert_eq!(ttl.as_secs(), 30);
        assert_eq!(*policy, QuorumPolicy::AllMinusOne);
    }

    #[tokio::test]
    async fn test_write_request_without_flag_is_raw() {
        let fixed = latch(LatchWait::Satisfied, 5, 5);
        let client = ScriptedClient::new(Reply::Latch(fixed));
        let request = WriteRequest::parse("app", "k", b"raw".to_vec(), Some("5"), Some("")).unwrap();

        let outcome = QuorumCoordinator::new().write(&client, &request).await;

        assert_eq!(outcome, Ok(WriteOutcome::Complete));
        let written = client.written.lock().unwrap();
        assert_eq!(written[0].1, CacheValue::raw(Bytes::from_static(b"raw")));
    }
}
