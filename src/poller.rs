//! Poll-until-done helper for server-side asynchronous operations.
//!
//! The booking API answers searches and reservations asynchronously: the
//! create call returns an id, and a status endpoint has to be polled until it
//! stops reporting the operation as pending. [`AsyncOperationPoller`] owns that
//! loop so each endpoint only has to translate one poll response into a
//! [`PollResult`].

use crate::config::PollConfig;
use crate::error::ApiError;
use std::future::Future;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Outcome of a single poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult<T> {
    Pending,
    Ready(T),
}

impl<T> PollResult<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, PollResult::Pending)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PollResult<U> {
        match self {
            PollResult::Pending => PollResult::Pending,
            PollResult::Ready(payload) => PollResult::Ready(f(payload)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AsyncOperationPoller {
    config: PollConfig,
}

impl AsyncOperationPoller {
    pub fn new(config: PollConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Polls `operation_id` until `poll_fn` reports a terminal payload.
    ///
    /// Errors returned by `poll_fn` end the loop immediately; only an explicit
    /// [`PollResult::Pending`] leads to another attempt.
    pub async fn poll_until_complete<T, F, Fut>(
        &self,
        operation_id: &str,
        poll_fn: F,
    ) -> Result<T, ApiError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<PollResult<T>, ApiError>>,
    {
        self.poll_with_cancellation(operation_id, poll_fn, &CancellationToken::new())
            .await
    }

    /// Same as [`poll_until_complete`](Self::poll_until_complete), but the loop
    /// also stops as soon as `cancel` fires, including in the middle of a wait.
    pub async fn poll_with_cancellation<T, F, Fut>(
        &self,
        operation_id: &str,
        mut poll_fn: F,
        cancel: &CancellationToken,
    ) -> Result<T, ApiError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<PollResult<T>, ApiError>>,
    {
        let started = Instant::now();
        let deadline = self
            .config
            .timeout()
            .and_then(|timeout| started.checked_add(timeout));
        let mut attempts: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(ApiError::PollCancelled {
                    operation_id: operation_id.to_string(),
                });
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(ApiError::PollTimeout {
                        operation_id: operation_id.to_string(),
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    });
                }
            }

            attempts += 1;
            debug!(operation_id, attempt = attempts, "polling operation");

            match poll_fn(operation_id.to_string()).await? {
                PollResult::Ready(payload) => {
                    debug!(
                        operation_id,
                        attempts,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "operation complete"
                    );
                    return Ok(payload);
                }
                PollResult::Pending => {
                    if let Some(max_attempts) = self.config.max_attempts {
                        if attempts >= max_attempts {
                            return Err(ApiError::PollAttemptsExhausted {
                                operation_id: operation_id.to_string(),
                                attempts,
                            });
                        }
                    }

                    // The wait never runs past the deadline
                    let mut wake_at = Instant::now() + self.config.interval();
                    if let Some(deadline) = deadline {
                        wake_at = wake_at.min(deadline);
                    }

                    trace!(operation_id, interval_ms = self.config.interval_ms, "still pending");
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return Err(ApiError::PollCancelled {
                                operation_id: operation_id.to_string(),
                            });
                        }
                        _ = sleep_until(wake_at) => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use test_case::test_case;
    use tokio::time::sleep;

    // Hands out the scripted responses in order, counting calls
    struct Script<T> {
        responses: Mutex<VecDeque<Result<PollResult<T>, ApiError>>>,
        calls: AtomicU32,
    }

    impl<T> Script<T> {
        fn new(responses: Vec<Result<PollResult<T>, ApiError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn next(&self) -> Result<PollResult<T>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .pop_front()
                .unwrap_or(Ok(PollResult::Pending))
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn poller(config: PollConfig) -> AsyncOperationPoller {
        AsyncOperationPoller::new(config)
    }

    #[test_case(0 ; "ready on first poll")]
    #[test_case(1 ; "one pending poll")]
    #[test_case(5 ; "five pending polls")]
    #[tokio::test(start_paused = true)]
    async fn test_returns_final_payload_after_k_plus_one_calls(pending: u32) {
        let mut responses: Vec<Result<PollResult<Vec<u32>>, ApiError>> =
            (0..pending).map(|_| Ok(PollResult::Pending)).collect();
        responses.push(Ok(PollResult::Ready(vec![pending])));
        let script = Script::new(responses);

        let started = Instant::now();
        let s = script.clone();
        let payload = poller(PollConfig::default())
            .poll_until_complete("op-1", move |_| {
                let s = s.clone();
                async move { s.next() }
            })
            .await
            .unwrap();

        assert_eq!(payload, vec![pending]);
        assert_eq!(script.calls(), pending + 1);
        // One interval slept per pending response, none after the terminal one
        assert_eq!(started.elapsed(), Duration::from_secs(pending as u64));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_pending_then_payload() {
        let script = Script::new(vec![
            Ok(PollResult::Pending),
            Ok(PollResult::Pending),
            Ok(PollResult::Ready(vec![1, 2, 3])),
        ]);

        let s = script.clone();
        let payload = poller(PollConfig::default())
            .poll_until_complete("search-123", move |_| {
                let s = s.clone();
                async move { s.next() }
            })
            .await
            .unwrap();

        assert_eq!(payload, vec![1, 2, 3]);
        assert_eq!(script.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_payload_is_terminal() {
        let script = Script::new(vec![Ok(PollResult::Ready(Vec::<u32>::new()))]);

        let started = Instant::now();
        let s = script.clone();
        let payload = poller(PollConfig::default())
            .poll_until_complete("search-empty", move |_| {
                let s = s.clone();
                async move { s.next() }
            })
            .await
            .unwrap();

        assert!(payload.is_empty());
        assert_eq!(script.calls(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_is_not_retried() {
        let script: Arc<Script<Vec<u32>>> = Script::new(vec![
            Ok(PollResult::Pending),
            Err(ApiError::Transport(TransportError::Status {
                status_code: 502,
                message: "Bad Gateway".to_string(),
            })),
            Ok(PollResult::Ready(vec![1])),
        ]);

        let s = script.clone();
        let result = poller(PollConfig::default())
            .poll_until_complete("op-err", move |_| {
                let s = s.clone();
                async move { s.next() }
            })
            .await;

        match result {
            Err(ApiError::Transport(err)) => assert_eq!(err.status_code(), Some(502)),
            other => panic!("Expected transport error, got {:?}", other),
        }
        assert_eq!(script.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_protocol_error_is_fatal() {
        let script: Arc<Script<()>> =
            Script::new(vec![Err(ApiError::Protocol("missing field".to_string()))]);

        let s = script.clone();
        let result = poller(PollConfig::default())
            .poll_until_complete("op-bad", move |_| {
                let s = s.clone();
                async move { s.next() }
            })
            .await;

        assert!(matches!(result, Err(ApiError::Protocol(_))));
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_attempts_bound() {
        let script: Arc<Script<()>> = Script::new(vec![]);

        let s = script.clone();
        let result = poller(PollConfig::default().with_max_attempts(4))
            .poll_until_complete("op-slow", move |_| {
                let s = s.clone();
                async move { s.next() }
            })
            .await;

        match result {
            Err(ApiError::PollAttemptsExhausted {
                operation_id,
                attempts,
            }) => {
                assert_eq!(operation_id, "op-slow");
                assert_eq!(attempts, 4);
            }
            other => panic!("Expected exhausted attempts, got {:?}", other),
        }
        assert_eq!(script.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_bound() {
        let script: Arc<Script<()>> = Script::new(vec![]);

        let s = script.clone();
        let result = poller(PollConfig::default().with_timeout_ms(2500))
            .poll_until_complete("op-slow", move |_| {
                let s = s.clone();
                async move { s.next() }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_poll_abort());
        assert!(matches!(err, ApiError::PollTimeout { elapsed_ms: 2500, .. }));
        // Polls at t=0s, 1s and 2s; the last wait is cut short at the deadline
        assert_eq!(script.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_shorter_than_interval() {
        let script: Arc<Script<()>> = Script::new(vec![]);

        let started = Instant::now();
        let s = script.clone();
        let config = PollConfig {
            interval_ms: 60_000,
            max_attempts: None,
            timeout_ms: Some(100),
        };
        let result = poller(config)
            .poll_until_complete("op-slow", move |_| {
                let s = s.clone();
                async move { s.next() }
            })
            .await;

        assert!(matches!(result, Err(ApiError::PollTimeout { elapsed_ms: 100, .. })));
        assert_eq!(script.calls(), 1);
        assert_eq!(started.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_wait() {
        let script: Arc<Script<()>> = Script::new(vec![]);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(1500)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let s = script.clone();
        let result = poller(PollConfig::default())
            .poll_with_cancellation(
                "op-stuck",
                move |_| {
                    let s = s.clone();
                    async move { s.next() }
                },
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(ApiError::PollCancelled { .. })));
        assert_eq!(script.calls(), 2);
        assert_eq!(started.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_poll() {
        let script: Arc<Script<()>> = Script::new(vec![Ok(PollResult::Ready(()))]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let s = script.clone();
        let result = poller(PollConfig::default())
            .poll_with_cancellation(
                "op-never",
                move |_| {
                    let s = s.clone();
                    async move { s.next() }
                },
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(ApiError::PollCancelled { .. })));
        assert_eq!(script.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_fn_receives_operation_id() {
        let seen = Arc::new(Mutex::new(Vec::new()));

        let recorder = seen.clone();
        let payload = poller(PollConfig::default())
            .poll_until_complete("search-42", move |id| {
                let recorder = recorder.clone();
                async move {
                    let mut seen = recorder.lock();
                    seen.push(id);
                    if seen.len() < 2 {
                        Ok::<_, ApiError>(PollResult::Pending)
                    } else {
                        Ok(PollResult::Ready("done"))
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(payload, "done");
        assert_eq!(*seen.lock(), vec!["search-42".to_string(), "search-42".to_string()]);
    }

    #[test]
    fn test_poll_result_map() {
        assert_eq!(PollResult::Ready(2).map(|n| n * 10), PollResult::Ready(20));
        assert!(PollResult::<u8>::Pending.map(|n| n + 1).is_pending());
    }
}
