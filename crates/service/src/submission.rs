//! Per-screen submission state: `Idle -> Submitting -> {Succeeded, Failed}`.
//!
//! Every submission runs under a child of the screen's cancellation scope.
//! Tearing the screen down (or dropping the [`Submission`]) cancels whatever
//! is still in flight, and a superseded request can never overwrite the
//! state of a newer one.

use std::future::Future;
use std::sync::Arc;

use configs::SubmitPolicy;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::RequestError;

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionState<T> {
    Idle,
    Submitting,
    Succeeded(T),
    Failed(String),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("a submission is already in flight")]
    Busy,
    #[error("submission cancelled")]
    Cancelled,
    #[error(transparent)]
    Request(#[from] RequestError),
}

#[derive(Debug)]
struct Inner<T> {
    state: SubmissionState<T>,
    generation: u64,
    in_flight: Option<CancellationToken>,
}

impl<T> Inner<T> {
    // no-op when a newer submission or a reset already owns the slot
    fn release(&mut self, generation: u64) {
        if self.generation == generation {
            self.in_flight = None;
            self.state = SubmissionState::Idle;
        }
    }
}

/// Frees the slot if the `submit` future is dropped before it settles.
struct InFlight<T: Send + 'static> {
    inner: Arc<Mutex<Inner<T>>>,
    generation: u64,
    token: CancellationToken,
    settled: bool,
}

impl<T: Send + 'static> Drop for InFlight<T> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.token.cancel();
        let generation = self.generation;
        match self.inner.try_lock() {
            Ok(mut inner) => inner.release(generation),
            Err(_) => {
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    let inner = Arc::clone(&self.inner);
                    handle.spawn(async move { inner.lock().await.release(generation) });
                }
            }
        }
        debug!(generation, "submission abandoned before completion");
    }
}

/// Submission slot owned by one screen.
#[derive(Debug)]
pub struct Submission<T> {
    inner: Arc<Mutex<Inner<T>>>,
    scope: CancellationToken,
    policy: SubmitPolicy,
}

impl<T: Clone + Send + 'static> Submission<T> {
    pub fn new(policy: SubmitPolicy) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: SubmissionState::Idle,
                generation: 0,
                in_flight: None,
            })),
            scope: CancellationToken::new(),
            policy,
        }
    }

    pub fn policy(&self) -> SubmitPolicy {
        self.policy
    }

    pub async fn state(&self) -> SubmissionState<T> {
        self.inner.lock().await.state.clone()
    }

    /// Run `work` as this screen's current action and record its outcome.
    ///
    /// A submission that ends up cancelled (replaced, reset, torn down, or
    /// dropped by the caller) leaves the slot `Idle` unless a newer one owns it.
    pub async fn submit<F>(&self, work: F) -> Result<T, SubmitError>
    where
        F: Future<Output = Result<T, RequestError>>,
    {
        if self.scope.is_cancelled() {
            return Err(SubmitError::Cancelled);
        }

        let (generation, token) = {
            let mut inner = self.inner.lock().await;
            if let Some(previous) = inner.in_flight.take() {
                match self.policy {
                    SubmitPolicy::Reject => {
                        inner.in_flight = Some(previous);
                        debug!("submission rejected: another request is in flight");
                        return Err(SubmitError::Busy);
                    }
                    SubmitPolicy::Replace => {
                        info!("replacing in-flight submission");
                        previous.cancel();
                    }
                }
            }
            let token = self.scope.child_token();
            inner.generation += 1;
            inner.state = SubmissionState::Submitting;
            inner.in_flight = Some(token.clone());
            (inner.generation, token)
        };
        let mut guard = InFlight {
            inner: Arc::clone(&self.inner),
            generation,
            token: token.clone(),
            settled: false,
        };

        let outcome = tokio::select! {
            _ = token.cancelled() => Err(SubmitError::Cancelled),
            res = work => res.map_err(SubmitError::from),
        };

        let mut inner = self.inner.lock().await;
        guard.settled = true;
        if inner.generation == generation {
            inner.in_flight = None;
            inner.state = match &outcome {
                Ok(value) => SubmissionState::Succeeded(value.clone()),
                Err(SubmitError::Request(e)) => SubmissionState::Failed(e.user_message()),
                Err(_) => SubmissionState::Idle,
            };
        }
        outcome
    }

    /// Cancel anything in flight and go back to `Idle`.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(token) = inner.in_flight.take() {
            token.cancel();
        }
        inner.generation += 1;
        inner.state = SubmissionState::Idle;
    }

    /// Screen teardown: cancel in-flight work and refuse further submissions.
    pub fn teardown(&self) {
        self.scope.cancel();
    }
}

impl<T> Drop for Submission<T> {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn success_and_failure_transitions() {
        let sub = Submission::<u32>::new(SubmitPolicy::Reject);
        assert_eq!(sub.state().await, SubmissionState::Idle);

        let v = sub.submit(async { Ok(7) }).await.unwrap();
        assert_eq!(v, 7);
        assert_eq!(sub.state().await, SubmissionState::Succeeded(7));

        let err = sub
            .submit(async {
                Err(RequestError::Http { status: 500, message: Some("model offline".into()) })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Request(_)));
        assert_eq!(sub.state().await, SubmissionState::Failed("model offline".into()));

        sub.reset().await;
        assert_eq!(sub.state().await, SubmissionState::Idle);
    }

    #[tokio::test]
    async fn reject_policy_refuses_double_submit() {
        let sub = Arc::new(Submission::<u32>::new(SubmitPolicy::Reject));
        let (tx, rx) = oneshot::channel::<()>();

        let first = {
            let sub = Arc::clone(&sub);
            tokio::spawn(async move {
                sub.submit(async move {
                    let _ = rx.await;
                    Ok(1)
                })
                .await
            })
        };
        while sub.state().await != SubmissionState::Submitting {
            tokio::task::yield_now().await;
        }

        let second = sub.submit(async { Ok(2) }).await;
        assert!(matches!(second, Err(SubmitError::Busy)));
        assert_eq!(sub.state().await, SubmissionState::Submitting);

        tx.send(()).unwrap();
        assert_eq!(first.await.unwrap().unwrap(), 1);
        assert_eq!(sub.state().await, SubmissionState::Succeeded(1));
    }

    #[tokio::test]
    async fn replace_policy_cancels_previous() {
        let sub = Arc::new(Submission::<u32>::new(SubmitPolicy::Replace));

        let first = {
            let sub = Arc::clone(&sub);
            tokio::spawn(async move {
                sub.submit(async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(1)
                })
                .await
            })
        };
        while sub.state().await != SubmissionState::Submitting {
            tokio::task::yield_now().await;
        }

        assert_eq!(sub.submit(async { Ok(2) }).await.unwrap(), 2);
        assert!(matches!(first.await.unwrap(), Err(SubmitError::Cancelled)));
        // the cancelled request did not clobber the newer result
        assert_eq!(sub.state().await, SubmissionState::Succeeded(2));
    }

    #[tokio::test]
    async fn teardown_cancels_in_flight_and_blocks_new_work() {
        let sub = Arc::new(Submission::<u32>::new(SubmitPolicy::Reject));
        let pending = {
            let sub = Arc::clone(&sub);
            tokio::spawn(async move {
                sub.submit(async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(1)
                })
                .await
            })
        };
        while sub.state().await != SubmissionState::Submitting {
            tokio::task::yield_now().await;
        }

        sub.teardown();
        assert!(matches!(pending.await.unwrap(), Err(SubmitError::Cancelled)));
        assert_eq!(sub.state().await, SubmissionState::Idle);
        assert!(matches!(sub.submit(async { Ok(3) }).await, Err(SubmitError::Cancelled)));
    }

    #[tokio::test]
    async fn dropped_submit_frees_the_slot() {
        let sub = Submission::<u32>::new(SubmitPolicy::Reject);
        assert_eq!(sub.policy(), SubmitPolicy::Reject);

        // caller gives up (outer timeout) while the request is still pending
        let gave_up = tokio::time::timeout(
            Duration::from_millis(50),
            sub.submit(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(1)
            }),
        )
        .await;
        assert!(gave_up.is_err());
        assert_eq!(sub.state().await, SubmissionState::Idle);

        assert_eq!(sub.submit(async { Ok(2) }).await.unwrap(), 2);
        assert_eq!(sub.state().await, SubmissionState::Succeeded(2));
    }

    #[tokio::test]
    async fn aborted_task_frees_the_slot() {
        let sub = Arc::new(Submission::<u32>::new(SubmitPolicy::Reject));
        let pending = {
            let sub = Arc::clone(&sub);
            tokio::spawn(async move {
                sub.submit(async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(1)
                })
                .await
            })
        };
        while sub.state().await != SubmissionState::Submitting {
            tokio::task::yield_now().await;
        }

        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());
        assert_eq!(sub.state().await, SubmissionState::Idle);
        assert_eq!(sub.submit(async { Ok(3) }).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn reset_discards_in_flight_result() {
        let sub = Arc::new(Submission::<u32>::new(SubmitPolicy::Reject));
        let pending = {
            let sub = Arc::clone(&sub);
            tokio::spawn(async move {
                sub.submit(async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(1)
                })
                .await
            })
        };
        while sub.state().await != SubmissionState::Submitting {
            tokio::task::yield_now().await;
        }

        sub.reset().await;
        assert!(matches!(pending.await.unwrap(), Err(SubmitError::Cancelled)));
        assert_eq!(sub.state().await, SubmissionState::Idle);
    }
}
