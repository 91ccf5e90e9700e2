//! Credential refresh with single-flight coalescing.
//!
//! When several authenticated calls are rejected at once, only the first one
//! to ask starts a reissue. Everyone else awaits the same shared future. The
//! reissue outcome is written to the credential store inside that future, so
//! the store sees exactly one write per reissue.
//!
//! Callers that were rejected *after* a reissue already finished must not start
//! another one. Each caller captures the coordinator's generation before
//! sending; if the generation has moved on by the time it asks to refresh, it
//! gets the outcome of the reissue that already happened.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use stockwatch_core::Credential;
use tracing::{debug, error, info, instrument, warn};

use crate::error::RefreshError;
use crate::store::CredentialStore;

/// Source of new credentials.
///
/// Implemented by [`PublicClient`](super::PublicClient) against the reissue
/// endpoint. The returned future must own everything it needs so it can be
/// shared between waiters.
pub trait CredentialIssuer: Send + Sync {
    /// Request a new credential using ambient session identification.
    fn issue(&self) -> BoxFuture<'static, Result<Credential, RefreshError>>;
}

type RefreshOutcome = Result<Credential, RefreshError>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Coalesces concurrent refresh requests into one reissue call.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    issuer: Arc<dyn CredentialIssuer>,
    store: Arc<dyn CredentialStore>,
    flight: Mutex<Flight>,
}

#[derive(Default)]
struct Flight {
    /// Number of completed reissues.
    generation: u64,
    /// The reissue currently running, if any.
    in_flight: Option<SharedRefresh>,
    /// Outcome of the most recent completed reissue.
    last: Option<RefreshOutcome>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flight = self.inner.lock();
        f.debug_struct("RefreshCoordinator")
            .field("generation", &flight.generation)
            .field("in_flight", &flight.in_flight.is_some())
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    /// Create a coordinator writing reissued credentials to `store`.
    #[must_use]
    pub fn new(issuer: Arc<dyn CredentialIssuer>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                issuer,
                store,
                flight: Mutex::new(Flight::default()),
            }),
        }
    }

    /// Number of reissues completed so far.
    ///
    /// Capture this before reading the credential for a request, and pass it
    /// to [`refresh_after`](Self::refresh_after) if the request is rejected.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Returns `true` while a reissue is running.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.inner.lock().in_flight.is_some()
    }

    /// Obtain a new credential, joining any reissue already in flight.
    ///
    /// # Errors
    ///
    /// Returns the `RefreshError` of the reissue this call waited on.
    pub async fn refresh(&self) -> Result<Credential, RefreshError> {
        let generation = self.generation();
        self.refresh_after(generation).await
    }

    /// Obtain a credential newer than the one current at `seen_generation`.
    ///
    /// - If a reissue completed since then, its outcome is returned without a
    ///   new call.
    /// - If one is running, this call waits on it.
    /// - Otherwise a reissue is started.
    ///
    /// On success the new credential is already in the store when this
    /// returns; on failure the store has been cleared.
    ///
    /// # Errors
    ///
    /// Returns the `RefreshError` of the reissue this call resolved to.
    #[instrument(skip(self))]
    pub async fn refresh_after(&self, seen_generation: u64) -> Result<Credential, RefreshError> {
        let pending = {
            let mut flight = self.inner.lock();

            if flight.generation != seen_generation
                && let Some(outcome) = flight.last.clone()
            {
                debug!(
                    generation = flight.generation,
                    "Credential already reissued since request was sent"
                );
                return outcome;
            }

            if let Some(pending) = &flight.in_flight {
                debug!("Joining in-flight reissue");
                pending.clone()
            } else {
                debug!("Starting reissue");
                let pending = self.start();
                flight.in_flight = Some(pending.clone());
                pending
            }
        };

        pending.await
    }

    fn start(&self) -> SharedRefresh {
        let inner = Arc::clone(&self.inner);

        async move {
            let outcome = match inner.issuer.issue().await {
                Ok(credential) => match inner.store.set(credential.clone()) {
                    Ok(()) => {
                        info!("Access credential refreshed");
                        Ok(credential)
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to store reissued credential");
                        Err(RefreshError::Store(e.to_string()))
                    }
                },
                Err(e) => {
                    warn!(error = %e, "Credential reissue failed");
                    if let Err(store_err) = inner.store.clear() {
                        error!(error = %store_err, "Failed to clear credential after reissue failure");
                    }
                    Err(e)
                }
            };

            let mut flight = inner.lock();
            flight.generation += 1;
            flight.last = Some(outcome.clone());
            flight.in_flight = None;

            outcome
        }
        .boxed()
        .shared()
    }
}

impl CoordinatorInner {
    fn lock(&self) -> MutexGuard<'_, Flight> {
        // Flight bookkeeping stays consistent even if a holder panicked
        self.flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::store::MemoryCredentialStore;

    /// Issuer that counts calls and answers after a delay.
    struct CountingIssuer {
        calls: AtomicUsize,
        delay: Duration,
        deny: bool,
    }

    impl CountingIssuer {
        fn new(delay: Duration, deny: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                deny,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CredentialIssuer for CountingIssuer {
        fn issue(&self) -> BoxFuture<'static, Result<Credential, RefreshError>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let delay = self.delay;
            let deny = self.deny;
            async move {
                tokio::time::sleep(delay).await;
                if deny {
                    Err(RefreshError::Denied(401))
                } else {
                    Ok(Credential::new(format!("fresh-{n}")))
                }
            }
            .boxed()
        }
    }

    fn coordinator(issuer: Arc<CountingIssuer>) -> (RefreshCoordinator, Arc<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::with_credential(Credential::new("stale")));
        let coordinator = RefreshCoordinator::new(issuer, store.clone());
        (coordinator, store)
    }

    #[tokio::test]
    async fn test_refresh_stores_new_credential() {
        let issuer = CountingIssuer::new(Duration::ZERO, false);
        let (coordinator, store) = coordinator(issuer.clone());

        let credential = coordinator.refresh().await.unwrap();

        assert_eq!(credential, Credential::new("fresh-1"));
        assert_eq!(store.get().unwrap(), Some(Credential::new("fresh-1")));
        assert_eq!(coordinator.generation(), 1);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_issue_once() {
        let issuer = CountingIssuer::new(Duration::from_millis(50), false);
        let (coordinator, _store) = coordinator(issuer.clone());
        let seen = coordinator.generation();

        let results = futures::future::join_all(
            (0..8).map(|_| {
                let coordinator = coordinator.clone();
                async move { coordinator.refresh_after(seen).await }
            }),
        )
        .await;

        assert_eq!(issuer.calls(), 1);
        for result in results {
            assert_eq!(result.unwrap(), Credential::new("fresh-1"));
        }
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_across_tasks_issue_once() {
        let issuer = CountingIssuer::new(Duration::from_millis(50), false);
        let (coordinator, _store) = coordinator(issuer.clone());
        let seen = coordinator.generation();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.refresh_after(seen).await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), Credential::new("fresh-1"));
        }
        assert_eq!(issuer.calls(), 1);
    }

    #[tokio::test]
    async fn test_late_caller_reuses_completed_refresh() {
        let issuer = CountingIssuer::new(Duration::ZERO, false);
        let (coordinator, _store) = coordinator(issuer.clone());
        let seen = coordinator.generation();

        coordinator.refresh_after(seen).await.unwrap();
        // Rejected with the old credential, but asks only after the reissue finished
        let late = coordinator.refresh_after(seen).await.unwrap();

        assert_eq!(late, Credential::new("fresh-1"));
        assert_eq!(issuer.calls(), 1);
    }

    #[tokio::test]
    async fn test_new_generation_triggers_new_refresh() {
        let issuer = CountingIssuer::new(Duration::ZERO, false);
        let (coordinator, store) = coordinator(issuer.clone());

        coordinator.refresh().await.unwrap();
        coordinator.refresh().await.unwrap();

        assert_eq!(issuer.calls(), 2);
        assert_eq!(store.get().unwrap(), Some(Credential::new("fresh-2")));
    }

    #[tokio::test]
    async fn test_denied_refresh_clears_store_and_is_shared() {
        let issuer = CountingIssuer::new(Duration::from_millis(20), true);
        let (coordinator, store) = coordinator(issuer.clone());
        let seen = coordinator.generation();

        let (a, b) = tokio::join!(coordinator.refresh_after(seen), coordinator.refresh_after(seen));

        assert_eq!(a.unwrap_err(), RefreshError::Denied(401));
        assert_eq!(b.unwrap_err(), RefreshError::Denied(401));
        assert_eq!(issuer.calls(), 1);
        assert!(store.get().unwrap().is_none());
    }
}
