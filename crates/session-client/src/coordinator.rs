//! Single-flight credential renewal
//!
//! The coordinator is `Idle` or `Refreshing`. The first caller to find it idle
//! becomes the driver: it flips the in-flight flag, performs the one renewal
//! call and settles the outcome. Callers arriving while a renewal is in flight
//! queue a oneshot sender and wait for the driver's result instead of starting
//! their own.
//!
//! Transitions:
//! - Idle → Refreshing (first `renew()` call, which becomes the driver)
//! - Refreshing → Refreshing (later callers enqueue as waiters)
//! - Refreshing → Idle (driver settles: waiters drained, flag cleared)
//!
//! The flag and the waiter queue live behind a `std::sync::Mutex` that is
//! never held across an await. Settling runs from a drop guard, so a driver
//! that panics or whose future is dropped still drains the queue and clears
//! the flag; its waiters observe `RefreshError::Abandoned`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use session_auth::{CredentialStore, token};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use transport::Transport;

use crate::metrics;
use crate::signal::{InvalidationSignal, SessionInvalidated};

/// Why a renewal did not produce a new access token.
///
/// Cloned to every waiter of the failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("no refresh token available")]
    NoRefreshToken,

    #[error("credential renewal failed: {0}")]
    Rejected(String),

    #[error("credential renewal abandoned before completing")]
    Abandoned,
}

/// New access token, or why there is none.
type Outcome = std::result::Result<String, RefreshError>;

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    waiters: VecDeque<oneshot::Sender<Outcome>>,
}

enum Role {
    Driver,
    Waiter(oneshot::Receiver<Outcome>),
}

/// Owns the renewal state for one session.
///
/// Each `SessionClient` has its own coordinator, so independent clients never
/// share in-flight state.
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    store: Arc<CredentialStore>,
    transport: Arc<dyn Transport>,
    signal: Arc<InvalidationSignal>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<CredentialStore>,
        transport: Arc<dyn Transport>,
        signal: Arc<InvalidationSignal>,
    ) -> Self {
        Self {
            state: Mutex::new(RefreshState::default()),
            store,
            transport,
            signal,
        }
    }

    /// Obtain a renewed access token, sharing any renewal already in flight.
    ///
    /// On failure the credential store has been cleared and the invalidation
    /// signal emitted (once, by the driver) before this returns.
    pub async fn renew(&self) -> Outcome {
        let role = {
            let mut state = lock_state(&self.state);
            if state.in_flight {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                debug!(
                    waiters = state.waiters.len(),
                    "renewal in flight, waiting for driver"
                );
                Role::Waiter(rx)
            } else {
                state.in_flight = true;
                Role::Driver
            }
        };

        match role {
            Role::Waiter(rx) => {
                metrics::record_refresh_waiter();
                rx.await.unwrap_or(Err(RefreshError::Abandoned))
            }
            Role::Driver => {
                let release = Release::new(&self.state);
                let outcome = self.drive().await;
                release.settle(&outcome);
                metrics::record_refresh(if outcome.is_ok() { "success" } else { "failure" });
                outcome
            }
        }
    }

    /// Whether a renewal is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        lock_state(&self.state).in_flight
    }

    /// Number of callers queued behind the in-flight renewal.
    pub fn waiting(&self) -> usize {
        lock_state(&self.state).waiters.len()
    }

    /// The driver's side of a renewal: one call to the refresh endpoint and
    /// the resulting store write or teardown.
    async fn drive(&self) -> Outcome {
        let credentials = self.store.read().await;
        let Some(refresh_token) = credentials.refresh_token().map(str::to_owned) else {
            warn!("no refresh token stored, session cannot be renewed");
            self.invalidate("no refresh token available").await;
            return Err(RefreshError::NoRefreshToken);
        };

        debug!("renewing credentials");
        let tokens = match token::refresh_tokens(self.transport.as_ref(), &refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "credential renewal failed");
                let reason = e.to_string();
                self.invalidate(&reason).await;
                return Err(RefreshError::Rejected(reason));
            }
        };

        let access_token = tokens.access.token;
        let rotated = tokens.refresh.map(|grant| grant.token);
        if let Err(e) = self
            .store
            .rotate_tokens(access_token.clone(), rotated)
            .await
        {
            warn!(error = %e, "failed to persist renewed credentials");
            let reason = format!("persisting renewed credentials: {e}");
            self.invalidate(&reason).await;
            return Err(RefreshError::Rejected(reason));
        }

        info!("credentials renewed");
        Ok(access_token)
    }

    /// Tear the session down: clear the store, then tell the shell.
    async fn invalidate(&self, reason: &str) {
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "failed to clear credentials after renewal failure");
        }
        self.signal.emit(SessionInvalidated {
            reason: reason.to_string(),
        });
    }
}

fn lock_state(state: &Mutex<RefreshState>) -> MutexGuard<'_, RefreshState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drains the waiter queue and returns the coordinator to idle exactly once,
/// either through `settle` or, if the driver never got there, on drop.
struct Release<'a> {
    state: &'a Mutex<RefreshState>,
    settled: bool,
}

impl<'a> Release<'a> {
    fn new(state: &'a Mutex<RefreshState>) -> Self {
        Self {
            state,
            settled: false,
        }
    }

    fn settle(mut self, outcome: &Outcome) {
        self.release(outcome);
        self.settled = true;
    }

    fn release(&self, outcome: &Outcome) {
        let waiters = {
            let mut state = lock_state(self.state);
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };
        debug!(
            waiters = waiters.len(),
            success = outcome.is_ok(),
            "releasing renewal waiters"
        );
        for waiter in waiters {
            // A waiter whose caller went away has dropped its receiver
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl Drop for Release<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("renewal driver stopped before completing, releasing waiters");
            self.release(&Err(RefreshError::Abandoned));
            metrics::record_refresh("abandoned");
        }
    }
}
