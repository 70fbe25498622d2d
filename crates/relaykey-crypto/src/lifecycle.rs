//! One-shot initialization gate.
//!
//! Tracks `Uninitialized -> Initializing -> Ready` for a component and
//! coalesces overlapping `initialize` calls onto a single in-flight attempt.
//! The first caller runs the initializer; everyone arriving while it is in
//! flight subscribes to a `watch` channel and receives a clone of the same
//! outcome. A failed attempt returns the gate to `Uninitialized` so the next
//! call starts over. There are no timeouts: a hung initializer hangs every
//! caller waiting on it.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::CryptoError;

/// Observable lifecycle of a gated component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready,
}

/// `None` until the leader publishes its result.
type Outcome = Option<Result<(), CryptoError>>;

#[derive(Debug)]
enum Phase {
    Uninitialized,
    Initializing(watch::Receiver<Outcome>),
    Ready,
}

enum Role {
    Leader(watch::Sender<Outcome>),
    Follower(watch::Receiver<Outcome>),
}

/// Initialization gate for one component.
///
/// The inner mutex only guards phase transitions and is never held across
/// an `.await`.
#[derive(Debug)]
pub struct InitGate {
    component: &'static str,
    phase: Mutex<Phase>,
}

impl InitGate {
    /// Create a gate in the `Uninitialized` state. `component` names the
    /// gated component in `NotInitialized` errors.
    pub const fn new(component: &'static str) -> Self {
        Self {
            component,
            phase: Mutex::new(Phase::Uninitialized),
        }
    }

    pub fn state(&self) -> LifecycleState {
        match *self.phase() {
            Phase::Uninitialized => LifecycleState::Uninitialized,
            Phase::Initializing(_) => LifecycleState::Initializing,
            Phase::Ready => LifecycleState::Ready,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.phase(), Phase::Ready)
    }

    /// Fail fast with `NotInitialized` unless the gate is `Ready`.
    pub fn ensure_ready(&self) -> Result<(), CryptoError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(self.not_initialized())
        }
    }

    pub const fn not_initialized(&self) -> CryptoError {
        CryptoError::NotInitialized {
            component: self.component,
        }
    }

    /// Run `init` unless the gate is already `Ready` or an attempt is in
    /// flight, in which case wait for that attempt's outcome instead.
    ///
    /// `init` is invoked at most once per successful initialization no
    /// matter how many callers overlap.
    pub async fn initialize<F, Fut>(&self, init: F) -> Result<(), CryptoError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), CryptoError>>,
    {
        let role = {
            let mut phase = self.phase();
            if matches!(*phase, Phase::Ready) {
                return Ok(());
            }
            if let Phase::Initializing(rx) = &*phase {
                Role::Follower(rx.clone())
            } else {
                let (tx, rx) = watch::channel(None);
                *phase = Phase::Initializing(rx);
                Role::Leader(tx)
            }
        };

        match role {
            Role::Follower(mut rx) => {
                debug!(component = self.component, "Joining in-flight initialization");
                let outcome = match rx.wait_for(Option::is_some).await {
                    Ok(published) => (*published).clone(),
                    // Leader dropped before publishing.
                    Err(_) => None,
                };
                outcome.unwrap_or_else(|| Err(self.not_initialized()))
            }
            Role::Leader(tx) => {
                let mut reset = ResetOnDrop {
                    gate: self,
                    armed: true,
                };
                let result = init().await;
                reset.armed = false;

                *self.phase() = if result.is_ok() {
                    Phase::Ready
                } else {
                    Phase::Uninitialized
                };
                match &result {
                    Ok(()) => debug!(component = self.component, "Initialized"),
                    Err(e) => {
                        warn!(component = self.component, error = %e, "Initialization failed");
                    }
                }
                tx.send_replace(Some(result.clone()));
                result
            }
        }
    }

    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the gate to `Uninitialized` if the leader is dropped mid-flight.
struct ResetOnDrop<'a> {
    gate: &'a InitGate,
    armed: bool,
}

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(
                component = self.gate.component,
                "Initialization abandoned before completion"
            );
            *self.gate.phase() = Phase::Uninitialized;
        }
    }
}
