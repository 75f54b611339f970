use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

/// Which kind of login flow currently holds the flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFlow {
    /// Started automatically from a previously obtained identity signal.
    Silent,
    /// Started from an explicit user action or a re-authentication.
    Interactive,
}

impl fmt::Display for LoginFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginFlow::Silent => f.write_str("silent"),
            LoginFlow::Interactive => f.write_str("interactive"),
        }
    }
}

type Slot = Arc<Mutex<Option<LoginFlow>>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Option<LoginFlow>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owner handle for the single login flight. Held by the session
/// orchestrator; everyone else gets a [`FlightStatus`].
#[derive(Debug, Default)]
pub struct LoginFlight {
    slot: Slot,
}

impl LoginFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flight for `flow`. Fails with the flow already in flight.
    /// The claim is released when the returned guard drops.
    pub fn try_begin(&self, flow: LoginFlow) -> Result<FlightGuard, LoginFlow> {
        let mut current = lock(&self.slot);
        if let Some(running) = *current {
            return Err(running);
        }
        *current = Some(flow);
        debug!(%flow, "Login flight started");
        Ok(FlightGuard {
            slot: self.slot.clone(),
            flow,
        })
    }

    /// Read-only view for the request gateway.
    pub fn status(&self) -> FlightStatus {
        FlightStatus {
            slot: self.slot.clone(),
        }
    }

    pub fn current(&self) -> Option<LoginFlow> {
        *lock(&self.slot)
    }
}

/// Read-only view of the login flight.
#[derive(Debug, Clone)]
pub struct FlightStatus {
    slot: Slot,
}

impl FlightStatus {
    pub fn current(&self) -> Option<LoginFlow> {
        *lock(&self.slot)
    }

    pub fn in_flight(&self) -> bool {
        self.current().is_some()
    }
}

/// Releases the flight on drop, including when the login future is cancelled.
#[derive(Debug)]
pub struct FlightGuard {
    slot: Slot,
    flow: LoginFlow,
}

impl FlightGuard {
    pub fn flow(&self) -> LoginFlow {
        self.flow
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        *lock(&self.slot) = None;
        debug!(flow = %self.flow, "Login flight finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_flight() {
        let flight = LoginFlight::new();
        let status = flight.status();
        assert!(!status.in_flight());

        let guard = flight.try_begin(LoginFlow::Silent).unwrap();
        assert_eq!(guard.flow(), LoginFlow::Silent);
        assert_eq!(status.current(), Some(LoginFlow::Silent));
        assert_eq!(
            flight.try_begin(LoginFlow::Interactive).unwrap_err(),
            LoginFlow::Silent
        );

        drop(guard);
        assert!(!status.in_flight());
        assert!(flight.try_begin(LoginFlow::Interactive).is_ok());
    }
}
