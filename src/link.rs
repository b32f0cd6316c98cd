//! Network link state shared between the Wi-Fi driver callbacks and the
//! measurement cycle.
//!
//! The driver pushes [`LinkEvent`]s from its event task; the cycle only ever
//! calls [`Link::await_connected`].

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Station started and association was requested.
    Started,
    /// Associated and got an IP address.
    Associated,
    /// Association or DHCP lease dropped. A started link goes back to
    /// connecting; a stopped one stays down.
    Lost,
    /// Station stopped.
    Stopped,
}

impl LinkState {
    pub fn on(self, event: LinkEvent) -> LinkState {
        match (self, event) {
            (_, LinkEvent::Stopped) => LinkState::Disconnected,
            (_, LinkEvent::Associated) => LinkState::Connected,
            (LinkState::Disconnected, LinkEvent::Started) => LinkState::Connecting,
            (state, LinkEvent::Started) => state,
            // A disconnect after stop is teardown, not a drop to recover from.
            (LinkState::Disconnected, LinkEvent::Lost) => LinkState::Disconnected,
            (_, LinkEvent::Lost) => LinkState::Connecting,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("link not connected after {waited:?} (state: {state:?})")]
pub struct LinkError {
    pub waited: Duration,
    pub state: LinkState,
}

#[derive(Debug, Clone, Default)]
pub struct Link {
    shared: Arc<(Mutex<LinkState>, Condvar)>,
}

impl Link {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.shared.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> LinkState {
        *self.lock()
    }

    pub fn apply(&self, event: LinkEvent) -> LinkState {
        let mut state = self.lock();
        let next = state.on(event);
        if next != *state {
            match next {
                LinkState::Connected => info!("Link up"),
                LinkState::Connecting if *state == LinkState::Connected => warn!("Link lost, reconnecting"),
                _ => debug!("Link {:?} -> {:?} on {:?}", *state, next, event),
            }
            *state = next;
            self.shared.1.notify_all();
        }
        next
    }

    /// Block until the link is up or `timeout` elapses.
    pub fn await_connected(&self, timeout: Duration) -> Result<(), LinkError> {
        let guard = self.lock();
        let (state, result) = self
            .shared
            .1
            .wait_timeout_while(guard, timeout, |state| *state != LinkState::Connected)
            .unwrap_or_else(PoisonError::into_inner);
        if result.timed_out() && *state != LinkState::Connected {
            return Err(LinkError {
                waited: timeout,
                state: *state,
            });
        }
        Ok(())
    }
}
