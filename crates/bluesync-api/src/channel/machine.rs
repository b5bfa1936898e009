// Push-channel connection state machine.
//
// Pure and synchronous: the async driver in `channel/mod.rs` feeds it
// lifecycle events and asks it what to do next. The reconnect timer is a
// single `Option` slot, so there is never more than one pending retry.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Connection state of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ChannelState {
    Idle,
    Connecting,
    Open,
    ReconnectWait,
    /// Terminal. Entered only through an explicit shutdown.
    ClosedIntentional,
}

/// Channel lifecycle with one reconnect-timer slot.
#[derive(Debug, Clone)]
pub struct ChannelMachine {
    state: ChannelState,
    reconnect_at: Option<Instant>,
    reconnect_delay: Duration,
}

impl ChannelMachine {
    pub fn new(reconnect_delay: Duration) -> Self {
        Self {
            state: ChannelState::Idle,
            reconnect_at: None,
            reconnect_delay,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Deadline of the pending reconnect timer, if one is armed.
    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// Start a connection attempt. Allowed from `idle` and from
    /// `reconnect-wait` (which consumes the timer). Returns `false` when no
    /// attempt should be made.
    pub fn begin_connect(&mut self) -> bool {
        match self.state {
            ChannelState::Idle | ChannelState::ReconnectWait => {
                self.reconnect_at = None;
                self.state = ChannelState::Connecting;
                true
            }
            ChannelState::Connecting | ChannelState::Open | ChannelState::ClosedIntentional => {
                false
            }
        }
    }

    /// Handshake succeeded. Any pending reconnect timer is cancelled.
    /// Returns `false` if the channel was shut down in the meantime.
    pub fn on_open(&mut self) -> bool {
        if self.state == ChannelState::ClosedIntentional {
            return false;
        }
        self.reconnect_at = None;
        self.state = ChannelState::Open;
        true
    }

    /// Connection closed or failed to open.
    ///
    /// Arms the reconnect timer only if none is pending; repeated closes
    /// keep the existing deadline. Returns `true` if a timer was armed by
    /// this call.
    pub fn on_close(&mut self, now: Instant) -> bool {
        if self.state == ChannelState::ClosedIntentional {
            return false;
        }
        self.state = ChannelState::ReconnectWait;
        if self.reconnect_at.is_some() {
            return false;
        }
        self.reconnect_at = Some(now + self.reconnect_delay);
        true
    }

    /// Explicit shutdown: cancel the timer and enter the terminal state.
    pub fn shutdown(&mut self) {
        self.reconnect_at = None;
        self.state = ChannelState::ClosedIntentional;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_secs(5);

    #[test]
    fn starts_idle_without_timer() {
        let m = ChannelMachine::new(DELAY);
        assert_eq!(m.state(), ChannelState::Idle);
        assert!(m.reconnect_deadline().is_none());
    }

    #[test]
    fn connect_then_open() {
        let mut m = ChannelMachine::new(DELAY);
        assert!(m.begin_connect());
        assert_eq!(m.state(), ChannelState::Connecting);
        assert!(!m.begin_connect());
        assert!(m.on_open());
        assert_eq!(m.state(), ChannelState::Open);
    }

    #[test]
    fn repeated_unexpected_closes_arm_exactly_one_timer() {
        let mut m = ChannelMachine::new(DELAY);
        m.begin_connect();
        m.on_open();

        let t0 = Instant::now();
        assert!(m.on_close(t0));
        let deadline = m.reconnect_deadline();
        assert_eq!(deadline, Some(t0 + DELAY));

        assert!(!m.on_close(t0 + Duration::from_secs(1)));
        assert!(!m.on_close(t0 + Duration::from_secs(2)));
        assert_eq!(m.reconnect_deadline(), deadline);
        assert_eq!(m.state(), ChannelState::ReconnectWait);
    }

    #[test]
    fn connect_failure_enters_reconnect_wait() {
        let mut m = ChannelMachine::new(DELAY);
        m.begin_connect();
        assert!(m.on_close(Instant::now()));
        assert_eq!(m.state(), ChannelState::ReconnectWait);
    }

    #[test]
    fn reconnect_consumes_timer() {
        let mut m = ChannelMachine::new(DELAY);
        m.begin_connect();
        let t0 = Instant::now();
        m.on_close(t0);

        assert_eq!(m.reconnect_deadline(), Some(t0 + DELAY));
        assert!(m.begin_connect());
        assert!(m.reconnect_deadline().is_none());
        assert_eq!(m.state(), ChannelState::Connecting);
    }

    #[test]
    fn open_cancels_pending_timer() {
        let mut m = ChannelMachine::new(DELAY);
        m.begin_connect();
        m.on_close(Instant::now());
        m.begin_connect();
        m.on_close(Instant::now());
        assert!(m.reconnect_deadline().is_some());

        // Stale timer slot from a racing close is cleared on open.
        m.state = ChannelState::Connecting;
        assert!(m.on_open());
        assert!(m.reconnect_deadline().is_none());
    }

    #[test]
    fn intentional_shutdown_never_arms_a_timer() {
        let mut m = ChannelMachine::new(DELAY);
        m.begin_connect();
        m.on_open();
        m.shutdown();

        assert!(!m.on_close(Instant::now()));
        assert!(m.reconnect_deadline().is_none());
        assert_eq!(m.state(), ChannelState::ClosedIntentional);
        assert!(!m.begin_connect());
        assert!(!m.on_open());
    }

    #[test]
    fn shutdown_cancels_pending_timer() {
        let mut m = ChannelMachine::new(DELAY);
        m.begin_connect();
        m.on_close(Instant::now());
        m.shutdown();
        assert!(m.reconnect_deadline().is_none());
        assert!(!m.begin_connect());
    }

    #[test]
    fn state_display_is_kebab_case() {
        assert_eq!(ChannelState::ReconnectWait.to_string(), "reconnect-wait");
        assert_eq!(ChannelState::ClosedIntentional.to_string(), "closed-intentional");
    }
}
