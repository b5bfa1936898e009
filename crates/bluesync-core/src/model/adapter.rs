// ── Adapter and scan state ──

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::MacAddress;

/// Name shown when the adapter reports neither alias nor name.
pub const DEFAULT_ADAPTER_NAME: &str = "Bluetooth Adapter";

/// The local Bluetooth controller, replaced wholesale on every poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adapter {
    pub id: String,
    /// Alias if set, else name, else [`DEFAULT_ADAPTER_NAME`].
    pub name: String,
    pub mac: Option<MacAddress>,
    pub powered: bool,
    pub discoverable: bool,
    pub pairable: bool,
    pub discovering: bool,
}

/// Bounded discovery session.
///
/// Times are monotonic; `deadline` is fixed at start and never moves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSession {
    pub active: bool,
    pub started_at: Option<Instant>,
    pub deadline: Option<Instant>,
}

impl ScanSession {
    pub fn started(at: Instant, duration: std::time::Duration) -> Self {
        Self {
            active: true,
            started_at: Some(at),
            deadline: Some(at + duration),
        }
    }

    pub fn inactive() -> Self {
        Self::default()
    }

    /// Time left before auto-stop, zero once past the deadline.
    pub fn remaining(&self, now: Instant) -> Option<std::time::Duration> {
        if !self.active {
            return None;
        }
        self.deadline.map(|d| d.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn started_session_has_fixed_deadline() {
        let now = Instant::now();
        let session = ScanSession::started(now, Duration::from_secs(30));
        assert!(session.active);
        assert_eq!(session.deadline, Some(now + Duration::from_secs(30)));
        assert_eq!(
            session.remaining(now + Duration::from_secs(10)),
            Some(Duration::from_secs(20))
        );
        assert_eq!(
            session.remaining(now + Duration::from_secs(45)),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn inactive_session_has_no_remaining_time() {
        assert_eq!(ScanSession::inactive().remaining(Instant::now()), None);
    }
}
