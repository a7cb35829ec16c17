//! Per-user inspection sessions.
//!
//! While a session is active, interacting with a cell shows its history
//! instead of changing it. Sessions expire after a period without access.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chronolog_core::ChangeRecord;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy)]
struct Session {
    last_access: Instant,
    inspections: u64,
}

/// Inspection sessions keyed by owner, expiring after a fixed idle time.
#[derive(Debug)]
pub struct InspectionSessions {
    ttl: Duration,
    sessions: Mutex<HashMap<String, Session>>,
}

impl InspectionSessions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Turns inspection on or off for `owner`. Returns the new state.
    pub fn toggle(&self, owner: &str) -> bool {
        self.toggle_at(owner, Instant::now())
    }

    pub fn toggle_at(&self, owner: &str, now: Instant) -> bool {
        let mut sessions = self.sessions.lock();
        match sessions.get(owner) {
            Some(session) if !self.is_expired(session, now) => {
                sessions.remove(owner);
                false
            }
            _ => {
                sessions.insert(
                    owner.to_string(),
                    Session {
                        last_access: now,
                        inspections: 0,
                    },
                );
                true
            }
        }
    }

    /// Returns `true` if `owner` has a live session, refreshing its idle timer.
    pub fn touch(&self, owner: &str) -> bool {
        self.touch_at(owner, Instant::now())
    }

    pub fn touch_at(&self, owner: &str, now: Instant) -> bool {
        let mut sessions = self.sessions.lock();
        let expired = match sessions.get_mut(owner) {
            None => return false,
            Some(session) if self.is_expired(session, now) => true,
            Some(session) => {
                session.last_access = now;
                session.inspections += 1;
                false
            }
        };
        if expired {
            sessions.remove(owner);
            tracing::debug!("Inspection session for {} expired", owner);
        }
        !expired
    }

    /// Ends a session. Ending a missing session does nothing.
    pub fn end(&self, owner: &str) {
        self.sessions.lock().remove(owner);
    }

    /// Lookups served by `owner`'s current session.
    pub fn inspections(&self, owner: &str) -> Option<u64> {
        self.sessions.lock().get(owner).map(|s| s.inspections)
    }

    /// Drops expired sessions and returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, session| !self.is_expired(session, now));
        before - sessions.len()
    }

    pub fn active_count(&self) -> usize {
        self.sessions.lock().len()
    }

    fn is_expired(&self, session: &Session, now: Instant) -> bool {
        now.saturating_duration_since(session.last_access) >= self.ttl
    }
}

/// One history line: `- {from} -> {to} at {timestamp}`.
pub fn format_change(record: &ChangeRecord) -> String {
    format!(
        "- {} -> {} at {}",
        record.subject().serialize_from(),
        record.subject().serialize_to(),
        record.timestamp()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronolog_core::{BlockPos, ChangeReason, ChangeSource, Subject};

    #[test]
    fn test_toggle() {
        let sessions = InspectionSessions::new(Duration::from_secs(600));
        assert!(!sessions.touch("steve"));
        assert!(sessions.toggle("steve"));
        assert!(sessions.touch("steve"));
        assert_eq!(sessions.inspections("steve"), Some(1));
        assert!(!sessions.toggle("steve"));
        assert!(!sessions.touch("steve"));
    }

    #[test]
    fn test_idle_session_expires() {
        let sessions = InspectionSessions::new(Duration::from_secs(600));
        let start = Instant::now();
        sessions.toggle_at("steve", start);
        sessions.toggle_at("alex", start);

        // Access resets the idle timer.
        assert!(sessions.touch_at("alex", start + Duration::from_secs(500)));

        assert_eq!(sessions.sweep_at(start + Duration::from_secs(700)), 1);
        assert!(!sessions.touch_at("steve", start + Duration::from_secs(700)));
        assert!(sessions.touch_at("alex", start + Duration::from_secs(1000)));
        assert!(!sessions.touch_at("alex", start + Duration::from_secs(1600)));
        assert_eq!(sessions.active_count(), 0);
    }

    #[test]
    fn test_format_change() {
        let record = ChangeRecord::new(
            "overworld",
            BlockPos::new(0, 64, 0),
            1_700_000_000_000,
            ChangeSource::actor("steve").unwrap(),
            ChangeReason::Break,
            Subject::cell("oak_log[axis=y]", "air"),
        );
        assert_eq!(
            format_change(&record),
            "- oak_log[axis=y] -> air at 1700000000000"
        );
    }
}
