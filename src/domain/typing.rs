use chrono::{DateTime, Duration, Utc};

/// "Someone is typing" marker for the open chat, cleared after a fixed TTL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingIndicator {
    ttl: Duration,
    active: Option<ActiveTyping>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveTyping {
    user_id: i64,
    expires_at: DateTime<Utc>,
}

impl TypingIndicator {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, active: None }
    }

    pub fn typing_user(&self, now: DateTime<Utc>) -> Option<i64> {
        self.active
            .filter(|active| active.expires_at > now)
            .map(|active| active.user_id)
    }

    pub fn observe(&mut self, user_id: i64, now: DateTime<Utc>) {
        self.active = Some(ActiveTyping {
            user_id,
            expires_at: now + self.ttl,
        });
    }

    /// Drops an expired marker; returns true when one was cleared.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        match self.active {
            Some(active) if active.expires_at <= now => {
                self.active = None;
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.active = None;
    }
}

/// Limits outbound typing signals to one per interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingThrottle {
    interval: Duration,
    last_sent: Option<DateTime<Utc>>,
}

impl TypingThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    pub fn should_send(&mut self, now: DateTime<Utc>) -> bool {
        match self.last_sent {
            Some(last) if now - last < self.interval => false,
            _ => {
                self.last_sent = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}
