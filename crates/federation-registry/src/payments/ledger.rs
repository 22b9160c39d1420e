use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

use super::domain::{PaymentSession, PaymentStatus};
use super::processor::PaymentError;

/// Sessions untouched for this long are dropped on the next insert.
pub const SESSION_TTL_HOURS: i64 = 24;
/// Upper bound on tracked sessions; the least recently updated go first.
pub const MAX_TRACKED_SESSIONS: usize = 10_000;

/// In-process record of opened sessions, keyed by order id.
#[derive(Debug)]
pub struct SessionLedger {
    sessions: Mutex<HashMap<String, PaymentSession>>,
    ttl: Duration,
    capacity: usize,
}

impl Default for SessionLedger {
    fn default() -> Self {
        Self::with_limits(Duration::hours(SESSION_TTL_HOURS), MAX_TRACKED_SESSIONS)
    }
}

impl SessionLedger {
    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    fn sessions(&self) -> Result<MutexGuard<'_, HashMap<String, PaymentSession>>, PaymentError> {
        self.sessions.lock().map_err(|_| PaymentError::Ledger)
    }

    /// Tracks a new session. An order id that is already tracked is refused.
    pub fn record(&self, session: PaymentSession) -> Result<(), PaymentError> {
        let mut sessions = self.sessions()?;
        if sessions.contains_key(&session.order_id) {
            return Err(PaymentError::DuplicateOrder(session.order_id));
        }

        self.evict(&mut sessions, Utc::now());
        sessions.insert(session.order_id.clone(), session);
        Ok(())
    }

    pub fn contains(&self, order_id: &str) -> Result<bool, PaymentError> {
        Ok(self.sessions()?.contains_key(order_id))
    }

    pub fn get(&self, order_id: &str) -> Result<Option<PaymentSession>, PaymentError> {
        Ok(self.sessions()?.get(order_id).cloned())
    }

    pub fn len(&self) -> Result<usize, PaymentError> {
        Ok(self.sessions()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, PaymentError> {
        Ok(self.sessions()?.is_empty())
    }

    /// Updates a tracked session. Returns `false` when the order is unknown to this process.
    pub fn set_status(&self, order_id: &str, status: PaymentStatus) -> Result<bool, PaymentError> {
        let mut sessions = self.sessions()?;
        match sessions.get_mut(order_id) {
            Some(session) => {
                session.status = status;
                session.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drops expired sessions, then the oldest until one slot is free.
    fn evict(&self, sessions: &mut HashMap<String, PaymentSession>, now: DateTime<Utc>) {
        let before = sessions.len();
        sessions.retain(|_, session| now - session.updated_at < self.ttl);

        if sessions.len() >= self.capacity {
            let mut by_age: Vec<(DateTime<Utc>, String)> = sessions
                .values()
                .map(|session| (session.updated_at, session.order_id.clone()))
                .collect();
            by_age.sort();
            let excess = sessions.len() + 1 - self.capacity;
            for (_, order_id) in by_age.into_iter().take(excess) {
                sessions.remove(&order_id);
            }
        }

        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, "payment sessions evicted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::domain::CustomerDetails;

    fn session(order_id: &str, updated_at: DateTime<Utc>) -> PaymentSession {
        PaymentSession {
            order_id: order_id.to_string(),
            amount: 500.0,
            currency: "INR".to_string(),
            customer: CustomerDetails {
                id: "asha".to_string(),
                name: "Asha Rao".to_string(),
                email: "asha@example.org".to_string(),
                phone: "9876543210".to_string(),
            },
            session_id: format!("synthetic_{order_id}"),
            redirect_url: None,
            status: PaymentStatus::Created,
            processor: "synthetic",
            created_at: updated_at,
            updated_at,
        }
    }

    #[test]
    fn reused_order_ids_are_refused_and_keep_the_original() {
        let ledger = SessionLedger::default();
        let now = Utc::now();
        ledger.record(session("order_a", now)).expect("first");
        ledger
            .set_status("order_a", PaymentStatus::Paid)
            .expect("status");

        let err = ledger
            .record(session("order_a", now))
            .expect_err("reuse refused");
        assert!(matches!(err, PaymentError::DuplicateOrder(ref id) if id == "order_a"));

        let kept = ledger.get("order_a").expect("ledger").expect("tracked");
        assert_eq!(kept.status, PaymentStatus::Paid);
    }

    #[test]
    fn expired_and_oldest_sessions_are_evicted() {
        let ledger = SessionLedger::with_limits(Duration::hours(1), 2);
        let now = Utc::now();

        ledger
            .record(session("order_stale", now - Duration::hours(2)))
            .expect("stale");
        ledger
            .record(session("order_old", now - Duration::minutes(10)))
            .expect("old");
        assert_eq!(ledger.len().expect("len"), 1);
        assert!(!ledger.contains("order_stale").expect("contains"));

        ledger
            .record(session("order_mid", now - Duration::minutes(5)))
            .expect("mid");
        ledger.record(session("order_new", now)).expect("new");

        assert_eq!(ledger.len().expect("len"), 2);
        assert!(!ledger.contains("order_old").expect("contains"));
        assert!(ledger.contains("order_mid").expect("contains"));
        assert!(ledger.contains("order_new").expect("contains"));
    }
}
