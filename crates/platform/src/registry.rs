//! Call session registry
//!
//! Sessions are the bridge between our API surface and platform calls: the
//! form data a caller provided up front lives here, keyed by a session id we
//! mint, with a reverse index from the platform call id once the call is
//! bound. Sessions are removed when their complete data is retrieved and
//! swept when idle past the timeout.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use lc_voice_core::{CallStatus, FieldMap};

use crate::PlatformError;

/// One in-flight intake session
pub struct CallSession {
    /// Session ID
    pub id: String,
    /// Fields provided on the form before the call
    pub provided: FieldMap,
    /// Creation time
    pub created_at: Instant,
    /// Platform call id, set once the call is started
    call_id: RwLock<Option<String>>,
    /// Last observed call status
    status: RwLock<CallStatus>,
    /// Last activity
    last_activity: RwLock<Instant>,
}

impl CallSession {
    fn new(id: impl Into<String>, provided: FieldMap) -> Self {
        Self {
            id: id.into(),
            provided,
            created_at: Instant::now(),
            call_id: RwLock::new(None),
            status: RwLock::new(CallStatus::Pending),
            last_activity: RwLock::new(Instant::now()),
        }
    }

    /// Platform call id, if the call was started
    pub fn call_id(&self) -> Option<String> {
        self.call_id.read().clone()
    }

    /// Last observed call status
    pub fn status(&self) -> CallStatus {
        *self.status.read()
    }

    /// Record a status observed from the platform or a webhook
    pub fn set_status(&self, status: CallStatus) {
        *self.status.write() = status;
        self.touch();
    }

    /// Update last activity
    pub fn touch(&self) {
        *self.last_activity.write() = Instant::now();
    }

    /// Check if session is expired
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.last_activity.read().elapsed() > timeout
    }
}

/// Registry of in-flight sessions
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<CallSession>>>,
    /// Platform call id -> session id
    by_call: RwLock<HashMap<String, String>>,
    max_sessions: usize,
    session_timeout: Duration,
    cleanup_interval: Duration,
}

impl SessionRegistry {
    /// Create a registry with default timeouts
    pub fn new(max_sessions: usize) -> Self {
        Self::with_config(
            max_sessions,
            Duration::from_secs(3600),
            Duration::from_secs(300),
        )
    }

    /// Create a registry with custom timeout and cleanup interval
    pub fn with_config(
        max_sessions: usize,
        session_timeout: Duration,
        cleanup_interval: Duration,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            by_call: RwLock::new(HashMap::new()),
            max_sessions,
            session_timeout,
            cleanup_interval,
        }
    }

    /// Start a background task that periodically removes expired sessions.
    ///
    /// Returns a shutdown sender that stops the task.
    pub fn start_cleanup_task(self: &Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let registry = Arc::clone(self);
        let interval = registry.cleanup_interval;

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let before = registry.count();
                        registry.cleanup_expired();
                        let after = registry.count();
                        if before != after {
                            tracing::info!(
                                "Session cleanup: removed {} expired sessions ({} remaining)",
                                before - after,
                                after
                            );
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("Session cleanup task shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }

    /// Create a new session holding the provided form fields.
    pub fn create(&self, provided: FieldMap) -> Result<Arc<CallSession>, PlatformError> {
        let mut sessions = self.sessions.write();

        // Check capacity
        if sessions.len() >= self.max_sessions {
            // Try to clean expired sessions
            self.cleanup_expired_internal(&mut sessions);

            if sessions.len() >= self.max_sessions {
                return Err(PlatformError::Session("Max sessions reached".to_string()));
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(CallSession::new(&id, provided));
        sessions.insert(id.clone(), session.clone());

        tracing::info!(
            session_id = %id,
            provided_fields = session.provided.len(),
            "Created session"
        );

        Ok(session)
    }

    /// Bind a started platform call to a session.
    pub fn bind_call(&self, session: &Arc<CallSession>, call_id: impl Into<String>) {
        let call_id = call_id.into();
        *session.call_id.write() = Some(call_id.clone());
        session.touch();
        self.by_call.write().insert(call_id, session.id.clone());
    }

    /// Get a session by ID
    pub fn get(&self, id: &str) -> Option<Arc<CallSession>> {
        self.sessions.read().get(id).cloned()
    }

    /// Get a session by its platform call id
    pub fn get_by_call(&self, call_id: &str) -> Option<Arc<CallSession>> {
        let session_id = self.by_call.read().get(call_id).cloned()?;
        self.get(&session_id)
    }

    /// Remove a session, returning it so callers can finish with its data.
    pub fn remove(&self, id: &str) -> Option<Arc<CallSession>> {
        let session = self.sessions.write().remove(id)?;
        if let Some(call_id) = session.call_id() {
            self.by_call.write().remove(&call_id);
        }
        tracing::info!(session_id = %id, "Removed session");
        Some(session)
    }

    /// Active session count
    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    /// List all session IDs
    pub fn list(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }

    /// Cleanup expired sessions
    pub fn cleanup_expired(&self) {
        let mut sessions = self.sessions.write();
        self.cleanup_expired_internal(&mut sessions);
    }

    fn cleanup_expired_internal(&self, sessions: &mut HashMap<String, Arc<CallSession>>) {
        let timeout = self.session_timeout;
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| s.is_expired(timeout))
            .map(|(id, _)| id.clone())
            .collect();

        for id in expired {
            if let Some(session) = sessions.remove(&id) {
                if let Some(call_id) = session.call_id() {
                    self.by_call.write().remove(&call_id);
                }
                tracing::info!(session_id = %id, "Expired session");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_fields() -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("amount_and_payment.amount_usd".to_string(), json!(50000));
        fields
    }

    #[test]
    fn test_session_creation() {
        let registry = SessionRegistry::new(10);
        let session = registry.create(sample_fields()).unwrap();

        assert_eq!(session.id.len(), 36);
        assert_eq!(session.status(), CallStatus::Pending);
        assert!(session.call_id().is_none());
        assert!(!session.is_expired(Duration::from_secs(60)));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_session_get() {
        let registry = SessionRegistry::new(10);
        let session = registry.create(sample_fields()).unwrap();

        let retrieved = registry.get(&session.id).unwrap();
        assert_eq!(retrieved.id, session.id);
        assert_eq!(retrieved.provided, session.provided);
    }

    #[test]
    fn test_bind_and_lookup_by_call() {
        let registry = SessionRegistry::new(10);
        let session = registry.create(sample_fields()).unwrap();

        registry.bind_call(&session, "call-abc");
        assert_eq!(session.call_id().as_deref(), Some("call-abc"));

        let found = registry.get_by_call("call-abc").unwrap();
        assert_eq!(found.id, session.id);
        assert!(registry.get_by_call("call-unknown").is_none());
    }

    #[test]
    fn test_remove_cleans_reverse_index() {
        let registry = SessionRegistry::new(10);
        let session = registry.create(sample_fields()).unwrap();
        registry.bind_call(&session, "call-abc");

        let removed = registry.remove(&session.id).unwrap();
        assert_eq!(removed.id, session.id);
        assert!(registry.get(&session.id).is_none());
        assert!(registry.get_by_call("call-abc").is_none());
    }

    #[test]
    fn test_capacity_limit() {
        let registry = SessionRegistry::new(1);
        registry.create(sample_fields()).unwrap();

        assert!(matches!(
            registry.create(sample_fields()),
            Err(PlatformError::Session(_))
        ));
    }

    #[test]
    fn test_capacity_recovered_from_expired_sessions() {
        let registry =
            SessionRegistry::with_config(1, Duration::from_millis(0), Duration::from_secs(300));
        registry.create(sample_fields()).unwrap();

        // The first session is instantly expired, so the slot frees up.
        std::thread::sleep(Duration::from_millis(5));
        let second = registry.create(sample_fields());
        assert!(second.is_ok());
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_two_sessions_stay_isolated() {
        let registry = SessionRegistry::new(10);

        let mut fields_a = FieldMap::new();
        fields_a.insert("parties.applicant_name".to_string(), json!("Alpha Imports"));
        let mut fields_b = FieldMap::new();
        fields_b.insert("parties.applicant_name".to_string(), json!("Beta Trading"));

        let a = registry.create(fields_a).unwrap();
        let b = registry.create(fields_b).unwrap();
        registry.bind_call(&a, "call-a");
        registry.bind_call(&b, "call-b");

        let via_a = registry.get_by_call("call-a").unwrap();
        let via_b = registry.get_by_call("call-b").unwrap();
        assert_eq!(
            via_a.provided.get("parties.applicant_name"),
            Some(&json!("Alpha Imports"))
        );
        assert_eq!(
            via_b.provided.get("parties.applicant_name"),
            Some(&json!("Beta Trading"))
        );

        a.set_status(CallStatus::Ended);
        assert_eq!(via_b.status(), CallStatus::Pending);
    }

    #[test]
    fn test_cleanup_expired() {
        let registry =
            SessionRegistry::with_config(10, Duration::from_millis(0), Duration::from_secs(300));
        let session = registry.create(sample_fields()).unwrap();
        registry.bind_call(&session, "call-old");

        std::thread::sleep(Duration::from_millis(5));
        registry.cleanup_expired();

        assert_eq!(registry.count(), 0);
        assert!(registry.get_by_call("call-old").is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cleanup_task_removes_expired_sessions() {
        let registry = Arc::new(SessionRegistry::with_config(
            10,
            Duration::from_millis(5),
            Duration::from_millis(10),
        ));
        registry.create(sample_fields()).unwrap();

        let shutdown = registry.start_cleanup_task();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(registry.count(), 0);
        let _ = shutdown.send(true);
    }
}
