//! Server-side sessions and the signed cookie that points at them

use assist_core::config::MAX_SESSION_LIFETIME_HOURS;
use assist_core::Principal;
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Name of the session cookie
pub const COOKIE_NAME: &str = "assist_session";

const COOKIE_KEY_CONTEXT: &str = "assist-gateway 2024 session cookie signing";

/// Unique session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A logged-in browser
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub principal: Principal,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Session manager - the in-memory session table
#[derive(Debug)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
    lifetime: Duration,
}

impl SessionManager {
    pub fn new(lifetime_secs: u64) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            lifetime: Duration::seconds(lifetime_secs.min(MAX_SESSION_LIFETIME_HOURS * 3600) as i64),
        }
    }

    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime.num_seconds()
    }

    /// Create a new session
    pub fn create_session(&self, principal: Principal) -> Session {
        let now = Utc::now();
        let session = Session {
            id: SessionId::new(),
            principal,
            created_at: now,
            expires_at: now.checked_add_signed(self.lifetime).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        self.sessions.write().insert(session.id.clone(), session.clone());
        tracing::debug!(user = %session.principal.username, "Session created");
        session
    }

    /// Get a live session; an expired one is removed on the way
    pub fn get_session(&self, id: &SessionId) -> Option<Session> {
        let session = self.sessions.read().get(id).cloned()?;
        if session.is_expired() {
            self.sessions.write().remove(id);
            return None;
        }
        Some(session)
    }

    /// End a session
    pub fn end_session(&self, id: &SessionId) -> Option<Session> {
        let removed = self.sessions.write().remove(id);
        if let Some(session) = &removed {
            tracing::debug!(user = %session.principal.username, "Session ended");
        }
        removed
    }

    /// Clean up expired sessions
    pub fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired());
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!("Cleaned up {} expired sessions", removed);
        }
        removed
    }

    /// Get session count
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}

/// Signs session ids so a cookie cannot be forged or guessed into a session
#[derive(Clone)]
pub struct CookieSigner {
    key: [u8; 32],
}

impl std::fmt::Debug for CookieSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CookieSigner(***)")
    }
}

impl CookieSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            key: blake3::derive_key(COOKIE_KEY_CONTEXT, secret.as_bytes()),
        }
    }

    /// `<id>.<mac>`
    pub fn sign(&self, id: &SessionId) -> String {
        let mac = blake3::keyed_hash(&self.key, id.0.as_bytes());
        format!("{}.{}", id.0, mac.to_hex())
    }

    /// Session id of a cookie value, if its signature holds
    pub fn verify(&self, value: &str) -> Option<SessionId> {
        let (id, mac) = value.rsplit_once('.')?;
        let given = blake3::Hash::from_hex(mac).ok()?;
        // blake3::Hash equality is constant-time
        (blake3::keyed_hash(&self.key, id.as_bytes()) == given).then(|| SessionId(id.to_string()))
    }

    /// Session id carried by the request's cookies, if any verifies
    pub fn session_from_headers(&self, headers: &HeaderMap) -> Option<SessionId> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == COOKIE_NAME)
            .find_map(|(_, value)| self.verify(value))
    }
}

/// `Set-Cookie` value establishing a session
pub fn session_cookie(value: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!("{COOKIE_NAME}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value removing the session cookie
pub fn clear_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assist_core::Role;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_lifecycle() {
        let manager = SessionManager::new(3600);
        let session = manager.create_session(Principal::new("ana", Role::User));
        assert_eq!(manager.session_count(), 1);
        assert_eq!(
            manager.get_session(&session.id).unwrap().principal.username,
            "ana"
        );

        assert!(manager.end_session(&session.id).is_some());
        assert!(manager.get_session(&session.id).is_none());
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    fn test_huge_lifetime_is_clamped() {
        let manager = SessionManager::new(u64::MAX);
        assert_eq!(manager.lifetime_secs(), (MAX_SESSION_LIFETIME_HOURS * 3600) as i64);

        let session = manager.create_session(Principal::new("ana", Role::User));
        assert!(session.expires_at > session.created_at);
        assert!(manager.get_session(&session.id).is_some());
    }

    #[test]
    fn test_expired_sessions_are_dropped() {
        let manager = SessionManager::new(0);
        let session = manager.create_session(Principal::new("ana", Role::User));
        assert!(manager.get_session(&session.id).is_none());

        manager.create_session(Principal::new("bruno", Role::User));
        assert_eq!(manager.cleanup_expired(), 1);
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    fn test_signature_round_trip() {
        let signer = CookieSigner::new("secret");
        let id = SessionId::new();
        let value = signer.sign(&id);
        assert_eq!(signer.verify(&value), Some(id.clone()));

        let other = CookieSigner::new("another secret");
        assert!(other.verify(&value).is_none());
        assert!(signer.verify(&format!("{}x", value)).is_none());
        assert!(signer.verify(&id.0).is_none());
    }

    #[test]
    fn test_session_from_headers() {
        let signer = CookieSigner::new("secret");
        let id = SessionId::new();
        let mut headers = HeaderMap::new();
        let cookie = format!("theme=dark; {}={}", COOKIE_NAME, signer.sign(&id));
        headers.insert(COOKIE, HeaderValue::from_str(&cookie).unwrap());
        assert_eq!(signer.session_from_headers(&headers), Some(id));

        assert!(signer.session_from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = session_cookie("abc", 60, true);
        assert!(cookie.starts_with("assist_session=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=60"));
        assert!(cookie.ends_with("; Secure"));
        assert!(clear_cookie(false).contains("Max-Age=0"));
    }
}
