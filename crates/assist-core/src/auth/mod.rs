//! Identities, roles and access control
//!
//! - [`password`]: Argon2id hashing
//! - [`guard`]: the route authorization decision
//! - [`IdentityService`]: credential checks and account creation on top of
//!   an [`IdentityRepository`]

pub mod guard;
pub mod password;

pub use guard::{authorize, AccessDecision, Principal, Requirement};
pub use password::{hash_password, verify_password};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::storage::IdentityRepository;
use crate::{AssistError, Result};

/// Message for a create request missing username or password
pub const MISSING_CREDENTIALS: &str = "Usuário e senha são obrigatórios";

/// Accounts created on an empty store: (username, password, role)
const DEFAULT_ACCOUNTS: [(&str, &str, Role); 2] = [
    ("admin", "admin123", Role::Admin),
    ("user", "user123", Role::User),
];

/// Access level of an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    /// Parse a role name; an absent or blank name means [`Role::User`].
    pub fn parse(name: Option<&str>) -> Result<Self> {
        match name.map(|n| n.trim().to_lowercase()).as_deref() {
            None | Some("") | Some("user") => Ok(Self::User),
            Some("admin") => Ok(Self::Admin),
            Some(other) => Err(AssistError::validation(format!("Perfil inválido: {other}"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored account
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub department: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl Identity {
    pub fn principal(&self) -> Principal {
        Principal::new(self.username.clone(), self.role)
    }
}

/// Request to create an account
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewIdentity {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

impl NewIdentity {
    pub fn new(username: impl Into<String>, password: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            role,
            ..Self::default()
        }
    }
}

/// Credential checks and account management
#[derive(Clone)]
pub struct IdentityService {
    repo: Arc<dyn IdentityRepository>,
}

impl fmt::Debug for IdentityService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityService").finish_non_exhaustive()
    }
}

impl IdentityService {
    pub fn new(repo: Arc<dyn IdentityRepository>) -> Self {
        Self { repo }
    }

    /// Check credentials; on success the last-login time is updated.
    ///
    /// Unknown user and wrong password are indistinguishable to the caller.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<Identity>> {
        if username.is_empty() || password.is_empty() {
            return Ok(None);
        }

        let Some(mut identity) = self.repo.find_identity(username)? else {
            warn!(username, "Login failed: unknown user");
            return Ok(None);
        };
        if !verify_password(password, &identity.password_hash) {
            warn!(username, "Login failed: wrong password");
            return Ok(None);
        }

        let now = Utc::now();
        self.repo.touch_last_login(&identity.username, now)?;
        identity.last_login = Some(now);
        info!(username, role = %identity.role, "User logged in");
        Ok(Some(identity))
    }

    /// Create an account. Duplicate usernames leave the store untouched.
    pub fn create(&self, new: NewIdentity) -> Result<Identity> {
        let username = new.username.trim();
        if username.is_empty() || new.password.trim().is_empty() {
            return Err(AssistError::validation(MISSING_CREDENTIALS));
        }
        if self.repo.find_identity(username)?.is_some() {
            return Err(AssistError::DuplicateUser(username.to_string()));
        }

        let identity = Identity {
            id: 0,
            username: username.to_string(),
            password_hash: hash_password(&new.password)?,
            role: new.role,
            email: non_blank(new.email),
            full_name: non_blank(new.full_name),
            department: non_blank(new.department),
            created_at: Utc::now(),
            last_login: None,
        };
        let stored = self.repo.insert_identity(identity)?;
        info!(username = %stored.username, role = %stored.role, "User created");
        Ok(stored)
    }

    pub fn find(&self, username: &str) -> Result<Option<Identity>> {
        self.repo.find_identity(username)
    }

    pub fn list(&self) -> Result<Vec<Identity>> {
        self.repo.list_identities()
    }

    /// Create the default accounts when no `admin` account exists.
    ///
    /// Returns true when anything was created.
    pub fn seed_defaults(&self) -> Result<bool> {
        if self.repo.find_identity("admin")?.is_some() {
            return Ok(false);
        }

        for (username, password, role) in DEFAULT_ACCOUNTS {
            match self.create(NewIdentity::new(username, password, role)) {
                Ok(_) | Err(AssistError::DuplicateUser(_)) => {}
                Err(e) => return Err(e),
            }
        }
        warn!("Default accounts created (admin/admin123, user/user123); change these passwords");
        Ok(true)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;

    fn service() -> IdentityService {
        IdentityService::new(Arc::new(SqliteStore::open_in_memory().unwrap()))
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse(None).unwrap(), Role::User);
        assert_eq!(Role::parse(Some("")).unwrap(), Role::User);
        assert_eq!(Role::parse(Some("ADMIN")).unwrap(), Role::Admin);
        assert_eq!(Role::parse(Some(" user ")).unwrap(), Role::User);
        assert!(Role::parse(Some("root")).is_err());
    }

    #[test]
    fn test_create_and_authenticate() {
        let service = service();
        service
            .create(NewIdentity::new("maria", "s3nha", Role::User))
            .unwrap();

        let identity = service.authenticate("maria", "s3nha").unwrap().unwrap();
        assert_eq!(identity.role, Role::User);
        assert!(identity.last_login.is_some());
        assert!(service.find("maria").unwrap().unwrap().last_login.is_some());

        assert!(service.authenticate("maria", "errada").unwrap().is_none());
        assert!(service.authenticate("joao", "s3nha").unwrap().is_none());
        assert!(service.authenticate("", "").unwrap().is_none());
    }

    #[test]
    fn test_missing_credentials() {
        let service = service();
        let err = service
            .create(NewIdentity::new("  ", "x", Role::User))
            .unwrap_err();
        assert_eq!(err.to_string(), MISSING_CREDENTIALS);

        let err = service
            .create(NewIdentity::new("ana", "", Role::User))
            .unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_duplicate_leaves_store_untouched() {
        let service = service();
        service
            .create(NewIdentity::new("ana", "first", Role::User))
            .unwrap();

        let err = service
            .create(NewIdentity::new("ana", "second", Role::Admin))
            .unwrap_err();
        assert!(matches!(err, AssistError::DuplicateUser(_)));

        let list = service.list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].role, Role::User);
        assert!(service.authenticate("ana", "first").unwrap().is_some());
    }

    #[test]
    fn test_seed_defaults_runs_once() {
        let service = service();
        assert!(service.seed_defaults().unwrap());
        assert!(!service.seed_defaults().unwrap());

        let admin = service.authenticate("admin", "admin123").unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
        let user = service.authenticate("user", "user123").unwrap().unwrap();
        assert_eq!(user.role, Role::User);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let service = service();
        let identity = service
            .create(NewIdentity::new("ana", "pw", Role::User))
            .unwrap();
        let json = serde_json::to_value(&identity).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "user");
    }
}
