//! Route authorization guard

use serde::{Deserialize, Serialize};

use super::Role;

/// Authenticated caller as resolved from a live session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    pub role: Role,
}

impl Principal {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// What a route demands of its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Authenticated,
    Privileged,
}

/// Outcome of [`authorize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Unauthenticated,
    Unprivileged,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Message shown to a rejected caller
    pub fn denial_message(&self) -> Option<&'static str> {
        match self {
            Self::Allowed => None,
            Self::Unauthenticated => Some("Não autorizado"),
            Self::Unprivileged => Some("Acesso negado"),
        }
    }
}

/// Decide whether `principal` may use a route with the given requirement.
pub fn authorize(principal: Option<&Principal>, requirement: Requirement) -> AccessDecision {
    match (principal, requirement) {
        (None, _) => AccessDecision::Unauthenticated,
        (Some(_), Requirement::Authenticated) => AccessDecision::Allowed,
        (Some(p), Requirement::Privileged) if p.is_admin() => AccessDecision::Allowed,
        (Some(_), Requirement::Privileged) => AccessDecision::Unprivileged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_is_always_unauthenticated() {
        assert_eq!(authorize(None, Requirement::Authenticated), AccessDecision::Unauthenticated);
        assert_eq!(authorize(None, Requirement::Privileged), AccessDecision::Unauthenticated);
    }

    #[test]
    fn test_standard_user() {
        let user = Principal::new("maria", Role::User);
        assert!(authorize(Some(&user), Requirement::Authenticated).is_allowed());
        assert_eq!(authorize(Some(&user), Requirement::Privileged), AccessDecision::Unprivileged);
    }

    #[test]
    fn test_admin_passes_everything() {
        let admin = Principal::new("admin", Role::Admin);
        assert!(authorize(Some(&admin), Requirement::Authenticated).is_allowed());
        assert!(authorize(Some(&admin), Requirement::Privileged).is_allowed());
    }

    #[test]
    fn test_denial_messages() {
        assert_eq!(AccessDecision::Unauthenticated.denial_message(), Some("Não autorizado"));
        assert_eq!(AccessDecision::Unprivileged.denial_message(), Some("Acesso negado"));
        assert_eq!(AccessDecision::Allowed.denial_message(), None);
    }
}
