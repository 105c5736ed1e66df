//! Identity keys for rate and budget subjects.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A rate/budget subject: an opaque map key plus its tier
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque key, never interpreted beyond map lookups
    pub key: String,

    /// Whether the subject is an authenticated user (higher limits)
    pub authenticated: bool,
}

impl Identity {
    /// Create an identity from a raw key
    pub fn new(key: impl Into<String>, authenticated: bool) -> Self {
        Self {
            key: key.into(),
            authenticated,
        }
    }

    /// Authenticated user, keyed `user:{id}`
    pub fn user(user_id: &str) -> Self {
        Self::new(format!("user:{user_id}"), true)
    }

    /// Anonymous session, keyed `session:{id}`
    pub fn session(session_id: &str) -> Self {
        Self::new(format!("session:{session_id}"), false)
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}
