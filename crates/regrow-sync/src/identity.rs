//! Who is playing.

use serde::{Deserialize, Serialize};

/// Key addressing a user's record in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserKey(String);

impl UserKey {
    /// Wrap a user key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Identity signal supplied by the authentication layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Authentication is still resolving.
    #[default]
    Unknown,
    /// Signed out.
    Anonymous,
    /// Signed in as the given user.
    Authenticated(UserKey),
}

impl Identity {
    /// Shorthand for `Identity::Authenticated(UserKey::new(key))`.
    pub fn user(key: impl Into<String>) -> Self {
        Self::Authenticated(UserKey::new(key))
    }

    /// The user key, if signed in.
    pub fn user_key(&self) -> Option<&UserKey> {
        match self {
            Self::Authenticated(key) => Some(key),
            _ => None,
        }
    }

    /// Whether this identity may spend currency on actions.
    pub fn gate(&self) -> ActionGate {
        match self {
            Self::Authenticated(_) => ActionGate::Allowed,
            Self::Unknown | Self::Anonymous => ActionGate::LoginRequired,
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Anonymous => write!(f, "guest"),
            Self::Authenticated(key) => write!(f, "user:{key}"),
        }
    }
}

/// Whether the presentation layer should forward an action intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionGate {
    /// Forward the intent.
    Allowed,
    /// Block the intent and prompt the user to sign in.
    LoginRequired,
}

impl ActionGate {
    /// Whether actions are allowed.
    pub fn is_allowed(self) -> bool {
        self == ActionGate::Allowed
    }
}
