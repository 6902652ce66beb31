//! Identity for staff and students
//!
//! Sign-in is delegated to an identity provider. Two credential kinds are
//! accepted:
//!
//! - **Password**: staff accounts on the scanner and search screens
//! - **Federated**: an identity asserted by an external provider, used by
//!   students on the portal
//!
//! Auth-state changes are published on a `watch` channel so screens can react
//! to sign-in and sign-out without polling.

mod local;

pub use local::*;

use async_trait::async_trait;
use tokio::sync::watch;

/// A signed-in user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Stable provider-assigned id
    pub uid: String,

    /// Email address (lower-cased)
    pub email: String,

    pub display_name: Option<String>,

    pub method: SignInMethod,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInMethod {
    Password,
    Federated { provider: String },
}

/// Credentials presented at sign-in
#[derive(Clone)]
pub enum Credentials {
    Password { email: String, password: String },
    Federated { provider: String, email: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Password { email, .. } => f
                .debug_struct("Password")
                .field("email", email)
                .finish_non_exhaustive(),
            Credentials::Federated { provider, email } => f
                .debug_struct("Federated")
                .field("provider", provider)
                .field("email", email)
                .finish(),
        }
    }
}

impl Credentials {
    pub fn password(email: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Password {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn federated(provider: impl Into<String>, email: impl Into<String>) -> Self {
        Credentials::Federated {
            provider: provider.into(),
            email: email.into(),
        }
    }
}

/// Authentication error
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("account disabled")]
    AccountDisabled,

    #[error("sign-in provider not allowed: {0}")]
    ProviderNotAllowed(String),

    #[error("email domain not allowed: {0}")]
    DomainNotAllowed(String),

    #[error("not signed in")]
    NotSignedIn,

    #[error("identity service unavailable: {0}")]
    Unavailable(String),
}

impl AuthError {
    /// Message shown on the sign-in form
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials | AuthError::AccountDisabled => {
                "Invalid email or password. Please try again."
            }
            AuthError::ProviderNotAllowed(_) | AuthError::DomainNotAllowed(_) => {
                "This account is not allowed to sign in here."
            }
            AuthError::NotSignedIn => "Please sign in first.",
            AuthError::Unavailable(_) => "Sign-in service unavailable. Try again shortly.",
        }
    }
}

/// Identity provider contract
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Interactive sign-in. On success the new user is published to subscribers.
    async fn sign_in(&self, credentials: Credentials) -> Result<User, AuthError>;

    /// End the current session. Publishes `None`.
    async fn sign_out(&self);

    /// The currently signed-in user, if any
    fn current_user(&self) -> Option<User>;

    /// Auth-state stream; the receiver sees the current user and every change
    fn subscribe(&self) -> watch::Receiver<Option<User>>;
}
