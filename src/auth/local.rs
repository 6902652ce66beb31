//! Local account directory
//!
//! A self-contained identity provider for single-station deployments and
//! tests. Password accounts store a salted SHA-256 digest; federated sign-in
//! trusts the asserted email when the provider is on the allow-list.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};

use super::{AuthError, Credentials, IdentityProvider, SignInMethod, User};
use crate::domain::normalize_email;

/// Password account metadata (never store plaintext)
#[derive(Debug, Clone)]
pub struct PasswordAccount {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    salt: [u8; 16],
    password_hash: String,
    pub active: bool,
}

impl PasswordAccount {
    pub fn new(email: &str, password: &str, display_name: Option<String>) -> Self {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let email = normalize_email(email);

        Self {
            uid: derive_uid("password", &email),
            password_hash: hash_password(&salt, password),
            email,
            display_name,
            salt,
            active: true,
        }
    }

    /// Rebuild an account from a stored `salt_hex:hash_hex` digest.
    ///
    /// Returns `None` when the digest is malformed.
    pub fn from_digest(email: &str, digest: &str, display_name: Option<String>) -> Option<Self> {
        let (salt_hex, hash_hex) = digest.trim().split_once(':')?;
        let salt: [u8; 16] = hex::decode(salt_hex).ok()?.try_into().ok()?;
        let hash = hex::decode(hash_hex).ok()?;
        if hash.len() != 32 {
            return None;
        }
        let email = normalize_email(email);

        Some(Self {
            uid: derive_uid("password", &email),
            password_hash: hex::encode(hash),
            email,
            display_name,
            salt,
            active: true,
        })
    }

    /// Storable form of the credential, readable by [`PasswordAccount::from_digest`]
    pub fn digest(&self) -> String {
        format!("{}:{}", hex::encode(self.salt), self.password_hash)
    }

    fn verify(&self, password: &str) -> bool {
        hash_password(&self.salt, password) == self.password_hash
    }
}

/// Hash a password with its salt for storage
fn hash_password(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn derive_uid(method: &str, email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b":");
    hasher.update(email.as_bytes());
    hex::encode(hasher.finalize())[..28].to_string()
}

/// In-process identity provider
pub struct LocalIdentityProvider {
    accounts: RwLock<HashMap<String, PasswordAccount>>,
    federated_providers: HashSet<String>,
    state: watch::Sender<Option<User>>,
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            accounts: RwLock::new(HashMap::new()),
            federated_providers: HashSet::new(),
            state,
        }
    }

    /// Accept federated assertions from `provider`
    pub fn allow_federated(mut self, provider: impl Into<String>) -> Self {
        self.federated_providers.insert(provider.into());
        self
    }

    /// Register a password account, replacing any existing one for the email
    pub async fn register(&self, account: PasswordAccount) {
        let mut accounts = self.accounts.write().await;
        accounts.insert(account.email.clone(), account);
    }

    /// Disable an account; an active session for it is ended
    pub async fn disable(&self, email: &str) {
        let email = normalize_email(email);
        if let Some(account) = self.accounts.write().await.get_mut(&email) {
            account.active = false;
        }
        if self
            .current_user()
            .is_some_and(|u| u.email == email)
        {
            self.sign_out().await;
        }
    }
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in(&self, credentials: Credentials) -> Result<User, AuthError> {
        let user = match credentials {
            Credentials::Password { email, password } => {
                let email = normalize_email(&email);
                let accounts = self.accounts.read().await;
                let account = accounts.get(&email).ok_or(AuthError::InvalidCredentials)?;

                if !account.verify(&password) {
                    warn!(email = %email, "password sign-in rejected");
                    return Err(AuthError::InvalidCredentials);
                }
                if !account.active {
                    return Err(AuthError::AccountDisabled);
                }

                User {
                    uid: account.uid.clone(),
                    email: account.email.clone(),
                    display_name: account.display_name.clone(),
                    method: SignInMethod::Password,
                }
            }
            Credentials::Federated { provider, email } => {
                if !self.federated_providers.contains(&provider) {
                    return Err(AuthError::ProviderNotAllowed(provider));
                }
                let email = normalize_email(&email);
                User {
                    uid: derive_uid(&provider, &email),
                    email,
                    display_name: None,
                    method: SignInMethod::Federated { provider },
                }
            }
        };

        info!(uid = %user.uid, email = %user.email, "signed in");
        self.state.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) {
        if let Some(previous) = self.state.send_replace(None) {
            info!(uid = %previous.uid, "signed out");
        }
    }

    fn current_user(&self) -> Option<User> {
        self.state.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn provider() -> LocalIdentityProvider {
        let provider = LocalIdentityProvider::new().allow_federated("google");
        provider
            .register(PasswordAccount::new(
                "Staff@Fest.org",
                "hunter22",
                Some("Gate 1".to_string()),
            ))
            .await;
        provider
    }

    #[tokio::test]
    async fn test_password_sign_in() {
        let provider = provider().await;

        let user = provider
            .sign_in(Credentials::password("staff@fest.org", "hunter22"))
            .await
            .unwrap();
        assert_eq!(user.email, "staff@fest.org");
        assert_eq!(provider.current_user(), Some(user));
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let provider = provider().await;

        let result = provider
            .sign_in(Credentials::password("staff@fest.org", "wrong"))
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        assert!(provider.current_user().is_none());
    }

    #[tokio::test]
    async fn test_federated_provider_allow_list() {
        let provider = provider().await;

        let user = provider
            .sign_in(Credentials::federated("google", "cs101@smail.iitm.ac.in"))
            .await
            .unwrap();
        assert!(matches!(user.method, SignInMethod::Federated { .. }));

        let denied = provider
            .sign_in(Credentials::federated("github", "x@y.z"))
            .await;
        assert!(matches!(denied, Err(AuthError::ProviderNotAllowed(_))));
    }

    #[tokio::test]
    async fn test_subscribers_see_sign_out() {
        let provider = provider().await;
        let mut rx = provider.subscribe();

        provider
            .sign_in(Credentials::password("staff@fest.org", "hunter22"))
            .await
            .unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_some());

        provider.sign_out().await;
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_none());
    }

    #[tokio::test]
    async fn test_stored_digest_signs_in() {
        let original = PasswordAccount::new("gate@fest.org", "letmein9", None);
        let restored = PasswordAccount::from_digest("Gate@Fest.org", &original.digest(), None).unwrap();
        assert_eq!(restored.uid, original.uid);

        let provider = LocalIdentityProvider::new();
        provider.register(restored).await;
        assert!(provider
            .sign_in(Credentials::password("gate@fest.org", "letmein9"))
            .await
            .is_ok());
        assert!(provider
            .sign_in(Credentials::password("gate@fest.org", "letmein8"))
            .await
            .is_err());
    }

    #[test]
    fn test_malformed_digest_rejected() {
        assert!(PasswordAccount::from_digest("a@b.c", "nocolon", None).is_none());
        assert!(PasswordAccount::from_digest("a@b.c", "zz:00", None).is_none());
        assert!(PasswordAccount::from_digest("a@b.c", &format!("{}:{}", "00".repeat(16), "ab"), None).is_none());
    }

    #[tokio::test]
    async fn test_disabled_account_signed_out() {
        let provider = provider().await;
        provider
            .sign_in(Credentials::password("staff@fest.org", "hunter22"))
            .await
            .unwrap();

        provider.disable("staff@fest.org").await;
        assert!(provider.current_user().is_none());

        let result = provider
            .sign_in(Credentials::password("staff@fest.org", "hunter22"))
            .await;
        assert!(matches!(result, Err(AuthError::AccountDisabled)));
    }
}
