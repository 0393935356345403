//! In-memory email/password auth provider
//!
//! Accounts and sessions live in `DashMap`s and vanish on restart. Passwords
//! are stored as Argon2id PHC strings; session tokens are 32 random bytes,
//! hex encoded.

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use async_trait::async_trait;
use curate_core::{AuthError, AuthProvider, Session, User};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rand::RngCore;
use tracing::{debug, info, instrument};
use validator::ValidateEmail;

pub const DEFAULT_MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
struct Account {
    user: User,
    /// PHC string, salt and parameters included
    password_hash: String,
}

/// Auth provider holding accounts in memory
#[derive(Debug)]
pub struct InMemoryAuthProvider {
    /// Keyed by lowercased email
    accounts: DashMap<String, Account>,
    /// Session token → account key
    sessions: DashMap<String, String>,
    min_password_len: usize,
}

impl Default for InMemoryAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuthProvider {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            sessions: DashMap::new(),
            min_password_len: DEFAULT_MIN_PASSWORD_LEN,
        }
    }

    pub fn with_min_password_len(mut self, len: usize) -> Self {
        self.min_password_len = len;
        self
    }

    pub fn user_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn open_session(&self, key: String, user: User) -> Session {
        let token = new_token();
        self.sessions.insert(token.clone(), key);
        Session { token, user }
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    if email.validate_email() {
        Ok(email)
    } else {
        Err(AuthError::InvalidEmail(email))
    }
}

/// Argon2id hash of `password` under a fresh random salt
fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt = [0u8; 16];
    rand::rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt).map_err(|e| AuthError::Backend(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Backend(e.to_string()))
}

fn verify_password(password: &str, stored: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(stored).map_err(|e| AuthError::Backend(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Run a hashing step off the async workers
async fn blocking<T, F>(work: F) -> Result<T, AuthError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AuthError::Backend(e.to_string()))?
}

fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[async_trait]
impl AuthProvider for InMemoryAuthProvider {
    #[instrument(skip(self, password))]
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let key = normalize_email(email)?;
        if password.chars().count() < self.min_password_len {
            return Err(AuthError::WeakPassword(self.min_password_len));
        }
        if self.accounts.contains_key(&key) {
            return Err(AuthError::EmailTaken(key));
        }

        let password = password.to_string();
        let password_hash = blocking(move || hash_password(&password)).await?;

        let user = match self.accounts.entry(key.clone()) {
            Entry::Occupied(_) => return Err(AuthError::EmailTaken(key)),
            Entry::Vacant(slot) => {
                let user = User {
                    uid: uuid::Uuid::new_v4().simple().to_string(),
                    email: key.clone(),
                    display_name: None,
                };
                slot.insert(Account {
                    user: user.clone(),
                    password_hash,
                });
                user
            }
        };

        info!(uid = %user.uid, "User signed up");
        Ok(self.open_session(key, user))
    }

    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let key = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;
        let account = self
            .accounts
            .get(&key)
            .map(|account| account.clone())
            .ok_or(AuthError::InvalidCredentials)?;

        let password = password.to_string();
        let stored = account.password_hash;
        if !blocking(move || verify_password(&password, &stored)).await? {
            debug!("Password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        info!(uid = %account.user.uid, "User signed in");
        Ok(self.open_session(key, account.user))
    }

    async fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        if self.sessions.remove(token).is_some() {
            debug!("Session closed");
        }
        Ok(())
    }

    async fn current_user(&self, token: &str) -> Result<Option<User>, AuthError> {
        let Some(key) = self.sessions.get(token).map(|k| k.clone()) else {
            return Ok(None);
        };
        Ok(self.accounts.get(&key).map(|account| account.user.clone()))
    }
}
