use std::collections::HashMap;

use chrono::{DateTime, Utc};
use core_types::config::AdminSettings;
use log::{info, warn};
use parking_lot::RwLock;
use rand::{Rng, distributions::Alphanumeric};

use crate::error::AuthError;

const TOKEN_LEN: usize = 32;
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub issued_at: DateTime<Utc>,
}

/// Recovery message addressed to the configured admin mailbox.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordResetRequest {
    pub email: String,
    pub subject: String,
    pub body: String,
}

pub trait AuthService: Send + Sync {
    fn sign_in(&self, username: &str, password: &str) -> Result<Session, AuthError>;
    fn current_session(&self, token: &str) -> Option<Session>;
    /// Returns false if the token had no session.
    fn sign_out(&self, token: &str) -> bool;
    fn request_password_reset(&self) -> Result<PasswordResetRequest, AuthError>;
}

struct Credentials {
    username: String,
    salt: [u8; 32],
    digest: blake3::Hash,
}

impl Credentials {
    fn new(username: &str, password: &str) -> Self {
        let salt: [u8; 32] = rand::thread_rng().gen();
        Self {
            username: username.to_string(),
            salt,
            digest: blake3::keyed_hash(&salt, password.as_bytes()),
        }
    }

    fn matches(&self, username: &str, password: &str) -> bool {
        // blake3::Hash equality is constant time
        let digest = blake3::keyed_hash(&self.salt, password.as_bytes());
        self.username == username && self.digest == digest
    }
}

/// Single-admin authentication kept in process memory.
pub struct LocalAuth {
    credentials: RwLock<Credentials>,
    sessions: RwLock<HashMap<String, Session>>,
    recovery_email: Option<String>,
}

impl LocalAuth {
    pub fn new(username: &str, password: &str, recovery_email: Option<String>) -> Self {
        Self {
            credentials: RwLock::new(Credentials::new(username, password)),
            sessions: RwLock::new(HashMap::new()),
            recovery_email,
        }
    }

    pub fn from_settings(settings: &AdminSettings) -> Self {
        Self::new(
            settings.username.trim(),
            &settings.password,
            settings.recovery_email.clone(),
        )
    }

    /// Replaces the admin credential. Every other session is revoked.
    pub fn change_credentials(
        &self,
        token: &str,
        username: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        let session = self.current_session(token).ok_or(AuthError::InvalidSession)?;
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::RejectedCredentials {
                reason: "username is required".to_string(),
            });
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::RejectedCredentials {
                reason: format!("password needs at least {MIN_PASSWORD_LEN} characters"),
            });
        }
        *self.credentials.write() = Credentials::new(username, password);
        let mut sessions = self.sessions.write();
        sessions.retain(|key, _| key == &session.token);
        if let Some(current) = sessions.get_mut(&session.token) {
            current.username = username.to_string();
        }
        info!("admin credentials changed by '{}'", session.username);
        Ok(())
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.read().len()
    }
}

impl AuthService for LocalAuth {
    fn sign_in(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let username = username.trim();
        if !self.credentials.read().matches(username, password) {
            warn!("rejected admin sign-in for '{username}'");
            return Err(AuthError::InvalidCredentials);
        }
        let session = Session {
            token: new_token(),
            username: username.to_string(),
            issued_at: Utc::now(),
        };
        self.sessions
            .write()
            .insert(session.token.clone(), session.clone());
        info!("admin '{username}' signed in");
        Ok(session)
    }

    fn current_session(&self, token: &str) -> Option<Session> {
        self.sessions.read().get(token).cloned()
    }

    fn sign_out(&self, token: &str) -> bool {
        self.sessions.write().remove(token).is_some()
    }

    fn request_password_reset(&self) -> Result<PasswordResetRequest, AuthError> {
        let email = self
            .recovery_email
            .clone()
            .ok_or(AuthError::NoRecoveryEmail)?;
        info!("password reset requested for {email}");
        Ok(PasswordResetRequest {
            email,
            subject: "Password recovery - raffle administration".to_string(),
            body: "A password reset was requested for the raffle administrator account. \
                   If you did not request it, ignore this message."
                .to_string(),
        })
    }
}

fn new_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}
