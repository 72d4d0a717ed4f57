//! Authentication gate
//!
//! Turns `(email, password)` into an [`AuthenticatedUser`] or rejects it,
//! and registers new accounts. Password hashes are bcrypt, computed on a
//! blocking thread.

use crate::error::{Error, Result};
use crate::keys::KeyProvisioner;
use crate::message::is_valid_address;
use crate::user::{Identity, NewUser, UserStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

const MIN_PASSWORD_LEN: usize = 8;

/// Sign-up request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    /// # Errors
    ///
    /// [`Error::InvalidInput`] for an empty name, a malformed email or a
    /// password shorter than eight characters.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("Name is required".into()));
        }
        if !is_valid_address(&self.email) {
            return Err(Error::InvalidInput("Invalid email address".into()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::InvalidInput(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }
}

/// The identity a successful login yields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub public_key: String,
}

pub struct AuthGate {
    users: Arc<dyn UserStore>,
    keys: Arc<dyn KeyProvisioner>,
    hash_cost: u32,
}

impl AuthGate {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, keys: Arc<dyn KeyProvisioner>, hash_cost: u32) -> Self {
        Self {
            users,
            keys,
            hash_cost,
        }
    }

    /// Create an account with freshly provisioned keys.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for a malformed request,
    /// [`Error::Conflict`] if the email is taken.
    pub async fn register(&self, registration: Registration) -> Result<Identity> {
        registration.validate()?;

        // Cheap early rejection; the store re-checks atomically on insert.
        if self.users.find_by_email(&registration.email)?.is_some() {
            return Err(Error::Conflict(format!(
                "Email {} is already registered",
                registration.email
            )));
        }

        let password_hash = hash_password(registration.password, self.hash_cost).await?;
        let user = self.users.insert(NewUser {
            name: registration.name,
            email: registration.email,
            password_hash,
            keys: Some(self.keys.provision()),
        })?;

        info!("New user registered: {}", user.email);
        Ok(user.identity())
    }

    /// Check credentials.
    ///
    /// Unknown email and wrong password both fail with
    /// [`Error::InvalidCredentials`]. Accounts without key material get
    /// keys on their first successful login.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCredentials`] on a failed check; store errors are
    /// passed through.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<AuthenticatedUser> {
        let Some(user) = self.users.find_by_email(email)? else {
            warn!("Failed login attempt");
            return Err(Error::InvalidCredentials);
        };

        if !verify_password(password.to_string(), user.password_hash.clone()).await? {
            warn!("Failed login attempt");
            return Err(Error::InvalidCredentials);
        }

        let keys = match user.keys {
            Some(keys) => keys,
            None => {
                debug!("Provisioning keys for {}", user.email);
                self.users.ensure_keys(&user.email, self.keys.provision())?
            }
        };

        Ok(AuthenticatedUser {
            id: user.id,
            name: user.name,
            email: user.email,
            public_key: keys.public_key,
        })
    }
}

async fn hash_password(password: String, cost: u32) -> Result<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| Error::Hash(e.to_string()))?
        .map_err(Error::from)
}

async fn verify_password(password: String, hash: String) -> Result<bool> {
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| Error::Hash(e.to_string()))?;

    // A corrupt stored hash is indistinguishable from a wrong password.
    Ok(verified.unwrap_or_else(|e| {
        warn!("Stored password hash unreadable: {}", e);
        false
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{KeyPair, OpaqueKeyProvisioner};
    use crate::user::MemoryUserStore;

    const TEST_COST: u32 = 4;

    fn gate() -> (AuthGate, Arc<MemoryUserStore>) {
        let users = Arc::new(MemoryUserStore::new());
        let gate = AuthGate::new(users.clone(), Arc::new(OpaqueKeyProvisioner), TEST_COST);
        (gate, users)
    }

    #[tokio::test]
    async fn register_then_authenticate() {
        let (gate, _) = gate();
        let identity = gate
            .register(Registration::new("A", "a@x.com", "password1"))
            .await
            .unwrap();
        assert_eq!(identity.id, "1");
        assert_eq!(identity.email, "a@x.com");

        let user = gate.authenticate("a@x.com", "password1").await.unwrap();
        assert_eq!(user.id, "1");
        assert_eq!(user.name, "A");
        assert!(!user.public_key.is_empty());
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let (gate, _) = gate();
        gate.register(Registration::new("A", "a@x.com", "password1"))
            .await
            .unwrap();
        let err = gate
            .register(Registration::new("A again", "a@x.com", "password2"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn registration_validation() {
        let (gate, _) = gate();
        for reg in [
            Registration::new("", "a@x.com", "password1"),
            Registration::new("A", "not-an-email", "password1"),
            Registration::new("A", "a@x.com", "short"),
        ] {
            let err = gate.register(reg).await.unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)));
        }
    }

    #[tokio::test]
    async fn password_is_hashed() {
        let (gate, users) = gate();
        gate.register(Registration::new("A", "a@x.com", "password1"))
            .await
            .unwrap();
        let stored = users.find_by_email("a@x.com").unwrap().unwrap();
        assert_ne!(stored.password_hash, "password1");
        assert!(stored.password_hash.starts_with("$2"));
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_look_the_same() {
        let (gate, _) = gate();
        gate.register(Registration::new("A", "a@x.com", "password1"))
            .await
            .unwrap();

        let unknown = gate.authenticate("nobody@x.com", "password1").await.unwrap_err();
        let wrong = gate.authenticate("a@x.com", "password2").await.unwrap_err();

        assert!(matches!(unknown, Error::InvalidCredentials));
        assert!(matches!(wrong, Error::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_eq!(unknown.kind(), wrong.kind());
    }

    #[tokio::test]
    async fn login_provisions_missing_keys_once() {
        let (gate, users) = gate();
        let hash = bcrypt::hash("password1", TEST_COST).unwrap();
        users
            .insert(NewUser {
                name: "Legacy".into(),
                email: "old@x.com".into(),
                password_hash: hash,
                keys: None,
            })
            .unwrap();

        let first = gate.authenticate("old@x.com", "password1").await.unwrap();
        let second = gate.authenticate("old@x.com", "password1").await.unwrap();
        assert!(!first.public_key.is_empty());
        assert_eq!(first.public_key, second.public_key);
    }

    #[tokio::test]
    async fn concurrent_first_logins_agree_on_keys() {
        let (gate, users) = gate();
        let hash = bcrypt::hash("password1", TEST_COST).unwrap();
        users
            .insert(NewUser {
                name: "Legacy".into(),
                email: "old@x.com".into(),
                password_hash: hash,
                keys: None,
            })
            .unwrap();

        let (a, b) = tokio::join!(
            gate.authenticate("old@x.com", "password1"),
            gate.authenticate("old@x.com", "password1"),
        );
        let stored = users.find_by_email("old@x.com").unwrap().unwrap().keys.unwrap();
        assert_eq!(a.unwrap().public_key, stored.public_key);
        assert_eq!(b.unwrap().public_key, stored.public_key);
    }

    #[tokio::test]
    async fn registration_provisions_keys() {
        let (gate, users) = gate();
        gate.register(Registration::new("A", "a@x.com", "password1"))
            .await
            .unwrap();
        let stored: Option<KeyPair> = users.find_by_email("a@x.com").unwrap().unwrap().keys;
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn corrupt_hash_is_invalid_credentials() {
        let (gate, users) = gate();
        users
            .insert(NewUser {
                name: "Broken".into(),
                email: "broken@x.com".into(),
                password_hash: "not-a-bcrypt-hash".into(),
                keys: None,
            })
            .unwrap();

        let err = gate.authenticate("broken@x.com", "password1").await.unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials));
    }
}
