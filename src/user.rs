//! User directory

use crate::error::{Error, Result};
use crate::keys::KeyPair;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// An account record. Email is the unique key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub keys: Option<KeyPair>,
}

impl User {
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Public view of a user: no password hash, no key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// A new account, before the directory assigns its id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub keys: Option<KeyPair>,
}

/// Storage for user accounts.
pub trait UserStore: Send + Sync {
    fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Insert a user, assigning its id. The existence check and the
    /// insert happen as one step; a taken email yields
    /// [`Error::Conflict`].
    fn insert(&self, user: NewUser) -> Result<User>;

    /// Store `keys` for the user with this email unless they already
    /// have key material. Returns the pair the user ends up with.
    fn ensure_keys(&self, email: &str, keys: KeyPair) -> Result<KeyPair>;

    /// Every user, in id order.
    fn users(&self) -> Result<Vec<User>>;
}

/// In-memory [`UserStore`]. Ids are assigned "1", "2", ... in
/// registration order.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, User>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_users(users: Vec<User>) -> Self {
        Self {
            users: Mutex::new(users.into_iter().map(|u| (u.email.clone(), u)).collect()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, User>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UserStore for MemoryUserStore {
    fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.lock().get(email).cloned())
    }

    fn insert(&self, user: NewUser) -> Result<User> {
        let mut users = self.lock();
        if users.contains_key(&user.email) {
            return Err(Error::Conflict(format!(
                "Email {} is already registered",
                user.email
            )));
        }

        let next_id = users
            .values()
            .filter_map(|u| u.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let created = User {
            id: next_id.to_string(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            keys: user.keys,
        };
        users.insert(created.email.clone(), created.clone());
        drop(users);
        Ok(created)
    }

    fn ensure_keys(&self, email: &str, keys: KeyPair) -> Result<KeyPair> {
        let mut users = self.lock();
        let user = users
            .get_mut(email)
            .ok_or_else(|| Error::NotFound(format!("No user {email}")))?;
        let stored = user.keys.get_or_insert(keys).clone();
        drop(users);
        Ok(stored)
    }

    fn users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.lock().values().cloned().collect();
        users.sort_by_key(|u| u.id.parse::<u64>().unwrap_or(u64::MAX));
        Ok(users)
    }
}
