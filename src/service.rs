//! The `Webmail` service
//!
//! Public operations of the webmail backend. Every mail operation takes a
//! [`SessionToken`] issued by [`Webmail::authenticate`] and acts on the
//! mailbox of the user behind it.

use crate::auth::{AuthGate, AuthenticatedUser, Registration};
use crate::config::Config;
use crate::demo::{DEMO_PASSWORD, DEMO_USERS, DemoSeeder};
use crate::error::{Error, Result};
use crate::folder::Folder;
use crate::keys::{KeyProvisioner, OpaqueKeyProvisioner};
use crate::message::{Message, MessageId, OutgoingMessage, SendReceipt, preview};
use crate::settings::MailSettings;
use crate::snapshot::Snapshot;
use crate::store::{self, MailStore, MemoryStore};
use crate::user::{Identity, MemoryUserStore, UserStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Opaque handle for a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: SessionToken,
    pub user: AuthenticatedUser,
}

/// Webmail backend over injected user and mail stores
pub struct Webmail {
    config: Config,
    mail: Arc<dyn MailStore>,
    users: Arc<dyn UserStore>,
    auth: AuthGate,
    sessions: Mutex<HashMap<SessionToken, AuthenticatedUser>>,
    settings: Mutex<HashMap<String, MailSettings>>,
    demo: DemoSeeder,
}

impl Webmail {
    /// A service over empty in-memory stores.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_stores(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryUserStore::new()),
            Arc::new(OpaqueKeyProvisioner),
        )
    }

    #[must_use]
    pub fn with_stores(
        config: Config,
        mail: Arc<dyn MailStore>,
        users: Arc<dyn UserStore>,
        keys: Arc<dyn KeyProvisioner>,
    ) -> Self {
        let auth = AuthGate::new(users.clone(), keys, config.hash_cost);
        Self {
            config,
            mail,
            users,
            auth,
            sessions: Mutex::new(HashMap::new()),
            settings: Mutex::new(HashMap::new()),
            demo: DemoSeeder::new(),
        }
    }

    /// [`Webmail::new`], plus the demo accounts when `config.demo_users`
    /// is set.
    ///
    /// # Errors
    ///
    /// Fails if a demo account cannot be registered.
    pub async fn bootstrap(config: Config) -> Result<Self> {
        let webmail = Self::new(config);
        if webmail.config.demo_users {
            webmail.seed_demo_users().await?;
        }
        Ok(webmail)
    }

    /// Rebuild a service from a saved [`Snapshot`].
    #[must_use]
    pub fn from_snapshot(config: Config, snapshot: Snapshot) -> Self {
        let mut webmail = Self::with_stores(
            config,
            Arc::new(MemoryStore::from_mailboxes(snapshot.mailboxes)),
            Arc::new(MemoryUserStore::from_users(snapshot.users)),
            Arc::new(OpaqueKeyProvisioner),
        );
        webmail.settings = Mutex::new(snapshot.settings.into_iter().collect());
        webmail.demo = DemoSeeder::from_claimed(snapshot.demo_seeded);
        webmail
    }

    /// Current state, sessions excluded.
    ///
    /// # Errors
    ///
    /// Store errors are passed through.
    pub fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            users: self.users.users()?,
            mailboxes: self.mail.export()?,
            settings: lock(&self.settings)
                .iter()
                .map(|(email, settings)| (email.clone(), settings.clone()))
                .collect(),
            demo_seeded: self.demo.claimed(),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Register every missing demo account.
    ///
    /// # Errors
    ///
    /// Any registration failure other than an existing account.
    pub async fn seed_demo_users(&self) -> Result<()> {
        for (name, email) in DEMO_USERS {
            match self.register(Registration::new(name, email, DEMO_PASSWORD)).await {
                Ok(_) | Err(Error::Conflict(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    // -- accounts --

    /// Create an account.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for a malformed request,
    /// [`Error::Conflict`] if the email is already registered.
    pub async fn register(&self, registration: Registration) -> Result<Identity> {
        self.auth.register(registration).await
    }

    /// Check credentials and open a session.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCredentials`] for an unknown email or a wrong
    /// password alike.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Session> {
        let user = self.auth.authenticate(email, password).await?;
        let token = SessionToken::generate();
        lock(&self.sessions).insert(token.clone(), user.clone());

        info!("User signed in: {}", user.email);
        Ok(Session { token, user })
    }

    /// Close a session. Returns whether it was open.
    pub fn sign_out(&self, token: &SessionToken) -> bool {
        lock(&self.sessions).remove(token).is_some()
    }

    /// The user behind `token`.
    ///
    /// # Errors
    ///
    /// [`Error::Unauthorized`] for an unknown or closed session.
    pub fn current_user(&self, token: &SessionToken) -> Result<AuthenticatedUser> {
        lock(&self.sessions)
            .get(token)
            .cloned()
            .ok_or(Error::Unauthorized)
    }

    // -- mail --

    /// Messages of the signed-in user in `folder`, newest first.
    ///
    /// # Errors
    ///
    /// [`Error::Unauthorized`] without a session.
    pub fn list_mail(&self, token: &SessionToken, folder: Folder) -> Result<Vec<Message>> {
        let user = self.current_user(token)?;
        let mut messages = self.mail.list_by_folder(&user.email, folder)?;

        if messages.is_empty() && self.config.demo_mailbox {
            let seeded = self.demo.claim(&user.email, folder, Utc::now());
            if !seeded.is_empty() {
                debug!("Seeding {} demo message(s) into {} {}", seeded.len(), user.email, folder);
                let rows = seeded.into_iter().map(|m| (user.email.clone(), m)).collect();
                self.mail.append_batch(rows)?;
                messages = self.mail.list_by_folder(&user.email, folder)?;
            }
        }

        debug!("Fetched {} emails for {} from {} folder", messages.len(), user.email, folder);
        Ok(messages)
    }

    /// Send a message from the signed-in user.
    ///
    /// Stores a SENT copy for the sender and an INBOX copy for each
    /// address in `to` and `cc`; an address in both lists gets two.
    ///
    /// # Errors
    ///
    /// [`Error::Unauthorized`] without a session, [`Error::InvalidInput`]
    /// for a malformed message or an oversized attachment.
    pub fn send_mail(
        &self,
        token: &SessionToken,
        outgoing: OutgoingMessage,
    ) -> Result<SendReceipt> {
        let user = self.current_user(token)?;
        outgoing.validate(self.config.max_attachment_bytes)?;

        debug!(
            "Sending '{}' from {}: {}",
            outgoing.subject,
            user.email,
            preview(&outgoing.body)
        );
        let receipt = store::send(self.mail.as_ref(), &user.email, outgoing)?;

        info!(
            "Email {} sent by {} to {} recipient(s), {} attachment(s) ({} KB)",
            receipt.message_id,
            user.email,
            receipt.recipient_count,
            receipt.attachment_count,
            receipt.attachment_bytes.div_ceil(1024)
        );
        Ok(receipt)
    }

    /// Delete the messages in `ids` from `folder`: a move to TRASH, or
    /// permanent removal when `folder` is TRASH. Returns the number of
    /// messages affected.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for an empty `ids`, [`Error::NotFound`]
    /// if the user has no mailbox.
    pub fn delete_or_move_mail(
        &self,
        token: &SessionToken,
        ids: &[MessageId],
        folder: Folder,
    ) -> Result<usize> {
        let user = self.current_user(token)?;
        if ids.is_empty() {
            return Err(Error::InvalidInput("At least one message id is required".into()));
        }

        let affected = self.mail.delete_or_move(&user.email, ids, folder)?;
        info!("Deleted/moved {} emails for user {} from {}", affected, user.email, folder);
        Ok(affected)
    }

    /// Mark the messages in `ids` read or unread. Returns the number of
    /// messages updated.
    ///
    /// # Errors
    ///
    /// [`Error::Unauthorized`] without a session, [`Error::InvalidInput`]
    /// for an empty `ids`.
    pub fn mark_read(&self, token: &SessionToken, ids: &[MessageId], read: bool) -> Result<usize> {
        let user = self.current_user(token)?;
        if ids.is_empty() {
            return Err(Error::InvalidInput("At least one message id is required".into()));
        }
        self.mail.set_read(&user.email, ids, read)
    }

    // -- settings --

    /// IMAP/SMTP settings of the signed-in user, defaults if never saved.
    ///
    /// # Errors
    ///
    /// [`Error::Unauthorized`] without a session.
    pub fn settings(&self, token: &SessionToken) -> Result<MailSettings> {
        let user = self.current_user(token)?;
        Ok(lock(&self.settings)
            .get(&user.email)
            .cloned()
            .unwrap_or_else(|| MailSettings::for_account(&user.email)))
    }

    /// Replace the IMAP/SMTP settings of the signed-in user.
    ///
    /// # Errors
    ///
    /// [`Error::Unauthorized`] without a session, [`Error::InvalidInput`]
    /// for an empty host or a zero port.
    pub fn update_settings(&self, token: &SessionToken, settings: MailSettings) -> Result<()> {
        let user = self.current_user(token)?;
        settings.validate()?;
        lock(&self.settings).insert(user.email.clone(), settings);
        info!("Settings saved for {}", user.email);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            hash_cost: 4,
            ..Config::default()
        }
    }

    async fn signed_in(webmail: &Webmail, email: &str) -> SessionToken {
        webmail
            .register(Registration::new("User", email, "password1"))
            .await
            .unwrap();
        webmail.authenticate(email, "password1").await.unwrap().token
    }

    fn outgoing(to: &[&str]) -> OutgoingMessage {
        OutgoingMessage {
            to: to.iter().map(ToString::to_string).collect(),
            subject: "Hello".into(),
            body: "Body".into(),
            ..OutgoingMessage::default()
        }
    }

    #[tokio::test]
    async fn unknown_token_is_unauthorized() {
        let webmail = Webmail::new(config());
        let token = SessionToken::from("nope".to_string());
        assert!(matches!(
            webmail.list_mail(&token, Folder::Inbox),
            Err(Error::Unauthorized)
        ));
        assert!(matches!(
            webmail.send_mail(&token, outgoing(&["b@x.com"])),
            Err(Error::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn sign_out_closes_session() {
        let webmail = Webmail::new(config());
        let token = signed_in(&webmail, "a@x.com").await;
        assert!(webmail.current_user(&token).is_ok());
        assert!(webmail.sign_out(&token));
        assert!(!webmail.sign_out(&token));
        assert!(matches!(webmail.current_user(&token), Err(Error::Unauthorized)));
    }

    #[tokio::test]
    async fn empty_ids_is_invalid_input() {
        let webmail = Webmail::new(config());
        let token = signed_in(&webmail, "a@x.com").await;
        assert!(matches!(
            webmail.delete_or_move_mail(&token, &[], Folder::Inbox),
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn delete_without_mailbox_is_not_found() {
        let webmail = Webmail::new(config());
        let token = signed_in(&webmail, "a@x.com").await;
        let err = webmail
            .delete_or_move_mail(&token, &[MessageId::from("m1")], Folder::Inbox)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn oversized_attachment_rejected() {
        let webmail = Webmail::new(Config {
            max_attachment_bytes: 16,
            ..config()
        });
        let token = signed_in(&webmail, "a@x.com").await;
        let mut msg = outgoing(&["b@x.com"]);
        msg.attachments.push(crate::Attachment {
            id: "1".into(),
            filename: "big.bin".into(),
            content: String::new(),
            content_type: "application/octet-stream".into(),
            size: 17,
        });

        assert!(matches!(webmail.send_mail(&token, msg), Err(Error::InvalidInput(_))));
        assert!(!webmail.mail.has_mailbox("b@x.com").unwrap());
    }

    #[tokio::test]
    async fn demo_mailbox_seeds_once() {
        let webmail = Webmail::new(Config {
            demo_mailbox: true,
            ..config()
        });
        let token = signed_in(&webmail, "a@x.com").await;

        let spam = webmail.list_mail(&token, Folder::Spam).unwrap();
        assert_eq!(spam.len(), 1);

        webmail
            .delete_or_move_mail(&token, &[spam[0].id.clone()], Folder::Spam)
            .unwrap();
        assert!(webmail.list_mail(&token, Folder::Spam).unwrap().is_empty());
    }

    #[tokio::test]
    async fn demo_mailbox_off_by_default() {
        let webmail = Webmail::new(config());
        let token = signed_in(&webmail, "a@x.com").await;
        for folder in Folder::ALL {
            assert!(webmail.list_mail(&token, folder).unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn settings_default_then_update() {
        let webmail = Webmail::new(config());
        let token = signed_in(&webmail, "a@x.com").await;

        let mut settings = webmail.settings(&token).unwrap();
        assert_eq!(settings, MailSettings::for_account("a@x.com"));

        settings.imap.host = "imap.x.com".into();
        webmail.update_settings(&token, settings.clone()).unwrap();
        assert_eq!(webmail.settings(&token).unwrap(), settings);

        settings.smtp.port = 0;
        assert!(webmail.update_settings(&token, settings).is_err());
    }

    #[tokio::test]
    async fn bootstrap_registers_demo_users() {
        let webmail = Webmail::bootstrap(Config {
            demo_users: true,
            ..config()
        })
        .await
        .unwrap();

        let session = webmail
            .authenticate("demo@example.com", DEMO_PASSWORD)
            .await
            .unwrap();
        assert_eq!(session.user.id, "1");
        assert_eq!(session.user.name, "Demo User");

        // Seeding again is a no-op.
        webmail.seed_demo_users().await.unwrap();
        assert_eq!(webmail.snapshot().unwrap().users.len(), DEMO_USERS.len());
    }

    #[tokio::test]
    async fn snapshot_restores_state() {
        let webmail = Webmail::new(config());
        let token = signed_in(&webmail, "a@x.com").await;
        webmail.send_mail(&token, outgoing(&["b@x.com"])).unwrap();

        let restored = Webmail::from_snapshot(config(), webmail.snapshot().unwrap());
        // Sessions are not part of the snapshot.
        assert!(restored.current_user(&token).is_err());

        let token = restored.authenticate("a@x.com", "password1").await.unwrap().token;
        assert_eq!(restored.list_mail(&token, Folder::Sent).unwrap().len(), 1);
    }
}
