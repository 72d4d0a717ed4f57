//! Webmail backend core
//!
//! Account sign-up and sign-in, folder-based mailboxes, sending and
//! deleting mail, and per-user IMAP/SMTP settings. Entry point is
//! [`Webmail`]; storage sits behind the [`MailStore`] and [`UserStore`]
//! traits with in-memory implementations included.
//!
//! ```no_run
//! use securemail::{Config, Folder, OutgoingMessage, Registration, Webmail};
//!
//! # async fn demo() -> securemail::Result<()> {
//! let webmail = Webmail::new(Config::from_env()?);
//! webmail.register(Registration::new("A", "a@x.com", "password1")).await?;
//! let session = webmail.authenticate("a@x.com", "password1").await?;
//!
//! webmail.send_mail(
//!     &session.token,
//!     OutgoingMessage {
//!         to: vec!["b@x.com".into()],
//!         subject: "Hi".into(),
//!         body: "Hello".into(),
//!         ..OutgoingMessage::default()
//!     },
//! )?;
//! let sent = webmail.list_mail(&session.token, Folder::Sent)?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod config;
pub mod demo;
mod error;
mod folder;
mod keys;
mod message;
mod service;
mod settings;
mod snapshot;
pub mod store;
mod user;

pub use auth::{AuthGate, AuthenticatedUser, Registration};
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use folder::Folder;
pub use keys::{KeyPair, KeyProvisioner, OpaqueKeyProvisioner};
pub use message::{Attachment, Message, MessageId, OutgoingMessage, SendReceipt};
pub use service::{Session, SessionToken, Webmail};
pub use settings::{ImapSettings, MailSettings, SmtpSettings};
pub use snapshot::Snapshot;
pub use store::{MailStore, MemoryStore};
pub use user::{Identity, MemoryUserStore, NewUser, User, UserStore};
