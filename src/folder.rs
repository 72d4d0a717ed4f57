//! Mailbox folder types
//!
//! The set of folders is closed: every message lives in exactly one of
//! INBOX, SENT, DRAFT, TRASH or SPAM. On the wire folders are the
//! lowercase names (`"inbox"`, `"sent"`, ...).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A mailbox folder.
///
/// # Examples
///
/// ```
/// use securemail::Folder;
///
/// let trash: Folder = "Trash".parse().unwrap();
/// assert_eq!(trash, Folder::Trash);
/// assert_eq!(trash.as_str(), "trash");
/// assert!("Archive".parse::<Folder>().is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Folder {
    /// Received messages.
    #[default]
    Inbox,
    /// Messages this user sent.
    Sent,
    /// Unsent drafts.
    Draft,
    /// Deleted messages. Deleting from here is permanent.
    Trash,
    /// Spam / junk messages.
    Spam,
}

impl Folder {
    pub const ALL: [Self; 5] = [Self::Inbox, Self::Sent, Self::Draft, Self::Trash, Self::Spam];

    /// The wire name of the folder.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Sent => "sent",
            Self::Draft => "draft",
            Self::Trash => "trash",
            Self::Spam => "spam",
        }
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Folder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|folder| s.eq_ignore_ascii_case(folder.as_str()))
            .ok_or_else(|| Error::InvalidInput(format!("Unknown folder '{s}'")))
    }
}
