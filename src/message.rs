//! Message records and the outgoing-message request

use crate::error::{Error, Result};
use crate::folder::Folder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier shared by every stored copy of one sent message.
///
/// Unique within one user's mailbox, not across the whole store: the
/// sender's SENT copy and each recipient's INBOX copy carry the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// A fresh id of the form `mock-email-<uuid>`.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("mock-email-{}", uuid::Uuid::new_v4()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file attached to a message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    /// Opaque encoded blob (base64 from the browser client).
    pub content: String,
    pub content_type: String,
    /// Declared size in bytes.
    pub size: usize,
}

impl Attachment {
    /// Reject attachments over `max_bytes`, by declared size or by the
    /// length of the blob itself. The blob may be padded base64 of up to
    /// `max_bytes` bytes.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for a missing filename or an oversized
    /// attachment.
    pub fn validate(&self, max_bytes: usize) -> Result<()> {
        if self.filename.trim().is_empty() {
            return Err(Error::InvalidInput("Attachment filename is required".into()));
        }
        let max_blob = max_bytes.div_ceil(3).saturating_mul(4);
        if self.size > max_bytes || self.content.len() > max_blob {
            return Err(Error::InvalidInput(format!(
                "Attachment '{}' exceeds the {max_bytes} byte limit",
                self.filename
            )));
        }
        Ok(())
    }
}

/// One stored copy of a message in a user's mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub from: String,
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Display marker only; the body is stored as given.
    pub is_encrypted: bool,
    pub date: DateTime<Utc>,
    pub read: bool,
    pub deleted: bool,
    pub folder: Folder,
}

/// A message as submitted for sending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub is_encrypted: bool,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl OutgoingMessage {
    /// Check the request shape before anything is stored.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] naming the first problem found.
    pub fn validate(&self, max_attachment_bytes: usize) -> Result<()> {
        if self.to.is_empty() {
            return Err(Error::InvalidInput("At least one recipient is required".into()));
        }
        for address in self.to.iter().chain(&self.cc) {
            if !is_valid_address(address) {
                return Err(Error::InvalidInput(format!(
                    "Invalid email address '{address}'"
                )));
            }
        }
        if self.subject.trim().is_empty() {
            return Err(Error::InvalidInput("Subject is required".into()));
        }
        if self.body.trim().is_empty() {
            return Err(Error::InvalidInput("Body is required".into()));
        }
        for attachment in &self.attachments {
            attachment.validate(max_attachment_bytes)?;
        }
        Ok(())
    }

    /// Every inbox that receives a copy, duplicates included.
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.to.iter().chain(&self.cc).map(String::as_str)
    }

    #[must_use]
    pub fn attachment_bytes(&self) -> usize {
        self.attachments.iter().map(|a| a.size).sum()
    }
}

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    pub message_id: MessageId,
    /// `|to| + |cc|`, duplicates counted.
    pub recipient_count: usize,
    pub attachment_count: usize,
    pub attachment_bytes: usize,
}

/// Loose `local@domain.tld` check.
#[must_use]
pub fn is_valid_address(address: &str) -> bool {
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !address.chars().any(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// First 50 characters, for log lines.
pub(crate) fn preview(body: &str) -> String {
    const MAX: usize = 50;
    if body.chars().count() <= MAX {
        body.to_string()
    } else {
        let truncated: String = body.chars().take(MAX).collect();
        format!("{truncated}...")
    }
}
