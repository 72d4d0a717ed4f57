//! Mailbox store
//!
//! Holds, per user email, the ordered list of that user's message copies
//! and answers folder-scoped queries. [`MailStore`] is the seam a
//! persistent backend plugs into; [`MemoryStore`] is the in-process
//! implementation.
//!
//! Folder transitions:
//!
//! ```text
//! INBOX/SENT/DRAFT/SPAM --(delete)--> TRASH
//! TRASH --(delete)--> [removed]
//! ```

use crate::error::{Error, Result};
use crate::folder::Folder;
use crate::message::{Message, MessageId, OutgoingMessage, SendReceipt};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Storage for per-user mailboxes.
pub trait MailStore: Send + Sync {
    /// Append a message to the end of `owner`'s mailbox, creating the
    /// mailbox on first write.
    fn append(&self, owner: &str, message: Message) -> Result<()> {
        self.append_batch(vec![(owner.to_string(), message)])
    }

    /// Append every `(owner, message)` row, or none of them.
    fn append_batch(&self, rows: Vec<(String, Message)>) -> Result<()>;

    /// Messages of `owner` in `folder`, newest first. Ties keep
    /// insertion order. An unknown owner yields an empty list.
    fn list_by_folder(&self, owner: &str, folder: Folder) -> Result<Vec<Message>>;

    /// Delete the messages in `ids` that currently sit in `current`.
    ///
    /// From TRASH the messages are removed for good; from any other
    /// folder they move to TRASH and are marked deleted. Messages whose
    /// id matches but whose folder differs are left alone. Returns the
    /// number of affected messages.
    ///
    /// Fails with [`Error::NotFound`] only when `owner` has no mailbox.
    fn delete_or_move(&self, owner: &str, ids: &[MessageId], current: Folder) -> Result<usize>;

    /// Set the read flag on every message of `owner` whose id is in
    /// `ids`. Returns the number of messages touched.
    fn set_read(&self, owner: &str, ids: &[MessageId], read: bool) -> Result<usize>;

    fn has_mailbox(&self, owner: &str) -> Result<bool>;

    /// Every mailbox, keyed by owner.
    fn export(&self) -> Result<BTreeMap<String, Vec<Message>>>;
}

/// In-memory [`MailStore`].
///
/// A single mutex serializes every call, so each operation is atomic
/// with respect to the others.
#[derive(Debug, Default)]
pub struct MemoryStore {
    mailboxes: Mutex<HashMap<String, Vec<Message>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from exported mailboxes.
    #[must_use]
    pub fn from_mailboxes(mailboxes: BTreeMap<String, Vec<Message>>) -> Self {
        Self {
            mailboxes: Mutex::new(mailboxes.into_iter().collect()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Message>>> {
        self.mailboxes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MailStore for MemoryStore {
    fn append_batch(&self, rows: Vec<(String, Message)>) -> Result<()> {
        let mut mailboxes = self.lock();
        for (owner, message) in rows {
            mailboxes.entry(owner).or_default().push(message);
        }
        drop(mailboxes);
        Ok(())
    }

    fn list_by_folder(&self, owner: &str, folder: Folder) -> Result<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .lock()
            .get(owner)
            .map(|mailbox| {
                mailbox
                    .iter()
                    .filter(|m| m.folder == folder)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        messages.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(messages)
    }

    fn delete_or_move(&self, owner: &str, ids: &[MessageId], current: Folder) -> Result<usize> {
        let mut mailboxes = self.lock();
        let mailbox = mailboxes
            .get_mut(owner)
            .ok_or_else(|| Error::NotFound(format!("No mailbox for {owner}")))?;

        let matches = |m: &Message| m.folder == current && ids.contains(&m.id);

        let affected = if current == Folder::Trash {
            let before = mailbox.len();
            mailbox.retain(|m| !matches(m));
            before - mailbox.len()
        } else {
            let mut moved = 0;
            for message in mailbox.iter_mut() {
                if matches(message) {
                    message.folder = Folder::Trash;
                    message.deleted = true;
                    moved += 1;
                }
            }
            moved
        };
        drop(mailboxes);

        debug!("{} message(s) of {} affected in {}", affected, owner, current);
        Ok(affected)
    }

    fn set_read(&self, owner: &str, ids: &[MessageId], read: bool) -> Result<usize> {
        let mut mailboxes = self.lock();
        let mailbox = mailboxes
            .get_mut(owner)
            .ok_or_else(|| Error::NotFound(format!("No mailbox for {owner}")))?;

        let mut touched = 0;
        for message in mailbox.iter_mut().filter(|m| ids.contains(&m.id)) {
            message.read = read;
            touched += 1;
        }
        drop(mailboxes);
        Ok(touched)
    }

    fn has_mailbox(&self, owner: &str) -> Result<bool> {
        Ok(self.lock().contains_key(owner))
    }

    fn export(&self) -> Result<BTreeMap<String, Vec<Message>>> {
        Ok(self
            .lock()
            .iter()
            .map(|(owner, mailbox)| (owner.clone(), mailbox.clone()))
            .collect())
    }
}

/// Store one sent message: a read SENT copy for `from` and an unread
/// INBOX copy for every address in `to` then `cc`, all sharing one id
/// and one date.
///
/// Recipients listed twice get two inbox copies. Drafts are not touched.
/// `outgoing` is expected to be validated already.
///
/// # Errors
///
/// Whatever [`MailStore::append_batch`] returns; nothing is stored then.
pub fn send(
    store: &dyn MailStore,
    from: &str,
    outgoing: OutgoingMessage,
) -> Result<SendReceipt> {
    let id = MessageId::generate();
    let date = Utc::now();
    let recipients: Vec<String> = outgoing.recipients().map(str::to_string).collect();
    let receipt = SendReceipt {
        message_id: id.clone(),
        recipient_count: recipients.len(),
        attachment_count: outgoing.attachments.len(),
        attachment_bytes: outgoing.attachment_bytes(),
    };

    let sent = Message {
        id,
        from: from.to_string(),
        to: outgoing.to,
        cc: outgoing.cc,
        subject: outgoing.subject,
        body: outgoing.body,
        attachments: outgoing.attachments,
        is_encrypted: outgoing.is_encrypted,
        date,
        read: true,
        deleted: false,
        folder: Folder::Sent,
    };

    let mut rows = Vec::with_capacity(recipients.len() + 1);
    for recipient in recipients {
        let copy = Message {
            read: false,
            folder: Folder::Inbox,
            ..sent.clone()
        };
        rows.push((recipient, copy));
    }
    rows.insert(0, (from.to_string(), sent));

    store.append_batch(rows)?;
    Ok(receipt)
}
