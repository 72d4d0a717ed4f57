//! Demo accounts and demo mailbox content

use crate::folder::Folder;
use crate::message::{Message, MessageId};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Password shared by every demo account.
pub const DEMO_PASSWORD: &str = "secure123";

/// `(name, email)` of the demo accounts, in registration order.
pub const DEMO_USERS: [(&str, &str); 5] = [
    ("Demo User", "demo@example.com"),
    ("User One", "user1@example.com"),
    ("User Two", "user2@example.com"),
    ("Test User 1", "test1@example.com"),
    ("Test User 2", "test2@example.com"),
];

/// Remembers which `(owner, folder)` pairs already received demo
/// content, so a folder the user empties stays empty.
#[derive(Debug, Default)]
pub struct DemoSeeder {
    seeded: Mutex<HashSet<(String, Folder)>>,
}

impl DemoSeeder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore the claimed pairs of an earlier run.
    #[must_use]
    pub fn from_claimed(claimed: impl IntoIterator<Item = (String, Folder)>) -> Self {
        Self {
            seeded: Mutex::new(claimed.into_iter().collect()),
        }
    }

    /// Every claimed pair, sorted.
    #[must_use]
    pub fn claimed(&self) -> Vec<(String, Folder)> {
        let mut claimed: Vec<(String, Folder)> = self
            .seeded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        claimed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.as_str().cmp(b.1.as_str())));
        claimed
    }

    /// Demo messages for `owner`'s `folder`, or nothing if that pair was
    /// already claimed. Claims the pair when content is returned.
    pub fn claim(&self, owner: &str, folder: Folder, now: DateTime<Utc>) -> Vec<Message> {
        let mut seeded = self.seeded.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (owner.to_string(), folder);
        if seeded.contains(&key) {
            return Vec::new();
        }

        let messages = demo_messages(owner, folder, now);
        if !messages.is_empty() {
            seeded.insert(key);
        }
        messages
    }
}

struct Template {
    from: &'static str,
    to: &'static [&'static str],
    cc: &'static [&'static str],
    subject: &'static str,
    body: &'static str,
    is_encrypted: bool,
    minutes_ago: i64,
    read: bool,
}

const OWNER: &str = "{owner}";

fn demo_messages(owner: &str, folder: Folder, now: DateTime<Utc>) -> Vec<Message> {
    templates(owner, folder)
        .iter()
        .map(|t| {
            let resolve = |addr: &str| {
                if addr == OWNER {
                    owner.to_string()
                } else {
                    addr.to_string()
                }
            };
            Message {
                id: MessageId::generate(),
                from: resolve(t.from),
                to: t.to.iter().copied().map(resolve).collect(),
                cc: t.cc.iter().copied().map(resolve).collect(),
                subject: t.subject.to_string(),
                body: t.body.to_string(),
                attachments: Vec::new(),
                is_encrypted: t.is_encrypted,
                date: now - Duration::minutes(t.minutes_ago),
                read: t.read,
                deleted: folder == Folder::Trash,
                folder,
            }
        })
        .collect()
}

#[allow(clippy::too_many_lines)]
fn templates(owner: &str, folder: Folder) -> Vec<Template> {
    let mut out = Vec::new();
    match folder {
        Folder::Inbox => {
            match owner {
                "demo@example.com" => out.push(Template {
                    from: "test1@example.com",
                    to: &[OWNER],
                    cc: &["test2@example.com"],
                    subject: "Testing CC functionality",
                    body: "This is a test email with CC. Both you and test2@example.com should receive this message.",
                    is_encrypted: true,
                    minutes_ago: 10,
                    read: false,
                }),
                "test1@example.com" => out.push(Template {
                    from: "demo@example.com",
                    to: &[OWNER],
                    cc: &[],
                    subject: "Welcome to the test account",
                    body: "Hi Test User 1, welcome to our secure email platform. You can use this account to send and receive secure messages.",
                    is_encrypted: false,
                    minutes_ago: 30,
                    read: false,
                }),
                "test2@example.com" => out.push(Template {
                    from: "test1@example.com",
                    to: &["demo@example.com"],
                    cc: &[OWNER],
                    subject: "You are CCed on this message",
                    body: "This message was sent to demo@example.com with you in CC. You can reply to all to continue the conversation.",
                    is_encrypted: true,
                    minutes_ago: 45,
                    read: false,
                }),
                _ => {}
            }
            out.push(Template {
                from: "support@securemail.com",
                to: &[OWNER],
                cc: &[],
                subject: "Your Account Setup",
                body: "Your secure email account has been set up successfully. You can now send and receive encrypted emails. If you have any questions, please contact our support team.",
                is_encrypted: false,
                minutes_ago: 120,
                read: true,
            });
        }
        Folder::Sent => match owner {
            "demo@example.com" => out.push(Template {
                from: OWNER,
                to: &["test1@example.com", "test2@example.com"],
                cc: &[],
                subject: "Group message to test users",
                body: "This is a message sent to both test users. Please reply to confirm you received it.",
                is_encrypted: true,
                minutes_ago: 45,
                read: true,
            }),
            "test1@example.com" => out.push(Template {
                from: OWNER,
                to: &["demo@example.com"],
                cc: &["test2@example.com"],
                subject: "Response to your message",
                body: "I received your message. Test2 is also included in this conversation via CC.",
                is_encrypted: true,
                minutes_ago: 15,
                read: true,
            }),
            "test2@example.com" => out.push(Template {
                from: OWNER,
                to: &["demo@example.com", "test1@example.com"],
                cc: &[],
                subject: "My introduction",
                body: "Hello everyone, I'm Test User 2. Looking forward to our secure communications.",
                is_encrypted: false,
                minutes_ago: 60,
                read: true,
            }),
            _ => {}
        },
        Folder::Draft => out.push(Template {
            from: OWNER,
            to: &["recipient@example.com"],
            cc: &[],
            subject: "Draft message",
            body: "This is a draft message that hasn't been sent yet.\n\n[DRAFT - NOT COMPLETE]",
            is_encrypted: false,
            minutes_ago: 60,
            read: true,
        }),
        Folder::Trash => out.push(Template {
            from: "spam@unwanted.com",
            to: &[OWNER],
            cc: &[],
            subject: "You Won a Prize!",
            body: "Congratulations! You've won a prize in our sweepstakes. Click the link below to claim your reward.",
            is_encrypted: false,
            minutes_ago: 60 * 24 * 2,
            read: true,
        }),
        Folder::Spam => out.push(Template {
            from: "noreply@suspicious.com",
            to: &[OWNER],
            cc: &[],
            subject: "Urgent: Your Account Needs Verification",
            body: "Your account needs immediate verification. Please click the link below to confirm your identity.",
            is_encrypted: false,
            minutes_ago: 180,
            read: false,
        }),
    }
    out
}
