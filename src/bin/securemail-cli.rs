#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for the securemail backend, keeping its state in a JSON file

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::{Args as ClapArgs, Parser, Subcommand};
use securemail::{
    Attachment, Config, Folder, MessageId, OutgoingMessage, Registration, Session, Snapshot,
    Webmail,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "securemail-cli")]
#[command(about = "Command-line client for the securemail backend")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// State file
    #[arg(long, global = true, env = "SECUREMAIL_STATE", default_value = "securemail.json")]
    state: PathBuf,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(ClapArgs)]
struct Credentials {
    /// Account email
    #[arg(long, env = "SECUREMAIL_EMAIL")]
    email: String,

    /// Account password
    #[arg(long, env = "SECUREMAIL_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Check credentials and show the account
    Login {
        #[command(flatten)]
        creds: Credentials,
    },

    /// List messages in a folder
    List {
        #[command(flatten)]
        creds: Credentials,

        /// Folder to list (inbox, sent, draft, trash, spam)
        #[arg(long, default_value = "inbox")]
        folder: Folder,

        /// Maximum number of messages to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Send a message
    Send {
        #[command(flatten)]
        creds: Credentials,

        /// Recipient (repeatable)
        #[arg(long, required = true)]
        to: Vec<String>,

        /// Carbon-copy recipient (repeatable)
        #[arg(long)]
        cc: Vec<String>,

        #[arg(long)]
        subject: String,

        #[arg(long)]
        body: String,

        /// Flag the message as encrypted
        #[arg(long)]
        encrypted: bool,

        /// File to attach (repeatable)
        #[arg(long)]
        attach: Vec<PathBuf>,
    },

    /// Delete messages: move to trash, or remove for good from trash
    Delete {
        #[command(flatten)]
        creds: Credentials,

        /// Folder the messages are in
        #[arg(long, default_value = "inbox")]
        folder: Folder,

        /// Message ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Mark messages read or unread
    MarkRead {
        #[command(flatten)]
        creds: Credentials,

        /// Mark unread instead
        #[arg(long)]
        unread: bool,

        /// Message ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Show IMAP/SMTP settings
    Settings {
        #[command(flatten)]
        creds: Credentials,

        /// Replace the stored settings with IMAP_*/SMTP_* variables
        #[arg(long)]
        from_env: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let snapshot = Snapshot::load(&args.state).await?;
    let webmail = Webmail::from_snapshot(config, snapshot);
    if webmail.config().demo_users {
        webmail.seed_demo_users().await?;
    }

    match &args.command {
        Command::Register {
            name,
            email,
            password,
        } => {
            let identity = webmail
                .register(Registration::new(name, email, password))
                .await?;
            print_json_or(&args, &identity, || {
                println!("Registered {} <{}> (id {})", identity.name, identity.email, identity.id);
            })?;
        }
        Command::Login { creds } => {
            let session = login(&webmail, creds).await?;
            print_json_or(&args, &session.user, || {
                println!("ID:         {}", session.user.id);
                println!("Name:       {}", session.user.name);
                println!("Email:      {}", session.user.email);
                println!("Public key: {}", session.user.public_key);
            })?;
        }
        Command::List {
            creds,
            folder,
            limit,
        } => {
            let session = login(&webmail, creds).await?;
            let messages = webmail.list_mail(&session.token, *folder)?;
            let display: Vec<&securemail::Message> = messages.iter().take(*limit).collect();
            print_json_or(&args, &display, || print_message_table(&display))?;
        }
        Command::Send {
            creds,
            to,
            cc,
            subject,
            body,
            encrypted,
            attach,
        } => {
            let session = login(&webmail, creds).await?;
            let mut attachments = Vec::with_capacity(attach.len());
            for path in attach {
                attachments.push(read_attachment(path).await?);
            }
            let receipt = webmail.send_mail(
                &session.token,
                OutgoingMessage {
                    to: to.clone(),
                    cc: cc.clone(),
                    subject: subject.clone(),
                    body: body.clone(),
                    is_encrypted: *encrypted,
                    attachments,
                },
            )?;
            print_json_or(&args, &receipt, || {
                println!(
                    "Sent {} to {} recipient(s) with {} attachment(s)",
                    receipt.message_id, receipt.recipient_count, receipt.attachment_count
                );
            })?;
        }
        Command::Delete { creds, folder, ids } => {
            let session = login(&webmail, creds).await?;
            let ids = to_ids(ids);
            let deleted = webmail.delete_or_move_mail(&session.token, &ids, *folder)?;
            print_json_or(&args, &serde_json::json!({ "deleted": deleted }), || {
                println!("{deleted} message(s) deleted");
            })?;
        }
        Command::MarkRead { creds, unread, ids } => {
            let session = login(&webmail, creds).await?;
            let ids = to_ids(ids);
            let updated = webmail.mark_read(&session.token, &ids, !*unread)?;
            print_json_or(&args, &serde_json::json!({ "updated": updated }), || {
                println!("{updated} message(s) updated");
            })?;
        }
        Command::Settings { creds, from_env } => {
            let session = login(&webmail, creds).await?;
            if *from_env {
                let settings = securemail::MailSettings {
                    imap: securemail::ImapSettings::from_env(&session.user.email)?,
                    smtp: securemail::SmtpSettings::from_env(&session.user.email)?,
                };
                webmail.update_settings(&session.token, settings)?;
            }
            let settings = webmail.settings(&session.token)?;
            print_json_or(&args, &settings, || {
                println!(
                    "IMAP: {}@{}:{} (tls: {})",
                    settings.imap.username,
                    settings.imap.host,
                    settings.imap.port,
                    settings.imap.tls
                );
                println!(
                    "SMTP: {}@{}:{} (secure: {})",
                    settings.smtp.username,
                    settings.smtp.host,
                    settings.smtp.port,
                    settings.smtp.secure
                );
            })?;
        }
    }

    webmail.snapshot()?.save(&args.state).await?;
    Ok(())
}

async fn login(webmail: &Webmail, creds: &Credentials) -> anyhow::Result<Session> {
    Ok(webmail.authenticate(&creds.email, &creds.password).await?)
}

fn to_ids(ids: &[String]) -> Vec<MessageId> {
    ids.iter().map(|id| MessageId::from(id.as_str())).collect()
}

fn print_json_or<T: serde::Serialize>(
    args: &Args,
    value: &T,
    text: impl FnOnce(),
) -> anyhow::Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text();
    }
    Ok(())
}

async fn read_attachment(path: &Path) -> anyhow::Result<Attachment> {
    let bytes = tokio::fs::read(path).await?;
    let filename = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    Ok(Attachment {
        id: uuid::Uuid::new_v4().to_string(),
        content_type: content_type(&filename).to_string(),
        filename,
        size: bytes.len(),
        content: BASE64.encode(&bytes),
    })
}

fn content_type(filename: &str) -> &'static str {
    let ext = filename.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("txt") => "text/plain",
        Some("html" | "htm") => "text/html",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

fn print_message_table(messages: &[&securemail::Message]) {
    if messages.is_empty() {
        println!("No emails found.");
        return;
    }

    let header = format!("{:<2} {:<48} {:<17} {:<28} {}", "", "ID", "Date", "From", "Subject");
    println!("{header}");
    println!("{}", "-".repeat(120));

    for message in messages {
        println!(
            "{:<2} {:<48} {:<17} {:<28} {}",
            if message.read { "" } else { "*" },
            message.id.as_str(),
            message.date.format("%Y-%m-%d %H:%M"),
            truncate(&message.from, 26),
            truncate(&message.subject, 40),
        );
    }

    println!("\n{} email(s)", messages.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
