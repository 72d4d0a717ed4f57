//! IMAP/SMTP account settings
//!
//! Stored per user for the settings page. Nothing here opens a
//! connection.

use crate::config::parse_bool;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Incoming mail server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImapSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub tls: bool,
}

/// Outgoing mail server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub secure: bool,
}

impl ImapSettings {
    /// `imap.example.com:993` over TLS, logging in as `email`.
    #[must_use]
    pub fn for_account(email: &str) -> Self {
        Self {
            host: "imap.example.com".to_string(),
            port: 993,
            username: email.to_string(),
            password: String::new(),
            tls: true,
        }
    }

    /// Load IMAP settings from environment variables
    ///
    /// Reads from `.env` file if present. Optional variables, falling
    /// back to [`ImapSettings::for_account`]:
    /// - `IMAP_HOST`, `IMAP_PORT`, `IMAP_USER`, `IMAP_PASSWORD`, `IMAP_TLS`
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an unparsable port or switch.
    pub fn from_env(email: &str) -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::for_account(email);

        Ok(Self {
            host: env::var("IMAP_HOST").unwrap_or(defaults.host),
            port: parse_port("IMAP_PORT", defaults.port)?,
            username: env::var("IMAP_USER").unwrap_or(defaults.username),
            password: env::var("IMAP_PASSWORD").unwrap_or(defaults.password),
            tls: parse_bool("IMAP_TLS", defaults.tls)?,
        })
    }
}

impl SmtpSettings {
    /// `smtp.example.com:587`, secure, logging in as `email`.
    #[must_use]
    pub fn for_account(email: &str) -> Self {
        Self {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: email.to_string(),
            password: String::new(),
            secure: true,
        }
    }

    /// Load SMTP settings from environment variables
    ///
    /// Same scheme as [`ImapSettings::from_env`] with the `SMTP_` prefix
    /// and `SMTP_SECURE` for the TLS switch.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an unparsable port or switch.
    pub fn from_env(email: &str) -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::for_account(email);

        Ok(Self {
            host: env::var("SMTP_HOST").unwrap_or(defaults.host),
            port: parse_port("SMTP_PORT", defaults.port)?,
            username: env::var("SMTP_USER").unwrap_or(defaults.username),
            password: env::var("SMTP_PASSWORD").unwrap_or(defaults.password),
            secure: parse_bool("SMTP_SECURE", defaults.secure)?,
        })
    }
}

/// Both server configurations of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailSettings {
    pub imap: ImapSettings,
    pub smtp: SmtpSettings,
}

impl MailSettings {
    #[must_use]
    pub fn for_account(email: &str) -> Self {
        Self {
            imap: ImapSettings::for_account(email),
            smtp: SmtpSettings::for_account(email),
        }
    }

    /// # Errors
    ///
    /// [`Error::InvalidInput`] for an empty host or a zero port.
    pub fn validate(&self) -> Result<()> {
        for (label, host, port) in [
            ("IMAP", &self.imap.host, self.imap.port),
            ("SMTP", &self.smtp.host, self.smtp.port),
        ] {
            if host.trim().is_empty() {
                return Err(Error::InvalidInput(format!("{label} host is required")));
            }
            if port == 0 {
                return Err(Error::InvalidInput(format!("{label} port must be non-zero")));
            }
        }
        Ok(())
    }
}

fn parse_port(name: &str, default: u16) -> Result<u16> {
    env::var(name).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid {name}: {e}")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_account() {
        let settings = MailSettings::for_account("a@x.com");
        assert_eq!(settings.imap.host, "imap.example.com");
        assert_eq!(settings.imap.port, 993);
        assert_eq!(settings.smtp.port, 587);
        assert_eq!(settings.imap.username, "a@x.com");
        assert_eq!(settings.smtp.username, "a@x.com");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_host_and_zero_port() {
        let mut settings = MailSettings::for_account("a@x.com");
        settings.imap.host = " ".into();
        assert!(matches!(settings.validate(), Err(Error::InvalidInput(_))));

        let mut settings = MailSettings::for_account("a@x.com");
        settings.smtp.port = 0;
        assert!(matches!(settings.validate(), Err(Error::InvalidInput(_))));
    }
}
