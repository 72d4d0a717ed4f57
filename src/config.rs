//! Service configuration

use crate::error::{Error, Result};
use std::env;

/// Client-side limit in the original compose form, re-checked here.
pub const DEFAULT_MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;

pub const DEFAULT_HASH_COST: u32 = 10;

/// bcrypt accepts costs in this range.
const HASH_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

/// Runtime configuration for [`Webmail`](crate::Webmail)
#[derive(Debug, Clone)]
pub struct Config {
    /// bcrypt cost factor for password hashes.
    pub hash_cost: u32,
    /// Largest accepted attachment, in bytes.
    pub max_attachment_bytes: usize,
    /// Register the demo accounts on bootstrap.
    pub demo_users: bool,
    /// Seed demo messages the first time a folder is viewed.
    pub demo_mailbox: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hash_cost: DEFAULT_HASH_COST,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            demo_users: false,
            demo_mailbox: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Reads from `.env` file if present. All variables are optional:
    /// - `SECUREMAIL_HASH_COST` (default: `10`)
    /// - `SECUREMAIL_MAX_ATTACHMENT_BYTES` (default: 5 MiB)
    /// - `SECUREMAIL_DEMO_USERS` (default: `false`)
    /// - `SECUREMAIL_DEMO_MAILBOX` (default: `false`)
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an unparsable or out-of-range value.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            hash_cost: parse_var("SECUREMAIL_HASH_COST", defaults.hash_cost)?,
            max_attachment_bytes: parse_var(
                "SECUREMAIL_MAX_ATTACHMENT_BYTES",
                defaults.max_attachment_bytes,
            )?,
            demo_users: parse_bool("SECUREMAIL_DEMO_USERS", defaults.demo_users)?,
            demo_mailbox: parse_bool("SECUREMAIL_DEMO_MAILBOX", defaults.demo_mailbox)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the values are usable.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for a hash cost outside bcrypt's range.
    pub fn validate(&self) -> Result<()> {
        if !HASH_COST_RANGE.contains(&self.hash_cost) {
            return Err(Error::Config(format!(
                "SECUREMAIL_HASH_COST must be between {} and {}, got {}",
                HASH_COST_RANGE.start(),
                HASH_COST_RANGE.end(),
                self.hash_cost
            )));
        }
        Ok(())
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid {name}: {e}"))),
        Err(_) => Ok(default),
    }
}

pub(crate) fn parse_bool(name: &str, default: bool) -> Result<bool> {
    let Ok(raw) = env::var(name) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::Config(format!("Invalid {name}: '{other}'"))),
    }
}
