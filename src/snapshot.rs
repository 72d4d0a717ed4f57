//! On-disk state for the CLI
//!
//! A [`Snapshot`] is the whole service state as one JSON document. The
//! CLI loads it, runs one command and writes it back.

use crate::error::Result;
use crate::folder::Folder;
use crate::message::Message;
use crate::settings::MailSettings;
use crate::user::User;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub mailboxes: BTreeMap<String, Vec<Message>>,
    #[serde(default)]
    pub settings: BTreeMap<String, MailSettings>,
    /// `(owner, folder)` pairs that already received demo content.
    #[serde(default)]
    pub demo_seeded: Vec<(String, Folder)>,
}

impl Snapshot {
    /// Read a snapshot. A missing file is an empty snapshot.
    ///
    /// # Errors
    ///
    /// [`Error::Io`](crate::Error::Io) if the file cannot be read,
    /// [`Error::Json`](crate::Error::Json) if it is not a snapshot.
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                debug!("Loaded state from {}", path.display());
                Ok(serde_json::from_slice(&bytes)?)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the snapshot, replacing the file atomically. The file holds
    /// password hashes and server passwords, so on unix it is readable
    /// by the owner only.
    ///
    /// # Errors
    ///
    /// [`Error::Io`](crate::Error::Io) if the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        if let Err(e) = tokio::fs::remove_file(&tmp).await
            && e.kind() != ErrorKind::NotFound
        {
            return Err(e.into());
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&tmp).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        debug!("Saved state to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("securemail-{name}-{}.json", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let snapshot = Snapshot::load(&temp_path("missing")).await.unwrap();
        assert_eq!(snapshot, Snapshot::default());
    }

    #[tokio::test]
    async fn save_then_load() {
        let path = temp_path("roundtrip");
        let mut snapshot = Snapshot::default();
        snapshot
            .settings
            .insert("a@x.com".into(), MailSettings::for_account("a@x.com"));
        snapshot.demo_seeded.push(("a@x.com".into(), Folder::Spam));

        snapshot.save(&path).await.unwrap();
        let loaded = Snapshot::load(&path).await.unwrap();
        assert_eq!(loaded, snapshot);

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let path = temp_path("mode");
        Snapshot::default().save(&path).await.unwrap();
        Snapshot::default().save(&path).await.unwrap();

        let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_file_is_json_error() {
        let path = temp_path("corrupt");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let err = Snapshot::load(&path).await.unwrap_err();
        assert!(matches!(err, crate::Error::Json(_)));

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
