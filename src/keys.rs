//! Per-user key material
//!
//! Accounts carry a public/private key pair slot. No real asymmetric
//! cryptography is implemented: [`OpaqueKeyProvisioner`] fills the slot
//! with random, unrelated handles. Anything that needs actual message
//! encryption has to plug in a real [`KeyProvisioner`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPair {
    pub public_key: String,
    /// Opaque blob, never returned to clients.
    pub private_key: String,
}

/// Source of key material for new accounts.
pub trait KeyProvisioner: Send + Sync {
    fn provision(&self) -> KeyPair;
}

/// Random base64 handles. Not a cryptographic key pair.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpaqueKeyProvisioner;

impl OpaqueKeyProvisioner {
    const HANDLE_BYTES: usize = 32;

    fn handle() -> String {
        let mut bytes = [0u8; Self::HANDLE_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        BASE64.encode(bytes)
    }
}

impl KeyProvisioner for OpaqueKeyProvisioner {
    fn provision(&self) -> KeyPair {
        KeyPair {
            public_key: Self::handle(),
            private_key: Self::handle(),
        }
    }
}
