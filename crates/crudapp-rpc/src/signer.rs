use std::path::Path;

use async_trait::async_trait;
use ed25519_dalek::{Signer, Verifier};

use crudapp_types::{Address, TxSignature};

use crate::error::{RpcError, RpcResult};

/// Something that can authorize transactions on behalf of one identity.
///
/// Wallet adapters that prompt a user implement this asynchronously; a
/// local keypair answers immediately.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    fn pubkey(&self) -> Address;

    async fn sign_message(&self, message: &[u8]) -> RpcResult<TxSignature>;
}

/// Ed25519 keypair held in process memory.
pub struct KeypairSigner(ed25519_dalek::SigningKey);

impl KeypairSigner {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut csprng = rand::thread_rng();
        Self(ed25519_dalek::SigningKey::generate(&mut csprng))
    }

    /// Create from a raw 32-byte secret.
    pub fn from_secret(bytes: [u8; 32]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(&bytes))
    }

    /// Create from 64 bytes of `secret || public`, rejecting a mismatched half.
    pub fn from_keypair_bytes(bytes: &[u8]) -> RpcResult<Self> {
        let arr: [u8; 64] = bytes.try_into().map_err(|_| {
            RpcError::Signing(format!("keypair must be 64 bytes, got {}", bytes.len()))
        })?;
        let key = ed25519_dalek::SigningKey::from_keypair_bytes(&arr)
            .map_err(|e| RpcError::Signing(format!("invalid keypair: {e}")))?;
        Ok(Self(key))
    }

    /// Read a keypair file: a JSON array of 64 byte values.
    pub fn read_keypair_file(path: impl AsRef<Path>) -> RpcResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| RpcError::Signing(format!("cannot read {}: {e}", path.display())))?;
        let bytes: Vec<u8> = serde_json::from_str(&raw)
            .map_err(|e| RpcError::Signing(format!("malformed keypair file {}: {e}", path.display())))?;
        Self::from_keypair_bytes(&bytes)
    }

    /// The 64-byte `secret || public` form written to keypair files.
    pub fn to_keypair_bytes(&self) -> [u8; 64] {
        self.0.to_keypair_bytes()
    }
}

impl std::fmt::Debug for KeypairSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeypairSigner({}, <redacted>)", self.pubkey().short_id())
    }
}

#[async_trait]
impl TransactionSigner for KeypairSigner {
    fn pubkey(&self) -> Address {
        Address::new(self.0.verifying_key().to_bytes())
    }

    async fn sign_message(&self, message: &[u8]) -> RpcResult<TxSignature> {
        Ok(TxSignature::new(self.0.sign(message).to_bytes()))
    }
}

/// Check an ed25519 signature made by `signer` over `message`.
pub fn verify_signature(signer: &Address, message: &[u8], signature: &TxSignature) -> bool {
    let Ok(key) = ed25519_dalek::VerifyingKey::from_bytes(signer.as_bytes()) else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
    key.verify(message, &sig).is_ok()
}
