//! Key material embedded in a session record.
//!
//! - `MasterSecret`: opaque handle handed to the session-key codec, never
//!   written into the record by this crate
//! - `IdentityKey`: the peer's long-term public identity key
//! - `SessionKey`: key material produced by the ratchet, tagged with the
//!   local/remote key ids it was derived for
//!
//! # Security Properties
//!
//! - **Zeroize on drop**: `MasterSecret` and `SessionKey` implement
//!   `ZeroizeOnDrop`, so secrets are cleared when a record is dropped or a
//!   session key is replaced
//! - **Opaque session-key blob**: the record codec never looks inside the
//!   session-key blob; encryption at rest is the `SessionKeyCodec`'s concern

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::codec::CodecError;
use crate::io::{RecordReader, RecordWriter};

/// Error types for key material
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(&'static str),
    #[error("Session key blob is malformed")]
    MalformedSessionKey,
}

/// Opaque master secret used by the session-key codec
/// Automatically zeroized on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret(Vec<u8>);

impl MasterSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterSecret(..)")
    }
}

// ============================================================
// IDENTITY KEY
// ============================================================

/// Type byte prefixing a serialized identity key
pub const IDENTITY_KEY_TYPE: u8 = 0x05;

/// Public key length (excluding type byte)
pub const IDENTITY_KEY_LEN: usize = 32;

/// Serialized identity key length (type byte + key)
pub const IDENTITY_KEY_SERIALIZED_LEN: usize = 1 + IDENTITY_KEY_LEN;

/// Peer identity public key
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityKey {
    public_key: [u8; IDENTITY_KEY_LEN],
}

impl IdentityKey {
    pub fn new(public_key: [u8; IDENTITY_KEY_LEN]) -> Self {
        Self { public_key }
    }

    /// Parse a serialized identity key starting at `offset`
    pub fn decode(bytes: &[u8], offset: usize) -> Result<Self, KeyError> {
        let serialized = bytes
            .get(offset..)
            .filter(|rest| rest.len() >= IDENTITY_KEY_SERIALIZED_LEN)
            .ok_or(KeyError::InvalidKeyMaterial("identity key too short"))?;

        if serialized[0] != IDENTITY_KEY_TYPE {
            return Err(KeyError::InvalidKeyMaterial("unknown identity key type"));
        }

        let mut public_key = [0u8; IDENTITY_KEY_LEN];
        public_key.copy_from_slice(&serialized[1..IDENTITY_KEY_SERIALIZED_LEN]);
        Ok(Self { public_key })
    }

    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(IDENTITY_KEY_SERIALIZED_LEN);
        bytes.push(IDENTITY_KEY_TYPE);
        bytes.extend_from_slice(&self.public_key);
        bytes
    }

    #[must_use]
    pub fn public_key(&self) -> &[u8; IDENTITY_KEY_LEN] {
        &self.public_key
    }

    /// Hex fingerprint for out-of-band verification
    #[must_use]
    pub fn fingerprint(&self) -> String {
        hex::encode(self.serialize())
    }
}

impl std::fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("IdentityKey").field(&self.fingerprint()).finish()
    }
}

// ============================================================
// SESSION KEY
// ============================================================

/// Ratchet key material for one (local key id, remote key id) pair
/// Automatically zeroized on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey {
    local_key_id: u32,
    remote_key_id: u32,
    cipher_key: Vec<u8>,
    mac_key: Vec<u8>,
}

impl SessionKey {
    pub fn new(local_key_id: u32, remote_key_id: u32, cipher_key: Vec<u8>, mac_key: Vec<u8>) -> Self {
        Self {
            local_key_id,
            remote_key_id,
            cipher_key,
            mac_key,
        }
    }

    #[must_use]
    pub fn local_key_id(&self) -> u32 {
        self.local_key_id
    }

    #[must_use]
    pub fn remote_key_id(&self) -> u32 {
        self.remote_key_id
    }

    #[must_use]
    pub fn cipher_key(&self) -> &[u8] {
        &self.cipher_key
    }

    #[must_use]
    pub fn mac_key(&self) -> &[u8] {
        &self.mac_key
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("local_key_id", &self.local_key_id)
            .field("remote_key_id", &self.remote_key_id)
            .finish_non_exhaustive()
    }
}

/// Serialization of the embedded session-key blob
///
/// Implementations own encryption at rest; the record codec only stores the
/// bytes they return and hands them back, together with the master secret,
/// on load.
pub trait SessionKeyCodec {
    fn encode(&self, key: &SessionKey, master: &MasterSecret) -> Result<Vec<u8>, KeyError>;

    fn decode(&self, blob: &[u8], master: &MasterSecret) -> Result<SessionKey, KeyError>;
}

/// Stores session keys without encryption at rest
///
/// Layout: `[u32 local_key_id][u32 remote_key_id][blob cipher_key][blob mac_key]`
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainSessionKeyCodec;

impl SessionKeyCodec for PlainSessionKeyCodec {
    fn encode(&self, key: &SessionKey, _master: &MasterSecret) -> Result<Vec<u8>, KeyError> {
        let mut writer = RecordWriter::new();
        writer.write_u32(key.local_key_id);
        writer.write_u32(key.remote_key_id);
        writer
            .write_blob(&key.cipher_key)
            .and_then(|()| writer.write_blob(&key.mac_key))
            .map_err(|_| KeyError::MalformedSessionKey)?;
        Ok(writer.into_bytes())
    }

    fn decode(&self, blob: &[u8], _master: &MasterSecret) -> Result<SessionKey, KeyError> {
        let mut reader = RecordReader::new(blob);
        let decoded = read_plain_session_key(&mut reader).map_err(|_| KeyError::MalformedSessionKey)?;

        if reader.remaining() != 0 {
            return Err(KeyError::MalformedSessionKey);
        }
        Ok(decoded)
    }
}

fn read_plain_session_key(reader: &mut RecordReader<'_>) -> Result<SessionKey, CodecError> {
    let local_key_id = reader.read_u32("local key id")?;
    let remote_key_id = reader.read_u32("remote key id")?;
    let cipher_key = reader.read_blob("cipher key")?;
    let mac_key = reader.read_blob("mac key")?;
    Ok(SessionKey::new(local_key_id, remote_key_id, cipher_key, mac_key))
}
