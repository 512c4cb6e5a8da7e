//! Session record format codec.
//!
//! Four record layouts exist, oldest first:
//!
//! ```text
//! Unmarked: [counter] [blob local fp] [blob remote fp]
//! V1:       [marker] [counter] [blob local fp] [blob remote fp] [current version]
//! V2:       V1 ++ [blob identity key] [verified 0|1]
//! V3:       V2 ++ [prekey bundle required 0|1] [negotiated version]
//! ```
//!
//! Every layout may be followed by one more blob holding the embedded session
//! key. Each layout only appends to the previous one, so a single decode pass
//! gated on the detected format reads all of them.
//!
//! Encoding always produces V3. Older records are migrated the first time a
//! decoded state is saved.

use tracing::debug;

use crate::io::{RecordReader, RecordWriter};
use crate::keys::{IdentityKey, KeyError, MasterSecret, SessionKeyCodec};
use crate::state::{RecipientId, SessionState, UNESTABLISHED_VERSION};

// ============================================================
// FORMAT MARKERS
// ============================================================

pub const MARKER_V1: u32 = 0x5555_5555;
pub const MARKER_V2: u32 = 0x5555_5556;
pub const MARKER_V3: u32 = 0x5555_5557;

/// Marker written by `encode`
pub const CURRENT_MARKER: u32 = MARKER_V3;

/// Error types for record encoding/decoding
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Record truncated while reading {field}")]
    Truncated { field: &'static str },
    #[error("Blob of {len} bytes does not fit a 32-bit length prefix")]
    BlobTooLarge { len: usize },
    #[error("Session key error: {0}")]
    SessionKey(#[from] KeyError),
}

/// On-disk layout of a session record
///
/// Ordered oldest to newest; each variant carries every field of the
/// variants before it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RecordFormat {
    /// Legacy layout without a marker; the first integer is the counter
    Unmarked { counter: u32 },
    V1,
    V2,
    V3,
}

impl RecordFormat {
    /// Classify the first integer of a record
    ///
    /// A legacy counter that happens to equal a marker is indistinguishable
    /// from that marker.
    #[must_use]
    pub fn detect(first: u32) -> Self {
        match first {
            MARKER_V1 => Self::V1,
            MARKER_V2 => Self::V2,
            MARKER_V3 => Self::V3,
            counter => Self::Unmarked { counter },
        }
    }

    /// Marker value for versioned formats
    #[must_use]
    pub fn marker(&self) -> Option<u32> {
        match self {
            Self::Unmarked { .. } => None,
            Self::V1 => Some(MARKER_V1),
            Self::V2 => Some(MARKER_V2),
            Self::V3 => Some(MARKER_V3),
        }
    }

    #[must_use]
    pub fn is_current(&self) -> bool {
        *self == Self::V3
    }
}

/// Detect the format of a record without decoding it
pub fn peek_format(bytes: &[u8]) -> Result<RecordFormat, CodecError> {
    RecordReader::new(bytes)
        .read_u32("version marker")
        .map(RecordFormat::detect)
}

// ============================================================
// DECODE
// ============================================================

/// Decode a record into a new state
pub fn decode<C: SessionKeyCodec + ?Sized>(
    recipient_id: RecipientId,
    bytes: &[u8],
    codec: &C,
    master: &MasterSecret,
) -> Result<(SessionState, RecordFormat), CodecError> {
    let mut state = SessionState::new(recipient_id);
    let format = decode_into(&mut state, bytes, codec, master)?;
    Ok((state, format))
}

/// Decode a record field by field into `state`
///
/// Fields are stored as soon as they are read, so on error `state` holds
/// everything decoded before the failure.
///
/// # Panics
///
/// Panics if a non-empty identity key blob does not parse. Those bytes were
/// produced by `encode` and must always be well-formed.
pub fn decode_into<C: SessionKeyCodec + ?Sized>(
    state: &mut SessionState,
    bytes: &[u8],
    codec: &C,
    master: &MasterSecret,
) -> Result<RecordFormat, CodecError> {
    let mut reader = RecordReader::new(bytes);
    let format = RecordFormat::detect(reader.read_u32("version marker")?);
    debug!(recipient_id = state.recipient_id(), ?format, "decoding session record");

    let counter = match format {
        RecordFormat::Unmarked { counter } => counter,
        RecordFormat::V1 | RecordFormat::V2 | RecordFormat::V3 => reader.read_u32("counter")?,
    };
    state.set_counter(counter);

    let local_fingerprint = reader.read_blob("local fingerprint")?;
    let remote_fingerprint = reader.read_blob("remote fingerprint")?;
    state.set_session_id(local_fingerprint, remote_fingerprint);

    let current_version = match format {
        RecordFormat::Unmarked { .. } => UNESTABLISHED_VERSION,
        RecordFormat::V1 | RecordFormat::V2 | RecordFormat::V3 => {
            reader.read_u32("current session version")?
        }
    };
    state.set_session_version(current_version);

    match format {
        RecordFormat::Unmarked { .. } | RecordFormat::V1 => {}
        RecordFormat::V2 | RecordFormat::V3 => {
            let identity_blob = reader.read_blob("identity key")?;
            state.set_identity_key(parse_identity_key(&identity_blob));
            if reader.read_flag("verified session key")? {
                state.mark_verified();
            }
        }
    }

    match format {
        RecordFormat::Unmarked { .. } | RecordFormat::V1 | RecordFormat::V2 => {
            state.set_negotiated_session_version(current_version);
        }
        RecordFormat::V3 => {
            let prekey_bundle_required = reader.read_flag("prekey bundle required")?;
            state.set_prekey_bundle_required(prekey_bundle_required);
            let negotiated = reader.read_u32("negotiated session version")?;
            state.set_negotiated_session_version(negotiated);
        }
    }

    if reader.remaining() != 0 {
        let blob = reader.read_blob("session key")?;
        state.set_session_key(codec.decode(&blob, master)?);
    }

    Ok(format)
}

fn parse_identity_key(blob: &[u8]) -> Option<IdentityKey> {
    if blob.is_empty() {
        return None;
    }
    match IdentityKey::decode(blob, 0) {
        Ok(key) => Some(key),
        Err(err) => panic!("stored identity key failed to parse: {err}"),
    }
}

// ============================================================
// ENCODE
// ============================================================

/// Encode a state as a current-format (V3) record
pub fn encode<C: SessionKeyCodec + ?Sized>(
    state: &SessionState,
    codec: &C,
    master: &MasterSecret,
) -> Result<Vec<u8>, CodecError> {
    let mut writer = RecordWriter::new();

    writer.write_u32(CURRENT_MARKER);
    writer.write_u32(state.counter());
    writer.write_blob(state.local_fingerprint())?;
    writer.write_blob(state.remote_fingerprint())?;
    writer.write_u32(state.raw_session_version());
    match state.identity_key() {
        Some(key) => writer.write_blob(&key.serialize())?,
        None => writer.write_blob(&[])?,
    }
    writer.write_flag(state.is_verified_session());
    writer.write_flag(state.is_prekey_bundle_required());
    writer.write_u32(state.raw_negotiated_session_version());

    if let Some(key) = state.session_key() {
        writer.write_blob(&codec.encode(key, master)?)?;
    }

    Ok(writer.into_bytes())
}

// ============================================================
// TESTS
// ============================================================
